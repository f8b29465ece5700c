// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream tokenizing and Flate-compressed stream construction.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, Stream};
use satzwerk_core::error::SatzwerkError;

/// Tokenize decoded content-stream bytes into operations.
pub fn decode_operations(bytes: &[u8]) -> Result<Vec<Operation>, SatzwerkError> {
    Content::decode(bytes)
        .map(|content| content.operations)
        .map_err(|err| SatzwerkError::ContentError(format!("failed to tokenize content: {}", err)))
}

pub fn encode_operations(operations: Vec<Operation>) -> Result<Vec<u8>, SatzwerkError> {
    Content { operations }
        .encode()
        .map_err(|err| SatzwerkError::ContentError(format!("failed to encode content: {}", err)))
}

/// Build a stream whose payload is Flate-compressed.
pub fn flate_stream(mut dict: Dictionary, data: &[u8]) -> Result<Stream, SatzwerkError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    Ok(Stream::new(dict, compressed))
}

/// Flate-compressed content stream for a list of operations.
pub fn content_stream(operations: Vec<Operation>) -> Result<Stream, SatzwerkError> {
    let bytes = encode_operations(operations)?;
    flate_stream(Dictionary::new(), &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::objects::stream_bytes;

    #[test]
    fn flate_streams_decode_back_to_input() {
        let stream = flate_stream(Dictionary::new(), b"BT /F1 12 Tf (Hi) Tj ET").expect("compress");
        assert_eq!(stream_bytes(&stream), b"BT /F1 12 Tf (Hi) Tj ET");
    }

    #[test]
    fn operations_survive_encode_and_decode() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
            Operation::new("ET", vec![]),
        ];
        let bytes = encode_operations(ops).expect("encode");
        let decoded = decode_operations(&bytes).expect("decode");
        let operators: Vec<&str> = decoded.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators, ["BT", "Tf", "ET"]);
    }
}
