// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Base64 payload helpers for binary data carried in the JSON model.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a payload; malformed input yields `None` and a debug log.
pub fn decode(encoded: &str) -> Option<Vec<u8>> {
    match STANDARD.decode(encoded.trim()) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            debug!(%err, "invalid base64 payload");
            None
        }
    }
}

/// Decode an optional, possibly blank payload.
pub fn decode_opt(encoded: Option<&str>) -> Option<Vec<u8>> {
    encoded
        .filter(|s| !s.trim().is_empty())
        .and_then(decode)
        .filter(|bytes| !bytes.is_empty())
}
