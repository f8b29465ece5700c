// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed accessors over the lopdf object graph: reference resolution, numbers,
// names, text strings, and page attributes inherited through the page tree.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// Deepest reference chain followed before giving up.
const MAX_REFERENCE_DEPTH: usize = 32;

/// Follow `Reference` objects until a direct object is reached.
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    let mut current = object;
    for _ in 0..MAX_REFERENCE_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Resolve to a dictionary; a stream yields its dictionary.
pub fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

pub fn resolve_stream<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Stream> {
    match resolve(doc, object)? {
        Object::Stream(stream) => Some(stream),
        _ => None,
    }
}

/// Look up `key` in `dict` and resolve the value.
pub fn get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    resolve(doc, dict.get(key).ok()?)
}

pub fn get_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    resolve_dict(doc, dict.get(key).ok()?)
}

pub fn get_stream<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Stream> {
    resolve_stream(doc, dict.get(key).ok()?)
}

pub fn get_name(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    name_of(get(doc, dict, key)?)
}

pub fn get_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    number(get(doc, dict, key)?)
}

pub fn get_text(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match get(doc, dict, key)? {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

pub fn get_numbers(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<Vec<f64>> {
    match get(doc, dict, key)? {
        Object::Array(items) => items
            .iter()
            .map(|item| resolve(doc, item).and_then(number))
            .collect(),
        _ => None,
    }
}

pub fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

pub fn name_of(object: &Object) -> Option<String> {
    match object {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Reference id of `object`, if it is indirect.
pub fn reference_id(object: &Object) -> Option<ObjectId> {
    match object {
        Object::Reference(id) => Some(*id),
        _ => None,
    }
}

/// Numeric object, integral values written as integers.
pub fn real(value: f64) -> Object {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Object::Integer(value as i64)
    } else {
        Object::Real(value as f32)
    }
}

pub fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

/// PDF text string: UTF-16BE with BOM unless the value is plain ASCII.
pub fn text_string(value: &str) -> Object {
    if value.chars().all(|c| (c as u32) < 0x80) {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Decode a PDF text string (UTF-16BE/LE with BOM, UTF-8 with BOM, or
/// PDFDocEncoding approximated as Latin-1).
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(&bytes[3..]).into_owned();
    }
    bytes.iter().map(|&b| char::from(b)).collect()
}

// -- Page tree ----------------------------------------------------------------

/// Look up a page attribute, walking `/Parent` for inheritable keys.
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_REFERENCE_DEPTH {
        if let Some(value) = get(doc, current, key) {
            return Some(value);
        }
        current = get_dict(doc, current, b"Parent")?;
    }
    None
}

pub fn page_resources<'a>(doc: &'a Document, page_id: ObjectId) -> Option<&'a Dictionary> {
    match inherited(doc, page_id, b"Resources")? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Width and height from CropBox, else MediaBox, else US Letter.
pub fn page_size(doc: &Document, page_id: ObjectId) -> (f64, f64) {
    let read_box = |key: &[u8]| -> Option<(f64, f64)> {
        let values = match inherited(doc, page_id, key)? {
            Object::Array(items) => items
                .iter()
                .map(|item| resolve(doc, item).and_then(number))
                .collect::<Option<Vec<f64>>>()?,
            _ => return None,
        };
        if values.len() != 4 {
            return None;
        }
        Some(((values[2] - values[0]).abs(), (values[3] - values[1]).abs()))
    };
    read_box(b"CropBox")
        .or_else(|| read_box(b"MediaBox"))
        .unwrap_or((612.0, 792.0))
}

pub fn page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited(doc, page_id, b"Rotate")
        .and_then(number)
        .map(|r| (r as i64).rem_euclid(360))
        .unwrap_or(0)
}

/// Ids of the page's content streams, in drawing order.
pub fn content_stream_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.iter().filter_map(reference_id).collect(),
            Ok(_) => vec![*id],
            Err(_) => Vec::new(),
        },
        Ok(Object::Array(items)) => items.iter().filter_map(reference_id).collect(),
        _ => Vec::new(),
    }
}

/// Stream bytes with filters removed; raw bytes when decoding is not possible.
pub fn stream_bytes(stream: &Stream) -> Vec<u8> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone())
    } else {
        stream.content.clone()
    }
}

/// Concatenated, decoded content of every content stream of a page.
pub fn page_content(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let mut content = Vec::new();
    for id in content_stream_ids(doc, page_id) {
        if let Ok(Object::Stream(stream)) = doc.get_object(id) {
            content.extend_from_slice(&stream_bytes(stream));
            content.push(b'\n');
        }
    }
    content
}
