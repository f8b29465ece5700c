// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Object-graph mapper: lopdf objects to the neutral `CosValue` tree and back.
//
// Used to carry annotations, form fields, font dictionaries, resource
// dictionaries, and content streams through JSON without interpreting them.

use std::collections::{BTreeMap, HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use satzwerk_core::cos::{CIRCULAR_MARKER, CosStream, CosValue};
use tracing::debug;

use crate::payload;

// -- Serialization ------------------------------------------------------------

/// Serializes objects of one source document.
///
/// References are followed. A reference that re-enters the current path
/// becomes the `__circular__` marker, and a reference to a page becomes a
/// `pageRef` carrying its 1-based number.
pub struct CosSerializer<'a> {
    doc: &'a Document,
    page_numbers: HashMap<ObjectId, u32>,
    path: HashSet<ObjectId>,
}

impl<'a> CosSerializer<'a> {
    pub fn new(doc: &'a Document) -> Self {
        let page_numbers = doc
            .get_pages()
            .into_iter()
            .map(|(number, id)| (id, number))
            .collect();
        Self {
            doc,
            page_numbers,
            path: HashSet::new(),
        }
    }

    pub fn serialize(&mut self, object: &Object) -> Option<CosValue> {
        match object {
            Object::Reference(id) => self.serialize_reference(*id),
            Object::Null => Some(CosValue::Null),
            Object::Boolean(value) => Some(CosValue::Boolean { value: *value }),
            Object::Integer(value) => Some(CosValue::Integer { value: *value }),
            Object::Real(value) => Some(CosValue::Float {
                value: f64::from(*value),
            }),
            Object::Name(name) => Some(CosValue::name(String::from_utf8_lossy(name))),
            Object::String(bytes, _) => Some(CosValue::String {
                value: payload::encode(bytes),
            }),
            Object::Array(items) => Some(CosValue::Array {
                items: items
                    .iter()
                    .map(|item| self.serialize(item).unwrap_or(CosValue::Null))
                    .collect(),
            }),
            Object::Dictionary(dict) => Some(CosValue::Dictionary {
                entries: self.serialize_entries(dict, &[]),
            }),
            Object::Stream(stream) => Some(CosValue::Stream {
                stream: self.serialize_stream(stream),
            }),
        }
    }

    /// Serialize a dictionary leaving out `skip_keys` at the top level.
    pub fn serialize_dictionary(&mut self, dict: &Dictionary, skip_keys: &[&[u8]]) -> CosValue {
        CosValue::Dictionary {
            entries: self.serialize_entries(dict, skip_keys),
        }
    }

    /// Serialize the object behind `id` with `skip_keys` removed from it.
    pub fn serialize_object(&mut self, id: ObjectId, skip_keys: &[&[u8]]) -> Option<CosValue> {
        let doc = self.doc;
        let dict = match doc.get_object(id).ok()? {
            Object::Dictionary(dict) => dict,
            other => return self.serialize(other),
        };
        self.path.insert(id);
        let value = self.serialize_dictionary(dict, skip_keys);
        self.path.remove(&id);
        Some(value)
    }

    pub fn serialize_stream(&mut self, stream: &Stream) -> CosStream {
        let dictionary = self.serialize_entries(&stream.dict, &[]);
        let raw_data = (!stream.content.is_empty()).then(|| payload::encode(&stream.content));
        CosStream {
            dictionary,
            raw_data,
        }
    }

    fn serialize_reference(&mut self, id: ObjectId) -> Option<CosValue> {
        if let Some(number) = self.page_numbers.get(&id) {
            return Some(CosValue::PageRef { value: *number });
        }
        if !self.path.insert(id) {
            return Some(CosValue::name(CIRCULAR_MARKER));
        }
        let doc = self.doc;
        let value = match doc.get_object(id) {
            Ok(object) => self.serialize(object),
            Err(err) => {
                debug!(?id, %err, "dangling reference serialized as null");
                Some(CosValue::Null)
            }
        };
        self.path.remove(&id);
        value
    }

    fn serialize_entries(
        &mut self,
        dict: &Dictionary,
        skip_keys: &[&[u8]],
    ) -> BTreeMap<String, CosValue> {
        let mut entries = BTreeMap::new();
        for (key, value) in dict.iter() {
            if skip_keys.contains(&key.as_slice()) {
                continue;
            }
            if let Some(serialized) = self.serialize(value) {
                entries.insert(String::from_utf8_lossy(key).into_owned(), serialized);
            }
        }
        entries
    }
}

// -- Deserialization ----------------------------------------------------------

/// Builds lopdf objects inside a target document.
///
/// Streams become new indirect objects. `pageRef` values reconnect to the
/// target's pages when known and become null otherwise.
pub struct CosBuilder<'a> {
    doc: &'a mut Document,
    page_ids: &'a BTreeMap<u32, ObjectId>,
}

impl<'a> CosBuilder<'a> {
    pub fn new(doc: &'a mut Document, page_ids: &'a BTreeMap<u32, ObjectId>) -> Self {
        Self { doc, page_ids }
    }

    /// Build an object; `None` when the value cannot be represented.
    pub fn build(&mut self, value: &CosValue) -> Option<Object> {
        match value {
            CosValue::Null => Some(Object::Null),
            CosValue::Boolean { value } => Some(Object::Boolean(*value)),
            CosValue::Integer { value } => Some(Object::Integer(*value)),
            CosValue::Float { value } => Some(Object::Real(*value as f32)),
            CosValue::Name { value } => Some(Object::Name(value.as_bytes().to_vec())),
            CosValue::String { value } => {
                payload::decode(value).map(|bytes| Object::String(bytes, StringFormat::Literal))
            }
            CosValue::Array { items } => Some(Object::Array(
                items
                    .iter()
                    .map(|item| self.build(item).unwrap_or(Object::Null))
                    .collect(),
            )),
            CosValue::Dictionary { entries } => {
                Some(Object::Dictionary(self.build_dictionary(entries)))
            }
            CosValue::Stream { stream } => Some(Object::Reference(self.build_stream(stream))),
            CosValue::PageRef { value } => Some(
                self.page_ids
                    .get(value)
                    .map(|id| Object::Reference(*id))
                    .unwrap_or(Object::Null),
            ),
        }
    }

    /// Build a dictionary, skipping entries that cannot be represented and
    /// entries that were cut at a cycle.
    pub fn build_dictionary(&mut self, entries: &BTreeMap<String, CosValue>) -> Dictionary {
        let mut dict = Dictionary::new();
        for (key, value) in entries {
            if value.is_circular_marker() {
                continue;
            }
            if let Some(object) = self.build(value) {
                dict.set(key.as_bytes().to_vec(), object);
            }
        }
        dict
    }

    /// Add a stream object and return its id. `Length` always matches the data.
    pub fn build_stream(&mut self, stream: &CosStream) -> ObjectId {
        let mut dict = self.build_dictionary(&stream.dictionary);
        let data = stream
            .raw_data
            .as_deref()
            .and_then(payload::decode)
            .unwrap_or_default();
        dict.set("Length", Object::Integer(data.len() as i64));
        self.doc.add_object(Object::Stream(Stream::new(dict, data)))
    }

    /// Build a value that must be a dictionary (or a stream's dictionary).
    pub fn build_dictionary_value(&mut self, value: &CosValue) -> Option<Dictionary> {
        match value {
            CosValue::Dictionary { entries } => Some(self.build_dictionary(entries)),
            _ => None,
        }
    }
}
