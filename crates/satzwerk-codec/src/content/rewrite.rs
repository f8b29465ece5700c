// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font preflight and in-place patching of preserved content streams.
//
// A patch replaces the bytes of every text-showing string with the edited
// text of the elements that string produced, re-encoded through the same
// font. It is all or nothing: the first disagreement between the operators
// and the elements abandons the patch and the page is regenerated.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use satzwerk_core::cos::{CosStream, CosValue};
use satzwerk_core::model::PdfJsonTextElement;
use tracing::{debug, trace, warn};

use crate::fonts::fallback::{FALLBACK_FONT_ID, resolve_fallback_font_id};
use crate::fonts::{FontMaterializer, LoadedFont};
use crate::payload;
use crate::pdf::objects::{name_of, stream_bytes};
use crate::pdf::streams::decode_operations;

// -- Preserved streams --------------------------------------------------------

/// Decoded bytes of one content-stream snapshot.
fn snapshot_bytes(stream: &CosStream) -> Vec<u8> {
    let data = payload::decode_opt(stream.raw_data.as_deref()).unwrap_or_default();
    let filter = match stream.dictionary.get("Filter") {
        Some(CosValue::Name { value }) => Some(Object::Name(value.as_bytes().to_vec())),
        Some(CosValue::Array { items }) => Some(Object::Array(
            items
                .iter()
                .filter_map(|item| match item {
                    CosValue::Name { value } => Some(Object::Name(value.as_bytes().to_vec())),
                    _ => None,
                })
                .collect(),
        )),
        _ => None,
    };
    let mut dict = Dictionary::new();
    if let Some(filter) = filter {
        dict.set("Filter", filter);
    }
    stream_bytes(&Stream::new(dict, data))
}

/// Operations of the page's preserved streams, concatenated.
///
/// `None` when nothing was preserved or the streams cannot be tokenized.
pub fn preserved_operations(streams: &[CosStream]) -> Option<Vec<Operation>> {
    if streams.is_empty() {
        return None;
    }
    let mut content = Vec::new();
    for stream in streams {
        content.extend_from_slice(&snapshot_bytes(stream));
        content.push(b'\n');
    }
    match decode_operations(&content) {
        Ok(operations) => Some(operations),
        Err(err) => {
            warn!(%err, "preserved content unreadable, page will be regenerated");
            None
        }
    }
}

/// XObject names drawn by `Do`.
pub fn referenced_xobjects(operations: &[Operation]) -> HashSet<String> {
    operations
        .iter()
        .filter(|op| op.operator == "Do")
        .filter_map(|op| op.operands.first().and_then(name_of))
        .collect()
}

/// Drop `Do` operators naming XObjects the page no longer has.
pub fn drop_missing_xobjects(
    operations: Vec<Operation>,
    known: &dyn Fn(&str) -> bool,
) -> Vec<Operation> {
    operations
        .into_iter()
        .filter(|op| {
            op.operator != "Do"
                || op
                    .operands
                    .first()
                    .and_then(name_of)
                    .is_some_and(|name| known(&name))
        })
        .collect()
}

// -- Preflight ----------------------------------------------------------------

/// Fonts resolved for a page's text elements.
#[derive(Debug, Default)]
pub struct Preflight {
    /// Font per element font id; `None` when the id did not resolve.
    pub fonts: HashMap<String, Option<LoadedFont>>,
    /// Fallback fonts registered for the page, by fallback id.
    pub fallbacks: BTreeMap<String, LoadedFont>,
    /// Some element cannot be drawn with its own font alone.
    pub needs_fallback: bool,
}

impl Preflight {
    pub fn run(
        doc: &mut Document,
        page_ids: &BTreeMap<u32, ObjectId>,
        materializer: &mut FontMaterializer,
        page_number: u32,
        elements: &[&PdfJsonTextElement],
    ) -> Self {
        let mut preflight = Self::default();
        let mut wanted: BTreeSet<&'static str> = BTreeSet::new();

        for element in elements {
            let font_id = element.font_id.as_deref().unwrap_or_default();
            let font = preflight
                .fonts
                .entry(font_id.to_string())
                .or_insert_with(|| {
                    if font_id.is_empty() {
                        None
                    } else {
                        materializer.resolve(doc, page_ids, page_number, font_id)
                    }
                })
                .clone();
            let native = font.as_ref().is_some_and(|f| resolves_to(f, font_id));
            let mut element_needs = !native;
            for c in element.text.chars() {
                let encodable = font.as_ref().is_some_and(|f| f.codec.can_encode_char(c));
                if !encodable {
                    element_needs = true;
                    wanted.insert(resolve_fallback_font_id(u32::from(c)));
                }
            }
            if element_needs {
                trace!(page = page_number, font_id, "element needs a fallback font");
                preflight.needs_fallback = true;
            }
        }

        if preflight.needs_fallback {
            wanted.insert(FALLBACK_FONT_ID);
        }
        for id in wanted {
            match materializer.fallback(doc, page_ids, id) {
                Some(font) => {
                    preflight.fallbacks.insert(id.to_string(), font);
                }
                None => debug!(page = page_number, id, "fallback font unavailable"),
            }
        }
        preflight
    }

    pub fn font(&self, font_id: &str) -> Option<&LoadedFont> {
        self.fonts.get(font_id).and_then(Option::as_ref)
    }
}

/// Whether `font` is the catalogue entry of `font_id` itself rather than a
/// substitute.
fn resolves_to(font: &LoadedFont, font_id: &str) -> bool {
    font.uid
        .split_once(':')
        .is_some_and(|(_, id)| id == font_id)
}

// -- Patch --------------------------------------------------------------------

/// Characters still to be placed, tagged with their element's font id.
struct Pending<'e> {
    chars: VecDeque<(&'e str, char)>,
}

impl<'e> Pending<'e> {
    fn new(elements: &[&'e PdfJsonTextElement]) -> Self {
        let chars = elements
            .iter()
            .copied()
            .flat_map(|element| {
                let font_id = element.font_id.as_deref().unwrap_or_default();
                element.text.chars().map(move |c| (font_id, c))
            })
            .collect();
        Self { chars }
    }

    /// Take `count` characters, all of which must belong to `font_id`.
    fn take(&mut self, font_id: &str, count: usize) -> Option<String> {
        let mut text = String::with_capacity(count);
        for _ in 0..count {
            let (owner, c) = self.chars.pop_front()?;
            if owner != font_id {
                return None;
            }
            text.push(c);
        }
        Some(text)
    }
}

/// Re-encode every shown string with the elements' text.
///
/// Returns `None` if any string disagrees with the elements in font or
/// glyph count, or if elements or strings are left over.
pub fn patch_text(
    operations: &[Operation],
    elements: &[&PdfJsonTextElement],
    preflight: &Preflight,
) -> Option<Vec<Operation>> {
    let mut pending = Pending::new(elements);
    let mut font_name: Option<String> = None;
    let mut patched = operations.to_vec();

    for op in &mut patched {
        match op.operator.as_str() {
            "Tf" => font_name = op.operands.first().and_then(name_of),
            "Tj" | "'" => {
                let target = op.operands.get_mut(0)?;
                patch_string(target, font_name.as_deref()?, preflight, &mut pending)?;
            }
            "\"" => {
                let target = op.operands.get_mut(2)?;
                patch_string(target, font_name.as_deref()?, preflight, &mut pending)?;
            }
            "TJ" => {
                let Some(Object::Array(items)) = op.operands.get_mut(0) else {
                    return None;
                };
                let font = font_name.as_deref()?;
                for item in items.iter_mut() {
                    if matches!(item, Object::String(..)) {
                        patch_string(item, font, preflight, &mut pending)?;
                    }
                }
            }
            _ => {}
        }
    }

    if !pending.chars.is_empty() {
        debug!(left = pending.chars.len(), "patch abandoned, characters left over");
        return None;
    }
    Some(patched)
}

fn patch_string(
    target: &mut Object,
    font_name: &str,
    preflight: &Preflight,
    pending: &mut Pending<'_>,
) -> Option<()> {
    let Object::String(bytes, _) = target else {
        return None;
    };
    let codec = &preflight.font(font_name)?.codec;
    let count = codec.codes(bytes).len();
    let Some(text) = pending.take(font_name, count) else {
        debug!(font = font_name, count, "patch abandoned, elements disagree with operators");
        return None;
    };
    let encoded = codec.encode(&text)?;
    let format = if codec.is_single_byte() {
        StringFormat::Literal
    } else {
        StringFormat::Hexadecimal
    };
    *target = Object::String(encoded, format);
    Some(())
}
