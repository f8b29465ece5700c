// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page annotations: structured summary plus a raw snapshot on extraction,
// snapshot-first restoration on reconstruction.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use satzwerk_core::model::PdfJsonAnnotation;
use tracing::{debug, warn};

use crate::cos::{CosBuilder, CosSerializer};
use crate::metadata::{format_pdf_date, get_date};
use crate::pdf::objects::{get, get_name, get_numbers, get_text, name, real, resolve, text_string};

/// Back-pointers left out of snapshots and re-established on restore.
const SNAPSHOT_SKIP_KEYS: &[&[u8]] = &[b"P", b"Parent"];

/// Annotation entries of a page: the resolved `/Annots` items.
pub fn annotation_refs(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match get(doc, page, b"Annots") {
        Some(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

pub fn is_widget(doc: &Document, annotation: &Object) -> bool {
    resolve(doc, annotation)
        .and_then(|object| object.as_dict().ok())
        .and_then(|dict| get_name(doc, dict, b"Subtype"))
        .is_some_and(|subtype| subtype == "Widget")
}

// -- Extraction ---------------------------------------------------------------

pub fn extract_annotations(
    doc: &Document,
    serializer: &mut CosSerializer<'_>,
    page_id: ObjectId,
) -> Vec<PdfJsonAnnotation> {
    let mut annotations = Vec::new();
    for entry in annotation_refs(doc, page_id) {
        let Some(Object::Dictionary(dict)) = resolve(doc, &entry) else {
            debug!(?entry, "annotation entry is not a dictionary");
            continue;
        };
        let raw_data = match &entry {
            Object::Reference(id) => serializer.serialize_object(*id, SNAPSHOT_SKIP_KEYS),
            _ => Some(serializer.serialize_dictionary(dict, SNAPSHOT_SKIP_KEYS)),
        };
        annotations.push(PdfJsonAnnotation {
            subtype: get_name(doc, dict, b"Subtype"),
            contents: get_text(doc, dict, b"Contents"),
            rect: get_numbers(doc, dict, b"Rect"),
            appearance_state: get_name(doc, dict, b"AS"),
            color: get_numbers(doc, dict, b"C"),
            author: get_text(doc, dict, b"T"),
            subject: get_text(doc, dict, b"Subj"),
            creation_date: get_date(doc, dict, b"CreationDate"),
            modification_date: get_date(doc, dict, b"M"),
            raw_data,
        });
    }
    annotations
}

// -- Restoration --------------------------------------------------------------

/// Add the annotations of one page to `doc` and return references to them.
///
/// Widgets are skipped when `skip_widgets` is set; form restoration owns
/// them then.
pub fn restore_annotations(
    doc: &mut Document,
    page_ids: &BTreeMap<u32, ObjectId>,
    page_number: u32,
    annotations: &[PdfJsonAnnotation],
    skip_widgets: bool,
) -> Vec<Object> {
    let Some(page_id) = page_ids.get(&page_number).copied() else {
        return Vec::new();
    };
    let mut restored = Vec::new();
    for (index, annotation) in annotations.iter().enumerate() {
        if skip_widgets && annotation.subtype.as_deref() == Some("Widget") {
            continue;
        }
        let snapshot = annotation
            .raw_data
            .as_ref()
            .and_then(|raw| CosBuilder::new(doc, page_ids).build_dictionary_value(raw))
            .filter(|dict| !dict.is_empty());
        let mut dict = match snapshot {
            Some(dict) => dict,
            None => match structured_annotation(annotation) {
                Some(dict) => dict,
                None => {
                    warn!(page = page_number, index, "annotation skipped, no snapshot and no rect");
                    continue;
                }
            },
        };
        dict.set("P", Object::Reference(page_id));
        restored.push(Object::Reference(doc.add_object(dict)));
    }
    restored
}

/// Minimal annotation built from the structured fields.
fn structured_annotation(annotation: &PdfJsonAnnotation) -> Option<Dictionary> {
    let rect = annotation
        .rect
        .as_ref()
        .filter(|rect| rect.len() == 4 && rect.iter().all(|v| v.is_finite()))?;
    let subtype = annotation.subtype.as_deref().unwrap_or("Text");
    let mut dict = dictionary! {
        "Type" => "Annot",
        "Subtype" => name(subtype),
        "Rect" => rect.iter().map(|v| real(*v)).collect::<Vec<Object>>(),
    };
    if let Some(contents) = &annotation.contents {
        dict.set("Contents", text_string(contents));
    }
    if let Some(color) = &annotation.color {
        dict.set("C", color.iter().map(|v| real(*v)).collect::<Vec<Object>>());
    }
    if let Some(author) = &annotation.author {
        dict.set("T", text_string(author));
    }
    if let Some(subject) = &annotation.subject {
        dict.set("Subj", text_string(subject));
    }
    if let Some(date) = annotation.modification_date.as_deref().and_then(format_pdf_date) {
        dict.set("M", Object::string_literal(date));
    }
    if let Some(state) = &annotation.appearance_state {
        dict.set("AS", name(state));
    }
    Some(dict)
}
