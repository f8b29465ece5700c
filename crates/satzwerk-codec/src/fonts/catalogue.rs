// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-document font catalogue built while walking page resources.
//
// Entries are keyed by `pageNumber:resourceName`. The expensive part of
// describing a font (program extraction, conversion, metrics) is cached by
// the identity of the font object in the document graph, so a font shared
// by many pages or resource names is processed once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId};
use satzwerk_core::model::{PdfJsonCidSystemInfo, PdfJsonFont, font_uid};
use tracing::debug;

use crate::cos::CosSerializer;
use crate::fonts::codec::{FontCodec, descendant_font};
use crate::fonts::program::{ProgramExtractor, font_descriptor};
use crate::fonts::standard14;
use crate::fonts::unicode::build_unicode_mapping;
use crate::payload;
use crate::pdf::objects::{
    get, get_dict, get_name, get_number, get_numbers, get_stream, get_text, page_resources,
    resolve, resolve_dict, stream_bytes,
};

/// Identity of a node in the document graph.
///
/// Indirect objects are identified by object id; direct dictionaries by
/// their address, which is stable while the document is borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Object(ObjectId),
    Inline(usize),
}

impl NodeKey {
    pub fn of(object: &Object) -> Self {
        match object {
            Object::Reference(id) => Self::Object(*id),
            other => Self::Inline(other as *const Object as usize),
        }
    }
}

/// Codecs of the fonts used by content streams, by font object identity.
#[derive(Debug, Default)]
pub struct CodecCache {
    codecs: HashMap<NodeKey, Arc<FontCodec>>,
}

impl CodecCache {
    /// Codec of the font object `font` (a reference or a direct dictionary).
    pub fn get(&mut self, doc: &Document, font: &Object) -> Option<Arc<FontCodec>> {
        let key = NodeKey::of(font);
        if let Some(codec) = self.codecs.get(&key) {
            return Some(Arc::clone(codec));
        }
        let dict = resolve_dict(doc, font)?;
        let codec = Arc::new(FontCodec::from_font(doc, dict));
        self.codecs.insert(key, Arc::clone(&codec));
        Some(codec)
    }
}

/// Resource name (form path included) to catalogue uid, for one page.
pub type PageFonts = BTreeMap<String, String>;

pub struct FontCatalogue<'a> {
    doc: &'a Document,
    extractor: &'a ProgramExtractor,
    lightweight: bool,
    described: HashMap<NodeKey, PdfJsonFont>,
    entries: BTreeMap<String, PdfJsonFont>,
    program_extractions: usize,
    pub codecs: CodecCache,
}

impl<'a> FontCatalogue<'a> {
    pub fn new(doc: &'a Document, extractor: &'a ProgramExtractor, lightweight: bool) -> Self {
        Self {
            doc,
            extractor,
            lightweight,
            described: HashMap::new(),
            entries: BTreeMap::new(),
            program_extractions: 0,
            codecs: CodecCache::default(),
        }
    }

    /// Number of distinct font objects whose programs were extracted.
    pub fn program_extractions(&self) -> usize {
        self.program_extractions
    }

    /// Register every font reachable from the page's resources, including
    /// those of nested form XObjects, and return the page's name map.
    pub fn collect_fonts_for_page(&mut self, page_number: u32, page_id: ObjectId) -> PageFonts {
        let mut fonts = PageFonts::new();
        let doc = self.doc;
        if let Some(resources) = page_resources(doc, page_id) {
            let mut visited = HashSet::new();
            self.walk_resources(page_number, resources, "", &mut visited, &mut fonts);
        }
        debug!(page = page_number, fonts = fonts.len(), "fonts collected");
        fonts
    }

    fn walk_resources(
        &mut self,
        page_number: u32,
        resources: &'a Dictionary,
        prefix: &str,
        visited: &mut HashSet<NodeKey>,
        fonts: &mut PageFonts,
    ) {
        let doc = self.doc;
        if let Some(font_dict) = get_dict(doc, resources, b"Font") {
            for (name, font) in font_dict.iter() {
                let id = format!("{}{}", prefix, String::from_utf8_lossy(name));
                let uid = font_uid(page_number as i32, &id);
                if !self.entries.contains_key(&uid) {
                    let mut entry = self.describe(font);
                    entry.id = id.clone();
                    entry.page_number = page_number as i32;
                    entry.uid = uid.clone();
                    self.entries.insert(uid.clone(), entry);
                }
                if self.codecs.get(doc, font).is_none() {
                    debug!(page = page_number, font_id = %id, "font object unreadable, no codec");
                }
                fonts.insert(id, uid);
            }
        }

        let Some(xobjects) = get_dict(doc, resources, b"XObject") else {
            return;
        };
        for (name, xobject) in xobjects.iter() {
            let Some(Object::Stream(stream)) = resolve(doc, xobject) else {
                continue;
            };
            if get_name(doc, &stream.dict, b"Subtype").as_deref() != Some("Form") {
                continue;
            }
            if !visited.insert(NodeKey::of(xobject)) {
                continue;
            }
            if let Some(form_resources) = get_dict(doc, &stream.dict, b"Resources") {
                let nested = format!("{}{}/", prefix, String::from_utf8_lossy(name));
                self.walk_resources(page_number, form_resources, &nested, visited, fonts);
            }
        }
    }

    /// Page-independent description of a font object, cached by identity.
    fn describe(&mut self, font: &Object) -> PdfJsonFont {
        let key = NodeKey::of(font);
        if let Some(described) = self.described.get(&key) {
            return described.clone();
        }
        let described = self.extract_font_model(font);
        self.described.insert(key, described.clone());
        described
    }

    fn extract_font_model(&mut self, font: &Object) -> PdfJsonFont {
        let doc = self.doc;
        let mut model = PdfJsonFont::default();
        let Some(dict) = resolve_dict(doc, font) else {
            return model;
        };
        model.base_name = get_name(doc, dict, b"BaseFont");
        model.subtype = get_name(doc, dict, b"Subtype");
        model.encoding = match get(doc, dict, b"Encoding") {
            Some(Object::Name(name)) => Some(String::from_utf8_lossy(name).into_owned()),
            Some(Object::Dictionary(encoding)) => get_name(doc, encoding, b"BaseEncoding"),
            _ => None,
        };
        let is_cid = model.subtype.as_deref() == Some("Type0");
        if is_cid {
            model.cid_system_info = descendant_font(doc, dict)
                .and_then(|d| get_dict(doc, d, b"CIDSystemInfo"))
                .map(|info| PdfJsonCidSystemInfo {
                    registry: get_text(doc, info, b"Registry"),
                    ordering: get_text(doc, info, b"Ordering"),
                    supplement: get_number(doc, info, b"Supplement").map(|s| s as i64),
                });
        }
        model.standard14_name = model
            .base_name
            .as_deref()
            .and_then(standard14::mapped_name)
            .map(str::to_string);

        let to_unicode = get_stream(doc, dict, b"ToUnicode").map(stream_bytes);
        if let Some(raw) = &to_unicode {
            model.to_unicode = Some(payload::encode(&build_unicode_mapping(is_cid, raw)));
        }

        if let Some(descriptor) = font_descriptor(doc, dict) {
            model.font_descriptor_flags = get_number(doc, descriptor, b"Flags").map(|f| f as i64);
            model.ascent = get_number(doc, descriptor, b"Ascent");
            model.descent = get_number(doc, descriptor, b"Descent");
            model.cap_height = get_number(doc, descriptor, b"CapHeight");
            model.x_height = get_number(doc, descriptor, b"XHeight");
            model.italic_angle = get_number(doc, descriptor, b"ItalicAngle");

            self.program_extractions += 1;
            if let Some(programs) = self.extractor.extract(doc, descriptor, to_unicode.as_deref()) {
                model.embedded = programs.original.is_some();
                if let Some(original) = programs.original {
                    model.program = Some(payload::encode(&original.bytes));
                    model.program_format = Some(original.format);
                }
                if let Some(web) = programs.web {
                    model.web_program = Some(payload::encode(&web.bytes));
                    model.web_program_format = Some(web.format);
                }
                if let Some(pdf) = programs.pdf {
                    model.pdf_program = Some(payload::encode(&pdf.bytes));
                    model.pdf_program_format = Some(pdf.format);
                }
            }
        }

        model.units_per_em = Some(units_per_em(doc, dict));

        if !(self.lightweight && model.has_program()) {
            model.cos_dictionary = CosSerializer::new(doc).serialize(font);
        }
        model
    }

    pub fn get(&self, uid: &str) -> Option<&PdfJsonFont> {
        self.entries.get(uid)
    }

    /// Catalogue entries sorted by uid.
    pub fn into_fonts(self) -> Vec<PdfJsonFont> {
        self.entries.into_values().collect()
    }
}

/// `1 / FontMatrix[0]` when plausible, else 1000.
fn units_per_em(doc: &Document, font: &Dictionary) -> u32 {
    get_numbers(doc, font, b"FontMatrix")
        .and_then(|matrix| matrix.first().copied())
        .filter(|a| *a > 0.0)
        .map(|a| (1.0 / a).round())
        .filter(|units| *units > 0.0 && *units <= 10_000.0)
        .map(|units| units as u32)
        .unwrap_or(1000)
}
