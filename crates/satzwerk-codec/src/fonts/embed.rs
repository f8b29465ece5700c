// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Turning catalogue entries back into font objects of a rebuilt document.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use lopdf::{Document, Object, ObjectId, dictionary};
use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::model::{DOCUMENT_SCOPE_PAGE, PdfJsonFont, font_uid};
use tracing::{debug, warn};

use crate::cos::CosBuilder;
use crate::fonts::cmap::write_to_unicode;
use crate::fonts::codec::FontCodec;
use crate::fonts::fallback::{FALLBACK_FONT_ID, FallbackFonts, is_fallback_id};
use crate::fonts::standard14;
use crate::payload;
use crate::pdf::objects::{name, real, text_string};
use crate::pdf::streams::flate_stream;

/// A font object present in the target document.
#[derive(Debug, Clone)]
pub struct LoadedFont {
    pub uid: String,
    pub object_id: ObjectId,
    pub codec: Arc<FontCodec>,
}

/// How a catalogue entry was turned into a font object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Snapshot,
    Program,
    Standard14,
}

/// Lazily materializes catalogue entries, once per uid.
pub struct FontMaterializer {
    models: HashMap<String, PdfJsonFont>,
    loaded: HashMap<String, Option<LoadedFont>>,
    fallback: FallbackFonts,
}

impl FontMaterializer {
    /// The default fallback entry is added when the catalogue lacks it.
    pub fn new(fonts: &[PdfJsonFont], fallback: FallbackFonts) -> Self {
        let mut models: HashMap<String, PdfJsonFont> = fonts
            .iter()
            .map(|font| {
                let uid = if font.uid.is_empty() {
                    font_uid(font.page_number, &font.id)
                } else {
                    font.uid.clone()
                };
                (uid, font.clone())
            })
            .collect();
        let default_uid = font_uid(DOCUMENT_SCOPE_PAGE, FALLBACK_FONT_ID);
        if !models.contains_key(&default_uid)
            && let Some(model) = fallback.font_model(FALLBACK_FONT_ID)
        {
            models.insert(default_uid, model);
        }
        Self {
            models,
            loaded: HashMap::new(),
            fallback,
        }
    }

    /// Catalogue entries sorted by uid, fallback entries included.
    pub fn models(&self) -> Vec<PdfJsonFont> {
        let sorted: BTreeMap<&String, &PdfJsonFont> = self.models.iter().collect();
        sorted.into_values().cloned().collect()
    }

    /// Font `font_id` as seen from `page_number`: the page entry first, then
    /// the document-scoped one, then a bundled fallback of that id.
    pub fn resolve(
        &mut self,
        doc: &mut Document,
        page_ids: &BTreeMap<u32, ObjectId>,
        page_number: u32,
        font_id: &str,
    ) -> Option<LoadedFont> {
        let page_uid = font_uid(page_number as i32, font_id);
        if self.models.contains_key(&page_uid) {
            return self.load(doc, page_ids, &page_uid);
        }
        let document_uid = font_uid(DOCUMENT_SCOPE_PAGE, font_id);
        if self.models.contains_key(&document_uid) {
            return self.load(doc, page_ids, &document_uid);
        }
        if is_fallback_id(font_id) {
            return self.fallback(doc, page_ids, font_id);
        }
        None
    }

    /// Resource ids of the catalogue entries belonging to one page, sorted.
    pub fn page_font_ids(&self, page_number: u32) -> Vec<String> {
        let mut ids: Vec<String> = self
            .models
            .values()
            .filter(|font| font.page_number == page_number as i32)
            .map(|font| font.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// A fallback font by id, registering its catalogue entry on first use.
    pub fn fallback(
        &mut self,
        doc: &mut Document,
        page_ids: &BTreeMap<u32, ObjectId>,
        id: &str,
    ) -> Option<LoadedFont> {
        let uid = font_uid(DOCUMENT_SCOPE_PAGE, id);
        if !self.models.contains_key(&uid) {
            let model = self.fallback.font_model(id)?;
            self.models.insert(uid.clone(), model);
        }
        self.load(doc, page_ids, &uid)
    }

    fn load(
        &mut self,
        doc: &mut Document,
        page_ids: &BTreeMap<u32, ObjectId>,
        uid: &str,
    ) -> Option<LoadedFont> {
        if let Some(loaded) = self.loaded.get(uid) {
            return loaded.clone();
        }
        let model = self.models.get(uid)?.clone();
        let loaded = match materialize(doc, page_ids, &model) {
            Some((object_id, codec, source)) => {
                debug!(uid, ?source, "font materialized");
                Some(LoadedFont {
                    uid: uid.to_string(),
                    object_id,
                    codec: Arc::new(codec),
                })
            }
            None if model.id != FALLBACK_FONT_ID => {
                warn!(uid, "font could not be materialized, using default fallback");
                self.fallback(doc, page_ids, FALLBACK_FONT_ID)
            }
            None => None,
        };
        self.loaded.insert(uid.to_string(), loaded.clone());
        loaded
    }
}

fn materialize(
    doc: &mut Document,
    page_ids: &BTreeMap<u32, ObjectId>,
    model: &PdfJsonFont,
) -> Option<(ObjectId, FontCodec, Source)> {
    if let Some(snapshot) = &model.cos_dictionary {
        let built = CosBuilder::new(doc, page_ids).build(snapshot);
        if let Some(Object::Dictionary(dict)) = built
            && dict.has(b"Subtype")
        {
            let id = doc.add_object(dict);
            if let Ok(dict) = doc.get_dictionary(id) {
                return Some((id, FontCodec::from_font(doc, dict), Source::Snapshot));
            }
        }
    }

    for (program, format) in [
        (&model.program, &model.program_format),
        (&model.pdf_program, &model.pdf_program_format),
        (&model.web_program, &model.web_program_format),
    ] {
        let usable = matches!(format.as_deref(), Some("ttf" | "otf") | None);
        let Some(bytes) = payload::decode_opt(program.as_deref()).filter(|_| usable) else {
            continue;
        };
        match embed_true_type(doc, model, &bytes) {
            Ok((id, codec)) => return Some((id, codec, Source::Program)),
            Err(err) => debug!(uid = %model.uid, %err, "program not embeddable"),
        }
    }

    let standard = model
        .standard14_name
        .as_deref()
        .and_then(standard14::mapped_name)
        .or_else(|| model.base_name.as_deref().and_then(standard14::mapped_name))?;
    let mut dict = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => standard,
    };
    if !standard14::is_symbolic(standard) {
        dict.set("Encoding", name("WinAnsiEncoding"));
    }
    let id = doc.add_object(dict);
    Some((id, FontCodec::standard14(standard), Source::Standard14))
}

/// Embed an sfnt program as a Type0 font with Identity-H encoding, glyph
/// ids as codes, and a generated ToUnicode CMap.
pub fn embed_true_type(
    doc: &mut Document,
    model: &PdfJsonFont,
    bytes: &[u8],
) -> Result<(ObjectId, FontCodec)> {
    let face = ttf_parser::Face::parse(bytes, 0)
        .map_err(|err| SatzwerkError::FontError(format!("failed to parse font program: {}", err)))?;
    let codec = FontCodec::from_face(&face);
    let upem = f64::from(face.units_per_em().max(1));
    let scale = |value: f64| (value * 1000.0 / upem).round();
    let bbox = face.global_bounding_box();
    let base_name = model
        .base_name
        .as_deref()
        .map(standard14::strip_subset_prefix)
        .unwrap_or(model.id.as_str())
        .replace(|c: char| c.is_whitespace() || c == '/', "");

    let program = flate_stream(
        dictionary! { "Length1" => bytes.len() as i64 },
        bytes,
    )?;
    let program_id = doc.add_object(program);

    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => name(&base_name),
        "Flags" => 32,
        "FontBBox" => vec![
            real(scale(f64::from(bbox.x_min))),
            real(scale(f64::from(bbox.y_min))),
            real(scale(f64::from(bbox.x_max))),
            real(scale(f64::from(bbox.y_max))),
        ],
        "ItalicAngle" => real(f64::from(face.italic_angle())),
        "Ascent" => real(scale(f64::from(face.ascender()))),
        "Descent" => real(scale(f64::from(face.descender()))),
        "CapHeight" => real(scale(f64::from(face.capital_height().unwrap_or(face.ascender())))),
        "StemV" => 80,
        "FontFile2" => Object::Reference(program_id),
    });

    let descendant_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => name(&base_name),
        "CIDSystemInfo" => dictionary! {
            "Registry" => text_string("Adobe"),
            "Ordering" => text_string("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => Object::Reference(descriptor_id),
        "DW" => 1000,
        "W" => width_array(&codec),
        "CIDToGIDMap" => "Identity",
    });

    let to_unicode = flate_stream(
        lopdf::Dictionary::new(),
        &write_to_unicode(codec.mappings(), 2),
    )?;
    let to_unicode_id = doc.add_object(to_unicode);

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => name(&base_name),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(descendant_id)],
        "ToUnicode" => Object::Reference(to_unicode_id),
    });
    Ok((font_id, codec))
}

/// `W` array grouping runs of consecutive glyph ids.
fn width_array(codec: &FontCodec) -> Vec<Object> {
    let mut array = Vec::new();
    let mut run_start: Option<u32> = None;
    let mut run: Vec<Object> = Vec::new();
    let mut previous = 0u32;
    for (code, width) in codec.width_entries() {
        if let Some(start) = run_start
            && code != previous + 1
        {
            array.push(Object::Integer(i64::from(start)));
            array.push(Object::Array(std::mem::take(&mut run)));
            run_start = None;
        }
        if run_start.is_none() {
            run_start = Some(code);
        }
        run.push(real(width.round()));
        previous = code;
    }
    if let Some(start) = run_start {
        array.push(Object::Integer(i64::from(start)));
        array.push(Object::Array(run));
    }
    array
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cos::CosSerializer;

    fn helvetica_snapshot() -> satzwerk_core::CosValue {
        let doc = Document::with_version("1.7");
        let font = Object::Dictionary(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        CosSerializer::new(&doc).serialize(&font).expect("snapshot")
    }

    #[test]
    fn snapshots_are_preferred_and_cached_by_uid() {
        let model = PdfJsonFont {
            id: "F1".into(),
            page_number: 1,
            uid: "1:F1".into(),
            cos_dictionary: Some(helvetica_snapshot()),
            ..PdfJsonFont::default()
        };
        let mut doc = Document::with_version("1.7");
        let pages = BTreeMap::new();
        let mut fonts = FontMaterializer::new(&[model], FallbackFonts::new(None));

        let first = fonts.resolve(&mut doc, &pages, 1, "F1").expect("resolved");
        let second = fonts.resolve(&mut doc, &pages, 1, "F1").expect("resolved again");
        assert_eq!(first.object_id, second.object_id);
        assert!(first.codec.can_encode("Grüße"));
        assert!(fonts.resolve(&mut doc, &pages, 2, "F1").is_none());
    }

    #[test]
    fn standard14_names_are_used_without_snapshot_or_program() {
        let model = PdfJsonFont {
            id: "F2".into(),
            page_number: 1,
            uid: "1:F2".into(),
            base_name: Some("ABCDEF+Arial-BoldMT".into()),
            ..PdfJsonFont::default()
        };
        let mut doc = Document::with_version("1.7");
        let pages = BTreeMap::new();
        let mut fonts = FontMaterializer::new(&[model], FallbackFonts::new(None));
        let loaded = fonts.resolve(&mut doc, &pages, 1, "F2").expect("resolved");
        let dict = doc.get_dictionary(loaded.object_id).expect("font dict");
        assert!(matches!(dict.get(b"BaseFont"), Ok(Object::Name(n)) if n == b"Helvetica-Bold"));
    }

    #[test]
    fn unusable_entries_fall_back_to_the_default_font() {
        let model = PdfJsonFont {
            id: "F3".into(),
            page_number: 1,
            uid: "1:F3".into(),
            base_name: Some("Mystery".into()),
            ..PdfJsonFont::default()
        };
        let mut doc = Document::with_version("1.7");
        let pages = BTreeMap::new();
        let mut fonts = FontMaterializer::new(&[model], FallbackFonts::new(None));
        let loaded = fonts.resolve(&mut doc, &pages, 1, "F3").expect("fallback");
        assert_eq!(loaded.uid, "-1:fallback-noto-sans");
        assert!(fonts.models().iter().any(|f| f.uid == "-1:fallback-noto-sans"));
    }

    #[test]
    fn document_scoped_entries_resolve_from_any_page() {
        let mut doc = Document::with_version("1.7");
        let pages = BTreeMap::new();
        let mut fonts = FontMaterializer::new(&[], FallbackFonts::new(None));
        let loaded = fonts
            .resolve(&mut doc, &pages, 7, FALLBACK_FONT_ID)
            .expect("default fallback");
        assert!(loaded.codec.can_encode("abc"));
        assert!(fonts.fallback(&mut doc, &pages, "fallback-noto-cjk").is_none());
        assert!(fonts.resolve(&mut doc, &pages, 7, "fallback-noto-cjk").is_none());
    }

    #[test]
    fn garbage_programs_are_rejected() {
        let mut doc = Document::with_version("1.7");
        let err = embed_true_type(&mut doc, &PdfJsonFont::default(), b"nope").expect_err("bad font");
        assert!(matches!(err, SatzwerkError::FontError(_)));
    }
}
