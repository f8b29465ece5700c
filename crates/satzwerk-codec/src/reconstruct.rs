// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Model to document reconstruction.
//
// Each page is rebuilt in one of four modes. A page with preserved content
// streams is patched in place when every element keeps its own font and
// glyph count; otherwise its non-text drawing is kept as a background layer
// and the elements are drawn on top. Pages without preserved streams are
// drawn from the elements alone.

use std::collections::{BTreeMap, HashSet};

use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId};
use satzwerk_core::config::CodecConfig;
use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::model::{
    PdfJsonDocument, PdfJsonImageElement, PdfJsonPage, PdfJsonPageDimension, PdfJsonTextElement,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::annotations::restore_annotations;
use crate::content::rewrite::{drop_missing_xobjects, referenced_xobjects};
use crate::content::{
    PageMode, PageResources, Preflight, compose, is_form_owned, patch_text, preserved_operations,
    vector_layer,
};
use crate::cos::CosBuilder;
use crate::fonts::{FallbackFonts, FontMaterializer};
use crate::forms::restore_form_fields;
use crate::metadata::apply_metadata;
use crate::pdf::document::{self, PageTree};
use crate::pdf::objects::real;
use crate::pdf::streams::content_stream;

const DEFAULT_PAGE_WIDTH: f64 = 612.0;
const DEFAULT_PAGE_HEIGHT: f64 = 792.0;

/// Mode chosen for every rebuilt page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconstructionReport {
    pub modes: BTreeMap<u32, PageMode>,
}

impl ReconstructionReport {
    pub fn count(&self, mode: PageMode) -> usize {
        self.modes.values().filter(|m| **m == mode).count()
    }
}

/// Page dictionary entries produced for one page.
#[derive(Debug)]
pub(crate) struct BuiltPage {
    /// `MediaBox`, `Rotate`, `Resources` and, when anything is drawn, `Contents`.
    pub entries: Dictionary,
    pub mode: PageMode,
}

#[instrument(skip_all, fields(pages = document.pages.len(), fonts = document.fonts.len()))]
pub fn reconstruct(
    document: &PdfJsonDocument,
    config: &CodecConfig,
) -> Result<(Vec<u8>, ReconstructionReport)> {
    let mut pages: BTreeMap<u32, &PdfJsonPage> = BTreeMap::new();
    for (index, page) in document.pages.iter().enumerate() {
        let number = if page.page_number == 0 {
            index as u32 + 1
        } else {
            page.page_number
        };
        if pages.insert(number, page).is_some() {
            warn!(page = number, "duplicate page number, later page wins");
        }
    }

    let mut doc = Document::with_version("1.7");
    let tree = PageTree::reserve(&mut doc, pages.keys().copied());
    let mut materializer = FontMaterializer::new(
        &document.fonts,
        FallbackFonts::new(config.fallback_font_dir.clone()),
    );
    let form = restore_form_fields(&mut doc, &tree.page_ids, &document.form_fields);

    let mut report = ReconstructionReport::default();
    let mut dictionaries = BTreeMap::new();
    for (number, page) in &pages {
        let built =
            build_page(&mut doc, &tree.page_ids, &mut materializer, *number, page, None)?;
        let mut entries = built.entries;

        let mut annots = restore_annotations(
            &mut doc,
            &tree.page_ids,
            *number,
            &page.annotations,
            form.is_some(),
        );
        if let Some(widgets) = form.as_ref().and_then(|f| f.widgets.get(number)) {
            annots.extend(widgets.iter().map(|id| Object::Reference(*id)));
        }
        if !annots.is_empty() {
            entries.set("Annots", Object::Array(annots));
        }

        debug!(page = number, mode = %built.mode, "page rebuilt");
        report.modes.insert(*number, built.mode);
        dictionaries.insert(*number, entries);
    }

    let catalog_id = tree.finish(&mut doc, dictionaries);
    if let Some(form) = form {
        let form_id = doc.add_object(form.acro_form);
        doc.get_object_mut(catalog_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| SatzwerkError::PdfError(format!("failed to attach form: {}", err)))?
            .set("AcroForm", Object::Reference(form_id));
    }
    apply_metadata(
        &mut doc,
        catalog_id,
        &document.metadata,
        document.xmp_metadata.as_deref(),
    );

    let bytes = document::save(&mut doc)?;
    info!(
        pages = report.modes.len(),
        reused = report.count(PageMode::Reuse),
        overlaid = report.count(PageMode::VectorOverlay),
        cleared = report.count(PageMode::Clear),
        output_bytes = bytes.len(),
        "document reconstructed"
    );
    Ok((bytes, report))
}

/// Rebuild one page's drawing into `doc`.
///
/// Size and rotation missing from `page` come from `current` when given,
/// else from the letter-size defaults.
pub(crate) fn build_page(
    doc: &mut Document,
    page_ids: &BTreeMap<u32, ObjectId>,
    materializer: &mut FontMaterializer,
    number: u32,
    page: &PdfJsonPage,
    current: Option<&PdfJsonPageDimension>,
) -> Result<BuiltPage> {
    let mut resources = page
        .resources
        .as_ref()
        .and_then(|snapshot| CosBuilder::new(doc, page_ids).build_dictionary_value(snapshot))
        .unwrap_or_default();
    let xobjects = match resources.remove(b"XObject") {
        Some(Object::Dictionary(xobjects)) => xobjects,
        _ => Dictionary::new(),
    };
    let mut names = PageResources::new(xobjects);

    let preserved = preserved_operations(&page.content_streams);
    let layered = preserved.is_some();
    // Form content and inline images stay inside the preserved streams.
    let texts: Vec<&PdfJsonTextElement> = page
        .text_elements
        .iter()
        .filter(|t| !layered || !t.font_id.as_deref().is_some_and(is_form_owned))
        .collect();
    let images: Vec<&PdfJsonImageElement> = page
        .image_elements
        .iter()
        .filter(|i| {
            !layered || !(i.inline_image || i.object_name.as_deref().is_some_and(is_form_owned))
        })
        .collect();

    let (streams, mode) = match preserved {
        None if texts.is_empty() && images.is_empty() => (Vec::new(), PageMode::NoContent),
        None => {
            let preflight = Preflight::run(doc, page_ids, materializer, number, &texts);
            let drawn = compose(doc, &mut names, &preflight, &texts, &images);
            (vec![drawn], PageMode::Clear)
        }
        Some(operations) => {
            let preflight = Preflight::run(doc, page_ids, materializer, number, &texts);
            let patched = if preflight.needs_fallback {
                debug!(page = number, "fallback fonts needed, patch skipped");
                None
            } else {
                patch_text(&operations, &texts, &preflight)
            };
            match patched {
                Some(patched) => {
                    for id in materializer.page_font_ids(number) {
                        if is_form_owned(&id) {
                            continue;
                        }
                        if let Some(font) = materializer.resolve(doc, page_ids, number, &id) {
                            names.font_name(&id, font.object_id);
                        }
                    }
                    let (kept, appended) = reuse(doc, &mut names, &preflight, patched, &images);
                    (vec![kept, appended], PageMode::Reuse)
                }
                None => {
                    let redrawn: HashSet<String> =
                        images.iter().filter_map(|i| i.object_name.clone()).collect();
                    let layer = {
                        let known = |name: &str| names.has_xobject(name);
                        vector_layer(operations, &redrawn, &known)
                    };
                    let drawn = compose(doc, &mut names, &preflight, &texts, &images);
                    (vec![layer, drawn], PageMode::VectorOverlay)
                }
            }
        }
    };

    let fonts = names.font_dict();
    if !fonts.is_empty() {
        resources.set("Font", Object::Dictionary(fonts));
    }
    let xobjects = names.xobject_dict();
    if !xobjects.is_empty() {
        resources.set("XObject", Object::Dictionary(xobjects));
    }

    let mut contents = Vec::new();
    for operations in streams.into_iter().filter(|ops| !ops.is_empty()) {
        contents.push(Object::Reference(doc.add_object(content_stream(operations)?)));
    }

    let usable = |v: Option<f64>| v.filter(|v| v.is_finite() && *v > 0.0);
    let width = usable(page.width)
        .or_else(|| usable(current.map(|c| c.width)))
        .unwrap_or(DEFAULT_PAGE_WIDTH);
    let height = usable(page.height)
        .or_else(|| usable(current.map(|c| c.height)))
        .unwrap_or(DEFAULT_PAGE_HEIGHT);
    let rotation = page.rotation.or(current.map(|c| c.rotation)).unwrap_or(0);
    let mut entries = Dictionary::new();
    entries.set("MediaBox", vec![real(0.0), real(0.0), real(width), real(height)]);
    entries.set("Rotate", Object::Integer(rotation));
    entries.set("Resources", Object::Dictionary(resources));
    match contents.len() {
        0 => {}
        1 => entries.set("Contents", contents.remove(0)),
        _ => entries.set("Contents", Object::Array(contents)),
    }
    Ok(BuiltPage { entries, mode })
}

/// Patched operations with image XObjects rebound by name, plus operations
/// drawing the images the patched streams do not reference.
fn reuse(
    doc: &mut Document,
    names: &mut PageResources,
    preflight: &Preflight,
    patched: Vec<Operation>,
    images: &[&PdfJsonImageElement],
) -> (Vec<Operation>, Vec<Operation>) {
    let referenced = referenced_xobjects(&patched);
    let mut rebound: HashSet<String> = HashSet::new();
    let mut fresh = Vec::new();
    for image in images {
        let Some(name) = image
            .object_name
            .as_deref()
            .filter(|name| referenced.contains(*name))
        else {
            fresh.push(*image);
            continue;
        };
        if rebound.contains(name) {
            continue;
        }
        if !names.has_xobject(name) && names.rebind(doc, name, image) {
            rebound.insert(name.to_string());
        } else {
            fresh.push(*image);
        }
    }
    let kept = {
        let known = |name: &str| names.has_xobject(name);
        drop_missing_xobjects(patched, &known)
    };
    let appended = compose(doc, names, preflight, &[], &fresh);
    (kept, appended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_document;
    use crate::pdf::objects::page_content;
    use crate::pdf::streams::decode_operations;
    use crate::progress::NoProgress;
    use crate::testing::sample_pdf;

    fn round_trip(bytes: &[u8]) -> PdfJsonDocument {
        extract_document(bytes, &CodecConfig::default(), false, &NoProgress).expect("extract")
    }

    fn texts(page: &PdfJsonPage) -> Vec<&str> {
        page.text_elements.iter().map(|e| e.text.as_str()).collect()
    }

    fn operators_of_page(bytes: &[u8], number: u32) -> Vec<String> {
        let doc = document::load(bytes).expect("load");
        let page_id = doc.get_pages()[&number];
        decode_operations(&page_content(&doc, page_id))
            .expect("decode")
            .into_iter()
            .map(|op| op.operator)
            .collect()
    }

    #[test]
    fn unchanged_documents_round_trip_through_the_patch_path() {
        let original = round_trip(&sample_pdf(2));
        let (bytes, report) = reconstruct(&original, &CodecConfig::default()).expect("rebuild");
        assert_eq!(report.modes.values().collect::<Vec<_>>(), [&PageMode::Reuse; 2]);

        let rebuilt = round_trip(&bytes);
        assert_eq!(rebuilt.pages.len(), 2);
        for (before, after) in original.pages.iter().zip(&rebuilt.pages) {
            assert_eq!(texts(before), texts(after));
            assert_eq!(before.image_elements.len(), after.image_elements.len());
            for (a, b) in before.image_elements.iter().zip(&after.image_elements) {
                for (x, y) in [(a.left, b.left), (a.bottom, b.bottom), (a.width, b.width)] {
                    let (x, y) = (x.expect("bound"), y.expect("bound"));
                    assert!((x - y).abs() < 1e-3, "{} vs {}", x, y);
                }
            }
        }
        let first: Vec<_> = original.pages[0]
            .text_elements
            .iter()
            .map(|e| (e.font_id.clone(), e.text_matrix.clone()))
            .collect();
        let again: Vec<_> = rebuilt.pages[0]
            .text_elements
            .iter()
            .map(|e| (e.font_id.clone(), e.text_matrix.clone()))
            .collect();
        assert_eq!(first, again);
        assert_eq!(rebuilt.metadata.title.as_deref(), Some("Sample"));
    }

    #[test]
    fn edits_of_equal_length_are_patched_in_place() {
        let mut model = round_trip(&sample_pdf(1));
        model.pages[0].text_elements[1].text = "Howdy".into();
        let (bytes, report) = reconstruct(&model, &CodecConfig::default()).expect("rebuild");
        assert_eq!(report.modes.get(&1), Some(&PageMode::Reuse));
        assert_eq!(texts(&round_trip(&bytes).pages[0]), ["Page 1", "Howdy", "World"]);
    }

    #[test]
    fn a_flipped_font_id_forces_regeneration() {
        let mut model = round_trip(&sample_pdf(2));
        model.pages[0].text_elements[0].font_id = Some("Missing".into());
        let (bytes, report) = reconstruct(&model, &CodecConfig::default()).expect("rebuild");
        assert_eq!(report.modes.get(&1), Some(&PageMode::VectorOverlay));
        assert_eq!(report.modes.get(&2), Some(&PageMode::Reuse));

        let operators = operators_of_page(&bytes, 1);
        assert!(operators.iter().any(|op| op == "re"), "vector layer kept");
        assert_eq!(operators.iter().filter(|op| *op == "Do").count(), 1);
        let rebuilt = round_trip(&bytes);
        assert_eq!(texts(&rebuilt.pages[0]), ["Page 1", "Hello", "World"]);
        assert_eq!(rebuilt.pages[0].image_elements.len(), 1);
    }

    #[test]
    fn unencodable_text_is_drawn_with_placeholders() {
        let mut model = round_trip(&sample_pdf(1));
        model.pages[0].text_elements[1].text = "漢字".into();
        let (bytes, report) = reconstruct(&model, &CodecConfig::default()).expect("rebuild");
        assert_eq!(report.modes.get(&1), Some(&PageMode::VectorOverlay));
        let rebuilt = round_trip(&bytes);
        assert!(texts(&rebuilt.pages[0]).contains(&"??"));
    }

    #[test]
    fn pages_without_preserved_streams_are_drawn_or_left_empty() {
        let model = PdfJsonDocument {
            pages: vec![
                PdfJsonPage {
                    page_number: 1,
                    text_elements: vec![PdfJsonTextElement {
                        text: "Hi".into(),
                        font_id: Some("F1".into()),
                        font_size: Some(12.0),
                        x: Some(72.0),
                        y: Some(700.0),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                PdfJsonPage {
                    page_number: 0,
                    width: Some(200.0),
                    height: Some(100.0),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let (bytes, report) = reconstruct(&model, &CodecConfig::default()).expect("rebuild");
        assert_eq!(report.modes.get(&1), Some(&PageMode::Clear));
        assert_eq!(report.modes.get(&2), Some(&PageMode::NoContent));

        let rebuilt = round_trip(&bytes);
        assert_eq!(texts(&rebuilt.pages[0]), ["Hi"]);
        assert!(rebuilt.pages[1].text_elements.is_empty());
        assert_eq!(rebuilt.pages[1].width, Some(200.0));
        assert_eq!(rebuilt.pages[0].width, Some(DEFAULT_PAGE_WIDTH));
    }

    #[test]
    fn degenerate_images_are_skipped_without_error() {
        let mut model = round_trip(&sample_pdf(1));
        model.pages[0].content_streams.clear();
        let image = &mut model.pages[0].image_elements[0];
        image.transform = Some(vec![0.0, 0.0, 0.0, 0.0, 300.0, 400.0]);
        let (bytes, report) = reconstruct(&model, &CodecConfig::default()).expect("rebuild");
        assert_eq!(report.modes.get(&1), Some(&PageMode::Clear));
        assert!(!operators_of_page(&bytes, 1).iter().any(|op| op == "Do"));
    }
}
