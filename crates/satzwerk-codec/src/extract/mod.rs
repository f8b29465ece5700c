// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document to model extraction.
//
// Stages run over all pages in turn (fonts, text, images, annotations) so
// progress can be reported per stage. Failures inside one page are logged
// and leave that page's element list empty.

pub mod text;

use lopdf::{Dictionary, Document, Object, ObjectId};
use satzwerk_core::config::CodecConfig;
use satzwerk_core::error::Result;
use satzwerk_core::model::{
    PdfJsonDocument, PdfJsonImageElement, PdfJsonPage, PdfJsonPageDimension, PdfJsonTextElement,
};
use satzwerk_core::types::{ConversionProgress, ConversionStage};
use tracing::{debug, info, instrument, warn};

use crate::annotations::extract_annotations;
use crate::cos::CosSerializer;
use crate::engine::ContentEngine;
use crate::fonts::{CodecCache, FontCatalogue, ProgramExtractor};
use crate::forms::extract_form_fields;
use crate::images::ImageCollector;
use crate::metadata::{extract_metadata, extract_xmp};
use crate::normalize::normalize_fonts;
use crate::pdf::document;
use crate::pdf::objects::{
    content_stream_ids, get_dict, get_name, page_resources, page_rotation, page_size,
    resolve_stream,
};
use crate::progress::ProgressSink;

pub use text::{TEXT_Z_BASE, TextCollector};

/// Fonts travel as catalogue entries, not inside the resource snapshot.
const RESOURCE_SKIP_KEYS: &[&[u8]] = &[b"Font"];

/// Run the optional normalization pass and parse the result.
///
/// Also returns the normalized bytes when they were used. Normalized bytes
/// that fail to parse are discarded in favour of the original input.
pub(crate) fn open_source(
    data: &[u8],
    config: &CodecConfig,
    progress: &dyn ProgressSink,
) -> Result<(Document, Option<Vec<u8>>)> {
    progress.report(&ConversionProgress::at(ConversionStage::Loading, "loading document"));
    if config.font_normalization.enabled {
        progress.report(&ConversionProgress::at(
            ConversionStage::Normalizing,
            "normalizing fonts",
        ));
    }
    let (doc, normalized) = match normalize_fonts(data, config) {
        Some(normalized) => match document::load(&normalized) {
            Ok(doc) => (doc, Some(normalized)),
            Err(err) => {
                warn!(%err, "normalized document unreadable, using original bytes");
                (document::load(data)?, None)
            }
        },
        None => (document::load(data)?, None),
    };
    progress.report(&ConversionProgress::at(
        ConversionStage::Parsing,
        format!("{} pages", doc.get_pages().len()),
    ));
    Ok((doc, normalized))
}

/// Full extraction of every page.
#[instrument(skip_all, fields(bytes_len = data.len(), lightweight))]
pub fn extract_document(
    data: &[u8],
    config: &CodecConfig,
    lightweight: bool,
    progress: &dyn ProgressSink,
) -> Result<PdfJsonDocument> {
    let (doc, _) = open_source(data, config, progress)?;
    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    let total = pages.len() as u32;
    let extractor = ProgramExtractor::from_config(config);
    let mut catalogue = FontCatalogue::new(&doc, &extractor, lightweight);

    for (index, (number, page_id)) in pages.iter().enumerate() {
        catalogue.collect_fonts_for_page(*number, *page_id);
        report_page(progress, ConversionStage::Fonts, *number, index, total);
    }

    let mut serializer = CosSerializer::new(&doc);
    let mut out: Vec<PdfJsonPage> = pages
        .iter()
        .map(|(number, page_id)| page_shell(&doc, &mut serializer, *number, *page_id))
        .collect();

    for (index, (page, (number, page_id))) in out.iter_mut().zip(&pages).enumerate() {
        page.text_elements = page_text(&doc, &mut catalogue.codecs, *number, *page_id);
        report_page(progress, ConversionStage::Text, *number, index, total);
    }

    let mut images = ImageCollector::new(&doc, config.preferred_image_format);
    for (index, (page, (number, page_id))) in out.iter_mut().zip(&pages).enumerate() {
        page.image_elements =
            page_images(&doc, &mut catalogue.codecs, &mut images, *number, *page_id);
        report_page(progress, ConversionStage::Images, *number, index, total);
    }

    for (index, (page, (number, page_id))) in out.iter_mut().zip(&pages).enumerate() {
        page.annotations = extract_annotations(&doc, &mut serializer, *page_id);
        report_page(progress, ConversionStage::Annotations, *number, index, total);
    }

    progress.report(&ConversionProgress::at(
        ConversionStage::Metadata,
        "metadata and form fields",
    ));
    let metadata = extract_metadata(&doc);
    let xmp_metadata = extract_xmp(&doc);
    let form_fields = extract_form_fields(&doc, &mut serializer);
    let program_extractions = catalogue.program_extractions();
    let fonts = catalogue.into_fonts();

    info!(
        pages = out.len(),
        fonts = fonts.len(),
        program_extractions,
        image_encodings = images.encodings(),
        "document extracted"
    );
    Ok(PdfJsonDocument {
        metadata,
        xmp_metadata,
        fonts,
        pages: out,
        form_fields,
        lazy_images: None,
    })
}

fn report_page(
    progress: &dyn ProgressSink,
    stage: ConversionStage,
    number: u32,
    index: usize,
    total: u32,
) {
    progress.report(&ConversionProgress::counted(
        stage,
        format!("page {}", number),
        index as u32 + 1,
        total,
    ));
}

// -- Per-page pieces ----------------------------------------------------------

/// Page box, rotation, resource snapshot, and content-stream snapshots.
pub(crate) fn page_shell(
    doc: &Document,
    serializer: &mut CosSerializer<'_>,
    number: u32,
    page_id: ObjectId,
) -> PdfJsonPage {
    let (width, height) = page_size(doc, page_id);
    let resources = page_resources(doc, page_id).map(|resources| {
        let filtered = resources_without_images(doc, resources);
        serializer.serialize_dictionary(&filtered, RESOURCE_SKIP_KEYS)
    });
    let content_streams = content_stream_ids(doc, page_id)
        .into_iter()
        .filter_map(|id| doc.get_object(id).ok())
        .filter_map(|object| object.as_stream().ok())
        .map(|stream| serializer.serialize_stream(stream))
        .collect();
    PdfJsonPage {
        page_number: number,
        width: Some(width),
        height: Some(height),
        rotation: Some(page_rotation(doc, page_id)),
        resources,
        content_streams,
        ..Default::default()
    }
}

pub(crate) fn page_dimension(
    doc: &Document,
    number: u32,
    page_id: ObjectId,
) -> PdfJsonPageDimension {
    let (width, height) = page_size(doc, page_id);
    PdfJsonPageDimension {
        page_number: number,
        width,
        height,
        rotation: page_rotation(doc, page_id),
    }
}

/// Resource dictionary with raster-image XObjects removed; their payloads
/// travel as image elements instead.
fn resources_without_images(doc: &Document, resources: &Dictionary) -> Dictionary {
    let mut filtered = resources.clone();
    let Some(xobjects) = get_dict(doc, resources, b"XObject") else {
        return filtered;
    };
    let mut kept = Dictionary::new();
    for (name, xobject) in xobjects.iter() {
        let is_image = resolve_stream(doc, xobject).is_some_and(|stream| {
            get_name(doc, &stream.dict, b"Subtype").as_deref() == Some("Image")
        });
        if !is_image {
            kept.set(name.clone(), xobject.clone());
        }
    }
    if kept.is_empty() {
        filtered.remove(b"XObject");
    } else {
        filtered.set("XObject", Object::Dictionary(kept));
    }
    filtered
}

pub(crate) fn page_text(
    doc: &Document,
    codecs: &mut CodecCache,
    number: u32,
    page_id: ObjectId,
) -> Vec<PdfJsonTextElement> {
    let mut collector = TextCollector::default();
    if let Err(err) = ContentEngine::new(doc, codecs).run_page(page_id, &mut collector) {
        warn!(page = number, %err, "page content unreadable, no text extracted");
        return Vec::new();
    }
    let elements = collector.finish();
    debug!(page = number, elements = elements.len(), "text extracted");
    elements
}

pub(crate) fn page_images(
    doc: &Document,
    codecs: &mut CodecCache,
    collector: &mut ImageCollector<'_>,
    number: u32,
    page_id: ObjectId,
) -> Vec<PdfJsonImageElement> {
    let result = ContentEngine::new(doc, codecs).run_page(page_id, collector);
    let elements = collector.take_page();
    if let Err(err) = result {
        warn!(page = number, %err, "page content unreadable, no images extracted");
        return Vec::new();
    }
    debug!(page = number, elements = elements.len(), "images extracted");
    elements
}
