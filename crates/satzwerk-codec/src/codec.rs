// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Codec facade: byte-level entry points for full extraction, full
// reconstruction, and the lazy per-page workflow.

use satzwerk_core::config::CodecConfig;
use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::model::{PdfJsonDocument, PdfJsonDocumentMetadata, PdfJsonPage};
use satzwerk_core::types::{ConversionProgress, ConversionStage};
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::extract::extract_document;
use crate::lazy::{self, LazyPageCache};
use crate::progress::ProgressSink;
use crate::reconstruct::{ReconstructionReport, reconstruct};

/// Converts documents to JSON and back.
///
/// Holds the configuration shared by every call and the lazy page cache.
/// Cloning the cache handle is cheap, so several codecs may share one.
#[derive(Debug, Clone)]
pub struct PdfJsonCodec {
    config: CodecConfig,
    cache: LazyPageCache,
}

impl PdfJsonCodec {
    // -- Construction ---------------------------------------------------------

    /// Create a codec with its own cache, expiring after `config.cache_ttl`.
    pub fn new(config: CodecConfig) -> Self {
        let cache = LazyPageCache::new(config.cache_ttl());
        Self { config, cache }
    }

    /// Create a codec around an existing cache.
    pub fn with_cache(config: CodecConfig, cache: LazyPageCache) -> Self {
        Self { config, cache }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn cache(&self) -> &LazyPageCache {
        &self.cache
    }

    /// A fresh job id for callers that have none of their own.
    pub fn new_job_id() -> String {
        Uuid::new_v4().to_string()
    }

    // -- Full conversion ------------------------------------------------------

    /// Extract every page of a document into the model.
    pub fn pdf_to_document(
        &self,
        data: &[u8],
        lightweight: bool,
        progress: &dyn ProgressSink,
    ) -> Result<PdfJsonDocument> {
        require_input(data, "document")?;
        let document = extract_document(data, &self.config, lightweight, progress)?;
        progress.report(&ConversionProgress::at(ConversionStage::Complete, "extraction done"));
        Ok(document)
    }

    /// Extract every page of a document as UTF-8 JSON.
    #[instrument(skip_all, fields(bytes_len = data.len(), lightweight))]
    pub fn pdf_to_json(
        &self,
        data: &[u8],
        lightweight: bool,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<u8>> {
        require_input(data, "document")?;
        let document = extract_document(data, &self.config, lightweight, progress)?;
        progress.report(&ConversionProgress::at(
            ConversionStage::Serializing,
            "writing JSON",
        ));
        let json = to_json(&document)?;
        progress.report(&ConversionProgress::at(ConversionStage::Complete, "extraction done"));
        info!(json_len = json.len(), "document converted to JSON");
        Ok(json)
    }

    /// Rebuild a document from the model.
    pub fn document_to_pdf(&self, document: &PdfJsonDocument) -> Result<Vec<u8>> {
        self.reconstruct_with_report(document).map(|(bytes, _)| bytes)
    }

    /// Rebuild a document and report the mode chosen for each page.
    pub fn reconstruct_with_report(
        &self,
        document: &PdfJsonDocument,
    ) -> Result<(Vec<u8>, ReconstructionReport)> {
        reconstruct(document, &self.config)
    }

    /// Rebuild a document from UTF-8 JSON.
    #[instrument(skip_all, fields(json_len = json.len()))]
    pub fn json_to_pdf(&self, json: &[u8]) -> Result<Vec<u8>> {
        require_input(json, "JSON")?;
        let document: PdfJsonDocument = from_json(json)?;
        let (bytes, report) = self.reconstruct_with_report(&document)?;
        debug!(modes = ?report.modes, "page modes");
        Ok(bytes)
    }

    // -- Lazy workflow --------------------------------------------------------

    /// Cache a document under `job_id` and return its fonts, metadata, and
    /// page dimensions.
    pub fn extract_document_metadata(
        &self,
        job_id: &str,
        data: &[u8],
        progress: &dyn ProgressSink,
    ) -> Result<PdfJsonDocumentMetadata> {
        require_input(data, "document")?;
        let metadata =
            lazy::extract_document_metadata(&self.cache, job_id, data, &self.config, progress)?;
        progress.report(&ConversionProgress::at(ConversionStage::Complete, "metadata cached"));
        Ok(metadata)
    }

    pub fn extract_document_metadata_json(
        &self,
        job_id: &str,
        data: &[u8],
        progress: &dyn ProgressSink,
    ) -> Result<Vec<u8>> {
        let metadata = self.extract_document_metadata(job_id, data, progress)?;
        to_json(&metadata)
    }

    /// One page (1-based) of a cached document.
    pub fn extract_single_page(&self, job_id: &str, page_number: u32) -> Result<PdfJsonPage> {
        lazy::extract_single_page(&self.cache, job_id, page_number, &self.config)
    }

    pub fn extract_single_page_json(&self, job_id: &str, page_number: u32) -> Result<Vec<u8>> {
        to_json(&self.extract_single_page(job_id, page_number)?)
    }

    /// Write the pages in `update` back into the cached document.
    pub fn export_updated_pages(&self, job_id: &str, update: &PdfJsonDocument) -> Result<Vec<u8>> {
        lazy::export_updated_pages(&self.cache, job_id, update, &self.config)
    }

    /// Same as [`PdfJsonCodec::export_updated_pages`] with the partial
    /// document given as JSON.
    pub fn export_updated_pages_json(&self, job_id: &str, json: &[u8]) -> Result<Vec<u8>> {
        require_input(json, "JSON")?;
        let update: PdfJsonDocument = from_json(json)?;
        self.export_updated_pages(job_id, &update)
    }

    /// Drop a cached job. Returns whether an entry was present.
    pub fn clear_cached_document(&self, job_id: &str) -> bool {
        let removed = self.cache.clear(job_id);
        debug!(job_id, removed, "cached document cleared");
        removed
    }
}

// -- Helpers ------------------------------------------------------------------

fn require_input(data: &[u8], what: &str) -> Result<()> {
    if data.is_empty() {
        return Err(SatzwerkError::InvalidInput(format!("{} input is empty", what)));
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn from_json(json: &[u8]) -> Result<PdfJsonDocument> {
    serde_json::from_slice(json)
        .map_err(|err| SatzwerkError::InvalidInput(format!("failed to parse JSON: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PageMode;
    use crate::progress::NoProgress;
    use crate::testing::{sample_pdf, sample_runs};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProgress {
        seen: Mutex<Vec<(u8, ConversionStage)>>,
    }

    impl ProgressSink for RecordingProgress {
        fn report(&self, progress: &ConversionProgress) {
            self.seen
                .lock()
                .expect("progress lock")
                .push((progress.percent, progress.stage));
        }
    }

    fn texts(page: &PdfJsonPage) -> Vec<String> {
        page.text_elements.iter().map(|e| e.text.clone()).collect()
    }

    #[test]
    fn json_round_trip_keeps_pages_and_text() {
        let codec = PdfJsonCodec::new(CodecConfig::default());
        let json = codec
            .pdf_to_json(&sample_pdf(3), false, &NoProgress)
            .expect("to json");
        let rebuilt = codec.json_to_pdf(&json).expect("to pdf");

        let again = codec
            .pdf_to_document(&rebuilt, false, &NoProgress)
            .expect("re-extract");
        assert_eq!(again.pages.len(), 3);
        for page in &again.pages {
            assert_eq!(texts(page), sample_runs(page.page_number));
        }
    }

    #[test]
    fn milestones_climb_to_completion() {
        let codec = PdfJsonCodec::new(CodecConfig::default());
        let progress = RecordingProgress::default();
        codec
            .pdf_to_json(&sample_pdf(2), true, &progress)
            .expect("to json");
        let seen = progress.seen.lock().expect("progress lock");
        assert_eq!(seen.first().map(|s| s.1), Some(ConversionStage::Loading));
        assert_eq!(seen.last(), Some(&(100, ConversionStage::Complete)));
        assert!(seen.contains(&(95, ConversionStage::Serializing)));
        assert!(seen.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    }

    #[test]
    fn empty_and_malformed_inputs_are_caller_errors() {
        let codec = PdfJsonCodec::new(CodecConfig::default());
        let empty = codec.pdf_to_json(&[], false, &NoProgress).expect_err("empty pdf");
        assert!(matches!(empty, SatzwerkError::InvalidInput(_)));
        let blank = codec.json_to_pdf(b"").expect_err("empty json");
        assert!(blank.is_caller_error());
        let broken = codec.json_to_pdf(b"{\"pages\": 3}").expect_err("bad json");
        assert!(matches!(broken, SatzwerkError::InvalidInput(_)));
        let corrupt = codec
            .pdf_to_document(b"not a pdf", false, &NoProgress)
            .expect_err("corrupt pdf");
        assert!(matches!(corrupt, SatzwerkError::PdfError(_)));
    }

    #[test]
    fn report_names_the_mode_of_each_page() {
        let codec = PdfJsonCodec::new(CodecConfig::default());
        let document = codec
            .pdf_to_document(&sample_pdf(2), false, &NoProgress)
            .expect("extract");
        let (_, report) = codec.reconstruct_with_report(&document).expect("rebuild");
        assert_eq!(report.count(PageMode::Reuse), 2);
    }

    #[test]
    fn lazy_workflow_through_json() {
        let codec = PdfJsonCodec::new(CodecConfig::default());
        let job_id = PdfJsonCodec::new_job_id();
        let metadata = codec
            .extract_document_metadata_json(&job_id, &sample_pdf(4), &NoProgress)
            .expect("metadata");
        let metadata: serde_json::Value = serde_json::from_slice(&metadata).expect("json");
        assert_eq!(metadata["lazyImages"], serde_json::Value::Bool(true));
        assert_eq!(metadata["pageDimensions"].as_array().map(Vec::len), Some(4));

        let page = codec.extract_single_page_json(&job_id, 2).expect("page 2");
        let mut page: PdfJsonPage = serde_json::from_slice(&page).expect("page json");
        page.text_elements[2].text = "Earth".into();
        let update = serde_json::to_vec(&serde_json::json!({ "pages": [page] })).expect("update");
        codec
            .export_updated_pages_json(&job_id, &update)
            .expect("export");

        let page = codec.extract_single_page(&job_id, 2).expect("page 2 again");
        assert_eq!(texts(&page), ["Page 2", "Hello", "Earth"]);
        assert!(codec.clear_cached_document(&job_id));
        assert!(!codec.clear_cached_document(&job_id));
    }

    #[test]
    fn codecs_can_share_one_cache() {
        let first = PdfJsonCodec::new(CodecConfig::default());
        let second = PdfJsonCodec::with_cache(CodecConfig::default(), first.cache().clone());
        first
            .extract_document_metadata("shared", &sample_pdf(1), &NoProgress)
            .expect("metadata");
        assert!(second.extract_single_page("shared", 1).is_ok());
    }
}
