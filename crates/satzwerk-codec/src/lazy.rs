// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lazy per-page extraction and incremental re-export.
//
// A job first caches the document bytes together with its font catalogue,
// metadata, and page dimensions. Pages are then extracted one at a time and
// edited pages written back. Cache entries are immutable: an export stores
// a new entry under the same job id. Entries expire a fixed time after the
// job was first cached.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lopdf::{Document, Object, ObjectId};
use satzwerk_core::config::CodecConfig;
use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::model::{
    DOCUMENT_SCOPE_PAGE, PdfJsonDocument, PdfJsonDocumentMetadata, PdfJsonFont, PdfJsonPage,
    font_uid,
};
use satzwerk_core::types::{ConversionProgress, ConversionStage};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::annotations::{annotation_refs, extract_annotations, is_widget, restore_annotations};
use crate::cos::CosSerializer;
use crate::extract::{open_source, page_dimension, page_images, page_shell, page_text};
use crate::fonts::{
    CodecCache, FallbackFonts, FontCatalogue, FontMaterializer, PageFonts, ProgramExtractor,
};
use crate::forms::extract_form_fields;
use crate::images::ImageCollector;
use crate::metadata::{extract_metadata, extract_xmp};
use crate::pdf::document;
use crate::progress::ProgressSink;
use crate::reconstruct::build_page;

/// Page-dictionary entries an export replaces.
const REPLACED_PAGE_KEYS: &[&[u8]] = &[
    b"MediaBox",
    b"CropBox",
    b"Rotate",
    b"Resources",
    b"Contents",
    b"Annots",
];

// -- Clock --------------------------------------------------------------------

/// Source of the current time for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// -- Cache --------------------------------------------------------------------

/// Immutable snapshot of one job's document.
#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub bytes: Vec<u8>,
    /// SHA-256 of `bytes`, hex encoded.
    pub digest: String,
    pub metadata: PdfJsonDocumentMetadata,
    /// Font resource names to catalogue uids, by page number.
    pub page_fonts: BTreeMap<u32, PageFonts>,
    pub created_at: DateTime<Utc>,
}

impl CachedDocument {
    pub fn new(
        bytes: Vec<u8>,
        metadata: PdfJsonDocumentMetadata,
        page_fonts: BTreeMap<u32, PageFonts>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let digest = hex::encode(Sha256::digest(&bytes));
        Self {
            bytes,
            digest,
            metadata,
            page_fonts,
            created_at,
        }
    }

    pub fn page_count(&self) -> u32 {
        self.metadata.page_dimensions.len() as u32
    }
}

/// Job-keyed store of cached documents, shared by clones.
#[derive(Clone)]
pub struct LazyPageCache {
    entries: Arc<RwLock<HashMap<String, Arc<CachedDocument>>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl fmt::Debug for LazyPageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyPageCache")
            .field("jobs", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl LazyPageCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
            ttl,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a new job. When a tokio runtime is available, a one-shot timer
    /// removes the entry after the TTL; otherwise expiry relies on lookups
    /// and [`LazyPageCache::sweep_expired`].
    pub fn insert(&self, job_id: &str, entry: CachedDocument) {
        let created_at = entry.created_at;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id.to_string(), Arc::new(entry));
        self.schedule_expiry(job_id, created_at);
    }

    /// The live entry for `job_id`.
    pub fn get(&self, job_id: &str) -> Result<Arc<CachedDocument>> {
        let entry = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned();
        match entry {
            Some(entry) if !self.is_expired(&entry) => Ok(entry),
            Some(entry) => {
                self.expire(job_id, entry.created_at);
                Err(cache_miss(job_id))
            }
            None => Err(cache_miss(job_id)),
        }
    }

    /// Swap in a new snapshot for an existing job. The job keeps its
    /// original creation time, so replacing never extends its lifetime.
    pub fn replace(&self, job_id: &str, mut entry: CachedDocument) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = entries.get(job_id) else {
            return Err(cache_miss(job_id));
        };
        entry.created_at = current.created_at;
        entries.insert(job_id.to_string(), Arc::new(entry));
        Ok(())
    }

    /// Remove a job. Removing an absent job is a no-op.
    pub fn clear(&self, job_id: &str) -> bool {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id)
            .is_some();
        debug!(job_id, removed, "cached document cleared");
        removed
    }

    /// Drop every expired entry and return how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry));
        let swept = before - entries.len();
        if swept > 0 {
            info!(swept, "expired documents swept");
        }
        swept
    }

    fn is_expired(&self, entry: &CachedDocument) -> bool {
        (self.clock.now() - entry.created_at)
            .to_std()
            .is_ok_and(|age| age >= self.ttl)
    }

    /// Remove `job_id` only if it still holds the entry created at `created_at`.
    fn expire(&self, job_id: &str, created_at: DateTime<Utc>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.get(job_id).is_some_and(|e| e.created_at == created_at) {
            entries.remove(job_id);
            debug!(job_id, "cached document expired");
        }
    }

    fn schedule_expiry(&self, job_id: &str, created_at: DateTime<Utc>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(job_id, "no async runtime, expiry left to lookups and sweeps");
            return;
        };
        let cache = self.clone();
        let job_id = job_id.to_string();
        let ttl = self.ttl;
        handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            cache.expire(&job_id, created_at);
        });
    }
}

fn cache_miss(job_id: &str) -> SatzwerkError {
    SatzwerkError::CacheMiss {
        job_id: job_id.to_string(),
    }
}

// -- Operations ---------------------------------------------------------------

/// Fonts, metadata, and page dimensions of a document, cached under `job_id`.
#[instrument(skip_all, fields(job_id = %job_id, bytes_len = data.len()))]
pub fn extract_document_metadata(
    cache: &LazyPageCache,
    job_id: &str,
    data: &[u8],
    config: &CodecConfig,
    progress: &dyn ProgressSink,
) -> Result<PdfJsonDocumentMetadata> {
    if job_id.trim().is_empty() {
        return Err(SatzwerkError::InvalidInput("job id is empty".into()));
    }
    let (doc, normalized) = open_source(data, config, progress)?;
    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    let total = pages.len() as u32;
    let extractor = ProgramExtractor::from_config(config);
    let mut catalogue = FontCatalogue::new(&doc, &extractor, config.lightweight);

    let mut page_fonts = BTreeMap::new();
    let mut page_dimensions = Vec::with_capacity(pages.len());
    for (index, (number, page_id)) in pages.iter().enumerate() {
        page_fonts.insert(*number, catalogue.collect_fonts_for_page(*number, *page_id));
        page_dimensions.push(page_dimension(&doc, *number, *page_id));
        progress.report(&ConversionProgress::counted(
            ConversionStage::Fonts,
            format!("page {}", number),
            index as u32 + 1,
            total,
        ));
    }

    progress.report(&ConversionProgress::at(
        ConversionStage::Metadata,
        "metadata and form fields",
    ));
    let mut serializer = CosSerializer::new(&doc);
    let result = PdfJsonDocumentMetadata {
        metadata: extract_metadata(&doc),
        xmp_metadata: extract_xmp(&doc),
        fonts: catalogue.into_fonts(),
        page_dimensions,
        form_fields: extract_form_fields(&doc, &mut serializer),
        lazy_images: true,
    };

    let bytes = normalized.unwrap_or_else(|| data.to_vec());
    let entry = CachedDocument::new(bytes, result.clone(), page_fonts, cache.now());
    info!(
        job_id,
        pages = total,
        fonts = result.fonts.len(),
        digest = %entry.digest,
        "document metadata cached"
    );
    cache.insert(job_id, entry);
    Ok(result)
}

/// Text, images, annotations, and snapshots of one cached page.
#[instrument(skip_all, fields(job_id = %job_id, page = page_number))]
pub fn extract_single_page(
    cache: &LazyPageCache,
    job_id: &str,
    page_number: u32,
    config: &CodecConfig,
) -> Result<PdfJsonPage> {
    let entry = cache.get(job_id)?;
    let doc = document::load(&entry.bytes)?;
    let pages = doc.get_pages();
    let Some(page_id) = pages.get(&page_number).copied() else {
        return Err(SatzwerkError::PageOutOfRange {
            page: page_number,
            total: pages.len() as u32,
        });
    };

    let mut serializer = CosSerializer::new(&doc);
    let mut page = page_shell(&doc, &mut serializer, page_number, page_id);
    let mut codecs = CodecCache::default();
    page.text_elements = page_text(&doc, &mut codecs, page_number, page_id);
    let mut collector = ImageCollector::new(&doc, config.preferred_image_format);
    page.image_elements = page_images(&doc, &mut codecs, &mut collector, page_number, page_id);
    page.annotations = extract_annotations(&doc, &mut serializer, page_id);

    // Every font the page names must resolve in the cached catalogue.
    let catalogued: HashSet<&str> =
        entry.metadata.fonts.iter().map(|f| f.uid.as_str()).collect();
    let names_known = entry
        .page_fonts
        .get(&page_number)
        .is_some_and(|fonts| fonts.values().all(|uid| catalogued.contains(uid.as_str())));
    let elements_known = page
        .text_elements
        .iter()
        .filter_map(|e| e.font_id.as_deref())
        .all(|id| {
            catalogued.contains(font_uid(page_number as i32, id).as_str())
                || catalogued.contains(font_uid(DOCUMENT_SCOPE_PAGE, id).as_str())
        });
    let complete = names_known && elements_known;
    if !complete {
        let mut metadata = entry.metadata.clone();
        let mut page_fonts = entry.page_fonts.clone();
        let added = catalogue_pages(
            &doc,
            config,
            &[(page_number, page_id)],
            &mut metadata.fonts,
            &mut page_fonts,
        );
        info!(page = page_number, added, "cached catalogue completed from the page");
        cache.replace(
            job_id,
            CachedDocument::new(entry.bytes.clone(), metadata, page_fonts, entry.created_at),
        )?;
    }
    debug!(
        page = page_number,
        texts = page.text_elements.len(),
        images = page.image_elements.len(),
        "page extracted"
    );
    Ok(page)
}

/// Rebuild the pages present in `update` into the cached document and
/// cache the result. Returns the new document bytes.
#[instrument(skip_all, fields(job_id = %job_id, pages = update.pages.len()))]
pub fn export_updated_pages(
    cache: &LazyPageCache,
    job_id: &str,
    update: &PdfJsonDocument,
    config: &CodecConfig,
) -> Result<Vec<u8>> {
    let entry = cache.get(job_id)?;
    if update.pages.is_empty() {
        debug!("no pages to update, returning cached bytes");
        return Ok(entry.bytes.clone());
    }

    let mut doc = document::load(&entry.bytes)?;
    let page_ids = doc.get_pages();
    let fonts = merge_fonts(&entry.metadata.fonts, &update.fonts);
    let mut materializer =
        FontMaterializer::new(&fonts, FallbackFonts::new(config.fallback_font_dir.clone()));

    let mut metadata = entry.metadata.clone();
    let mut page_fonts = entry.page_fonts.clone();
    let mut updated = Vec::with_capacity(update.pages.len());
    for page in &update.pages {
        let number = page.page_number;
        let Some(page_id) = page_ids.get(&number).copied() else {
            warn!(page = number, total = page_ids.len(), "update for unknown page skipped");
            continue;
        };
        let current = page_dimension(&doc, number, page_id);
        let built =
            build_page(&mut doc, &page_ids, &mut materializer, number, page, Some(&current))?;
        updated.push((number, page_id));

        let mut annots: Vec<Object> = annotation_refs(&doc, page_id)
            .into_iter()
            .filter(|annotation| is_widget(&doc, annotation))
            .collect();
        annots.extend(restore_annotations(
            &mut doc,
            &page_ids,
            number,
            &page.annotations,
            true,
        ));

        let dict = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| {
                SatzwerkError::PdfError(format!("failed to update page {}: {}", number, err))
            })?;
        for key in REPLACED_PAGE_KEYS {
            dict.remove(key);
        }
        for (key, value) in built.entries.iter() {
            dict.set(key.clone(), value.clone());
        }
        if !annots.is_empty() {
            dict.set("Annots", Object::Array(annots));
        }

        if let Some(dimension) = metadata
            .page_dimensions
            .iter_mut()
            .find(|d| d.page_number == number)
        {
            *dimension = page_dimension(&doc, number, page_id);
        }
        info!(page = number, mode = %built.mode, "page updated");
    }

    metadata.fonts = fonts;
    let added = catalogue_pages(&doc, config, &updated, &mut metadata.fonts, &mut page_fonts);
    debug!(added, "fonts of rebuilt pages catalogued");
    let bytes = document::save(&mut doc)?;
    cache.replace(
        job_id,
        CachedDocument::new(bytes.clone(), metadata, page_fonts, entry.created_at),
    )?;
    Ok(bytes)
}

/// Cached catalogue with `updates` merged in by uid, sorted by uid.
fn merge_fonts(cached: &[PdfJsonFont], updates: &[PdfJsonFont]) -> Vec<PdfJsonFont> {
    let mut merged: BTreeMap<String, PdfJsonFont> = BTreeMap::new();
    for font in cached.iter().chain(updates) {
        let mut font = font.clone();
        if font.uid.is_empty() {
            font.uid = font_uid(font.page_number, &font.id);
        }
        merged.insert(font.uid.clone(), font);
    }
    merged.into_values().collect()
}

/// Catalogue the fonts of `pages` as they stand in `doc`.
///
/// The page name maps are replaced; entries are added to `fonts` only for
/// uids it does not hold yet. Returns the number of entries added.
fn catalogue_pages(
    doc: &Document,
    config: &CodecConfig,
    pages: &[(u32, ObjectId)],
    fonts: &mut Vec<PdfJsonFont>,
    page_fonts: &mut BTreeMap<u32, PageFonts>,
) -> usize {
    let extractor = ProgramExtractor::from_config(config);
    let mut catalogue = FontCatalogue::new(doc, &extractor, config.lightweight);
    for (number, page_id) in pages {
        page_fonts.insert(*number, catalogue.collect_fonts_for_page(*number, *page_id));
    }
    let known: HashSet<String> = fonts.iter().map(|f| f.uid.clone()).collect();
    let before = fonts.len();
    fonts.extend(
        catalogue
            .into_fonts()
            .into_iter()
            .filter(|font| !known.contains(&font.uid)),
    );
    fonts.sort_by(|a, b| a.uid.cmp(&b.uid));
    fonts.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::testing::{sample_document, sample_pdf, sample_runs};
    use std::sync::Mutex;

    const TTL: Duration = Duration::from_secs(30 * 60);

    #[derive(Debug)]
    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Utc::now()),
            }
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().expect("clock lock");
            *now += chrono::Duration::from_std(by).expect("duration");
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().expect("clock lock")
        }
    }

    fn texts(page: &PdfJsonPage) -> Vec<&str> {
        page.text_elements.iter().map(|e| e.text.as_str()).collect()
    }

    fn uids(page: &PdfJsonPage) -> Vec<String> {
        page.text_elements
            .iter()
            .filter_map(|e| e.font_id.as_deref())
            .map(|id| font_uid(page.page_number as i32, id))
            .collect()
    }

    #[test]
    fn pages_are_served_and_updated_per_job() {
        let cache = LazyPageCache::new(TTL);
        let config = CodecConfig::default();
        let metadata =
            extract_document_metadata(&cache, "J1", &sample_pdf(10), &config, &NoProgress)
                .expect("metadata");
        assert!(metadata.lazy_images);
        assert_eq!(metadata.page_dimensions.len(), 10);
        let catalogue: Vec<&str> = metadata.fonts.iter().map(|f| f.uid.as_str()).collect();

        let third = extract_single_page(&cache, "J1", 3, &config).expect("page 3");
        let seventh = extract_single_page(&cache, "J1", 7, &config).expect("page 7");
        for uid in uids(&third).iter().chain(&uids(&seventh)) {
            assert!(catalogue.contains(&uid.as_str()), "{} missing", uid);
        }

        let mut edited = third.clone();
        edited.text_elements[1].text = "Howdy".into();
        let update = PdfJsonDocument {
            pages: vec![edited],
            ..Default::default()
        };
        let bytes = export_updated_pages(&cache, "J1", &update, &config).expect("export");
        assert_eq!(cache.get("J1").expect("entry").bytes, bytes);

        let third = extract_single_page(&cache, "J1", 3, &config).expect("page 3 again");
        assert_eq!(texts(&third), ["Page 3", "Howdy", "World"]);
        let seventh = extract_single_page(&cache, "J1", 7, &config).expect("page 7 again");
        let expected = sample_runs(7);
        assert_eq!(texts(&seventh), expected.iter().map(String::as_str).collect::<Vec<_>>());

        assert!(cache.clear("J1"));
        assert!(!cache.clear("J1"));
        let miss = extract_single_page(&cache, "J1", 3, &config).expect_err("cleared");
        assert!(matches!(miss, SatzwerkError::CacheMiss { ref job_id } if job_id == "J1"));
        assert!(miss.is_caller_error());
    }

    #[test]
    fn out_of_range_pages_and_empty_updates() {
        let cache = LazyPageCache::new(TTL);
        let config = CodecConfig::default();
        let data = sample_pdf(2);
        extract_document_metadata(&cache, "J2", &data, &config, &NoProgress).expect("metadata");

        let err = extract_single_page(&cache, "J2", 3, &config).expect_err("page 3");
        assert!(matches!(err, SatzwerkError::PageOutOfRange { page: 3, total: 2 }));

        let unchanged = export_updated_pages(&cache, "J2", &PdfJsonDocument::default(), &config)
            .expect("empty update");
        assert_eq!(unchanged, data);

        let missing = export_updated_pages(&cache, "nope", &PdfJsonDocument::default(), &config)
            .expect_err("unknown job");
        assert!(matches!(missing, SatzwerkError::CacheMiss { .. }));
        let blank = extract_document_metadata(&cache, " ", &data, &config, &NoProgress)
            .expect_err("blank job id");
        assert!(matches!(blank, SatzwerkError::InvalidInput(_)));
    }

    fn catalogue_uids(cache: &LazyPageCache, job_id: &str) -> HashSet<String> {
        let entry = cache.get(job_id).expect("entry");
        entry.metadata.fonts.iter().map(|f| f.uid.clone()).collect()
    }

    #[test]
    fn partial_updates_keep_the_page_box() {
        let mut doc = sample_document(2);
        let page_id = doc.get_pages()[&1];
        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .expect("page dict");
        page.set("MediaBox", vec![0.into(), 0.into(), 300.into(), 400.into()]);
        page.set("Rotate", 90);
        let mut data = Vec::new();
        doc.save_to(&mut data).expect("save");

        let cache = LazyPageCache::new(TTL);
        let config = CodecConfig::default();
        extract_document_metadata(&cache, "J4", &data, &config, &NoProgress).expect("metadata");
        let mut edited = extract_single_page(&cache, "J4", 1, &config).expect("page 1");
        edited.width = None;
        edited.height = None;
        edited.rotation = None;
        edited.text_elements[1].text = "Howdy".into();
        let update = PdfJsonDocument {
            pages: vec![edited],
            ..Default::default()
        };
        export_updated_pages(&cache, "J4", &update, &config).expect("export");

        let page = extract_single_page(&cache, "J4", 1, &config).expect("page 1 again");
        assert_eq!(page.width, Some(300.0));
        assert_eq!(page.height, Some(400.0));
        assert_eq!(page.rotation, Some(90));
        assert_eq!(texts(&page), ["Page 1", "Howdy", "World"]);
        let entry = cache.get("J4").expect("entry");
        let dimension = &entry.metadata.page_dimensions[0];
        assert_eq!((dimension.width, dimension.height), (300.0, 400.0));
    }

    #[test]
    fn single_pages_complete_a_sparse_catalogue() {
        let cache = LazyPageCache::new(TTL);
        let config = CodecConfig::default();
        cache.insert(
            "J5",
            CachedDocument::new(
                sample_pdf(2),
                PdfJsonDocumentMetadata::default(),
                BTreeMap::new(),
                cache.now(),
            ),
        );
        let page = extract_single_page(&cache, "J5", 2, &config).expect("page 2");
        let catalogue = catalogue_uids(&cache, "J5");
        for uid in uids(&page) {
            assert!(catalogue.contains(&uid), "{} missing", uid);
        }
        let entry = cache.get("J5").expect("entry");
        assert_eq!(entry.page_fonts[&2].get("F1").map(String::as_str), Some("2:F1"));
        assert!(!entry.page_fonts.contains_key(&1));
    }

    #[test]
    fn fallback_fonts_of_exported_pages_join_the_catalogue() {
        let cache = LazyPageCache::new(TTL);
        let config = CodecConfig::default();
        extract_document_metadata(&cache, "J6", &sample_pdf(3), &config, &NoProgress)
            .expect("metadata");
        let mut edited = extract_single_page(&cache, "J6", 3, &config).expect("page 3");
        edited.text_elements[2].text = "Welt \u{6F22}".into();
        let update = PdfJsonDocument {
            pages: vec![edited],
            ..Default::default()
        };
        export_updated_pages(&cache, "J6", &update, &config).expect("export");

        let page = extract_single_page(&cache, "J6", 3, &config).expect("page 3 again");
        let catalogue = catalogue_uids(&cache, "J6");
        assert!(!uids(&page).is_empty());
        for uid in uids(&page) {
            assert!(catalogue.contains(&uid), "{} missing", uid);
        }
        let entry = cache.get("J6").expect("entry");
        for uid in entry.page_fonts[&3].values() {
            assert!(catalogue.contains(uid), "{} missing", uid);
        }
    }

    #[test]
    fn entries_expire_by_clock() {
        let clock = Arc::new(ManualClock::new());
        let cache = LazyPageCache::with_clock(TTL, clock.clone());
        let entry = |created_at| {
            CachedDocument::new(
                b"%PDF".to_vec(),
                PdfJsonDocumentMetadata::default(),
                BTreeMap::new(),
                created_at,
            )
        };
        cache.insert("old", entry(clock.now()));
        clock.advance(Duration::from_secs(20 * 60));
        cache.insert("new", entry(clock.now()));

        let replaced = entry(clock.now());
        cache.replace("old", replaced).expect("replace");
        clock.advance(Duration::from_secs(11 * 60));

        assert!(matches!(cache.get("old"), Err(SatzwerkError::CacheMiss { .. })));
        assert!(cache.get("new").is_ok());
        clock.advance(Duration::from_secs(20 * 60));
        assert_eq!(cache.sweep_expired(), 1);
        assert!(cache.is_empty());
        assert!(cache.replace("new", entry(clock.now())).is_err());
    }

    #[tokio::test]
    async fn runtime_timers_expire_entries() {
        let cache = LazyPageCache::new(Duration::from_millis(20));
        let entry = CachedDocument::new(
            b"%PDF".to_vec(),
            PdfJsonDocumentMetadata::default(),
            BTreeMap::new(),
            cache.now(),
        );
        assert_eq!(entry.digest.len(), 64);
        cache.insert("J3", entry);
        assert_eq!(cache.len(), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.is_empty());
    }
}
