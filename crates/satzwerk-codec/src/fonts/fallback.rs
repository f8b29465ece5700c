// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Script-aware fallback fonts for characters the original font cannot encode.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use satzwerk_core::model::{DOCUMENT_SCOPE_PAGE, PdfJsonFont, font_uid};
use tracing::{debug, warn};

use crate::fonts::program::detect_true_type_format;
use crate::payload;

pub const FALLBACK_FONT_ID: &str = "fallback-noto-sans";
pub const FALLBACK_FONT_CJK_ID: &str = "fallback-noto-cjk";
pub const FALLBACK_FONT_JP_ID: &str = "fallback-noto-jp";
pub const FALLBACK_FONT_KR_ID: &str = "fallback-noto-korean";
pub const FALLBACK_FONT_AR_ID: &str = "fallback-noto-arabic";
pub const FALLBACK_FONT_TH_ID: &str = "fallback-noto-thai";

/// Face the default fallback degrades to when its file is unavailable.
pub const BUILTIN_FALLBACK_FACE: &str = "Helvetica";

/// Bundled file backing each fallback id.
pub fn fallback_file_name(id: &str) -> Option<&'static str> {
    match id {
        FALLBACK_FONT_ID => Some("NotoSans-Regular.ttf"),
        FALLBACK_FONT_CJK_ID => Some("NotoSansSC-Regular.ttf"),
        FALLBACK_FONT_JP_ID => Some("NotoSansJP-Regular.ttf"),
        FALLBACK_FONT_KR_ID => Some("malgun.ttf"),
        FALLBACK_FONT_AR_ID => Some("NotoSansArabic-Regular.ttf"),
        FALLBACK_FONT_TH_ID => Some("NotoSansThai-Regular.ttf"),
        _ => None,
    }
}

pub fn is_fallback_id(id: &str) -> bool {
    fallback_file_name(id).is_some()
}

/// Fallback font id for a code point. Pure function of the code point.
pub fn resolve_fallback_font_id(code_point: u32) -> &'static str {
    match code_point {
        // CJK symbols, full/half-width forms, Bopomofo, radicals, ideographs
        0x3000..=0x303F
        | 0xFF00..=0xFFEF
        | 0x2E80..=0x2FDF
        | 0x3100..=0x312F
        | 0x31A0..=0x31BF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xF900..=0xFAFF
        | 0x20000..=0x2FA1F => FALLBACK_FONT_CJK_ID,
        0x3040..=0x30FF | 0x31F0..=0x31FF => FALLBACK_FONT_JP_ID,
        0x1100..=0x11FF | 0x3130..=0x318F | 0xA960..=0xA97F | 0xAC00..=0xD7FF => {
            FALLBACK_FONT_KR_ID
        }
        0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF => {
            FALLBACK_FONT_AR_ID
        }
        0x0E00..=0x0E7F => FALLBACK_FONT_TH_ID,
        _ => FALLBACK_FONT_ID,
    }
}

/// ASCII stand-ins for glyphs no fallback covers.
pub fn map_unsupported_glyph(c: char) -> Option<char> {
    match c {
        '\u{276E}' => Some('<'),
        '\u{276F}' => Some('>'),
        _ => None,
    }
}

/// Loads bundled fallback fonts from disk, once per id.
#[derive(Debug, Clone, Default)]
pub struct FallbackFonts {
    dir: Option<PathBuf>,
    cache: Arc<Mutex<HashMap<String, Option<Arc<Vec<u8>>>>>>,
}

impl FallbackFonts {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Program bytes of a fallback font, `None` if unknown or missing.
    pub fn load(&self, id: &str) -> Option<Arc<Vec<u8>>> {
        if let Ok(cache) = self.cache.lock()
            && let Some(cached) = cache.get(id)
        {
            return cached.clone();
        }
        let loaded = self.read(id).map(Arc::new);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(id.to_string(), loaded.clone());
        }
        loaded
    }

    fn read(&self, id: &str) -> Option<Vec<u8>> {
        let path = self.dir.as_ref()?.join(fallback_file_name(id)?);
        match fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => {
                debug!(id, path = %path.display(), bytes = bytes.len(), "fallback font loaded");
                Some(bytes)
            }
            Ok(_) => None,
            Err(err) => {
                warn!(id, path = %path.display(), %err, "fallback font unavailable");
                None
            }
        }
    }

    /// Document-scoped catalogue entry for a fallback font.
    ///
    /// The default fallback is always available: without its file it is
    /// described as the built-in Helvetica face.
    pub fn font_model(&self, id: &str) -> Option<PdfJsonFont> {
        let base = PdfJsonFont {
            id: id.to_string(),
            page_number: DOCUMENT_SCOPE_PAGE,
            uid: font_uid(DOCUMENT_SCOPE_PAGE, id),
            ..PdfJsonFont::default()
        };
        let Some(bytes) = self.load(id) else {
            if id != FALLBACK_FONT_ID {
                return None;
            }
            return Some(PdfJsonFont {
                base_name: Some(BUILTIN_FALLBACK_FACE.into()),
                subtype: Some("Type1".into()),
                encoding: Some("WinAnsiEncoding".into()),
                standard14_name: Some(BUILTIN_FALLBACK_FACE.into()),
                units_per_em: Some(1000),
                ..base
            });
        };

        let format = detect_true_type_format(&bytes).to_string();
        let encoded = payload::encode(&bytes);
        let face = ttf_parser::Face::parse(&bytes, 0).ok();
        let scale = |value: i16, upem: u16| f64::from(value) * 1000.0 / f64::from(upem.max(1));
        let base_name = fallback_file_name(id).map(|f| f.trim_end_matches(".ttf").to_string());
        Some(PdfJsonFont {
            base_name,
            subtype: Some("TrueType".into()),
            embedded: true,
            program: Some(encoded.clone()),
            program_format: Some(format.clone()),
            web_program: Some(encoded.clone()),
            web_program_format: Some(format.clone()),
            pdf_program: Some(encoded),
            pdf_program_format: Some(format),
            ascent: face.as_ref().map(|f| scale(f.ascender(), f.units_per_em())),
            descent: face.as_ref().map(|f| scale(f.descender(), f.units_per_em())),
            cap_height: face
                .as_ref()
                .and_then(|f| f.capital_height().map(|h| scale(h, f.units_per_em()))),
            x_height: face
                .as_ref()
                .and_then(|f| f.x_height().map(|h| scale(h, f.units_per_em()))),
            italic_angle: face.as_ref().map(|f| f64::from(f.italic_angle())),
            units_per_em: face.as_ref().map(|f| u32::from(f.units_per_em())),
            ..base
        })
    }
}
