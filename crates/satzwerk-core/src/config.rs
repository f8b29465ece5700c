// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Codec configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings shared by extraction, reconstruction, and the lazy page cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Drop raw font dictionaries from the model whenever a program payload
    /// was captured.
    pub lightweight: bool,
    /// Optional font-normalization pre-pass run before extraction.
    pub font_normalization: FontNormalizationConfig,
    /// Conversion of CFF-flavoured programs to TrueType/OpenType.
    pub cff_converter: CffConverterConfig,
    /// Upper bound for any external tool invocation, in seconds.
    pub external_tool_timeout_secs: u64,
    /// Directory holding the bundled fallback fonts. When unset, only the
    /// built-in Helvetica fallback is available.
    pub fallback_font_dir: Option<PathBuf>,
    /// Lifetime of a lazy-cache entry, in seconds (default 30 minutes).
    pub cache_ttl_secs: u64,
    /// Raster format used for extracted images that are not already JPEG.
    pub preferred_image_format: RasterFormat,
}

impl CodecConfig {
    pub fn external_tool_timeout(&self) -> Duration {
        Duration::from_secs(self.external_tool_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            lightweight: false,
            font_normalization: FontNormalizationConfig::default(),
            cff_converter: CffConverterConfig::default(),
            external_tool_timeout_secs: 30,
            fallback_font_dir: None,
            cache_ttl_secs: 30 * 60,
            preferred_image_format: RasterFormat::Png,
        }
    }
}

/// External distiller pass that embeds and subsets every font.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontNormalizationConfig {
    pub enabled: bool,
    /// Executable name or path of the distiller (Ghostscript).
    pub command: String,
}

impl Default for FontNormalizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: "gs".into(),
        }
    }
}

/// Which converter is tried first for CFF font programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CffConverterMethod {
    Python,
    Fontforge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CffConverterConfig {
    pub enabled: bool,
    pub method: CffConverterMethod,
    /// Interpreter used to run the conversion script.
    pub python_command: String,
    /// Script invoked as `<python> <script> <input> <output> [<tounicode>]`.
    pub python_script: PathBuf,
    pub fontforge_command: String,
}

impl Default for CffConverterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: CffConverterMethod::Python,
            python_command: "/opt/venv/bin/python3".into(),
            python_script: PathBuf::from("/scripts/convert_cff_to_ttf.py"),
            fontforge_command: "fontforge".into(),
        }
    }
}

/// Portable raster formats used for image payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    Png,
    Jpeg,
}

impl RasterFormat {
    /// Tag written to `imageFormat` in the model.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: CodecConfig =
            serde_json::from_str(r#"{"lightweight":true,"cff_converter":{"method":"fontforge"}}"#)
                .expect("parse config");
        assert!(config.lightweight);
        assert_eq!(config.cff_converter.method, CffConverterMethod::Fontforge);
        assert_eq!(config.cff_converter.fontforge_command, "fontforge");
        assert_eq!(config.cache_ttl(), Duration::from_secs(1800));
        assert_eq!(config.external_tool_timeout(), Duration::from_secs(30));
    }
}
