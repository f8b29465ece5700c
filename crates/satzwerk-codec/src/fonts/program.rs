// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded font programs: extraction from the font descriptor, format
// classification, and conversion of CFF-flavoured programs to TrueType.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use lopdf::{Dictionary, Document};
use satzwerk_core::config::{CffConverterMethod, CodecConfig};
use satzwerk_core::error::{Result, SatzwerkError};
use tracing::{debug, info, warn};

use crate::external::run_with_timeout;
use crate::pdf::objects::{get_dict, get_name, get_stream, stream_bytes};

/// Raw program bytes with their format tag (`ttf`, `otf`, `type1`,
/// `type1c`, `cidfonttype0c`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct FontProgram {
    pub bytes: Vec<u8>,
    pub format: String,
}

/// Every program variant recovered for one font.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPrograms {
    /// Bytes as embedded in the source document.
    pub original: Option<FontProgram>,
    /// Converted program for downstream consumers (browsers).
    pub web: Option<FontProgram>,
    /// Program suitable for embedding into a rebuilt document.
    pub pdf: Option<FontProgram>,
}

// -- Classification -----------------------------------------------------------

/// Sniff a `FontFile2` program.
pub fn detect_true_type_format(bytes: &[u8]) -> &'static str {
    match bytes.get(..4) {
        Some(b"OTTO") => "otf",
        _ => "ttf",
    }
}

/// Flavour of a converted program, if it is an sfnt at all.
pub fn detect_sfnt_flavor(bytes: &[u8]) -> Option<&'static str> {
    match bytes.get(..4)? {
        [0x00, 0x01, 0x00, 0x00] | b"true" | b"typ1" => Some("ttf"),
        b"OTTO" => Some("otf"),
        _ => None,
    }
}

pub fn is_cff_format(format: &str) -> bool {
    let format = format.to_ascii_lowercase();
    format.contains("type1c") || format.contains("cidfonttype0c") || format == "cff"
}

pub fn is_type1_format(format: &str) -> bool {
    format.eq_ignore_ascii_case("type1")
}

/// Check that a converted program has a usable sfnt table directory.
pub fn validate_font_tables(bytes: &[u8]) -> Result<()> {
    let Some(header) = bytes.get(4..6) else {
        return Err(SatzwerkError::FontError("font program too small".into()));
    };
    let table_count = u16::from_be_bytes([header[0], header[1]]);
    if !(1..=100).contains(&table_count) {
        return Err(SatzwerkError::FontError(format!(
            "implausible table count {}",
            table_count
        )));
    }
    let face = ttf_parser::Face::parse(bytes, 0)
        .map_err(|err| SatzwerkError::FontError(format!("unparseable font program: {}", err)))?;
    if face.raw_face().table(ttf_parser::Tag::from_bytes(b"head")).is_none() {
        return Err(SatzwerkError::FontError("missing head table".into()));
    }
    let units = face.units_per_em();
    if !(16..=16384).contains(&units) {
        return Err(SatzwerkError::FontError(format!("unitsPerEm {} out of range", units)));
    }
    Ok(())
}

// -- Converters ---------------------------------------------------------------

/// External converter from a CFF program to an sfnt program.
pub trait CffConverter: Send + Sync {
    fn name(&self) -> &'static str;

    fn convert(&self, program: &[u8], to_unicode: Option<&[u8]>) -> Result<Vec<u8>>;
}

/// `<python> <script> <input> <output> [<tounicode>]`
pub struct PythonCffConverter {
    pub command: String,
    pub script: PathBuf,
    pub timeout: Duration,
}

impl CffConverter for PythonCffConverter {
    fn name(&self) -> &'static str {
        "python"
    }

    fn convert(&self, program: &[u8], to_unicode: Option<&[u8]>) -> Result<Vec<u8>> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("input.cff");
        let output = scratch.path().join("output.ttf");
        fs::write(&input, program)?;

        let mut cmd = Command::new(&self.command);
        cmd.arg(&self.script).arg(&input).arg(&output);
        if let Some(cmap) = to_unicode {
            let cmap_path = scratch.path().join("tounicode.cmap");
            fs::write(&cmap_path, cmap)?;
            cmd.arg(&cmap_path);
        }
        run_with_timeout(cmd, self.timeout)?;
        Ok(fs::read(&output)?)
    }
}

/// FontForge in its native scripting mode.
pub struct FontForgeConverter {
    pub command: String,
    pub timeout: Duration,
}

impl CffConverter for FontForgeConverter {
    fn name(&self) -> &'static str {
        "fontforge"
    }

    fn convert(&self, program: &[u8], _to_unicode: Option<&[u8]>) -> Result<Vec<u8>> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("input.cff");
        let output = scratch.path().join("output.ttf");
        fs::write(&input, program)?;

        let mut cmd = Command::new(&self.command);
        cmd.args(["-lang=ff", "-c", "Open($1); Generate($2)"])
            .arg(&input)
            .arg(&output);
        run_with_timeout(cmd, self.timeout)?;
        Ok(fs::read(&output)?)
    }
}

// -- Extraction ---------------------------------------------------------------

/// Reads programs out of font descriptors and runs the configured
/// converters over CFF-flavoured ones.
pub struct ProgramExtractor {
    primary: Option<Box<dyn CffConverter>>,
    secondary: Option<Box<dyn CffConverter>>,
}

impl ProgramExtractor {
    pub fn from_config(config: &CodecConfig) -> Self {
        let cff = &config.cff_converter;
        if !cff.enabled {
            return Self::without_conversion();
        }
        let timeout = config.external_tool_timeout();
        let fontforge = || -> Box<dyn CffConverter> {
            Box::new(FontForgeConverter {
                command: cff.fontforge_command.clone(),
                timeout,
            })
        };
        match cff.method {
            CffConverterMethod::Python => Self {
                primary: Some(Box::new(PythonCffConverter {
                    command: cff.python_command.clone(),
                    script: cff.python_script.clone(),
                    timeout,
                })),
                secondary: Some(fontforge()),
            },
            CffConverterMethod::Fontforge => Self {
                primary: Some(fontforge()),
                secondary: None,
            },
        }
    }

    pub fn without_conversion() -> Self {
        Self {
            primary: None,
            secondary: None,
        }
    }

    pub fn with_converters(
        primary: Option<Box<dyn CffConverter>>,
        secondary: Option<Box<dyn CffConverter>>,
    ) -> Self {
        Self { primary, secondary }
    }

    /// Programs embedded under `descriptor`, or `None` when the font is not
    /// embedded. `FontFile3` wins over `FontFile2`, which wins over `FontFile`.
    pub fn extract(
        &self,
        doc: &Document,
        descriptor: &Dictionary,
        to_unicode: Option<&[u8]>,
    ) -> Option<ExtractedPrograms> {
        if let Some(stream) = get_stream(doc, descriptor, b"FontFile3") {
            let format = get_name(doc, &stream.dict, b"Subtype")
                .map(|s| s.to_ascii_lowercase())
                .unwrap_or_else(|| "fontfile3".into());
            return Some(self.classify(stream_bytes(stream), format, to_unicode));
        }
        if let Some(stream) = get_stream(doc, descriptor, b"FontFile2") {
            let bytes = stream_bytes(stream);
            let format = detect_true_type_format(&bytes).to_string();
            return Some(self.classify(bytes, format, to_unicode));
        }
        if let Some(stream) = get_stream(doc, descriptor, b"FontFile") {
            return Some(self.classify(stream_bytes(stream), "type1".into(), to_unicode));
        }
        None
    }

    fn classify(
        &self,
        bytes: Vec<u8>,
        format: String,
        to_unicode: Option<&[u8]>,
    ) -> ExtractedPrograms {
        debug!(bytes = bytes.len(), %format, "font program found");
        let mut programs = ExtractedPrograms::default();

        if is_cff_format(&format) {
            if let Some(converted) = self.run(self.primary.as_deref(), &bytes, to_unicode) {
                if converted.format == "ttf" {
                    programs.pdf = Some(converted.clone());
                }
                programs.web = Some(converted);
            }
            if programs.pdf.is_none()
                && let Some(converted) = self.run(self.secondary.as_deref(), &bytes, to_unicode)
            {
                if programs.web.is_none() {
                    programs.web = Some(converted.clone());
                }
                programs.pdf = Some(converted);
            }
            if programs.web.is_none() && self.primary.is_some() {
                warn!(%format, "every CFF conversion failed");
            }
        } else if format == "ttf" || format == "otf" {
            let program = FontProgram {
                bytes: bytes.clone(),
                format: format.clone(),
            };
            programs.web = Some(program.clone());
            programs.pdf = Some(program);
        }

        programs.original = Some(FontProgram { bytes, format });
        programs
    }

    fn run(
        &self,
        converter: Option<&dyn CffConverter>,
        bytes: &[u8],
        to_unicode: Option<&[u8]>,
    ) -> Option<FontProgram> {
        let converter = converter?;
        let converted = match converter.convert(bytes, to_unicode) {
            Ok(converted) if !converted.is_empty() => converted,
            Ok(_) => {
                warn!(converter = converter.name(), "CFF conversion produced no output");
                return None;
            }
            Err(err) => {
                warn!(converter = converter.name(), %err, "CFF conversion failed");
                return None;
            }
        };
        let Some(format) = detect_sfnt_flavor(&converted) else {
            warn!(converter = converter.name(), "converted program is not an sfnt");
            return None;
        };
        if let Err(err) = validate_font_tables(&converted) {
            warn!(converter = converter.name(), %err, "converted program rejected");
            return None;
        }
        info!(
            converter = converter.name(),
            input_bytes = bytes.len(),
            output_bytes = converted.len(),
            format,
            "CFF program converted"
        );
        Some(FontProgram {
            bytes: converted,
            format: format.into(),
        })
    }
}

/// Font descriptor of a simple font or of the descendant of a Type0 font.
pub fn font_descriptor<'a>(doc: &'a Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    if let Some(descriptor) = get_dict(doc, font, b"FontDescriptor") {
        return Some(descriptor);
    }
    let descendant = crate::fonts::codec::descendant_font(doc, font)?;
    get_dict(doc, descendant, b"FontDescriptor")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Object, Stream, dictionary};

    struct FixedConverter(Vec<u8>);

    impl CffConverter for FixedConverter {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn convert(&self, _program: &[u8], _to_unicode: Option<&[u8]>) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn signatures_classify_programs() {
        assert_eq!(detect_true_type_format(b"OTTO...."), "otf");
        assert_eq!(detect_true_type_format(&[0, 1, 0, 0, 9]), "ttf");
        assert_eq!(detect_sfnt_flavor(b"true"), Some("ttf"));
        assert_eq!(detect_sfnt_flavor(b"wOFF"), None);
        assert!(is_cff_format("type1c"));
        assert!(is_cff_format("CIDFontType0C"));
        assert!(is_cff_format("cff"));
        assert!(!is_cff_format("ttf"));
        assert!(is_type1_format("Type1"));
    }

    #[test]
    fn table_validation_rejects_garbage() {
        assert!(validate_font_tables(b"abc").is_err());
        assert!(validate_font_tables(&[0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn font_file3_takes_precedence_and_keeps_the_original() {
        let mut doc = Document::with_version("1.7");
        let cff = doc.add_object(Stream::new(
            dictionary! { "Subtype" => "Type1C" },
            b"cff-bytes".to_vec(),
        ));
        let ttf = doc.add_object(Stream::new(dictionary! {}, vec![0, 1, 0, 0, 1]));
        let descriptor = dictionary! {
            "FontFile3" => Object::Reference(cff),
            "FontFile2" => Object::Reference(ttf),
        };

        let programs = ProgramExtractor::without_conversion()
            .extract(&doc, &descriptor, None)
            .expect("embedded");
        let original = programs.original.expect("original");
        assert_eq!(original.format, "type1c");
        assert_eq!(original.bytes, b"cff-bytes");
        assert!(programs.web.is_none());
        assert!(programs.pdf.is_none());
    }

    #[test]
    fn true_type_programs_serve_every_target() {
        let mut doc = Document::with_version("1.7");
        let ttf = doc.add_object(Stream::new(dictionary! {}, vec![0, 1, 0, 0, 7]));
        let descriptor = dictionary! { "FontFile2" => Object::Reference(ttf) };
        let programs = ProgramExtractor::without_conversion()
            .extract(&doc, &descriptor, None)
            .expect("embedded");
        assert_eq!(programs.pdf.as_ref().map(|p| p.format.as_str()), Some("ttf"));
        assert_eq!(programs.web, programs.pdf);
    }

    #[test]
    fn invalid_conversions_are_discarded() {
        let extractor = ProgramExtractor::with_converters(
            Some(Box::new(FixedConverter(b"not a font".to_vec()))),
            Some(Box::new(FixedConverter(Vec::new()))),
        );
        let programs = extractor.classify(b"cff".to_vec(), "type1c".into(), None);
        assert!(programs.web.is_none());
        assert!(programs.pdf.is_none());
        assert!(programs.original.is_some());
    }

    #[test]
    fn descriptors_without_programs_are_not_embedded() {
        let doc = Document::with_version("1.7");
        let descriptor = dictionary! { "FontName" => "Helvetica" };
        assert!(
            ProgramExtractor::without_conversion()
                .extract(&doc, &descriptor, None)
                .is_none()
        );
    }
}
