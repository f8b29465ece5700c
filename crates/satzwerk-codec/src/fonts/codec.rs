// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text codec of one font: char codes to Unicode and back, plus glyph widths.

use std::collections::{BTreeMap, HashMap};

use lopdf::{Dictionary, Document, Object};

use crate::fonts::cmap::parse_to_unicode;
use crate::fonts::encoding::{BaseEncoding, glyph_name_to_unicode};
use crate::fonts::standard14;
use crate::pdf::objects::{
    get, get_dict, get_name, get_number, get_numbers, get_stream, number, resolve, resolve_dict,
    stream_bytes,
};

/// Width used when a simple font declares none.
const FALLBACK_WIDTH: f64 = 500.0;

/// First descendant of a Type0 font.
pub fn descendant_font<'a>(doc: &'a Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    match get(doc, font, b"DescendantFonts")? {
        Object::Array(items) => resolve_dict(doc, items.first()?),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct FontCodec {
    code_width: usize,
    to_unicode: BTreeMap<u32, String>,
    from_unicode: HashMap<char, u32>,
    widths: HashMap<u32, f64>,
    default_width: f64,
}

impl FontCodec {
    /// Build the codec of a font dictionary as found in the document.
    pub fn from_font(doc: &Document, font: &Dictionary) -> Self {
        let subtype = get_name(doc, font, b"Subtype").unwrap_or_default();
        let mut codec = if subtype == "Type0" {
            Self::composite(doc, font)
        } else {
            Self::simple(doc, font, &subtype)
        };
        if let Some(stream) = get_stream(doc, font, b"ToUnicode") {
            let cmap = parse_to_unicode(&stream_bytes(stream));
            codec.to_unicode.extend(cmap.entries);
        }
        codec.index_reverse();
        codec
    }

    /// Codec of an sfnt program embedded as Identity-H, where codes are
    /// glyph ids.
    pub fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let mut codec = Self {
            code_width: 2,
            default_width: 1000.0,
            ..Self::default()
        };
        let scale = 1000.0 / f64::from(face.units_per_em().max(1));
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|codepoint| {
                    let Some(c) = char::from_u32(codepoint) else {
                        return;
                    };
                    let Some(glyph) = subtable.glyph_index(codepoint) else {
                        return;
                    };
                    let code = u32::from(glyph.0);
                    codec.to_unicode.entry(code).or_insert_with(|| c.to_string());
                    if let Some(advance) = face.glyph_hor_advance(glyph) {
                        codec.widths.insert(code, f64::from(advance) * scale);
                    }
                });
            }
        }
        codec.index_reverse();
        codec
    }

    fn composite(doc: &Document, font: &Dictionary) -> Self {
        let mut codec = Self {
            code_width: 2,
            default_width: 1000.0,
            ..Self::default()
        };
        let Some(descendant) = descendant_font(doc, font) else {
            return codec;
        };
        if let Some(dw) = get_number(doc, descendant, b"DW") {
            codec.default_width = dw;
        }
        if let Some(Object::Array(entries)) = get(doc, descendant, b"W") {
            let values: Vec<&Object> = entries.iter().filter_map(|e| resolve(doc, e)).collect();
            let mut i = 0;
            while i < values.len() {
                let Some(first) = number(values[i]) else {
                    break;
                };
                match values.get(i + 1) {
                    Some(Object::Array(widths)) => {
                        for (offset, width) in widths.iter().enumerate() {
                            if let Some(width) = resolve(doc, width).and_then(number) {
                                codec.widths.insert(first as u32 + offset as u32, width);
                            }
                        }
                        i += 2;
                    }
                    Some(last) => {
                        let (Some(last), Some(width)) =
                            (number(last), values.get(i + 2).and_then(|w| number(w)))
                        else {
                            break;
                        };
                        for code in first as u32..=last as u32 {
                            codec.widths.insert(code, width);
                        }
                        i += 3;
                    }
                    None => break,
                }
            }
        }
        codec
    }

    fn simple(doc: &Document, font: &Dictionary, subtype: &str) -> Self {
        let mut codec = Self {
            code_width: 1,
            default_width: FALLBACK_WIDTH,
            ..Self::default()
        };
        let base_name = get_name(doc, font, b"BaseFont").unwrap_or_default();
        let standard = standard14::mapped_name(&base_name);
        let symbolic = standard.is_some_and(standard14::is_symbolic);

        let default_encoding = match subtype {
            "Type1" | "MMType1" if !symbolic => Some(BaseEncoding::Standard),
            "TrueType" => Some(BaseEncoding::WinAnsi),
            _ => None,
        };
        let (base, differences) = match get(doc, font, b"Encoding") {
            Some(Object::Name(name)) => (
                BaseEncoding::from_name(&String::from_utf8_lossy(name)).or(default_encoding),
                None,
            ),
            Some(Object::Dictionary(dict)) => (
                get_name(doc, dict, b"BaseEncoding")
                    .and_then(|n| BaseEncoding::from_name(&n))
                    .or(default_encoding),
                get(doc, dict, b"Differences"),
            ),
            _ => (default_encoding, None),
        };
        for code in 0..=255u8 {
            let mapped = match base {
                Some(encoding) => encoding.decode(code),
                None if !symbolic && code >= 0x20 => Some(char::from(code)),
                None => None,
            };
            if let Some(c) = mapped {
                codec.to_unicode.insert(u32::from(code), c.to_string());
            }
        }
        if let Some(Object::Array(entries)) = differences {
            let mut code = 0u32;
            for entry in entries {
                match resolve(doc, entry) {
                    Some(Object::Name(glyph)) => {
                        if let Some(text) = glyph_name_to_unicode(&String::from_utf8_lossy(glyph)) {
                            codec.to_unicode.insert(code, text);
                        }
                        code += 1;
                    }
                    Some(other) => {
                        if let Some(n) = number(other) {
                            code = n as u32;
                        }
                    }
                    None => {}
                }
            }
        }

        // Type 3 widths live in glyph space.
        let width_scale = if subtype == "Type3" {
            get_numbers(doc, font, b"FontMatrix")
                .and_then(|m| m.first().copied())
                .map(|a| a * 1000.0)
                .unwrap_or(1.0)
        } else {
            1.0
        };
        if let Some(widths) = get_numbers(doc, font, b"Widths") {
            let first = get_number(doc, font, b"FirstChar").unwrap_or(0.0) as u32;
            for (offset, width) in widths.into_iter().enumerate() {
                codec.widths.insert(first + offset as u32, width * width_scale);
            }
        }
        if let Some(missing) = get_dict(doc, font, b"FontDescriptor")
            .and_then(|d| get_number(doc, d, b"MissingWidth"))
        {
            codec.default_width = missing * width_scale;
        } else if let Some(standard) = standard
            && codec.widths.is_empty()
        {
            for code in 0..=255u32 {
                codec
                    .widths
                    .insert(code, standard14::builtin_width(standard, code));
            }
        }
        codec
    }

    /// Built-in face of a Standard-14 font written with WinAnsi encoding.
    pub fn standard14(standard_name: &str) -> Self {
        let mut codec = Self {
            code_width: 1,
            default_width: FALLBACK_WIDTH,
            ..Self::default()
        };
        for code in 0..=255u8 {
            if let Some(c) = BaseEncoding::WinAnsi.decode(code) {
                codec.to_unicode.insert(u32::from(code), c.to_string());
            }
            codec.widths.insert(
                u32::from(code),
                standard14::builtin_width(standard_name, u32::from(code)),
            );
        }
        codec.index_reverse();
        codec
    }

    /// Reverse table; the lowest code wins for duplicated characters.
    fn index_reverse(&mut self) {
        self.from_unicode.clear();
        for (code, text) in self.to_unicode.iter().rev() {
            let mut chars = text.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                self.from_unicode.insert(c, *code);
            }
        }
    }

    pub fn is_single_byte(&self) -> bool {
        self.code_width == 1
    }

    pub fn code_bytes(&self) -> usize {
        self.code_width
    }

    pub fn mappings(&self) -> &BTreeMap<u32, String> {
        &self.to_unicode
    }

    /// Explicit widths sorted by code.
    pub fn width_entries(&self) -> Vec<(u32, f64)> {
        let mut entries: Vec<(u32, f64)> = self.widths.iter().map(|(c, w)| (*c, *w)).collect();
        entries.sort_by_key(|(code, _)| *code);
        entries
    }

    /// Split a shown string into char codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.code_width == 2 {
            bytes
                .chunks_exact(2)
                .map(|pair| u32::from(u16::from_be_bytes([pair[0], pair[1]])))
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }

    /// Unicode text of one code, U+FFFD when unmapped.
    pub fn decode_code(&self, code: u32) -> String {
        self.to_unicode
            .get(&code)
            .cloned()
            .unwrap_or_else(|| char::REPLACEMENT_CHARACTER.to_string())
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        self.codes(bytes)
            .into_iter()
            .map(|code| self.decode_code(code))
            .collect()
    }

    /// Advance of `code` in thousandths of an em.
    pub fn width(&self, code: u32) -> f64 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }

    pub fn code_for(&self, c: char) -> Option<u32> {
        self.from_unicode.get(&c).copied()
    }

    pub fn can_encode_char(&self, c: char) -> bool {
        self.from_unicode.contains_key(&c)
    }

    /// Whether every character of `text` has a code in this font.
    pub fn can_encode(&self, text: &str) -> bool {
        text.chars().all(|c| self.can_encode_char(c))
    }

    pub fn encode_code(&self, code: u32, out: &mut Vec<u8>) {
        if self.code_width == 2 {
            out.extend_from_slice(&(code as u16).to_be_bytes());
        } else {
            out.push(code as u8);
        }
    }

    /// Encode `text`, or `None` if any character is unmapped.
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(text.len() * self.code_width);
        for c in text.chars() {
            self.encode_code(self.code_for(c)?, &mut out);
        }
        Some(out)
    }

    /// Width of the space glyph in thousandths of an em.
    pub fn space_width(&self) -> f64 {
        self.code_for(' ')
            .map(|code| self.width(code))
            .unwrap_or(self.default_width / 2.0)
    }

    /// Total advance of `text` in thousandths of an em.
    pub fn text_width(&self, text: &str) -> f64 {
        text.chars()
            .map(|c| self.code_for(c).map(|code| self.width(code)).unwrap_or(self.default_width))
            .sum()
    }
}
