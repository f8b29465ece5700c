// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-byte base encodings and glyph-name lookup for simple fonts.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Base encodings a simple font can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    WinAnsi,
    Standard,
    MacRoman,
}

impl BaseEncoding {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "WinAnsiEncoding" => Some(Self::WinAnsi),
            "StandardEncoding" => Some(Self::Standard),
            "MacRomanEncoding" | "MacExpertEncoding" => Some(Self::MacRoman),
            _ => None,
        }
    }

    /// Unicode value of `code`, if the encoding defines it.
    pub fn decode(self, code: u8) -> Option<char> {
        match self {
            Self::WinAnsi => win_ansi(code),
            Self::Standard => match code {
                0x27 => Some('\u{2019}'),
                0x60 => Some('\u{2018}'),
                0x20..=0x7E => Some(char::from(code)),
                _ => None,
            },
            Self::MacRoman => match code {
                0x20..=0x7E => Some(char::from(code)),
                _ => None,
            },
        }
    }
}

/// Windows code page 1252 as used by `WinAnsiEncoding`.
fn win_ansi(code: u8) -> Option<char> {
    const HIGH: [u32; 32] = [
        0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
        0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
        0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
    ];
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(char::from(code)),
        0x80..=0x9F => match HIGH[usize::from(code - 0x80)] {
            0 => None,
            value => char::from_u32(value),
        },
        _ => None,
    }
}

const ASCII_NAMES: [&str; 95] = [
    "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand", "quotesingle",
    "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen", "period", "slash", "zero",
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "colon", "semicolon",
    "less", "equal", "greater", "question", "at", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J",
    "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "bracketleft",
    "backslash", "bracketright", "asciicircum", "underscore", "grave", "a", "b", "c", "d", "e",
    "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x",
    "y", "z", "braceleft", "bar", "braceright", "asciitilde",
];

const LATIN1_NAMES: [&str; 96] = [
    "nbspace", "exclamdown", "cent", "sterling", "currency", "yen", "brokenbar", "section",
    "dieresis", "copyright", "ordfeminine", "guillemotleft", "logicalnot", "sfthyphen",
    "registered", "macron", "degree", "plusminus", "twosuperior", "threesuperior", "acute", "mu",
    "paragraph", "periodcentered", "cedilla", "onesuperior", "ordmasculine", "guillemotright",
    "onequarter", "onehalf", "threequarters", "questiondown", "Agrave", "Aacute", "Acircumflex",
    "Atilde", "Adieresis", "Aring", "AE", "Ccedilla", "Egrave", "Eacute", "Ecircumflex",
    "Edieresis", "Igrave", "Iacute", "Icircumflex", "Idieresis", "Eth", "Ntilde", "Ograve",
    "Oacute", "Ocircumflex", "Otilde", "Odieresis", "multiply", "Oslash", "Ugrave", "Uacute",
    "Ucircumflex", "Udieresis", "Yacute", "Thorn", "germandbls", "agrave", "aacute",
    "acircumflex", "atilde", "adieresis", "aring", "ae", "ccedilla", "egrave", "eacute",
    "ecircumflex", "edieresis", "igrave", "iacute", "icircumflex", "idieresis", "eth", "ntilde",
    "ograve", "oacute", "ocircumflex", "otilde", "odieresis", "divide", "oslash", "ugrave",
    "uacute", "ucircumflex", "udieresis", "yacute", "thorn", "ydieresis",
];

const EXTRA_NAMES: [(&str, u32); 30] = [
    ("Euro", 0x20AC),
    ("quotesinglbase", 0x201A),
    ("florin", 0x0192),
    ("quotedblbase", 0x201E),
    ("ellipsis", 0x2026),
    ("dagger", 0x2020),
    ("daggerdbl", 0x2021),
    ("circumflex", 0x02C6),
    ("perthousand", 0x2030),
    ("Scaron", 0x0160),
    ("guilsinglleft", 0x2039),
    ("OE", 0x0152),
    ("Zcaron", 0x017D),
    ("quoteleft", 0x2018),
    ("quoteright", 0x2019),
    ("quotedblleft", 0x201C),
    ("quotedblright", 0x201D),
    ("bullet", 0x2022),
    ("endash", 0x2013),
    ("emdash", 0x2014),
    ("tilde", 0x02DC),
    ("trademark", 0x2122),
    ("scaron", 0x0161),
    ("guilsinglright", 0x203A),
    ("oe", 0x0153),
    ("zcaron", 0x017E),
    ("Ydieresis", 0x0178),
    ("fi", 0xFB01),
    ("fl", 0xFB02),
    ("minus", 0x2212),
];

fn glyph_names() -> &'static HashMap<&'static str, char> {
    static NAMES: OnceLock<HashMap<&'static str, char>> = OnceLock::new();
    NAMES.get_or_init(|| {
        let mut names = HashMap::new();
        for (offset, name) in ASCII_NAMES.iter().enumerate() {
            names.insert(*name, char::from(0x20 + offset as u8));
        }
        for (offset, name) in LATIN1_NAMES.iter().enumerate() {
            names.insert(*name, char::from(0xA0 + offset as u8));
        }
        for (name, value) in EXTRA_NAMES {
            if let Some(c) = char::from_u32(value) {
                names.insert(name, c);
            }
        }
        names
    })
}

/// Unicode value of a glyph name: known names, `uniXXXX`, and `uXXXX[XX]`.
pub fn glyph_name_to_unicode(name: &str) -> Option<String> {
    if let Some(c) = glyph_names().get(name) {
        return Some(c.to_string());
    }
    let base = name.split('.').next().unwrap_or(name);
    if base != name
        && let Some(c) = glyph_names().get(base)
    {
        return Some(c.to_string());
    }
    if let Some(hex) = base.strip_prefix("uni")
        && hex.len() >= 4
        && hex.len() % 4 == 0
    {
        let units: Option<Vec<u16>> = (0..hex.len())
            .step_by(4)
            .map(|i| u16::from_str_radix(&hex[i..i + 4], 16).ok())
            .collect();
        return units.map(|units| String::from_utf16_lossy(&units));
    }
    if let Some(hex) = base.strip_prefix('u')
        && (4..=6).contains(&hex.len())
    {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(|c| c.to_string());
    }
    None
}
