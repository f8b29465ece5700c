// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ToUnicode CMap parsing (bfchar/bfrange) and generation.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

/// Largest range expanded from a single bfrange line.
const MAX_RANGE_SPAN: u32 = 0xFFFF;

/// Parsed char-code to Unicode table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicodeMap {
    pub entries: BTreeMap<u32, String>,
    /// Byte width of the source codes (1 or 2), from the widest code seen.
    pub code_bytes: usize,
}

fn section_regex(kind: &str) -> Regex {
    Regex::new(&format!(r"(?s)begin{kind}(.*?)end{kind}")).expect("static regex")
}

fn bfchar_section() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| section_regex("bfchar"))
}

fn bfrange_section() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| section_regex("bfrange"))
}

fn bfchar_pair() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").expect("static regex")
    })
}

fn bfrange_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(<[0-9A-Fa-f]*>|\[[^\]]*\])")
            .expect("static regex")
    })
}

fn hex_tokens() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([0-9A-Fa-f]*)>").expect("static regex"))
}

fn hex_units(hex: &str) -> Vec<u16> {
    let padded = if hex.len() % 4 == 0 {
        hex.to_string()
    } else {
        format!("{:0>width$}", hex, width = hex.len().div_ceil(4) * 4)
    };
    (0..padded.len())
        .step_by(4)
        .filter_map(|i| u16::from_str_radix(&padded[i..i + 4], 16).ok())
        .collect()
}

fn units_to_string(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

/// Parse the bfchar and bfrange sections of a ToUnicode CMap.
pub fn parse_to_unicode(data: &[u8]) -> ToUnicodeMap {
    let text = String::from_utf8_lossy(data);
    let mut map = ToUnicodeMap::default();
    let note_code = |hex: &str, map: &mut ToUnicodeMap| {
        map.code_bytes = map.code_bytes.max(hex.len().div_ceil(2).clamp(1, 2));
    };

    for section in bfchar_section().captures_iter(&text) {
        for pair in bfchar_pair().captures_iter(&section[1]) {
            let Ok(code) = u32::from_str_radix(&pair[1], 16) else {
                continue;
            };
            note_code(&pair[1], &mut map);
            map.entries.insert(code, units_to_string(&hex_units(&pair[2])));
        }
    }

    for section in bfrange_section().captures_iter(&text) {
        for line in bfrange_line().captures_iter(&section[1]) {
            let (Ok(low), Ok(high)) = (
                u32::from_str_radix(&line[1], 16),
                u32::from_str_radix(&line[2], 16),
            ) else {
                continue;
            };
            if high < low || high - low > MAX_RANGE_SPAN {
                continue;
            }
            note_code(&line[1], &mut map);
            let destination = &line[3];
            if destination.starts_with('[') {
                for (offset, token) in hex_tokens().captures_iter(destination).enumerate() {
                    let code = low + offset as u32;
                    if code > high {
                        break;
                    }
                    map.entries.insert(code, units_to_string(&hex_units(&token[1])));
                }
            } else {
                let base = hex_units(destination.trim_matches(|c| c == '<' || c == '>'));
                let Some(last) = base.last().copied() else {
                    continue;
                };
                for code in low..=high {
                    let mut units = base.clone();
                    let bumped = u32::from(last) + (code - low);
                    let Ok(bumped) = u16::try_from(bumped) else {
                        break;
                    };
                    if let Some(slot) = units.last_mut() {
                        *slot = bumped;
                    }
                    map.entries.insert(code, units_to_string(&units));
                }
            }
        }
    }

    if map.code_bytes == 0 {
        map.code_bytes = 1;
    }
    map
}

/// Write a ToUnicode CMap for the given code widths and mappings.
pub fn write_to_unicode(entries: &BTreeMap<u32, String>, code_bytes: usize) -> Vec<u8> {
    let digits = code_bytes.clamp(1, 2) * 2;
    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n");
    let _ = writeln!(
        out,
        "1 begincodespacerange\n<{:0digits$X}> <{:0digits$X}>\nendcodespacerange",
        0,
        if digits == 2 { 0xFF } else { 0xFFFF },
    );
    let mapped: Vec<(&u32, &String)> = entries.iter().filter(|(_, s)| !s.is_empty()).collect();
    for chunk in mapped.chunks(100) {
        let _ = writeln!(out, "{} beginbfchar", chunk.len());
        for (code, text) in chunk {
            let hex: String = text.encode_utf16().map(|u| format!("{:04X}", u)).collect();
            let _ = writeln!(out, "<{:0digits$X}> <{}>", code, hex);
        }
        out.push_str("endbfchar\n");
    }
    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out.into_bytes()
}
