// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The fourteen standard Type 1 faces: name mapping and built-in widths.

const STANDARD_14: [&str; 14] = [
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Symbol",
    "ZapfDingbats",
];

/// Common aliases of the standard faces.
const ALIASES: [(&str, &str); 20] = [
    ("Arial", "Helvetica"),
    ("ArialMT", "Helvetica"),
    ("Arial,Bold", "Helvetica-Bold"),
    ("Arial-BoldMT", "Helvetica-Bold"),
    ("Arial,Italic", "Helvetica-Oblique"),
    ("Arial-ItalicMT", "Helvetica-Oblique"),
    ("Arial,BoldItalic", "Helvetica-BoldOblique"),
    ("Arial-BoldItalicMT", "Helvetica-BoldOblique"),
    ("TimesNewRoman", "Times-Roman"),
    ("TimesNewRomanPSMT", "Times-Roman"),
    ("TimesNewRoman,Bold", "Times-Bold"),
    ("TimesNewRomanPS-BoldMT", "Times-Bold"),
    ("TimesNewRoman,Italic", "Times-Italic"),
    ("TimesNewRomanPS-ItalicMT", "Times-Italic"),
    ("TimesNewRoman,BoldItalic", "Times-BoldItalic"),
    ("TimesNewRomanPS-BoldItalicMT", "Times-BoldItalic"),
    ("CourierNew", "Courier"),
    ("CourierNewPSMT", "Courier"),
    ("CourierNew,Bold", "Courier-Bold"),
    ("CourierNewPS-BoldMT", "Courier-Bold"),
];

/// Helvetica advance widths for codes 32..=126.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Strip a subset tag such as `ABCDEF+`.
pub fn strip_subset_prefix(base_name: &str) -> &str {
    match base_name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => rest,
        _ => base_name,
    }
}

/// Standard-14 face a base font name maps to, if any.
pub fn mapped_name(base_name: &str) -> Option<&'static str> {
    let name = strip_subset_prefix(base_name);
    if let Some(standard) = STANDARD_14.iter().find(|s| **s == name) {
        return Some(standard);
    }
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, standard)| *standard)
}

pub fn is_symbolic(standard_name: &str) -> bool {
    matches!(standard_name, "Symbol" | "ZapfDingbats")
}

/// Built-in width (thousandths of an em) of a single-byte code.
pub fn builtin_width(standard_name: &str, code: u32) -> f64 {
    if standard_name.starts_with("Courier") {
        return 600.0;
    }
    match code {
        32..=126 => f64::from(HELVETICA_ASCII[(code - 32) as usize]),
        _ => 556.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_tags_and_aliases_map_to_standard_faces() {
        assert_eq!(mapped_name("ABCDEF+Helvetica-Bold"), Some("Helvetica-Bold"));
        assert_eq!(mapped_name("ArialMT"), Some("Helvetica"));
        assert_eq!(mapped_name("Courier"), Some("Courier"));
        assert_eq!(mapped_name("NotoSans-Regular"), None);
        assert_eq!(strip_subset_prefix("abc+Font"), "abc+Font");
    }

    #[test]
    fn builtin_widths_follow_the_face() {
        assert_eq!(builtin_width("Helvetica", u32::from(b' ')), 278.0);
        assert_eq!(builtin_width("Helvetica", u32::from(b'W')), 944.0);
        assert_eq!(builtin_width("Courier-Bold", u32::from(b'W')), 600.0);
    }
}
