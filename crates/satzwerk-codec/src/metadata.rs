// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document information dictionary and XMP metadata, in both directions.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, TimeZone, Utc};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use regex::Regex;
use satzwerk_core::model::PdfJsonMetadata;
use tracing::debug;

use crate::payload;
use crate::pdf::objects::{
    get, get_dict, get_name, get_stream, get_text, name, stream_bytes, text_string,
};

/// `D:YYYYMMDDHHmmSSOHH'mm'`, every part after the year optional.
static PDF_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:D:)?(\d{4})(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\d{2})?(Z|[+-]\d{2}'?\d{2}'?|[+-]\d{2})?")
        .expect("static regex")
});

/// Convert a PDF date string to an RFC 3339 instant in UTC.
pub fn parse_pdf_date(raw: &str) -> Option<String> {
    let captures = PDF_DATE.captures(raw.trim())?;
    let part = |index: usize, default: u32| -> u32 {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(default)
    };
    let year = captures.get(1)?.as_str().parse::<i32>().ok()?;
    let local = NaiveDate::from_ymd_opt(year, part(2, 1), part(3, 1))?
        .and_hms_opt(part(4, 0), part(5, 0), part(6, 0))?;

    let offset_seconds = match captures.get(7).map(|m| m.as_str()) {
        None | Some("Z") => 0,
        Some(zone) => {
            let sign = if zone.starts_with('-') { -1 } else { 1 };
            let digits: String = zone.chars().filter(char::is_ascii_digit).collect();
            let hours: i32 = digits.get(..2)?.parse().ok()?;
            let minutes: i32 = digits.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
            sign * (hours * 3600 + minutes * 60)
        }
    };
    let offset = FixedOffset::east_opt(offset_seconds)?;
    let instant = offset.from_local_datetime(&local).single()?;
    Some(
        instant
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

/// Convert an RFC 3339 instant to a PDF date string in UTC.
pub fn format_pdf_date(instant: &str) -> Option<String> {
    let parsed = DateTime::parse_from_rfc3339(instant.trim())
        .map_err(|err| debug!(instant, %err, "date is not RFC 3339"))
        .ok()?;
    Some(
        parsed
            .with_timezone(&Utc)
            .format("D:%Y%m%d%H%M%S+00'00'")
            .to_string(),
    )
}

/// Date entry of a dictionary as an RFC 3339 instant.
pub(crate) fn get_date(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    let raw = get_text(doc, dict, key)?;
    let parsed = parse_pdf_date(&raw);
    if parsed.is_none() {
        debug!(key = %String::from_utf8_lossy(key), raw, "unparseable date dropped");
    }
    parsed
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    get_dict(doc, &doc.trailer, b"Info")
}

// -- Extraction ---------------------------------------------------------------

pub fn extract_metadata(doc: &Document) -> PdfJsonMetadata {
    let text = |key: &[u8]| info_dictionary(doc).and_then(|info| get_text(doc, info, key));
    let date = |key: &[u8]| info_dictionary(doc).and_then(|info| get_date(doc, info, key));
    let trapped = info_dictionary(doc).and_then(|info| match get(doc, info, b"Trapped") {
        Some(Object::Name(_)) => get_name(doc, info, b"Trapped"),
        Some(_) => get_text(doc, info, b"Trapped"),
        None => None,
    });
    PdfJsonMetadata {
        title: text(b"Title"),
        author: text(b"Author"),
        subject: text(b"Subject"),
        keywords: text(b"Keywords"),
        creator: text(b"Creator"),
        producer: text(b"Producer"),
        creation_date: date(b"CreationDate"),
        modification_date: date(b"ModDate"),
        trapped,
        number_of_pages: Some(doc.get_pages().len() as u32),
    }
}

/// Base64 of the catalog's XMP metadata stream.
pub fn extract_xmp(doc: &Document) -> Option<String> {
    let catalog = get_dict(doc, &doc.trailer, b"Root")?;
    let stream = get_stream(doc, catalog, b"Metadata")?;
    let bytes = stream_bytes(stream);
    (!bytes.is_empty()).then(|| payload::encode(&bytes))
}

// -- Restoration --------------------------------------------------------------

/// Write the information dictionary and, when present, the XMP stream.
pub fn apply_metadata(
    doc: &mut Document,
    catalog_id: ObjectId,
    metadata: &PdfJsonMetadata,
    xmp: Option<&str>,
) {
    let mut info = Dictionary::new();
    for (key, value) in [
        ("Title", &metadata.title),
        ("Author", &metadata.author),
        ("Subject", &metadata.subject),
        ("Keywords", &metadata.keywords),
        ("Creator", &metadata.creator),
        ("Producer", &metadata.producer),
    ] {
        if let Some(value) = value {
            info.set(key, text_string(value));
        }
    }
    for (key, value) in [
        ("CreationDate", &metadata.creation_date),
        ("ModDate", &metadata.modification_date),
    ] {
        if let Some(date) = value.as_deref().and_then(format_pdf_date) {
            info.set(key, Object::string_literal(date));
        }
    }
    if let Some(trapped) = &metadata.trapped {
        info.set("Trapped", name(trapped));
    }
    if !info.is_empty() {
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", Object::Reference(info_id));
    }

    let Some(xmp) = payload::decode_opt(xmp) else {
        return;
    };
    let stream_id = doc.add_object(Stream::new(
        dictionary! { "Type" => "Metadata", "Subtype" => "XML" },
        xmp,
    ));
    match doc.get_object_mut(catalog_id).and_then(Object::as_dict_mut) {
        Ok(catalog) => catalog.set("Metadata", Object::Reference(stream_id)),
        Err(err) => debug!(%err, "catalog missing, XMP metadata not attached"),
    }
}
