// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Char-code -> CID -> GID -> Unicode tables for CID-keyed fonts.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fonts::cmap::parse_to_unicode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnicodeMapping {
    #[serde(rename = "isCID")]
    pub is_cid: bool,
    pub cid_to_gid_identity: bool,
    pub entries: Vec<UnicodeMappingEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnicodeMappingEntry {
    pub code: u32,
    pub cid: u32,
    pub gid: u32,
    pub unicode: u32,
}

/// Mapping payload stored in a font entry's `toUnicode` field.
///
/// Composite fonts get the structured JSON table, assuming Identity
/// encoding and Identity CID-to-GID mapping. Simple fonts, and any table
/// that cannot be built, keep the raw CMap bytes.
pub fn build_unicode_mapping(is_cid: bool, raw_to_unicode: &[u8]) -> Vec<u8> {
    if !is_cid || raw_to_unicode.is_empty() {
        return raw_to_unicode.to_vec();
    }
    let cmap = parse_to_unicode(raw_to_unicode);
    let entries: Vec<UnicodeMappingEntry> = cmap
        .entries
        .iter()
        .filter_map(|(code, text)| {
            let unicode = u32::from(text.chars().next()?);
            Some(UnicodeMappingEntry {
                code: *code,
                cid: *code,
                gid: *code,
                unicode,
            })
        })
        .collect();
    let mapping = UnicodeMapping {
        is_cid: true,
        cid_to_gid_identity: true,
        entries,
    };
    match serde_json::to_vec(&mapping) {
        Ok(json) => {
            debug!(entries = mapping.entries.len(), "built CID unicode mapping");
            json
        }
        Err(err) => {
            warn!(%err, "failed to build CID unicode mapping, keeping raw CMap");
            raw_to_unicode.to_vec()
        }
    }
}
