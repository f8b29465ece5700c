// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Neutral, serializable mirror of a PDF object graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Marker written in place of a reference that re-enters the path being
/// serialized.
pub const CIRCULAR_MARKER: &str = "__circular__";

/// One node of a serialized object graph.
///
/// Strings and stream payloads are base64 so arbitrary bytes survive JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CosValue {
    Null,
    Boolean { value: bool },
    Integer { value: i64 },
    Float { value: f64 },
    Name { value: String },
    String { value: String },
    Array {
        #[serde(default)]
        items: Vec<CosValue>,
    },
    Dictionary {
        #[serde(default)]
        entries: BTreeMap<String, CosValue>,
    },
    Stream { stream: CosStream },
    /// Reference to a page of the same document, by 1-based page number.
    PageRef { value: u32 },
}

impl CosValue {
    pub fn name(value: impl Into<String>) -> Self {
        Self::Name {
            value: value.into(),
        }
    }

    /// Entries of a dictionary value, or of a stream's dictionary.
    pub fn entries(&self) -> Option<&BTreeMap<String, CosValue>> {
        match self {
            Self::Dictionary { entries } => Some(entries),
            Self::Stream { stream } => Some(&stream.dictionary),
            _ => None,
        }
    }

    pub fn is_circular_marker(&self) -> bool {
        matches!(self, Self::Name { value } if value == CIRCULAR_MARKER)
    }
}

/// Stream dictionary plus its raw (still filtered) bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosStream {
    #[serde(default)]
    pub dictionary: BTreeMap<String, CosValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<String>,
}
