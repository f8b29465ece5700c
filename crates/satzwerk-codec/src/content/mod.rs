// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream rewriting and regeneration for rebuilt pages.

pub mod regenerate;
pub mod rewrite;
pub mod vector;

use std::fmt;

use serde::Serialize;

pub use regenerate::{PageResources, compose};
pub use rewrite::{Preflight, patch_text, preserved_operations};
pub use vector::vector_layer;

/// How a page's content was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PageMode {
    /// Nothing to draw and nothing preserved: the page is empty.
    NoContent,
    /// No preserved streams: every element is drawn fresh.
    Clear,
    /// The preserved streams were patched in place.
    Reuse,
    /// Preserved non-text drawing underneath freshly drawn elements.
    VectorOverlay,
}

impl PageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoContent => "no-content",
            Self::Clear => "clear",
            Self::Reuse => "reuse",
            Self::VectorOverlay => "vector-overlay",
        }
    }
}

impl fmt::Display for PageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a font id or image name belongs to a form XObject (`Fm0/F1`).
pub(crate) fn is_form_owned(name: &str) -> bool {
    name.contains('/')
}
