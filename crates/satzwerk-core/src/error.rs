// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Satzwerk.

use thiserror::Error;

/// Top-level error type for all Satzwerk operations.
///
/// Only structural failures travel through this type. Problems local to a
/// single font, glyph, image, annotation, or page are logged and compensated
/// where they occur.
#[derive(Debug, Error)]
pub enum SatzwerkError {
    // -- Caller errors --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no cached document found for job {job_id}")]
    CacheMiss { job_id: String },

    #[error("page {page} out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: u32 },

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("font processing failed: {0}")]
    FontError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("content stream error: {0}")]
    ContentError(String),

    // -- External tools --
    #[error("external tool {tool} failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SatzwerkError {
    /// Whether the failure was caused by the caller's arguments rather than
    /// by the codec or the document.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::CacheMiss { .. } | Self::PageOutOfRange { .. }
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SatzwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_miss_is_a_caller_error() {
        let err = SatzwerkError::CacheMiss {
            job_id: "J1".into(),
        };
        assert!(err.is_caller_error());
        assert_eq!(err.to_string(), "no cached document found for job J1");
    }

    #[test]
    fn pdf_failures_are_not_caller_errors() {
        assert!(!SatzwerkError::PdfError("truncated xref".into()).is_caller_error());
        assert!(SatzwerkError::PageOutOfRange { page: 4, total: 3 }.is_caller_error());
    }
}
