// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// satzwerk-codec: bidirectional PDF/JSON codec.
//
// Converts whole documents to the JSON model and back, patching preserved
// content streams where possible. A job cache serves single pages lazily.

pub mod annotations;
pub mod codec;
pub mod content;
pub mod cos;
pub mod engine;
pub mod external;
pub mod extract;
pub mod fonts;
pub mod forms;
pub mod images;
pub mod lazy;
pub mod metadata;
pub mod normalize;
pub mod payload;
pub mod pdf;
pub mod progress;
pub mod reconstruct;

#[cfg(test)]
mod testing;

// Re-export the entry points so callers can use `satzwerk_codec::PdfJsonCodec` etc.
pub use codec::PdfJsonCodec;
pub use content::PageMode;
pub use extract::extract_document;
pub use lazy::{Clock, LazyPageCache, SystemClock};
pub use progress::{LoggingProgress, NoProgress, ProgressSink, TaskNoteProgress, TaskNotes};
pub use reconstruct::{ReconstructionReport, reconstruct};
