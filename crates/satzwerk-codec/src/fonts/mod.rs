// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font pipeline: discovery, program extraction, text codecs, fallback
// routing, and materialization into rebuilt documents.

pub mod catalogue;
pub mod cmap;
pub mod codec;
pub mod embed;
pub mod encoding;
pub mod fallback;
pub mod program;
pub mod standard14;
pub mod unicode;

pub use catalogue::{CodecCache, FontCatalogue, PageFonts};
pub use codec::FontCodec;
pub use embed::{FontMaterializer, LoadedFont};
pub use fallback::{
    FALLBACK_FONT_ID, FallbackFonts, map_unsupported_glyph, resolve_fallback_font_id,
};
pub use program::ProgramExtractor;
