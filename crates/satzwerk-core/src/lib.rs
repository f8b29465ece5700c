// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Satzwerk core: document model, configuration, and error definitions shared by
// the codec and its callers.

pub mod config;
pub mod cos;
pub mod error;
pub mod model;
pub mod types;

pub use config::CodecConfig;
pub use cos::{CosStream, CosValue};
pub use error::{Result, SatzwerkError};
pub use model::*;
pub use types::*;
