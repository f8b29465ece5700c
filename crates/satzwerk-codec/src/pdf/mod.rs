// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: lopdf accessors, stream helpers, and document load/save.

pub mod document;
pub mod objects;
pub mod streams;
