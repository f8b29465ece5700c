// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Optional font-normalization pre-pass through a PostScript distiller.
//
// The distiller rewrites the document with every font embedded. The pass
// fails closed: any problem leaves the caller with its original bytes.

use std::fs;
use std::process::Command;

use satzwerk_core::config::CodecConfig;
use satzwerk_core::error::Result;
use tracing::{info, instrument, warn};

use crate::external::run_with_timeout;

const DISTILLER_ARGS: &[&str] = &[
    "-sDEVICE=pdfwrite",
    "-dCompatibilityLevel=1.7",
    "-dPDFSETTINGS=/prepress",
    "-dEmbedAllFonts=true",
    "-dSubsetFonts=true",
    "-dCompressFonts=true",
    "-dNOPAUSE",
    "-dBATCH",
    "-dQUIET",
];

/// Rewritten bytes, or `None` when normalization is disabled or failed.
#[instrument(skip_all, fields(bytes_len = data.len()))]
pub fn normalize_fonts(data: &[u8], config: &CodecConfig) -> Option<Vec<u8>> {
    if !config.font_normalization.enabled {
        return None;
    }
    match run_distiller(data, config) {
        Ok(Some(output)) => {
            info!(output_bytes = output.len(), "fonts normalized");
            Some(output)
        }
        Ok(None) => {
            warn!("font normalization produced no output, keeping original bytes");
            None
        }
        Err(err) => {
            warn!(%err, "font normalization failed, keeping original bytes");
            None
        }
    }
}

fn run_distiller(data: &[u8], config: &CodecConfig) -> Result<Option<Vec<u8>>> {
    let scratch = tempfile::tempdir()?;
    let input = scratch.path().join("in.pdf");
    let output = scratch.path().join("out.pdf");
    fs::write(&input, data)?;

    let mut cmd = Command::new(&config.font_normalization.command);
    cmd.args(DISTILLER_ARGS)
        .arg("-o")
        .arg(&output)
        .args(["-c", "<</NeverEmbed[]>> setdistillerparams", "-f"])
        .arg(&input);
    run_with_timeout(cmd, config.external_tool_timeout())?;

    let bytes = match fs::read(&output) {
        Ok(bytes) => bytes,
        Err(_) => return Ok(None),
    };
    Ok((!bytes.is_empty()).then_some(bytes))
}
