// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Progress reporting types shared by the codec and its callers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed milestones of a full extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStage {
    Loading,
    Normalizing,
    Parsing,
    Fonts,
    Text,
    Images,
    Annotations,
    Metadata,
    Serializing,
    Complete,
}

impl ConversionStage {
    /// Percentage reported when the stage starts.
    pub fn base_percent(self) -> u8 {
        match self {
            Self::Loading => 5,
            Self::Normalizing => 10,
            Self::Parsing => 20,
            Self::Fonts => 30,
            Self::Text => 50,
            Self::Images => 70,
            Self::Annotations => 80,
            Self::Metadata => 90,
            Self::Serializing => 95,
            Self::Complete => 100,
        }
    }

    /// Percentage a stage may climb to while reporting per-page counters.
    pub fn ceiling_percent(self) -> u8 {
        match self {
            Self::Fonts => 50,
            Self::Text => 70,
            Self::Images => 80,
            Self::Annotations => 90,
            other => other.base_percent(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Normalizing => "normalizing",
            Self::Parsing => "parsing",
            Self::Fonts => "fonts",
            Self::Text => "text",
            Self::Images => "images",
            Self::Annotations => "annotations",
            Self::Metadata => "metadata",
            Self::Serializing => "serializing",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for ConversionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One advisory progress update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionProgress {
    pub percent: u8,
    pub stage: ConversionStage,
    pub message: String,
    pub current: Option<u32>,
    pub total: Option<u32>,
}

impl ConversionProgress {
    pub fn at(stage: ConversionStage, message: impl Into<String>) -> Self {
        Self {
            percent: stage.base_percent(),
            stage,
            message: message.into(),
            current: None,
            total: None,
        }
    }

    /// Interpolate between the stage's base and ceiling by `current / total`.
    pub fn counted(
        stage: ConversionStage,
        message: impl Into<String>,
        current: u32,
        total: u32,
    ) -> Self {
        let base = f64::from(stage.base_percent());
        let span = f64::from(stage.ceiling_percent()) - base;
        let fraction = if total == 0 {
            0.0
        } else {
            (f64::from(current) / f64::from(total)).clamp(0.0, 1.0)
        };
        Self {
            percent: (base + span * fraction).round() as u8,
            stage,
            message: message.into(),
            current: Some(current),
            total: Some(total),
        }
    }
}

impl fmt::Display for ConversionProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}%] {} - {}", self.percent, self.stage, self.message)?;
        if let (Some(current), Some(total)) = (self.current, self.total) {
            write!(f, " ({}/{})", current, total)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_stage_spans_thirty_to_fifty() {
        assert_eq!(
            ConversionProgress::counted(ConversionStage::Fonts, "fonts", 0, 4).percent,
            30
        );
        assert_eq!(
            ConversionProgress::counted(ConversionStage::Fonts, "fonts", 2, 4).percent,
            40
        );
        assert_eq!(
            ConversionProgress::counted(ConversionStage::Fonts, "fonts", 4, 4).percent,
            50
        );
    }

    #[test]
    fn display_includes_counters_when_present() {
        let counted = ConversionProgress::counted(ConversionStage::Images, "page", 1, 2);
        assert_eq!(counted.to_string(), "[75%] images - page (1/2)");
        let plain = ConversionProgress::at(ConversionStage::Complete, "done");
        assert_eq!(plain.to_string(), "[100%] complete - done");
    }
}
