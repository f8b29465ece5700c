// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Progress sinks for long-running extractions.
//
// Progress is advisory: a sink never influences the conversion and a sink
// failure is logged, not propagated.

use std::sync::Arc;

use satzwerk_core::error::Result;
use satzwerk_core::types::ConversionProgress;
use tracing::{info, warn};

/// Receiver of progress updates.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &ConversionProgress);
}

/// Writes each update to the log as `[{percent}%] {stage} - {message}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProgress;

impl ProgressSink for LoggingProgress {
    fn report(&self, progress: &ConversionProgress) {
        info!(percent = progress.percent, stage = %progress.stage, "{}", progress);
    }
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: &ConversionProgress) {}
}

// -- Task notes ---------------------------------------------------------------

/// Job registry accepting human-readable notes for a running task.
pub trait TaskNotes: Send + Sync {
    fn add_note(&self, job_id: &str, note: &str) -> Result<()>;
}

/// Forwards every update to a job registry as a note.
pub struct TaskNoteProgress {
    job_id: String,
    notes: Arc<dyn TaskNotes>,
}

impl TaskNoteProgress {
    pub fn new(job_id: impl Into<String>, notes: Arc<dyn TaskNotes>) -> Self {
        Self {
            job_id: job_id.into(),
            notes,
        }
    }
}

impl ProgressSink for TaskNoteProgress {
    fn report(&self, progress: &ConversionProgress) {
        if let Err(err) = self.notes.add_note(&self.job_id, &progress.to_string()) {
            warn!(job_id = %self.job_id, %err, "failed to record progress note");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satzwerk_core::error::SatzwerkError;
    use satzwerk_core::types::ConversionStage;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotes {
        notes: Mutex<Vec<(String, String)>>,
    }

    impl TaskNotes for RecordingNotes {
        fn add_note(&self, job_id: &str, note: &str) -> Result<()> {
            self.notes
                .lock()
                .expect("notes lock")
                .push((job_id.to_string(), note.to_string()));
            Ok(())
        }
    }

    struct FailingNotes;

    impl TaskNotes for FailingNotes {
        fn add_note(&self, _job_id: &str, _note: &str) -> Result<()> {
            Err(SatzwerkError::InvalidInput("registry offline".into()))
        }
    }

    #[test]
    fn notes_carry_the_formatted_milestone() {
        let notes = Arc::new(RecordingNotes::default());
        let sink = TaskNoteProgress::new("J1", notes.clone());
        sink.report(&ConversionProgress::counted(ConversionStage::Fonts, "page 1", 1, 2));
        let recorded = notes.notes.lock().expect("notes lock");
        assert_eq!(
            recorded.as_slice(),
            [("J1".to_string(), "[40%] fonts - page 1 (1/2)".to_string())]
        );
    }

    #[test]
    fn registry_failures_do_not_escape() {
        let sink = TaskNoteProgress::new("J2", Arc::new(FailingNotes));
        sink.report(&ConversionProgress::at(ConversionStage::Complete, "done"));
    }
}
