//! Pipeline driver
//!
//! Moves commands through the two external collaborators:
//!
//! ```text
//! recorded -> transcribing -> manual_review -> queued -> processing -> completed
//!             (recognition)   (user confirms)            (executor)
//! ```
//!
//! A collaborator failure never changes the status; it sets `failed` with the
//! collaborator's message and leaves the command for the review view and an
//! explicit retry.

use crate::manager::QueueManager;
use cmdq_core::errors::QueueError;
use cmdq_core::{
    after_transcription, log_op_end, log_op_error, log_op_start, CommandPatch, CommandRecord,
    CommandStatus,
};
use cmdq_store::errors::Result;
use std::path::Path;
use std::time::Instant;

/// Failure reported by a collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PipelineFailure {
    pub message: String,
}

impl PipelineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Speech recognition
pub trait RecognitionEngine: Send + Sync {
    /// Transcribe the recording at `audio`
    ///
    /// `language` is a hint such as `"en"`; `None` lets the engine detect it.
    fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
    ) -> std::result::Result<String, PipelineFailure>;
}

/// Carries out a confirmed command
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, text: &str) -> std::result::Result<(), PipelineFailure>;
}

pub struct Pipeline<'a> {
    recognizer: &'a dyn RecognitionEngine,
    executor: &'a dyn CommandExecutor,
}

impl<'a> Pipeline<'a> {
    pub fn new(recognizer: &'a dyn RecognitionEngine, executor: &'a dyn CommandExecutor) -> Self {
        Self {
            recognizer,
            executor,
        }
    }

    /// Transcribe a `recorded` command, or re-run a `transcribing` one
    ///
    /// On success the command moves to `manual_review`; an empty `text`
    /// takes the transcription.
    ///
    /// # Errors
    ///
    /// `IllegalTransition` from any other status, or a store error. A
    /// recognition failure is recorded on the command, not returned.
    pub fn transcribe(
        &self,
        manager: &QueueManager,
        id: &str,
        language: Option<&str>,
    ) -> Result<Option<CommandRecord>> {
        let started = Instant::now();
        log_op_start!("pipeline_transcribe", command_id = id);
        let outcome = self.run_transcription(manager, id, language);
        log_outcome("pipeline_transcribe", id, started, &outcome);
        outcome
    }

    fn run_transcription(
        &self,
        manager: &QueueManager,
        id: &str,
        language: Option<&str>,
    ) -> Result<Option<CommandRecord>> {
        let Some(record) = manager.update_status(id, CommandStatus::Transcribing)? else {
            return Ok(None);
        };

        let located = record
            .audio_path
            .as_deref()
            .and_then(|stored| manager.audio_dir().locate(stored));
        let Some(audio) = located else {
            let err = QueueError::AudioArtifactMissing {
                command_id: id.to_string(),
                audio_path: record.audio_path.clone().unwrap_or_default(),
            };
            if record.audio_path.is_some() {
                manager.update_audio_path(id, None)?;
            }
            return manager.update_failed(id, true, Some(err.to_string()));
        };

        match self.recognizer.transcribe(&audio, language) {
            Ok(transcription) => {
                let text = record
                    .text
                    .trim()
                    .is_empty()
                    .then(|| transcription.clone());
                let patch = CommandPatch {
                    text,
                    status: Some(after_transcription(record.status)),
                    transcription: Some(Some(transcription)),
                    ..CommandPatch::clear_failure()
                };
                manager.apply_patch("apply_transcription", id, patch)
            }
            Err(failure) => manager.update_failed(id, true, Some(failure.message)),
        }
    }

    /// Confirm a reviewed command, optionally with edited text
    pub fn confirm(
        &self,
        manager: &QueueManager,
        id: &str,
        text: Option<String>,
    ) -> Result<Option<CommandRecord>> {
        let started = Instant::now();
        log_op_start!("pipeline_confirm", command_id = id);
        let outcome =
            require_status(manager, id, CommandStatus::ManualReview, CommandStatus::Queued)
                .and_then(|()| {
                    let patch = CommandPatch {
                        text,
                        status: Some(CommandStatus::Queued),
                        ..CommandPatch::clear_failure()
                    };
                    manager.apply_patch("confirm_command", id, patch)
                });
        log_outcome("pipeline_confirm", id, started, &outcome);
        outcome
    }

    /// Execute a `queued` command
    ///
    /// # Errors
    ///
    /// `IllegalTransition` from any other status, or a store error. An
    /// executor failure is recorded on the command, not returned.
    pub fn execute(&self, manager: &QueueManager, id: &str) -> Result<Option<CommandRecord>> {
        let started = Instant::now();
        log_op_start!("pipeline_execute", command_id = id);
        let outcome = self.run_execution(manager, id);
        log_outcome("pipeline_execute", id, started, &outcome);
        outcome
    }

    fn run_execution(&self, manager: &QueueManager, id: &str) -> Result<Option<CommandRecord>> {
        require_status(manager, id, CommandStatus::Queued, CommandStatus::Processing)?;
        let patch = CommandPatch {
            status: Some(CommandStatus::Processing),
            ..CommandPatch::clear_failure()
        };
        let Some(record) = manager.apply_patch("start_execution", id, patch)? else {
            return Ok(None);
        };

        match self.executor.execute(&record.text) {
            Ok(()) => manager.update_status(id, CommandStatus::Completed),
            Err(failure) => manager.update_failed(id, true, Some(failure.message)),
        }
    }
}

/// The single `end` or `end_error` event of a pipeline step
fn log_outcome(
    op: &'static str,
    id: &str,
    started: Instant,
    outcome: &Result<Option<CommandRecord>>,
) {
    let duration_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(updated) => log_op_end!(
            op,
            duration_ms = duration_ms,
            command_id = id,
            found = updated.is_some(),
            failed = updated.as_ref().is_some_and(|r| r.failed)
        ),
        Err(err) => log_op_error!(
            op,
            err.clone(),
            duration_ms = duration_ms,
            command_id = id
        ),
    }
}

/// The same-status edge is legal in general, but not for these two steps
fn require_status(
    manager: &QueueManager,
    id: &str,
    expected: CommandStatus,
    next: CommandStatus,
) -> Result<()> {
    match manager.get(id) {
        Some(current) if current.status != expected => Err(QueueError::IllegalTransition {
            command_id: id.to_string(),
            from: current.status.to_string(),
            to: next.to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}
