use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::CommandStatus;
use crate::errors::{QueueError, Result};

/// A user-originated command tracked from capture to execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    /// Unique identifier (UUID v7), never reused
    pub id: String,

    /// Free-form content; the source of truth for execution
    pub text: String,

    pub status: CommandStatus,

    /// Creation time at millisecond precision; immutable sort key
    pub created_at: DateTime<Utc>,

    /// Bare file name inside the managed audio directory
    pub audio_path: Option<String>,

    /// Output of the recognition engine
    pub transcription: Option<String>,

    /// Ordered attachment references
    pub photo_paths: Vec<String>,

    /// The last attempted operation for the current status errored
    pub failed: bool,

    /// Needs user attention, independent of failure
    pub action_needed: bool,

    /// Diagnostic set with `failed`, cleared whenever `failed` is cleared
    pub error_message: Option<String>,
}

impl CommandRecord {
    /// Create a command captured as audio; starts as `recorded`
    pub fn recorded(audio_file_name: impl Into<String>) -> Self {
        let mut record = Self::with_status(String::new(), CommandStatus::Recorded);
        record.audio_path = Some(audio_file_name.into());
        record
    }

    /// Create a text-only command; starts as `queued`
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_status(text.into(), CommandStatus::Queued)
    }

    fn with_status(text: String, status: CommandStatus) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            text,
            status,
            created_at: now_millis(),
            audio_path: None,
            transcription: None,
            photo_paths: Vec::new(),
            failed: false,
            action_needed: false,
            error_message: None,
        }
    }

    pub fn with_photos(mut self, photo_paths: Vec<String>) -> Self {
        self.photo_paths = photo_paths;
        self
    }

    pub fn has_audio(&self) -> bool {
        self.audio_path.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Belongs in the review view: failed, flagged, or awaiting confirmation
    pub fn needs_attention(&self) -> bool {
        self.failed || self.action_needed || self.status == CommandStatus::ManualReview
    }

    /// Check the record-level invariants that hold for every stored record
    ///
    /// # Errors
    ///
    /// Returns `InvalidAudioPath` when `audio_path` still carries a separator
    /// and `MissingErrorMessage` when `failed` is set without a message.
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.audio_path {
            check_bare_name(path)?;
        }
        self.check_failure_message()
    }

    fn check_failure_message(&self) -> Result<()> {
        if self.failed && self.error_message.is_none() {
            return Err(QueueError::MissingErrorMessage {
                command_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Apply a field patch in place
    pub fn apply(&mut self, patch: &CommandPatch) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(audio_path) = &patch.audio_path {
            self.audio_path = audio_path.clone();
        }
        if let Some(transcription) = &patch.transcription {
            self.transcription = transcription.clone();
        }
        if let Some(failed) = patch.failed {
            self.failed = failed;
        }
        if let Some(action_needed) = patch.action_needed {
            self.action_needed = action_needed;
        }
        if let Some(error_message) = &patch.error_message {
            self.error_message = error_message.clone();
        }
    }
}

/// A partial update of mutable command fields
///
/// `None` leaves a field untouched; for optional fields `Some(None)` clears it.
/// `id` and `created_at` are immutable and therefore absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandPatch {
    pub text: Option<String>,
    pub status: Option<CommandStatus>,
    pub audio_path: Option<Option<String>>,
    pub transcription: Option<Option<String>>,
    pub failed: Option<bool>,
    pub action_needed: Option<bool>,
    pub error_message: Option<Option<String>>,
}

impl CommandPatch {
    pub fn is_empty(&self) -> bool {
        *self == CommandPatch::default()
    }

    pub fn status(status: CommandStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Mark the record failed with a diagnostic
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            failed: Some(true),
            error_message: Some(Some(message.into())),
            ..Self::default()
        }
    }

    /// Check the invariants of the fields this patch writes
    ///
    /// `patched` is the record after `apply`. State the patch leaves alone,
    /// such as a legacy path awaiting cleanup, is not re-checked.
    pub fn validate_on(&self, patched: &CommandRecord) -> Result<()> {
        if let Some(Some(path)) = &self.audio_path {
            check_bare_name(path)?;
        }
        if self.failed.is_some() || self.error_message.is_some() {
            patched.check_failure_message()?;
        }
        Ok(())
    }

    /// Clear the failure flag together with its message
    pub fn clear_failure() -> Self {
        Self {
            failed: Some(false),
            error_message: Some(None),
            ..Self::default()
        }
    }
}

fn check_bare_name(path: &str) -> Result<()> {
    if path.contains(['/', '\\']) {
        return Err(QueueError::InvalidAudioPath {
            audio_path: path.to_string(),
        });
    }
    Ok(())
}

fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_command() {
        let cmd = CommandRecord::recorded("a.m4a");
        assert_eq!(cmd.status, CommandStatus::Recorded);
        assert_eq!(cmd.audio_path.as_deref(), Some("a.m4a"));
        assert!(cmd.has_audio());
        assert!(cmd.text.is_empty());
        assert!(!cmd.failed);
    }

    #[test]
    fn test_text_command_is_queued() {
        let cmd = CommandRecord::text("buy milk").with_photos(vec!["p1.jpg".to_string()]);
        assert_eq!(cmd.status, CommandStatus::Queued);
        assert!(!cmd.has_audio());
        assert_eq!(cmd.photo_paths, vec!["p1.jpg".to_string()]);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = CommandRecord::text("a");
        let b = CommandRecord::text("b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_created_at_has_millisecond_precision() {
        let cmd = CommandRecord::text("x");
        assert_eq!(cmd.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_validate_rejects_absolute_audio_path() {
        let mut cmd = CommandRecord::recorded("a.m4a");
        assert!(cmd.validate().is_ok());
        cmd.audio_path = Some("/old/abs/path/a.m4a".to_string());
        assert!(matches!(
            cmd.validate(),
            Err(QueueError::InvalidAudioPath { .. })
        ));
    }

    #[test]
    fn test_validate_requires_message_when_failed() {
        let mut cmd = CommandRecord::text("x");
        cmd.failed = true;
        assert!(matches!(
            cmd.validate(),
            Err(QueueError::MissingErrorMessage { .. })
        ));
        cmd.error_message = Some("boom".to_string());
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_apply_patch() {
        let mut cmd = CommandRecord::recorded("a.m4a");
        cmd.apply(&CommandPatch::failure("API timeout"));
        assert!(cmd.failed);
        assert_eq!(cmd.error_message.as_deref(), Some("API timeout"));

        cmd.apply(&CommandPatch::clear_failure());
        assert!(!cmd.failed);
        assert_eq!(cmd.error_message, None);

        cmd.apply(&CommandPatch {
            audio_path: Some(None),
            ..CommandPatch::default()
        });
        assert_eq!(cmd.audio_path, None);
    }

    #[test]
    fn test_patch_checks_only_what_it_writes() {
        let mut legacy = CommandRecord::recorded("a.m4a");
        legacy.audio_path = Some("/old/abs/path/a.m4a".to_string());

        let patch = CommandPatch::status(CommandStatus::Transcribing);
        let mut patched = legacy.clone();
        patched.apply(&patch);
        assert!(patch.validate_on(&patched).is_ok());

        let patch = CommandPatch {
            audio_path: Some(Some("C:\\rec\\b.wav".to_string())),
            ..CommandPatch::default()
        };
        assert!(matches!(
            patch.validate_on(&legacy),
            Err(QueueError::InvalidAudioPath { .. })
        ));

        let patch = CommandPatch {
            failed: Some(true),
            ..CommandPatch::default()
        };
        let mut patched = legacy.clone();
        patched.apply(&patch);
        assert!(matches!(
            patch.validate_on(&patched),
            Err(QueueError::MissingErrorMessage { .. })
        ));
    }

    #[test]
    fn test_empty_patch() {
        assert!(CommandPatch::default().is_empty());
        assert!(!CommandPatch::status(CommandStatus::Queued).is_empty());
    }
}
