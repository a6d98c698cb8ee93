//! Retry policy engine
//!
//! Pure mapping from a command's `(status, failed)` to what a user-initiated
//! retry does. Retrying never happens implicitly; the engine only decides.
//!
//! | status        | failed | next status   | clear flag | clear message |
//! |---------------|--------|---------------|------------|---------------|
//! | processing    | any    | queued        | yes        | yes           |
//! | transcribing  | true   | transcribing  | yes        | yes           |
//! | transcribing  | false  | transcribing  | no         | no            |
//! | manual_review | any    | manual_review | yes        | yes           |
//! | anything else | any    | unchanged     | no         | no            |

use crate::model::{CommandPatch, CommandStatus};

/// Outcome of the retry policy for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// `None` leaves the status untouched
    pub next_status: Option<CommandStatus>,
    pub clear_error: bool,
    pub clear_error_message: bool,
}

impl RetryDecision {
    /// Status and flags unchanged
    pub const NO_OP: RetryDecision = RetryDecision {
        next_status: None,
        clear_error: false,
        clear_error_message: false,
    };

    fn to(next: CommandStatus, clear: bool) -> Self {
        Self {
            next_status: Some(next),
            clear_error: clear,
            clear_error_message: clear,
        }
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::NO_OP
    }

    /// Field patch that applies this decision
    pub fn to_patch(&self) -> CommandPatch {
        CommandPatch {
            status: self.next_status,
            failed: self.clear_error.then_some(false),
            error_message: self.clear_error_message.then_some(None),
            ..CommandPatch::default()
        }
    }
}

pub fn retry_policy(status: CommandStatus, failed: bool) -> RetryDecision {
    match status {
        CommandStatus::Processing => RetryDecision::to(CommandStatus::Queued, true),
        CommandStatus::Transcribing => RetryDecision::to(CommandStatus::Transcribing, failed),
        CommandStatus::ManualReview => RetryDecision::to(CommandStatus::ManualReview, true),
        CommandStatus::Recorded | CommandStatus::Queued | CommandStatus::Completed => {
            RetryDecision::NO_OP
        }
    }
}

/// Retry policy over a stored status string.
///
/// An unrecognized status is a no-op rather than an error.
pub fn retry_policy_raw(status: &str, failed: bool) -> RetryDecision {
    status
        .parse::<CommandStatus>()
        .map(|s| retry_policy(s, failed))
        .unwrap_or(RetryDecision::NO_OP)
}

/// Whether the retry action is available
pub fn can_retry(status: CommandStatus, failed: bool) -> bool {
    match status {
        CommandStatus::Processing | CommandStatus::ManualReview => true,
        CommandStatus::Transcribing => failed,
        CommandStatus::Recorded | CommandStatus::Queued | CommandStatus::Completed => false,
    }
}

pub fn can_retry_raw(status: &str, failed: bool) -> bool {
    status
        .parse::<CommandStatus>()
        .is_ok_and(|s| can_retry(s, failed))
}

/// Status a command takes once the recognition engine returned text.
///
/// Every transcription goes through manual review; nothing jumps to `queued`.
pub fn after_transcription(status: CommandStatus) -> CommandStatus {
    match status {
        CommandStatus::Transcribing | CommandStatus::ManualReview => CommandStatus::ManualReview,
        other => other,
    }
}

pub fn needs_manual_review(status: CommandStatus) -> bool {
    matches!(
        status,
        CommandStatus::Transcribing | CommandStatus::ManualReview
    )
}
