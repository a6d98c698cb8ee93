//! Command status and the lifecycle state machine
//!
//! ```text
//! recorded -> transcribing -> manual_review -> queued -> processing -> completed
//! ```
//!
//! `failed` is a flag on the record, not a status: a failure leaves the status
//! where it was. Retry edges (`processing -> queued`, `transcribing ->
//! transcribing`, `manual_review -> manual_review`) are allowed so a retry
//! decision can always be applied.

use crate::errors::QueueError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Recorded,
    Transcribing,
    Queued,
    Processing,
    Completed,
    ManualReview,
}

impl CommandStatus {
    pub const ALL: [CommandStatus; 6] = [
        CommandStatus::Recorded,
        CommandStatus::Transcribing,
        CommandStatus::Queued,
        CommandStatus::Processing,
        CommandStatus::Completed,
        CommandStatus::ManualReview,
    ];

    /// Stable on-disk name
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Recorded => "recorded",
            CommandStatus::Transcribing => "transcribing",
            CommandStatus::Queued => "queued",
            CommandStatus::Processing => "processing",
            CommandStatus::Completed => "completed",
            CommandStatus::ManualReview => "manual_review",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandStatus::Completed)
    }

    /// Whether `self -> next` is a legal lifecycle edge.
    ///
    /// Staying in the same status is allowed for every non-terminal status.
    pub fn can_transition_to(&self, next: CommandStatus) -> bool {
        use CommandStatus::*;

        if self.is_terminal() {
            return false;
        }
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Recorded, Transcribing)
                | (Transcribing, ManualReview)
                | (ManualReview, Queued)
                | (Queued, Processing)
                | (Processing, Completed)
                | (Processing, Queued)
        )
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandStatus {
    type Err = QueueError;

    /// Strict parse: unknown values are an error, never a default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recorded" => Ok(CommandStatus::Recorded),
            "transcribing" => Ok(CommandStatus::Transcribing),
            "queued" => Ok(CommandStatus::Queued),
            "processing" => Ok(CommandStatus::Processing),
            "completed" => Ok(CommandStatus::Completed),
            "manual_review" => Ok(CommandStatus::ManualReview),
            other => Err(QueueError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}
