//! Command queue core - in-memory semantics of the command lifecycle
//!
//! This crate provides:
//! - The command record and its closed status enumeration
//! - The status state machine and the retry policy engine
//! - Derived read views (processing, completed, review, all)
//! - The canonical error facility and the structured logging facility
//!
//! Nothing here touches the filesystem or the database; persistence lives in
//! `cmdq-store` and orchestration in `cmdq-engine`.

pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod retry;
pub mod views;

#[doc(hidden)]
pub use cmdq_core_types;

// Re-export commonly used types
pub use errors::{ExError, ExErrorKind, QueueError, Result};
pub use model::{CommandPatch, CommandRecord, CommandStatus};
pub use retry::{after_transcription, can_retry, needs_manual_review, retry_policy, RetryDecision};
pub use views::{QueueView, DEFAULT_VIEW_LIMIT};
