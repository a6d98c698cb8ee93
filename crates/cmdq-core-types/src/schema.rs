//! Structured log vocabulary
//!
//! Every crate logs through the same keys so one filter (`op`, `command_id`,
//! `event`) follows a command across the store, the engine and the pipeline.

/// Emitting module, from `module_path!()`
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

pub const FIELD_COMMAND_ID: &str = "command_id";
/// Status and failure flag after a single-record write
pub const FIELD_STATUS: &str = "status";
pub const FIELD_FAILED: &str = "failed";

/// Why a batch pass skipped a record
pub const FIELD_REASON: &str = "reason";

pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
pub const EVENT_RECORD_SKIPPED: &str = "record_skipped";

/// Every value the `event` field takes
pub const EVENTS: [&str; 4] = [EVENT_START, EVENT_END, EVENT_END_ERROR, EVENT_RECORD_SKIPPED];
