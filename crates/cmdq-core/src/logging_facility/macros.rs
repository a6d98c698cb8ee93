//! Operation logging macros
//!
//! Each operation logs one `start` event and exactly one of `end` or
//! `end_error`, all carrying the same `op` tag. Extra `key = value` fields are
//! passed through to `tracing` unchanged.

/// Log the start of an operation
///
/// ```
/// # use cmdq_core::log_op_start;
/// log_op_start!("add_command");
/// log_op_start!("add_command", command_id = "c123");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::cmdq_core_types::schema::EVENT_START,
            $($($field)*)?
        )
    };
}

/// Log the successful end of an operation; `duration_ms` is required
///
/// ```
/// # use cmdq_core::log_op_end;
/// log_op_end!("add_command", duration_ms = 42);
/// log_op_end!("add_command", duration_ms = 42, command_id = "c123");
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::cmdq_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($($field)*)?
        )
    };
}

/// Log the failed end of an operation
///
/// `$err` is anything convertible into `ExError`; its kind and code become
/// fields of the event.
///
/// ```
/// # use cmdq_core::{log_op_error, errors::QueueError};
/// let err = QueueError::RecordNotFound { command_id: "c1".to_string() };
/// log_op_error!("update_status", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let failure: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::cmdq_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?failure.kind(),
            err.code = failure.code(),
            message = failure.message(),
            $($($field)*)?
        )
    }};
}

/// Log a record a batch pass left untouched (migration, load, audio cleanup)
#[macro_export]
macro_rules! log_record_skipped {
    ($op:expr, $command_id:expr, $reason:expr) => {
        tracing::warn!(
            component = module_path!(),
            op = $op,
            event = $crate::cmdq_core_types::schema::EVENT_RECORD_SKIPPED,
            command_id = %$command_id,
            reason = %$reason,
        )
    };
}
