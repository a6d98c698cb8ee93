//! Structured logging for the command queue
//!
//! `init` installs the process-wide subscriber for a [`Profile`]; the
//! `log_op_*` and `log_record_skipped` macros emit events with the field
//! names from `cmdq_core_types::schema`; [`init_test_capture`] swaps in an
//! in-memory subscriber for assertions.
//!
//! ```rust
//! use cmdq_core::logging_facility::{init, Profile};
//!
//! init(Profile::Test);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
