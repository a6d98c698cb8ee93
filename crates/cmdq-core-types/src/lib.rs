//! Core types shared across the command queue facilities
//!
//! Holds the canonical field keys and event names used by the logging
//! facility and by error reporting.

pub mod schema;
