//! Migration framework
//!
//! Provides:
//! - Ordered, version-gated migration steps (`PRAGMA user_version`)
//! - A `schema_version` ledger with DDL checksums
//! - Per-record data transforms that skip and report bad rows

mod checksums;
mod embedded;
mod runner;
mod transforms;

pub use runner::{apply_migrations, schema_version, MigrationReport, CURRENT_SCHEMA_VERSION};
