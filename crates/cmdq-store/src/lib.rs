//! Command queue store - durable persistence for command records
//!
//! Provides:
//! - SQLite connection helpers
//! - Versioned schema migrations gated by `PRAGMA user_version`
//! - Repository layer (single-record CRUD) and fallible bulk hydration
//! - Managed audio directory and the startup audio cleanup pass

pub mod audio;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;

// Re-export key types
pub use audio::{AudioDir, CleanupReport};
pub use errors::Result;
pub use migrations::{apply_migrations, MigrationReport, CURRENT_SCHEMA_VERSION};
pub use repo::{load_commands, CommandRepo, LoadReport, RecordParseError};
