//! Repository layer for persisting command records to SQLite

pub mod hydration;
pub mod sqlite_repo;

pub use hydration::{load_commands, LoadReport, RecordParseError};
pub use sqlite_repo::CommandRepo;
