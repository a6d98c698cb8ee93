//! Command queue engine - orchestration layer
//!
//! Owns the store connection and the in-memory mirror of it, and drives
//! commands through the recognition engine and the command executor.

pub mod config;
pub mod manager;
pub mod pipeline;

pub use config::QueueConfig;
pub use manager::{MaintenanceReport, QueueManager};
pub use pipeline::{CommandExecutor, Pipeline, PipelineFailure, RecognitionEngine};
