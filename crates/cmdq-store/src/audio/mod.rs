//! Audio artifact management
//!
//! Provides:
//! - The managed audio directory (bare file names resolved against it)
//! - Move primitive with a cross-filesystem fallback
//! - The startup cleanup pass that migrates legacy absolute paths

mod atomic;
mod cleanup;
mod dir;

pub use cleanup::{
    apply_audio_fixes, cleanup_audio_paths, plan_audio_fixes, scan_audio_refs, AudioFix, AudioRef,
    CleanupReport,
};
pub use dir::{bare_file_name, has_separator, AudioDir};
