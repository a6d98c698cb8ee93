//! File move primitive
//!
//! `rename` when source and target share a filesystem; otherwise copy into a
//! temp file next to the target, rename it into place, then remove the source.

use crate::errors::{io_error, Result};
use std::fs;
use std::path::Path;

pub fn move_file(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create_audio_dir", e))?;
    }

    if fs::rename(source, target).is_ok() {
        return Ok(());
    }

    let temp_path = target.with_extension("tmp");
    fs::copy(source, &temp_path).map_err(|e| io_error("copy_audio_temp", e))?;
    fs::rename(&temp_path, target).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        io_error("rename_audio_temp", e)
    })?;
    fs::remove_file(source).map_err(|e| io_error("remove_audio_source", e))?;

    Ok(())
}
