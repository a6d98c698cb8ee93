use crate::audio::atomic::move_file;
use crate::errors::{io_error, Result};
use cmdq_core::errors::{ExError, ExErrorKind};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Whether a stored audio reference is still in legacy (path) form
pub fn has_separator(path: &str) -> bool {
    path.contains('/') || path.contains('\\')
}

/// Last path component of a stored reference, accepting either separator
pub fn bare_file_name(path: &str) -> Option<&str> {
    path.rsplit(['/', '\\']).find(|segment| !segment.is_empty())
}

/// The managed audio directory
///
/// Command records reference audio by bare file name only; this type turns
/// those names into paths.
#[derive(Debug, Clone)]
pub struct AudioDir {
    root: PathBuf,
}

impl AudioDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory if it does not exist
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| io_error("create_audio_dir", e))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn exists(&self, file_name: &str) -> bool {
        !file_name.is_empty() && !has_separator(file_name) && self.resolve(file_name).is_file()
    }

    /// Delete a managed file; a file that is already gone is not an error
    ///
    /// Returns whether a file was removed.
    pub fn delete(&self, file_name: &str) -> Result<bool> {
        if file_name.is_empty() || has_separator(file_name) {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("delete_audio")
                .with_message(format!("not a bare file name: {}", file_name)));
        }
        match fs::remove_file(self.resolve(file_name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("delete_audio", e)),
        }
    }

    /// File a stored reference points at, if it exists
    ///
    /// A legacy path is used as-is while the file is still there; otherwise
    /// its bare name is looked up here, as the cleanup pass would rewrite it.
    pub fn locate(&self, stored: &str) -> Option<PathBuf> {
        if !has_separator(stored) {
            return self.exists(stored).then(|| self.resolve(stored));
        }
        let legacy = Path::new(stored);
        if legacy.is_file() {
            return Some(legacy.to_path_buf());
        }
        bare_file_name(stored)
            .filter(|name| self.exists(name))
            .map(|name| self.resolve(name))
    }

    /// Delete whatever file a stored reference points at, legacy or bare
    ///
    /// Returns whether a file was removed.
    pub fn delete_stored(&self, stored: &str) -> Result<bool> {
        let Some(path) = self.locate(stored) else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("delete_audio", e)),
        }
    }

    /// Move an external recording into the directory
    ///
    /// Keeps the source file name unless it is taken, in which case a short
    /// unique suffix is added. Returns the bare file name to store.
    pub fn import(&self, source: &Path) -> Result<String> {
        let original = source
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_op("import_audio")
                    .with_message(format!("no file name in {}", source.display()))
            })?;

        let file_name = if self.resolve(original).exists() {
            unique_name(original)
        } else {
            original.to_string()
        };

        self.ensure()?;
        move_file(source, &self.resolve(&file_name))?;
        Ok(file_name)
    }

    /// Move a file found at a legacy absolute path into the directory
    pub(crate) fn adopt(&self, legacy: &Path, file_name: &str) -> Result<()> {
        move_file(legacy, &self.resolve(file_name))
    }
}

fn unique_name(original: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    match original.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, suffix, ext),
        _ => format!("{}-{}", original, suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bare_file_name() {
        assert_eq!(bare_file_name("/old/abs/path/a.m4a"), Some("a.m4a"));
        assert_eq!(bare_file_name("C:\\rec\\b.wav"), Some("b.wav"));
        assert_eq!(bare_file_name("c.m4a"), Some("c.m4a"));
        assert_eq!(bare_file_name("/dir/"), Some("dir"));
        assert_eq!(bare_file_name("/"), None);
    }

    #[test]
    fn test_has_separator() {
        assert!(has_separator("/a.m4a"));
        assert!(has_separator("x\\a.m4a"));
        assert!(!has_separator("a.m4a"));
    }

    #[test]
    fn test_exists_and_delete() {
        let tmp = TempDir::new().unwrap();
        let audio = AudioDir::new(tmp.path().join("audio"));
        audio.ensure().unwrap();
        fs::write(audio.resolve("a.m4a"), b"x").unwrap();

        assert!(audio.exists("a.m4a"));
        assert!(!audio.exists(""));
        assert!(audio.delete("a.m4a").unwrap());
        assert!(!audio.exists("a.m4a"));
        assert!(!audio.delete("a.m4a").unwrap());
        assert!(audio.delete("../a.m4a").is_err());
    }

    #[test]
    fn test_locate_and_delete_stored_legacy_reference() {
        let tmp = TempDir::new().unwrap();
        let audio = AudioDir::new(tmp.path().join("audio"));
        audio.ensure().unwrap();
        let legacy = tmp.path().join("old").join("a.m4a");
        fs::create_dir_all(legacy.parent().unwrap()).unwrap();
        fs::write(&legacy, b"pcm").unwrap();
        let stored = legacy.to_string_lossy().into_owned();

        assert_eq!(audio.locate(&stored), Some(legacy.clone()));
        assert!(audio.delete_stored(&stored).unwrap());
        assert!(!legacy.exists());
        assert_eq!(audio.locate(&stored), None);
        assert!(!audio.delete_stored(&stored).unwrap());
    }

    #[test]
    fn test_locate_falls_back_to_managed_name() {
        let tmp = TempDir::new().unwrap();
        let audio = AudioDir::new(tmp.path().join("audio"));
        audio.ensure().unwrap();
        fs::write(audio.resolve("b.m4a"), b"pcm").unwrap();

        assert_eq!(audio.locate("/gone/b.m4a"), Some(audio.resolve("b.m4a")));
        assert_eq!(audio.locate("b.m4a"), Some(audio.resolve("b.m4a")));
        assert_eq!(audio.locate("c.m4a"), None);
        assert!(audio.delete_stored("b.m4a").unwrap());
        assert!(!audio.exists("b.m4a"));
    }

    #[test]
    fn test_import_keeps_name_then_suffixes() {
        let tmp = TempDir::new().unwrap();
        let audio = AudioDir::new(tmp.path().join("audio"));

        let first = tmp.path().join("rec.m4a");
        fs::write(&first, b"1").unwrap();
        assert_eq!(audio.import(&first).unwrap(), "rec.m4a");

        let second = tmp.path().join("rec.m4a");
        fs::write(&second, b"2").unwrap();
        let name = audio.import(&second).unwrap();
        assert_ne!(name, "rec.m4a");
        assert!(name.starts_with("rec-") && name.ends_with(".m4a"));
        assert_eq!(fs::read(audio.resolve(&name)).unwrap(), b"2");
    }
}
