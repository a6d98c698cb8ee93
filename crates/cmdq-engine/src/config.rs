//! Engine configuration
//!
//! Loaded from a TOML file; every field has a default except `data_root`,
//! which has to be set either in the file or through `CMDQ_DATA_ROOT`.

use cmdq_core::errors::{ExError, ExErrorKind};
use cmdq_core::logging_facility::{self, Profile};
use cmdq_core::DEFAULT_VIEW_LIMIT;
use cmdq_store::errors::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `data_root`
pub const DATA_ROOT_ENV: &str = "CMDQ_DATA_ROOT";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Writable application-data root
    pub data_root: PathBuf,
    /// Audio directory, relative to `data_root`
    pub audio_dir_name: String,
    /// Store file, relative to `data_root`
    pub database_file: String,
    /// Cap applied to every derived view
    pub view_limit: usize,
    pub log_profile: Profile,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::new(),
            audio_dir_name: "audio".to_string(),
            database_file: "commands.db".to_string(),
            view_limit: DEFAULT_VIEW_LIMIT,
            log_profile: Profile::default(),
        }
    }
}

impl QueueConfig {
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    /// Read a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            config_error(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(Self::from_toml_str(&content)?.with_env_overrides())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| config_error(e.to_string()))
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(root) = std::env::var_os(DATA_ROOT_ENV).filter(|v| !v.is_empty()) {
            self.data_root = PathBuf::from(root);
        }
        self
    }

    /// Reject settings the engine cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.data_root.as_os_str().is_empty() {
            return Err(config_error(format!(
                "data_root is not set (config file or {})",
                DATA_ROOT_ENV
            )));
        }
        for (key, value) in [
            ("audio_dir_name", &self.audio_dir_name),
            ("database_file", &self.database_file),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(config_error(format!(
                    "{} must be a plain name, got {:?}",
                    key, value
                )));
            }
        }
        if self.view_limit == 0 {
            return Err(config_error("view_limit must be positive".to_string()));
        }
        Ok(())
    }

    /// Install the global subscriber for `log_profile`; later calls are no-ops
    pub fn init_logging(&self) {
        logging_facility::init(self.log_profile);
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.data_root.join(&self.audio_dir_name)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_root.join(&self.database_file)
    }
}

fn config_error(message: String) -> ExError {
    ExError::new(ExErrorKind::Config)
        .with_op("load_config")
        .with_message(message)
}
