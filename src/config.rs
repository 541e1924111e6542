//! Configuration file handling
//!
//! Settings live in `config.yaml` under the platform config directory. A
//! missing file is created with defaults on first load.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration
};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{adapter::storage::StorageType, domain::constant::APPROVAL_WORKFLOW, registry::DuplicatePolicy};

/// Configuration structure for the workflow CLI
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Storage backend for projects and commissions
    pub storage:          StorageType,
    /// Directory for the RocksDB store; defaults to `<config dir>/data`
    pub data_dir:         Option<PathBuf>,
    /// Workflow name handlers are assembled for
    pub workflow:         String,
    /// How identical transitions declared by several handlers are resolved
    pub duplicate_policy: DuplicatePolicy,
    /// How long a caller waits for a project processor
    pub fire_timeout_ms:  u64,
    /// Default tracing filter when `RUST_LOG` is not set
    pub log_level:        String,
    /// Optional directory of notification templates overriding the built-in ones
    pub templates_dir:    Option<PathBuf>
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage:          StorageType::RocksDb,
            data_dir:         None,
            workflow:         APPROVAL_WORKFLOW.to_string(),
            duplicate_policy: DuplicatePolicy::FirstWins,
            fire_timeout_ms:  30_000,
            log_level:        "info".to_string(),
            templates_dir:    None
        }
    }
}

impl Settings {
    pub fn fire_timeout(&self) -> Duration {
        Duration::from_millis(self.fire_timeout_ms)
    }

    /// RocksDB directory, falling back to the default under the config directory
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(get_config_dir()?.join("data"))
        }
    }
}

/// Get the project directories for cross-platform config path resolution
pub fn get_project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "invest-workflow").context("Failed to determine project directories")
}

/// Get the configuration directory path
pub fn get_config_dir() -> Result<PathBuf> {
    let project_dirs = get_project_dirs()?;
    Ok(project_dirs.config_dir().to_path_buf())
}

/// Get the config file path
pub fn get_config_file_path() -> Result<PathBuf> {
    let config_dir = get_config_dir()?;
    Ok(config_dir.join("config.yaml"))
}

/// Load settings from the default location, creating the file if missing
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&get_config_file_path()?)
}

/// Load settings from `path` or create it with defaults if it doesn't exist
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if path.exists() {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))
    } else {
        let settings = Settings::default();
        save_settings_to(path, &settings)?;
        Ok(settings)
    }
}

/// Save settings to `path`
pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }

    let content = serde_yaml::to_string(settings).context("Failed to serialize config")?;

    fs::write(path, content).with_context(|| format!("Failed to write config file {}", path.display()))?;

    Ok(())
}
