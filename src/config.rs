use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::fetch::MAX_ANNOTATORS;
/// Names a JSON configuration file.
pub const CONFIG_ENV: &str = "WAVEFETCH_CONFIG";
pub const DB_ROOT_ENV: &str = "WAVEFETCH_DB_ROOT";
pub const CALIBRATION_ENV: &str = "WAVEFETCH_CALIBRATION";
pub const MAX_ANNOTATORS_ENV: &str = "WAVEFETCH_MAX_ANNOTATORS";
/// Overrides `log_filter` when set.
pub const LOG_ENV: &str = "WAVEFETCH_LOG";
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: String, value: String },
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub database_root: PathBuf,
    /// Falls back to `<database_root>/wfdbcal` when unset.
    pub calibration_file: Option<PathBuf>,
    pub max_annotators: usize,
    pub log_filter: String,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_root: PathBuf::from("/usr/local/database"),
            calibration_file: None,
            max_annotators: MAX_ANNOTATORS,
            log_filter: "warn".to_string(),
        }
    }
}
impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
    /// Defaults, then the file named by `WAVEFETCH_CONFIG`, then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|name| std::env::var(name).ok())
    }
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        Ok(config)
    }
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(root) = lookup(DB_ROOT_ENV) {
            self.database_root = PathBuf::from(root);
        }
        if let Some(path) = lookup(CALIBRATION_ENV) {
            self.calibration_file = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup(MAX_ANNOTATORS_ENV) {
            self.max_annotators = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: MAX_ANNOTATORS_ENV.to_string(),
                value: value.clone(),
            })?;
        }
        if let Some(filter) = lookup(LOG_ENV) {
            self.log_filter = filter;
        }
        Ok(())
    }
    /// Calibration file to load, if any.
    pub fn calibration_path(&self) -> Option<PathBuf> {
        match &self.calibration_file {
            Some(path) => Some(path.clone()),
            None => {
                let fallback = self.database_root.join("wfdbcal");
                fallback.is_file().then_some(fallback)
            }
        }
    }
}
