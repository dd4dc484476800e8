//! Operator configuration.
//!
//! Loaded from `$XDG_CONFIG_HOME/quire/config.toml`. Every field has a
//! default, so a missing file is a valid (empty) config.
//!
//! ```toml
//! [storage]
//! database = "/var/lib/quire/quire.db"
//! uploads = "/var/lib/quire/uploads"
//! public_base_url = "https://cdn.example.com"
//!
//! [uploads]
//! images = "img"
//!
//! [logging]
//! filter = "quire=debug,info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quire_types::UploadCategory;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no home directory to derive {0} from")]
    NoHomeDir(&'static str),
}

/// Top-level config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuireConfig {
    pub storage: StorageConfig,
    pub uploads: UploadsConfig,
    pub logging: LoggingConfig,
}

/// Where documents and uploads live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path. Defaults to `{data_dir}/quire.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// Upload root. Defaults to `{data_dir}/uploads`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploads: Option<PathBuf>,

    /// Base URL uploaded files are served from. Defaults to `file://` paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
}

impl StorageConfig {
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| data_dir.join("quire.db"))
    }

    pub fn uploads_path(&self, data_dir: &Path) -> PathBuf {
        self.uploads
            .clone()
            .unwrap_or_else(|| data_dir.join("uploads"))
    }
}

/// Directory name per upload category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    pub images: String,
    pub videos: String,
    pub files: String,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            images: UploadCategory::Images.as_str().to_string(),
            videos: UploadCategory::Videos.as_str().to_string(),
            files: UploadCategory::Files.as_str().to_string(),
        }
    }
}

impl UploadsConfig {
    pub fn dir_for(&self, category: UploadCategory) -> &str {
        match category {
            UploadCategory::Images => &self.images,
            UploadCategory::Videos => &self.videos,
            UploadCategory::Files => &self.files,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// `~/.config/quire/config.toml`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|p| p.join("quire").join("config.toml"))
        .ok_or(ConfigError::NoHomeDir("config path"))
}

/// `~/.local/share/quire`
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_local_dir()
        .map(|p| p.join("quire"))
        .ok_or(ConfigError::NoHomeDir("data directory"))
}

impl QuireConfig {
    /// Parse a config from TOML text.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path`, or the default location. A missing file gives defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                tracing::debug!(path = %path.display(), "loaded config");
                Self::from_toml(&text, &path)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }
}
