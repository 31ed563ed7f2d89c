//! Configuration loading and root folder resolution
//!
//! Each setting is resolved independently, highest priority first:
//! 1. Command-line argument (or its environment variable)
//! 2. TOML config file
//! 3. Compiled default

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::db::DEFAULT_BUSY_TIMEOUT_MS;
use crate::{Error, Result};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "SONGBOOK_ROOT_FOLDER";

/// Default listen address
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default listen port
pub const DEFAULT_PORT: u16 = 5780;

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "songbook.db";

/// Tracing filter used when neither `RUST_LOG` nor the config file sets one
pub const DEFAULT_LOG_FILTER: &str = "songbook_api=info,songbook_common=info,tower_http=info";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub busy_timeout_ms: Option<u64>,
    pub cors_permissive: Option<bool>,
    pub log_filter: Option<String>,
}

impl TomlConfig {
    /// Load an explicitly named config file. Missing or malformed files are errors.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Load the per-user config file if there is one
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading config file: {}", path.display());
                Self::load(&path)
            }
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Per-user config file location (`<config_dir>/songbook/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("songbook").join("config.toml"))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("songbook"))
        .unwrap_or_else(|| PathBuf::from("./songbook_data"))
}

/// Root folder resolution: argument, then `SONGBOOK_ROOT_FOLDER`, then the
/// config file, then the OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_permissive: bool,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub busy_timeout_ms: u64,
    pub cors_permissive: bool,
    /// Filter from the config file; `RUST_LOG` still wins at start-up
    pub log_filter: String,
}

impl ServiceConfig {
    /// Read the config file (named or default) and merge it with `overrides`
    pub fn resolve(overrides: Overrides) -> Result<Self> {
        let toml = match &overrides.config_path {
            Some(path) => TomlConfig::load(path)?,
            None => TomlConfig::load_default()?,
        };

        Ok(Self::merge(overrides, toml))
    }

    /// Combine command-line values, file values, and defaults
    pub fn merge(overrides: Overrides, toml: TomlConfig) -> Self {
        let root_folder = resolve_root_folder(overrides.root_folder.as_deref(), &toml);

        // A relative database path is taken relative to the root folder
        let database_path = overrides
            .database_path
            .or(toml.database_path)
            .map(|p| root_folder.join(p))
            .unwrap_or_else(|| root_folder.join(DATABASE_FILE_NAME));

        ServiceConfig {
            database_path,
            host: overrides
                .host
                .or(toml.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            busy_timeout_ms: toml.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            cors_permissive: overrides.cors_permissive || toml.cors_permissive.unwrap_or(false),
            log_filter: toml
                .log_filter
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            root_folder,
        }
    }

    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
