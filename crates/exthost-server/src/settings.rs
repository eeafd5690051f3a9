//! Host settings, read from `exthost.toml`.
//!
//! Every key is optional. A missing file means all defaults; a file that
//! exists but does not parse is an error. Relative paths are resolved
//! against the directory containing the settings file.
//!
//! # Example
//!
//! ```toml
//! [api]
//! name = "CoreAPI"
//! version = "0.0.0"
//!
//! [server]
//! bind = "127.0.0.1:5000"
//! shutdown_timeout_secs = 30
//! environment = "production"
//!
//! [extensions]
//! directory = "extensions"
//! config_directory = "config"
//!
//! [route_overrides]
//! my-extension = "custom"
//!
//! [logging]
//! filter = "info"
//! format = "pretty"
//! directory = "logs"
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// Default settings file name.
pub const SETTINGS_FILENAME: &str = "exthost.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api: ApiSettings,
    pub server: ServerSettings,
    pub extensions: ExtensionSettings,
    /// Extension name to route prefix.
    pub route_overrides: BTreeMap<String, String>,
    pub logging: LoggingSettings,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
    pub name: String,
    pub version: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            name: "CoreAPI".to_string(),
            version: "0.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub bind: String,
    /// How long in-flight requests may take to finish after a shutdown signal.
    pub shutdown_timeout_secs: u64,
    pub environment: Environment,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            shutdown_timeout_secs: 30,
            environment: Environment::default(),
        }
    }
}

/// Deployment environment. Development exposes panic details in error
/// responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtensionSettings {
    pub directory: PathBuf,
    pub config_directory: PathBuf,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("extensions"),
            config_directory: PathBuf::from("config"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
    pub format: LogFormat,
    /// Daily-rolling log files are written here when set.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            server: ServerSettings::default(),
            extensions: ExtensionSettings::default(),
            route_overrides: BTreeMap::new(),
            logging: LoggingSettings::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file does
    /// not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut settings = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ServerError::io(path, e))?;
            toml::from_str::<Settings>(&content).map_err(|source| ServerError::Settings {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Settings::default()
        };

        settings.base_dir = base_dir;
        Ok(settings)
    }

    /// Settings with every relative path resolved against `base_dir`.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn extensions_dir(&self) -> PathBuf {
        self.resolve_path(&self.extensions.directory)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.resolve_path(&self.extensions.config_directory)
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.logging.directory.as_deref().map(|dir| self.resolve_path(dir))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|source| ServerError::BindAddress {
                address: self.server.bind.clone(),
                source,
            })
    }
}
