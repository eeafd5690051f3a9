//! Error types for exthost-server

use std::path::PathBuf;

/// Result type for host operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that can occur while configuring or running the host
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// I/O error at a known path
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file exists but is not valid TOML for [`Settings`](crate::settings::Settings)
    #[error("invalid settings file {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The bind address could not be parsed
    #[error("invalid bind address '{address}': {source}")]
    BindAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// The listener could not be bound
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Could not acquire the lock on a file being written
    #[error("failed to lock {path}")]
    LockFailed { path: PathBuf },

    /// Writing a default configuration took too long
    #[error("timed out writing {path}")]
    Timeout { path: PathBuf },

    /// A blocking task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(String),

    /// The global tracing subscriber could not be installed
    #[error("failed to initialise logging: {0}")]
    Logging(String),

    /// Standard I/O error without path context
    #[error(transparent)]
    Server(#[from] std::io::Error),
}

impl ServerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
