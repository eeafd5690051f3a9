use std::path::PathBuf;

/// Errors that can occur while loading or resolving extensions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error while enumerating or creating the extensions directory.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dynamic library could not be opened.
    #[error("failed to open extension library {path}: {source}")]
    LibraryOpen {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// The binary was built against a different contract version.
    #[error("extension {path} was built against contract {found}, host provides {expected}")]
    ContractMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// The factory returned no instance, or the instance panicked while
    /// describing itself.
    #[error("extension {path} failed to construct: {reason}")]
    Construction { path: PathBuf, reason: String },

    /// Invalid semver version string.
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// Requirement string matches neither the range nor the floating grammar.
    #[error("invalid version requirement '{requirement}': {reason}")]
    InvalidRequirement { requirement: String, reason: String },

    /// The declared dependencies form a cycle.
    #[error("dependency cycle among: {}", participants.join(", "))]
    DependencyCycle { participants: Vec<String> },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
