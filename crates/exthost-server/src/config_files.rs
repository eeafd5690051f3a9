//! Per-extension configuration files: `<config_dir>/<name>.json`.
//!
//! A missing file is created from the extension's `default_config()` when it
//! has one. Failures are logged and the extension continues with whatever
//! could be read, an empty object at worst.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use exthost_contract::{Extension, ExtensionConfig};
use exthost_core::panic_message;
use fs2::FileExt;
use tempfile::NamedTempFile;

use crate::error::{Result, ServerError};

/// Upper bound on writing one default configuration file.
pub const CONFIG_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn config_path(config_dir: &Path, name: &str) -> PathBuf {
    config_dir.join(format!("{name}.json"))
}

/// Name of the lock file serialising default-config writes in one
/// configuration directory.
pub const LOCK_FILENAME: &str = ".exthost.lock";

/// Write `content` to `path` unless the file already exists.
///
/// Holds an exclusive lock on the directory's lock file so two hosts
/// sharing a configuration directory never interleave writes, and an
/// operator's file that appeared in the meantime is never overwritten.
/// The content goes to a temporary file in the same directory which is
/// then renamed into place. Returns whether the file was written.
pub fn write_if_missing(path: &Path, content: &[u8]) -> Result<bool> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(|e| ServerError::io(dir, e))?;

    let lock_path = dir.join(LOCK_FILENAME);
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| ServerError::io(&lock_path, e))?;
    lock.lock_exclusive()
        .map_err(|_| ServerError::LockFailed { path: lock_path.clone() })?;

    let written = if path.exists() {
        tracing::debug!(path = %path.display(), "Configuration appeared while waiting for lock");
        false
    } else {
        let mut staged = NamedTempFile::new_in(dir).map_err(|e| ServerError::io(dir, e))?;
        staged
            .write_all(content)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| ServerError::io(staged.path(), e))?;
        staged
            .persist(path)
            .map_err(|e| ServerError::io(path, e.error))?;
        true
    };

    FileExt::unlock(&lock).map_err(|_| ServerError::LockFailed { path: lock_path })?;
    Ok(written)
}

/// Write `value` as pretty JSON on the blocking pool, giving up after
/// `timeout`. Returns whether the file was written.
pub async fn write_default_config(
    path: PathBuf,
    value: serde_json::Value,
    timeout: Duration,
) -> Result<bool> {
    let content = serde_json::to_vec_pretty(&value)?;
    let target = path.clone();
    let task = tokio::task::spawn_blocking(move || write_if_missing(&target, &content));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(ServerError::Task(join.to_string())),
        Err(_) => Err(ServerError::Timeout { path }),
    }
}

/// Read `path` as an extension configuration. Missing or unreadable files
/// give an empty configuration.
pub fn load_config(name: &str, path: &Path) -> ExtensionConfig {
    if !path.exists() {
        return ExtensionConfig::empty(name);
    }

    let parsed = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| {
            serde_json::from_str::<serde_json::Value>(&content).map_err(|e| e.to_string())
        });

    match parsed {
        Ok(values) => ExtensionConfig::new(name, values),
        Err(error) => {
            tracing::warn!(
                extension = name,
                path = %path.display(),
                error = %error,
                "Unreadable extension configuration, using empty configuration"
            );
            ExtensionConfig::empty(name)
        }
    }
}

/// Make sure the extension's configuration exists, then load it.
pub async fn prepare_config(config_dir: &Path, extension: &dyn Extension) -> ExtensionConfig {
    let name = extension.name();
    let path = config_path(config_dir, name);

    if !path.exists() {
        match catch_unwind(AssertUnwindSafe(|| extension.default_config())) {
            Ok(Some(value)) => {
                match write_default_config(path.clone(), value, CONFIG_WRITE_TIMEOUT).await {
                    Ok(true) => tracing::info!(
                        extension = name,
                        path = %path.display(),
                        "Created default configuration"
                    ),
                    Ok(false) => {}
                    Err(error) => tracing::error!(
                        extension = name,
                        path = %path.display(),
                        error = %error,
                        "Failed to write default configuration"
                    ),
                }
            }
            Ok(None) => {}
            Err(payload) => tracing::error!(
                extension = name,
                panic = %panic_message(payload.as_ref()),
                "default_config panicked"
            ),
        }
    }

    load_config(name, &path)
}
