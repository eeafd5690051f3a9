//! [`TestHost`] builder for host installation scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory laid out like a host installation:
///
/// ```text
/// <root>/exthost.toml
/// <root>/extensions/
/// <root>/config/
/// ```
///
/// Nothing is created until asked for, so tests can check that the host
/// creates missing directories itself.
///
/// # Example
///
/// ```rust
/// use exthost_test_utils::TestHost;
///
/// let host = TestHost::new();
/// host.write_settings("[api]\nname = \"Demo\"\n");
/// host.write_extension_config("greeter", &serde_json::json!({"greeting": "hi"}));
/// host.assert_file_exists("config/greeter.json");
/// ```
pub struct TestHost {
    temp_dir: TempDir,
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root().join("exthost.toml")
    }

    pub fn extensions_dir(&self) -> PathBuf {
        self.root().join("extensions")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root().join("config")
    }

    /// Write `exthost.toml` with the given content.
    pub fn write_settings(&self, content: &str) {
        fs::write(self.settings_path(), content).unwrap();
    }

    /// Create the extensions directory and return its path.
    pub fn create_extensions_dir(&self) -> PathBuf {
        let dir = self.extensions_dir();
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write `config/<name>.json`.
    pub fn write_extension_config(&self, name: &str, value: &serde_json::Value) {
        let dir = self.config_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(format!("{name}.json")),
            serde_json::to_string_pretty(value).unwrap(),
        )
        .unwrap();
    }

    /// Read and parse `config/<name>.json`.
    pub fn read_extension_config(&self, name: &str) -> serde_json::Value {
        let path = self.config_dir().join(format!("{name}.json"));
        let content = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
        serde_json::from_str(&content).unwrap()
    }

    /// Write an arbitrary file relative to the root, creating parents.
    pub fn write_file(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn assert_file_exists(&self, relative: &str) {
        let path = self.root().join(relative);
        assert!(path.exists(), "expected file to exist: {}", path.display());
    }

    pub fn assert_file_missing(&self, relative: &str) {
        let path = self.root().join(relative);
        assert!(!path.exists(), "expected file to be missing: {}", path.display());
    }
}
