use serde::de::DeserializeOwned;
use serde_json::Value;

/// Configuration handed to an extension's hooks.
///
/// Backed by the extension's own `config/<name>.json`; an extension without
/// a configuration file sees an empty object.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionConfig {
    name: String,
    values: Value,
}

impl ExtensionConfig {
    pub fn new(name: impl Into<String>, values: Value) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// An empty configuration for `name`.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Value::Object(Default::default()))
    }

    /// Name of the extension this configuration belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw configuration document.
    pub fn values(&self) -> &Value {
        &self.values
    }

    /// Deserialize a top-level key. Returns `None` when the key is absent or
    /// does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Deserialize the whole document.
    pub fn deserialize<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.values.clone())
    }
}
