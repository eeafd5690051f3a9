use std::collections::BTreeMap;

use exthost_contract::Extension;

/// Snapshot of an extension's identity and declared dependencies.
///
/// Captured once at load time; resolution never asks the extension for
/// these values again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionDescriptor {
    pub name: String,
    pub version: String,
    /// Dependency name to version requirement.
    pub dependencies: BTreeMap<String, String>,
}

impl ExtensionDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            dependencies: BTreeMap::new(),
        }
    }

    /// Builder-style helper adding one dependency.
    pub fn with_dependency(mut self, name: impl Into<String>, requirement: impl Into<String>) -> Self {
        self.dependencies.insert(name.into(), requirement.into());
        self
    }

    /// Read the descriptor from a live extension.
    pub fn capture(extension: &dyn Extension) -> Self {
        Self {
            name: extension.name().to_string(),
            version: extension.version().to_string(),
            dependencies: extension.dependencies(),
        }
    }
}
