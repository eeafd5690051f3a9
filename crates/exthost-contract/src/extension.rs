use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;

use crate::config::ExtensionConfig;
use crate::services::ServiceCollection;

/// Error type returned by extension hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Read-only view of co-loaded extensions: name to declared version.
pub type LoadedVersions = BTreeMap<String, String>;

/// Boxed extension instance, as produced by an extension's factory.
pub type ExtensionBox = Box<dyn Extension>;

/// The interface every extension implements.
///
/// `name`, `version` and `dependencies` are read once, when the host loads
/// the extension, and treated as immutable afterwards. The remaining hooks
/// run in resolution order, dependencies before dependents.
pub trait Extension: Send + Sync {
    /// Unique extension name. Also the default route prefix.
    fn name(&self) -> &str;

    /// Semantic version of this extension.
    ///
    /// One- and two-component versions are padded (`"2"` reads as `2.0.0`).
    /// A four-component version is accepted only with a zero revision
    /// (`"1.2.3.0"`); anything else fails declarative validation.
    fn version(&self) -> &str;

    /// Declared dependencies: extension name to version requirement.
    ///
    /// Requirements may be a bare version (`"1.0"`, meaning at least that
    /// version), an interval (`"[1.0,2.0)"`), comparators (`">=1.2, <2"`) or
    /// a floating pattern (`"1.*"`).
    fn dependencies(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Whether routes are nested under `/<name>` (or a configured override).
    fn use_auto_route_prefix(&self) -> bool {
        true
    }

    /// Configuration written to `config/<name>.json` when no file exists yet.
    fn default_config(&self) -> Option<serde_json::Value> {
        None
    }

    /// Custom validation, run after all declared dependencies were satisfied.
    ///
    /// `loaded` holds every extension that passed declarative checks.
    /// Returning `Ok(false)` or an error excludes this extension.
    fn validate_dependency(&self, _loaded: &LoadedVersions) -> Result<bool, HookError> {
        Ok(true)
    }

    /// Register shared services for use by route handlers.
    ///
    /// Runs for every extension before any `register_routes`.
    fn register_services(&self, _services: &mut ServiceCollection, _config: &ExtensionConfig) {}

    /// Add routes to `routes` and return it.
    ///
    /// `services` is the completed collection. Handlers that need it get it
    /// from a layer or state the extension adds itself, for example
    /// `routes.layer(axum::Extension(Arc::clone(services)))`; the host does
    /// not install one, since request extensions are keyed by a `TypeId`
    /// that differs between the host and a dynamically loaded binary.
    fn register_routes(
        &self,
        routes: Router,
        _config: &ExtensionConfig,
        _services: &Arc<ServiceCollection>,
    ) -> Router {
        routes
    }

    /// Wrap the assembled application with middleware and return it.
    fn configure(&self, app: Router) -> Router {
        app
    }
}
