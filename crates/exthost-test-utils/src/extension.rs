//! [`FakeExtension`]: an in-process extension whose hooks do what the test
//! tells them to.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use exthost_contract::axum::http::HeaderValue;
use exthost_contract::axum::response::Response;
use exthost_contract::axum::routing::get;
use exthost_contract::axum::{self, Router};
use exthost_contract::{
    Extension, ExtensionBox, ExtensionConfig, HookError, LoadedVersions, ServiceCollection,
};

/// Response header appended by extensions built with
/// [`FakeExtension::with_response_header`].
pub const CONFIGURED_HEADER: &str = "x-configured-by";

/// Scripted outcome of `validate_dependency`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Accept,
    Decline,
    Fail(String),
    Panic(String),
}

/// Service registered by extensions built with [`FakeExtension::with_service`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeService {
    pub owner: String,
}

/// Builder for test extensions.
///
/// # Example
///
/// ```rust
/// use exthost_contract::Extension;
/// use exthost_test_utils::FakeExtension;
///
/// let auth = FakeExtension::new("auth", "1.0.0")
///     .depends_on("core", ">=1.0")
///     .with_route("/status", "ok");
/// let recorded = auth.validation_calls();
/// let boxed = auth.boxed();
/// assert_eq!(boxed.name(), "auth");
/// assert!(recorded.lock().unwrap().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct FakeExtension {
    name: String,
    version: String,
    dependencies: BTreeMap<String, String>,
    validation: Validation,
    auto_route_prefix: bool,
    default_config: Option<serde_json::Value>,
    routes: Vec<(String, String)>,
    panicking_routes: Vec<String>,
    service: bool,
    response_header: Option<String>,
    panic_on_register: bool,
    panic_on_configure: bool,
    validation_calls: Arc<Mutex<Vec<LoadedVersions>>>,
    config_seen: Arc<Mutex<Option<ExtensionConfig>>>,
}

impl FakeExtension {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            dependencies: BTreeMap::new(),
            validation: Validation::Accept,
            auto_route_prefix: true,
            default_config: None,
            routes: Vec::new(),
            panicking_routes: Vec::new(),
            service: false,
            response_header: None,
            panic_on_register: false,
            panic_on_configure: false,
            validation_calls: Arc::default(),
            config_seen: Arc::default(),
        }
    }

    pub fn depends_on(mut self, name: impl Into<String>, requirement: impl Into<String>) -> Self {
        self.dependencies.insert(name.into(), requirement.into());
        self
    }

    pub fn validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn declining(self) -> Self {
        self.validation(Validation::Decline)
    }

    pub fn failing(self, message: impl Into<String>) -> Self {
        self.validation(Validation::Fail(message.into()))
    }

    pub fn panicking(self, message: impl Into<String>) -> Self {
        self.validation(Validation::Panic(message.into()))
    }

    pub fn without_route_prefix(mut self) -> Self {
        self.auto_route_prefix = false;
        self
    }

    pub fn with_default_config(mut self, config: serde_json::Value) -> Self {
        self.default_config = Some(config);
        self
    }

    /// Add `GET path` answering with `body`.
    pub fn with_route(mut self, path: impl Into<String>, body: impl Into<String>) -> Self {
        self.routes.push((path.into(), body.into()));
        self
    }

    /// Add `GET path` whose handler panics.
    pub fn with_panicking_route(mut self, path: impl Into<String>) -> Self {
        self.panicking_routes.push(path.into());
        self
    }

    /// Register a [`FakeService`] and expose it at `GET /service`.
    pub fn with_service(mut self) -> Self {
        self.service = true;
        self
    }

    /// Append [`CONFIGURED_HEADER`]` = value` to every response from `configure`.
    pub fn with_response_header(mut self, value: impl Into<String>) -> Self {
        self.response_header = Some(value.into());
        self
    }

    pub fn panicking_on_register(mut self) -> Self {
        self.panic_on_register = true;
        self
    }

    pub fn panicking_on_configure(mut self) -> Self {
        self.panic_on_configure = true;
        self
    }

    /// Every `loaded` map passed to `validate_dependency`, in call order.
    pub fn validation_calls(&self) -> Arc<Mutex<Vec<LoadedVersions>>> {
        Arc::clone(&self.validation_calls)
    }

    /// The configuration last passed to `register_routes`.
    pub fn seen_config(&self) -> Arc<Mutex<Option<ExtensionConfig>>> {
        Arc::clone(&self.config_seen)
    }

    pub fn boxed(self) -> ExtensionBox {
        Box::new(self)
    }
}

async fn explode() -> &'static str {
    panic!("handler exploded")
}

async fn service_owner(
    axum::Extension(services): axum::Extension<Arc<ServiceCollection>>,
) -> String {
    services
        .get::<FakeService>()
        .map(|service| service.owner.clone())
        .unwrap_or_default()
}

impl Extension for FakeExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn dependencies(&self) -> BTreeMap<String, String> {
        self.dependencies.clone()
    }

    fn use_auto_route_prefix(&self) -> bool {
        self.auto_route_prefix
    }

    fn default_config(&self) -> Option<serde_json::Value> {
        self.default_config.clone()
    }

    fn validate_dependency(&self, loaded: &LoadedVersions) -> Result<bool, HookError> {
        self.validation_calls.lock().unwrap().push(loaded.clone());
        match &self.validation {
            Validation::Accept => Ok(true),
            Validation::Decline => Ok(false),
            Validation::Fail(message) => Err(message.clone().into()),
            Validation::Panic(message) => panic!("{message}"),
        }
    }

    fn register_services(&self, services: &mut ServiceCollection, _config: &ExtensionConfig) {
        if self.service {
            services.insert(FakeService {
                owner: self.name.clone(),
            });
        }
    }

    fn register_routes(
        &self,
        mut routes: Router,
        config: &ExtensionConfig,
        services: &Arc<ServiceCollection>,
    ) -> Router {
        *self.config_seen.lock().unwrap() = Some(config.clone());
        if self.panic_on_register {
            panic!("register_routes exploded");
        }

        for (path, body) in &self.routes {
            let body = body.clone();
            routes = routes.route(
                path,
                get(move || {
                    let body = body.clone();
                    async move { body }
                }),
            );
        }
        for path in &self.panicking_routes {
            routes = routes.route(path, get(explode));
        }
        if self.service {
            routes = routes
                .route("/service", get(service_owner))
                .layer(axum::Extension(Arc::clone(services)));
        }
        routes
    }

    fn configure(&self, app: Router) -> Router {
        if self.panic_on_configure {
            panic!("configure exploded");
        }
        let Some(value) = &self.response_header else {
            return app;
        };

        let value = HeaderValue::from_str(value).unwrap();
        app.layer(axum::middleware::map_response(move |mut response: Response| {
            let value = value.clone();
            async move {
                response.headers_mut().append(CONFIGURED_HEADER, value);
                response
            }
        }))
    }
}
