//! A minimal exthost extension.
//!
//! Build it as a `cdylib` and drop the library into the host's extensions
//! directory. Its routes are served under `/greeter`:
//!
//! - `GET /greeter/hello` answers with the configured greeting.
//! - `GET /greeter/hello/:name` greets `name`.
//!
//! On first start the host writes `config/greeter.json` from
//! [`GreeterSettings::default`].

use std::sync::Arc;

use exthost_contract::axum::extract::Path;
use exthost_contract::axum::routing::get;
use exthost_contract::axum::{Extension as Service, Router};
use exthost_contract::{Extension, ExtensionConfig, ServiceCollection, export_extension};
use serde::{Deserialize, Serialize};

pub const NAME: &str = "greeter";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreeterSettings {
    pub greeting: String,
    pub punctuation: String,
}

impl Default for GreeterSettings {
    fn default() -> Self {
        Self {
            greeting: "Hello".to_string(),
            punctuation: "!".to_string(),
        }
    }
}

impl GreeterSettings {
    fn from_config(config: &ExtensionConfig) -> Self {
        config.deserialize().unwrap_or_default()
    }
}

/// Shared greeting service, also usable by extensions loaded after this one.
#[derive(Debug, Clone)]
pub struct Greeting {
    settings: GreeterSettings,
}

impl Greeting {
    pub fn new(settings: GreeterSettings) -> Self {
        Self { settings }
    }

    pub fn greet(&self, name: &str) -> String {
        format!(
            "{}, {}{}",
            self.settings.greeting, name, self.settings.punctuation
        )
    }
}

#[derive(Debug, Default)]
pub struct GreeterExtension;

impl Extension for GreeterExtension {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn default_config(&self) -> Option<serde_json::Value> {
        serde_json::to_value(GreeterSettings::default()).ok()
    }

    fn register_services(&self, services: &mut ServiceCollection, config: &ExtensionConfig) {
        services.insert(Greeting::new(GreeterSettings::from_config(config)));
    }

    fn register_routes(
        &self,
        routes: Router,
        config: &ExtensionConfig,
        services: &Arc<ServiceCollection>,
    ) -> Router {
        let greeting = Greeting::new(GreeterSettings::from_config(config));

        routes
            .route("/hello", get(move || async move { greeting.greet("world") }))
            .route(
                "/hello/:name",
                get(
                    |Service(services): Service<Arc<ServiceCollection>>,
                     Path(name): Path<String>| async move {
                        match services.get::<Greeting>() {
                            Some(shared) => shared.greet(&name),
                            None => format!("Hello, {name}!"),
                        }
                    },
                ),
            )
            .layer(Service(Arc::clone(services)))
    }
}

export_extension!(GreeterExtension::default);
