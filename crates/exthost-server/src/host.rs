//! Loading, resolving and serving extensions.
//!
//! Hooks run in resolution order, dependencies first, one phase at a time:
//! every `register_services`, then every `register_routes` with the
//! completed service collection, then every `configure` so its middleware
//! wraps all endpoints. A panic in any hook is logged and only costs that
//! extension its contribution.

use std::collections::BTreeMap;
use std::future::{Future, IntoFuture};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use exthost_contract::{Extension, ExtensionConfig, ServiceCollection};
use exthost_core::{
    ExtensionLoader, LoadFailure, LoadedExtension, ResolutionContext, Resolver, panic_message,
};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::config_files::prepare_config;
use crate::error::{Result, ServerError};
use crate::middleware::{PanicPolicy, catch_panics};
use crate::routing::{RootInfo, root_router, route_prefix};
use crate::settings::Settings;

/// Outcome of loading and resolving one extensions directory.
#[derive(Debug)]
pub struct Resolution {
    /// Extensions to host, dependencies first.
    pub extensions: Vec<LoadedExtension>,
    pub failures: Vec<LoadFailure>,
    pub context: ResolutionContext,
}

/// Load every binary in the configured extensions directory and resolve it
/// together with `builtins`.
pub fn load_and_resolve(settings: &Settings, builtins: Vec<LoadedExtension>) -> Resolution {
    let loader = ExtensionLoader::new(settings.extensions_dir());
    let report = loader.load_all();

    let mut candidates = builtins;
    candidates.extend(report.extensions);

    let mut context = ResolutionContext::new();
    let extensions = Resolver::new().resolve(&mut context, candidates);

    Resolution {
        extensions,
        failures: report.failures,
        context,
    }
}

/// The assembled application.
///
/// Extension libraries stay mapped for the life of the process, so `router`
/// remains valid after `extensions` is dropped.
pub struct HostedApp {
    pub router: Router,
    pub services: Arc<ServiceCollection>,
    pub extensions: Vec<LoadedExtension>,
}

/// Run every extension's hooks and assemble the router.
pub async fn build_app(
    settings: &Settings,
    extensions: Vec<LoadedExtension>,
    started: Instant,
) -> HostedApp {
    let config_dir = settings.config_dir();
    let mut services = ServiceCollection::new();

    let mut router = root_router(RootInfo {
        api_name: settings.api.name.clone(),
        version: settings.api.version.clone(),
        started,
    });

    let mut configs = Vec::with_capacity(extensions.len());
    for loaded in &extensions {
        let extension = loaded.extension();
        let config = prepare_config(&config_dir, extension).await;
        register_services(extension, &mut services, &config);
        configs.push(config);
    }

    let services = Arc::new(services);
    for (loaded, config) in extensions.iter().zip(&configs) {
        router = mount_routes(
            router,
            loaded.extension(),
            config,
            &services,
            &settings.route_overrides,
        );
    }

    for loaded in &extensions {
        router = apply_configure(router, loaded.extension());
    }

    let router = router.layer(axum::middleware::from_fn_with_state(
        PanicPolicy {
            expose_details: settings.server.environment.is_development(),
        },
        catch_panics,
    ));

    HostedApp {
        router,
        services,
        extensions,
    }
}

fn register_services(
    extension: &dyn Extension,
    services: &mut ServiceCollection,
    config: &ExtensionConfig,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        extension.register_services(services, config)
    }));
    if let Err(payload) = outcome {
        tracing::error!(
            extension = extension.name(),
            panic = %panic_message(payload.as_ref()),
            "register_services panicked"
        );
    }
}

/// Add the extension's routes, nested under its prefix or merged at the
/// root. On a panic or a route conflict `router` is returned unchanged.
fn mount_routes(
    router: Router,
    extension: &dyn Extension,
    config: &ExtensionConfig,
    services: &Arc<ServiceCollection>,
    overrides: &BTreeMap<String, String>,
) -> Router {
    let name = extension.name();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let routes = extension.register_routes(Router::new(), config, services);
        if extension.use_auto_route_prefix() {
            let prefix = route_prefix(name, overrides);
            router.clone().nest(&format!("/{prefix}"), routes)
        } else {
            router.clone().merge(routes)
        }
    }));

    match outcome {
        Ok(mounted) => {
            tracing::info!(
                extension = name,
                version = extension.version(),
                "Loaded extension routes"
            );
            mounted
        }
        Err(payload) => {
            tracing::error!(
                extension = name,
                panic = %panic_message(payload.as_ref()),
                "Extension failed to register routes"
            );
            router
        }
    }
}

fn apply_configure(router: Router, extension: &dyn Extension) -> Router {
    match catch_unwind(AssertUnwindSafe(|| extension.configure(router.clone()))) {
        Ok(configured) => configured,
        Err(payload) => {
            tracing::error!(
                extension = extension.name(),
                panic = %panic_message(payload.as_ref()),
                "configure panicked"
            );
            router
        }
    }
}

/// Serve `app` on `listener` until `shutdown` completes, then give in-flight
/// requests at most `grace` to finish.
pub async fn serve(
    listener: TcpListener,
    app: HostedApp,
    grace: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let HostedApp {
        router, extensions, ..
    } = app;

    let stop = Arc::new(Notify::new());
    let stop_signal = Arc::clone(&stop);
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move { stop_signal.notified().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(ServerError::from);
        }
        () = shutdown => {}
    }

    tracing::info!(grace_secs = grace.as_secs(), "Shutting down, draining in-flight requests");
    stop.notify_one();

    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => {
            result.map_err(ServerError::from)?;
            tracing::info!("Server shutdown complete");
        }
        Err(_) => {
            tracing::warn!("Shutdown timeout elapsed, abandoning in-flight requests");
        }
    }
    tracing::debug!(count = extensions.len(), "Releasing extension instances");
    Ok(())
}

/// Resolve when the process receives Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
