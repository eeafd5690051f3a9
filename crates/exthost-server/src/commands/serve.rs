//! `exthost serve`: load, resolve and host.

use std::time::Instant;

use colored::Colorize;
use tokio::net::TcpListener;

use crate::error::{Result, ServerError};
use crate::host::{build_app, load_and_resolve, serve, shutdown_signal};
use crate::settings::Settings;

/// Run the serve command until a shutdown signal arrives.
pub async fn run_serve(settings: Settings, started: Instant) -> Result<()> {
    let resolution = load_and_resolve(&settings, Vec::new());
    if !resolution.failures.is_empty() {
        tracing::warn!(
            count = resolution.failures.len(),
            "Some extension binaries failed to load"
        );
    }

    let addr = settings.bind_addr()?;
    let app = build_app(&settings, resolution.extensions, started).await;
    let hosted = app.extensions.len();

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { address: addr, source })?;
    let local = listener.local_addr()?;

    tracing::info!(address = %local, extensions = hosted, "Listening");
    println!(
        "{} {} listening on {} with {} extension(s)",
        "=>".blue().bold(),
        settings.api.name.cyan(),
        format!("http://{local}").bold(),
        hosted
    );

    serve(listener, app, settings.shutdown_timeout(), shutdown_signal()).await
}
