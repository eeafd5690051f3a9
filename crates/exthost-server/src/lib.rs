//! exthost server
//!
//! Hosts an HTTP API assembled from the extensions resolved by
//! `exthost-core`, and the `exthost` command-line interface around it.

pub mod cli;
pub mod commands;
pub mod config_files;
pub mod error;
pub mod host;
pub mod logging;
pub mod middleware;
pub mod routing;
pub mod settings;

pub use error::{Result, ServerError};
pub use host::{HostedApp, Resolution, build_app, load_and_resolve, serve, shutdown_signal};
pub use settings::Settings;
