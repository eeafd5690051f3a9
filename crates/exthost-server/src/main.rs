//! exthost CLI
//!
//! Loads extension binaries, resolves them and hosts their routes.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use colored::Colorize;

use exthost_server::cli::{Cli, Commands};
use exthost_server::error::Result;
use exthost_server::settings::Settings;
use exthost_server::{commands, logging};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let started = Instant::now();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        // No command provided - show help hint
        println!("{} Extension API host", "exthost".green().bold());
        println!();
        println!("Run {} for available commands.", "exthost --help".cyan());
        return Ok(());
    };

    let mut settings = Settings::load(&cli.config)?;
    let _guard = logging::init(&settings, cli.verbose)?;
    tracing::debug!(config = %cli.config.display(), "Settings loaded");

    match command {
        Commands::Serve { bind, extensions } => {
            if let Some(bind) = bind {
                settings.server.bind = bind;
            }
            apply_extensions_override(&mut settings, extensions)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(commands::run_serve(settings, started))
        }
        Commands::Check { extensions, json } => {
            apply_extensions_override(&mut settings, extensions)?;
            commands::run_check(&settings, json)
        }
    }
}

/// Command-line paths are relative to the working directory, not the
/// settings file.
fn apply_extensions_override(settings: &mut Settings, directory: Option<PathBuf>) -> Result<()> {
    if let Some(directory) = directory {
        settings.extensions.directory = std::env::current_dir()?.join(directory);
    }
    Ok(())
}
