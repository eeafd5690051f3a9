//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::settings::SETTINGS_FILENAME;

/// exthost - Host HTTP APIs assembled from dynamically loaded extensions
#[derive(Parser, Debug)]
#[command(name = "exthost")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the settings file
    #[arg(short, long, global = true, env = "EXTHOST_CONFIG", default_value = SETTINGS_FILENAME)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Load, resolve and host extensions
    ///
    /// Examples:
    ///   exthost serve                          # Use exthost.toml
    ///   exthost serve --bind 0.0.0.0:8080      # Override the listen address
    ///   exthost serve --extensions ./plugins   # Override the extensions directory
    Serve {
        /// Address to listen on (overrides [server].bind)
        #[arg(short, long)]
        bind: Option<String>,

        /// Extensions directory (overrides [extensions].directory)
        #[arg(short, long)]
        extensions: Option<PathBuf>,
    },

    /// Load and resolve extensions without serving
    ///
    /// Prints the resolved load order, binaries that failed to load, and
    /// every rejected extension with its reason.
    Check {
        /// Extensions directory (overrides [extensions].directory)
        #[arg(short, long)]
        extensions: Option<PathBuf>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_with_overrides() {
        let cli = Cli::parse_from(["exthost", "serve", "--bind", "0.0.0.0:8080", "-e", "plugins"]);
        assert_eq!(
            cli.command,
            Some(Commands::Serve {
                bind: Some("0.0.0.0:8080".into()),
                extensions: Some(PathBuf::from("plugins")),
            })
        );
    }

    #[test]
    fn test_parse_check_json_with_global_flags() {
        let cli = Cli::parse_from(["exthost", "check", "--json", "--config", "host.toml", "-v"]);
        assert_eq!(
            cli.command,
            Some(Commands::Check {
                extensions: None,
                json: true,
            })
        );
        assert_eq!(cli.config, PathBuf::from("host.toml"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_no_command() {
        let cli = Cli::parse_from(["exthost"]);
        assert!(cli.command.is_none());
    }
}
