//! `exthost check`: resolve without serving.

use colored::Colorize;
use serde::Serialize;

use crate::error::Result;
use crate::host::{Resolution, load_and_resolve};
use crate::settings::Settings;

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub extensions_dir: String,
    pub extensions: Vec<ResolvedEntry>,
    pub failures: Vec<FailureEntry>,
    pub rejections: Vec<RejectionEntry>,
}

#[derive(Debug, Serialize)]
pub struct ResolvedEntry {
    pub name: String,
    pub version: String,
    pub origin: String,
}

#[derive(Debug, Serialize)]
pub struct FailureEntry {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct RejectionEntry {
    pub extension: String,
    pub dependency: Option<String>,
    pub stage: String,
    pub reason: String,
}

impl CheckReport {
    pub fn from_resolution(settings: &Settings, resolution: &Resolution) -> Self {
        Self {
            extensions_dir: settings.extensions_dir().display().to_string(),
            extensions: resolution
                .extensions
                .iter()
                .map(|e| ResolvedEntry {
                    name: e.name().to_string(),
                    version: e.version().to_string(),
                    origin: e.origin().to_string(),
                })
                .collect(),
            failures: resolution
                .failures
                .iter()
                .map(|f| FailureEntry {
                    path: f.path.display().to_string(),
                    error: f.error.to_string(),
                })
                .collect(),
            rejections: resolution
                .context
                .rejections()
                .iter()
                .map(|r| RejectionEntry {
                    extension: r.extension.clone(),
                    dependency: r.dependency.clone(),
                    stage: r.stage.to_string(),
                    reason: r.reason.to_string(),
                })
                .collect(),
        }
    }
}

/// Run the check command. Rejections are reported, not treated as errors.
pub fn run_check(settings: &Settings, json: bool) -> Result<()> {
    let resolution = load_and_resolve(settings, Vec::new());
    let report = CheckReport::from_resolution(settings, &resolution);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &CheckReport) {
    println!(
        "{} Extensions directory: {}",
        "=>".blue().bold(),
        report.extensions_dir.cyan()
    );
    println!();

    if report.extensions.is_empty() {
        println!("{}", "No extensions resolved.".dimmed());
    } else {
        println!("{}", "Load order".bold());
        for (index, entry) in report.extensions.iter().enumerate() {
            println!(
                "  {:>2}. {} v{} ({})",
                index + 1,
                entry.name.green(),
                entry.version,
                entry.origin.dimmed()
            );
        }
    }

    if !report.failures.is_empty() {
        println!();
        println!("{}", "Failed to load".red().bold());
        for failure in &report.failures {
            println!("  {} {}", failure.path.yellow(), failure.error);
        }
    }

    if !report.rejections.is_empty() {
        println!();
        println!("{}", "Rejected".yellow().bold());
        for rejection in &report.rejections {
            println!(
                "  {} [{}] {}",
                rejection.extension.yellow(),
                rejection.stage.dimmed(),
                rejection.reason
            );
        }
    }

    println!();
    println!(
        "{} {} resolved, {} failed to load, {} rejected",
        "Total:".dimmed(),
        report.extensions.len(),
        report.failures.len(),
        report.rejections.len()
    );
}
