//! sharedbus - CLI entry point for running event bus scenarios

use std::path::Path;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use sharedbus::cli::{Cli, Command};
use sharedbus::config::{Config, OutputFormat};
use sharedbus::demo::run_modal_demo;
use sharedbus::scenario::{Report, Scenario, ScenarioRunner};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // stdout is reserved for reports
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run { scenario, format } => cmd_run(&config, &scenario, format.unwrap_or(config.format)),
        Command::Demo => cmd_demo(),
    }
}

/// Run a scenario file and print its report
fn cmd_run(config: &Config, scenario: &Path, format: OutputFormat) -> Result<()> {
    let path = config.scenario_path(scenario);
    debug!(path = %path.display(), ?format, "cmd_run: called");

    let scenario = Scenario::load(&path).context(format!("Failed to load scenario {}", path.display()))?;
    let report = ScenarioRunner::new()
        .run(&scenario)
        .context(format!("Scenario {} failed", path.display()))?;

    info!(
        deliveries = report.deliveries.len(),
        shared_instances = report.shared_instances,
        "cmd_run: scenario complete"
    );

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &Report) {
    let name = report.name.as_deref().unwrap_or("scenario");
    println!("{} {} ({} steps)", "▶".cyan(), name.bold(), report.steps);

    for delivery in &report.deliveries {
        let event = delivery.event.as_ref().map_or_else(|| "-".to_string(), |v| v.to_string());
        let payload = delivery.payload.as_ref().map_or_else(|| "-".to_string(), |v| v.to_string());
        println!(
            "  {} {} <- {} {} {}",
            format!("[{}]", delivery.step).dimmed(),
            delivery.component.yellow(),
            delivery.key.cyan(),
            event,
            payload.dimmed()
        );
    }

    println!(
        "{} {} deliveries, {} shared instances, {} listeners remaining",
        "✓".green(),
        report.deliveries.len(),
        report.shared_instances,
        report.remaining_listeners
    );
}

/// Walk through the modal display example
fn cmd_demo() -> Result<()> {
    debug!("cmd_demo: called");
    let lines = run_modal_demo().context("Modal demo failed")?;
    for line in lines {
        println!("{} {}", "•".cyan(), line);
    }
    Ok(())
}
