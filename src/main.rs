use anyhow::{Context, Result};
use cep_weather::{CepWeatherConfig, TracePropagator, service, telemetry, web};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "cep-weather")]
#[command(version, about = "Current weather for a Brazilian postal code", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging for this crate and the HTTP layer
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Client-facing relay: validates and forwards to the pipeline
    Relay {
        /// Listen address, overrides server.relay_bind
        #[arg(long)]
        bind: Option<String>,
    },
    /// Lookup pipeline: ViaCEP then WeatherAPI
    Pipeline {
        /// Listen address, overrides server.pipeline_bind
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = CepWeatherConfig::load_from_path(cli.config.clone())
        .context("Failed to load configuration")?;

    let service_name = match cli.command {
        Command::Relay { .. } => "cep-weather-relay",
        Command::Pipeline { .. } => "cep-weather-pipeline",
    };
    let _telemetry = telemetry::init(&config.logging, &config.telemetry, service_name, cli.verbose)
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("Failed to initialise logging")?;

    let propagator = TracePropagator::w3c();
    let (app, addr) = match cli.command {
        Command::Relay { bind } => (
            service::relay(&config, propagator)?,
            bind.unwrap_or_else(|| config.server.relay_bind.clone()),
        ),
        Command::Pipeline { bind } => (
            service::pipeline(&config, propagator)?,
            bind.unwrap_or_else(|| config.server.pipeline_bind.clone()),
        ),
    };

    tracing::info!(service = service_name, version = cep_weather::VERSION, "Starting");

    let shutdown = CancellationToken::new();
    tokio::spawn(web::shutdown_signal(shutdown.clone()));

    web::serve(&addr, app, shutdown)
        .await
        .with_context(|| format!("{service_name} stopped with an error"))?;

    Ok(())
}
