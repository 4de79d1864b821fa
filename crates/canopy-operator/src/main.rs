//! Canopy Operator - installs extension controllers on seeds

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kube::Client;

use canopy_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use canopy_operator::controller_runner::build_registration_controller;
use canopy_operator::crds::{crd_manifests, ensure_crds};
use canopy_registration::{RegistrationConfig, CONTROLLER_NAME};

/// Canopy - reconciles ControllerInstallations for every seed
#[derive(Parser, Debug)]
#[command(name = "canopy-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Path to the RegistrationConfig YAML file
    #[arg(long, env = "CANOPY_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format: json or text
    #[arg(long, env = "CANOPY_LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches Seeds and everything that contributes to their extension
    /// requirements, and converges each seed's ControllerInstallations.
    Controller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        print!("{}", crd_manifests()?);
        return Ok(());
    }

    let _telemetry = init_telemetry(TelemetryConfig {
        log_format: cli.log_format,
        ..TelemetryConfig::from_env(CONTROLLER_NAME)
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let config = load_config(cli.config)?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller(config).await,
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<RegistrationConfig> {
    let Some(path) = path else {
        tracing::info!("no config file given, using defaults");
        return Ok(RegistrationConfig::default());
    };

    let config = RegistrationConfig::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e))?;
    tracing::info!(
        path = %path.display(),
        use_dns_records = config.use_dns_records,
        default_domains = config.default_domains.len(),
        "loaded config"
    );
    Ok(config)
}

/// Run in controller mode
async fn run_controller(config: RegistrationConfig) -> anyhow::Result<()> {
    tracing::info!("Canopy controller starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds(&client).await?;

    tracing::info!("Starting controllers:");
    build_registration_controller(client, config).await;

    tracing::info!("Canopy controller shutting down");
    Ok(())
}
