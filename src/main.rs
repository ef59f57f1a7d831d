use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod cli;

use autopilot::config::{GlobalConfig, load_config};
use autopilot::domain::{JobKind, TenantId};
use autopilot::network::DryRunFactory;
use autopilot::orchestrator::Orchestrator;
use autopilot::storage::StoreFixture;
use cli::Cli;
use cli::commands::Commands;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autopilot")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("autopilot.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: GlobalConfig) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            store,
            tenant,
            kinds,
            for_secs,
        } => handle_run_command(store, tenant, kinds, *for_secs, config).await,
        Commands::CheckConfig => handle_check_config_command(&config),
    }
}

async fn handle_run_command(
    store_path: &Path,
    tenant: &str,
    kinds: &[JobKind],
    for_secs: Option<u64>,
    config: GlobalConfig,
) -> Result<()> {
    let fixture = StoreFixture::load_from_file(store_path)
        .context(format!("Failed to load store fixture {}", store_path.display()))?;
    let (store, destinations) = fixture.into_parts();

    let orchestrator = Orchestrator::new(
        config,
        Arc::new(store),
        Arc::new(DryRunFactory::with_destinations(destinations)),
    )
    .context("Failed to build orchestrator")?;

    let tenant = TenantId::new(tenant);
    let kinds: Vec<JobKind> = if kinds.is_empty() {
        JobKind::ALL.to_vec()
    } else {
        kinds.to_vec()
    };

    for kind in &kinds {
        if orchestrator.start(&tenant, *kind).await {
            println!("{} {} for tenant {}", "Started:".green(), kind, tenant);
        } else {
            println!("{} {} already running", "Skipped:".yellow(), kind);
        }
    }

    match for_secs {
        Some(secs) => {
            println!("{}", format!("Running for {}s...", secs).cyan());
            tokio::time::sleep(Duration::from_secs(secs)).await;
        }
        None => {
            println!("{}", "Running, press Ctrl-C to stop...".cyan());
            tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
        }
    }

    println!("{}", "Stopping job loops...".cyan());
    let stopped = orchestrator.shutdown().await;
    println!("{} {} job loop(s)", "Stopped:".green(), stopped);
    Ok(())
}

fn handle_check_config_command(config: &GlobalConfig) -> Result<()> {
    println!("{}", "Configuration is valid".green());
    println!("  stop grace:        {:?}", config.registry.stop_grace());
    println!("  handshake timeout: {:?}", config.sessions.handshake_timeout());
    for kind in JobKind::ALL {
        let job = config.job(kind);
        println!(
            "  {:<14} cycle {:>5}s  idle {:>4}s  pause {:>6}ms  concurrency {}",
            kind.to_string().bold(),
            job.cycle_interval.as_secs(),
            job.idle_interval.as_secs(),
            job.item_pause.as_millis(),
            job.max_concurrency
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load and validate configuration
    let config = load_config(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, config)
        .await
        .context("Application failed")?;

    Ok(())
}
