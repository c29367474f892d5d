//! alertdispatch - dispatches one alert batch to every configured channel.
//!
//! Reads a JSON array of alerts from `--batch` (or stdin), runs the
//! dispatcher over the channels in the configuration and prints one JSON
//! result per line.

use alertdispatch::{
    cli::Cli, config::Config, core::Alert, transport::HttpTransport, Dispatcher,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        tracing_subscriber::fmt().with_writer(std::io::stderr).init();
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    // Initialize logging; RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("alertdispatch starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("External URL: {}", config.external_url);
    info!("Product: {} v{}", config.product_name, config.build_version);
    info!("Default Timeout: {}s", config.default_timeout_secs);
    info!("Template Files: {}", config.template_files.len());
    info!("Channels: {}", config.channels.len());
    info!("-------------------------------------------------------");

    let templates = Arc::new(config.templates()?);
    // Total delivery time is bounded per channel by the dispatcher.
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(
        config.default_timeout_secs,
    ))?);
    let dispatcher = Dispatcher::new(templates, transport, config.dispatch_settings());

    // Reject broken channels up front so they are visible before any batch.
    let mut invalid = 0;
    for (channel, built) in config
        .channels
        .iter()
        .zip(dispatcher.prepare(&config.channels))
    {
        if let Err(e) = built {
            invalid += 1;
            warn!(channel = %channel.uid, kind = %channel.kind, error = %e, "Invalid channel configuration");
        }
    }
    if cli.check {
        info!(invalid, "Configuration check finished");
        if invalid > 0 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let alerts = read_batch(&cli)?;
    info!(alerts = alerts.len(), "Loaded alert batch");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling dispatch.");
                cancel.cancel();
            }
        });
    }

    let results = dispatcher
        .dispatch_alerts(alerts, &config.channels, &cancel)
        .await?;

    let mut failed = false;
    for result in &results {
        failed |= !result.is_success();
        println!("{}", serde_json::to_string(result)?);
    }
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn read_batch(cli: &Cli) -> Result<Vec<Alert>> {
    let raw = match &cli.batch {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read batch file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read batch from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("batch is not a JSON array of alerts")
}
