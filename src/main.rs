//! Metric sidecar binary.
//!
//! Boots the rule-driven metric extraction sidecar: loads configuration,
//! builds the instrument registry, exposes the Prometheus scrape endpoint,
//! and runs the buffering proxy in front of the configured upstream.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use metric_sidecar::config::load_config;
use metric_sidecar::observability;
use metric_sidecar::{InstrumentRegistry, SidecarServer};

#[derive(Parser)]
#[command(name = "metric-sidecar")]
#[command(about = "Rule-driven metric extraction sidecar for JSON services", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Absent = all-default config.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Override the upstream address.
    #[arg(long)]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(upstream) = cli.upstream {
        config.upstream.address = upstream;
    }

    observability::logging::init(&config.observability.log_level);

    tracing::info!("metric-sidecar v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        input_metrics = config.rules.input_metrics.len(),
        output_metrics = config.rules.output_metrics.len(),
        context_labels = config.rules.context_labels_from_input.len(),
        "Configuration loaded"
    );

    // Instruments are created once, before serving begins.
    let instruments = Arc::new(InstrumentRegistry::from_config(&config.rules));

    if config.observability.metrics_enabled {
        let metrics_listener = TcpListener::bind(&config.observability.metrics_address).await?;
        let metrics_instruments = instruments.clone();
        tokio::spawn(async move {
            if let Err(error) =
                observability::exposition::serve(metrics_listener, metrics_instruments).await
            {
                tracing::error!(error = %error, "Metrics endpoint failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = SidecarServer::new(config, instruments);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
