//! Tapline monitor
//!
//! Connects to a collector, subscribes to its targets and logs every
//! updated value in its display form until Ctrl-C or connection loss.

use anyhow::{Context, Result};
use clap::Parser;
use config::{load_settings, ProxySettings};
use network::{ConnectionState, ProxyClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tapline_monitor::{bootstrap, PushPipeline};
use telemetry::SeriesStore;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use types::TargetId;

#[derive(Parser, Debug)]
#[command(name = "tapline-monitor", author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "TAPLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Environment overlay (development, staging, production)
    #[arg(short, long)]
    environment: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,

    /// Print the effective settings and exit
    #[arg(long)]
    print_config: bool,

    /// Seconds of history to preload per target (0 disables)
    #[arg(long, default_value_t = 300)]
    history_secs: u64,

    /// Only monitor these target ids
    #[arg(short, long = "target")]
    targets: Vec<TargetId>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = load_settings(args.config.as_deref(), args.environment.as_deref())
        .context("Failed to load settings")?;

    if args.print_config {
        print!("{}", redacted(&settings).to_toml()?);
        return Ok(());
    }

    init_tracing(&settings, args.json || settings.global.json_logs);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting Tapline monitor");

    let client = ProxyClient::from_settings(&settings).context("Failed to build client")?;
    let store = Arc::new(SeriesStore::from_settings(&settings.series));
    let pushes = client.subscribe_pushes();
    let mut states = client.subscribe_state();

    let session = client
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}", client.session().endpoint()))?;
    info!(
        session_id = session.session_id,
        server_version = %session.server_version,
        "Session established"
    );

    bootstrap(
        &client,
        &store,
        Duration::from_secs(args.history_secs),
        &args.targets,
    )
    .await
    .context("Failed to set up monitoring")?;

    let pipeline = tokio::spawn(PushPipeline::new(Arc::clone(&store)).run(pushes));

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        },
        state = connection_lost(&mut states) => {
            warn!(%state, "Connection lost");
        }
    }

    client.disconnect();
    let stats = pipeline.await.context("Pipeline task failed")?;
    let session_stats = client.stats();
    info!(
        batches = stats.batches,
        samples = stats.samples,
        rejected = stats.rejected,
        frames_received = session_stats.frames_received,
        timeouts = session_stats.timeouts,
        "Monitor stopped"
    );
    Ok(())
}

fn init_tracing(settings: &ProxySettings, json: bool) {
    let level = &settings.global.log_level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tapline_monitor={level},network={level},telemetry={level},warn"
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves once the session leaves `Connected`
async fn connection_lost(states: &mut watch::Receiver<ConnectionState>) -> ConnectionState {
    match states.wait_for(|s| !s.is_connected()).await {
        Ok(state) => state.clone(),
        Err(_) => ConnectionState::Disconnected,
    }
}

fn redacted(settings: &ProxySettings) -> ProxySettings {
    let mut settings = settings.clone();
    if !settings.credentials.token.is_empty() {
        settings.credentials.token = "<redacted>".to_string();
    }
    settings
}
