//! CLI module for the shadowlink local client.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use shadowlink_config::{CliOverrides, Config, LoggingConfig, apply_overrides, load_config, validate_config};
use shadowlink_core::defaults::DEFAULT_SHUTDOWN_TIMEOUT_SECS;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::pool::WorkerPool;

/// Local SOCKS5 client arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "shadowlink-local", version, about = "Encrypted SOCKS5 local client")]
pub struct ClientArgs {
    /// Config file path (json/jsonc/yaml/toml).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Load, override and validate the configuration named by `args`.
pub fn build_config(args: &ClientArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, &args.overrides);
    validate_config(&config)?;
    Ok(config)
}

/// Run the local client until Ctrl+C or SIGTERM.
///
/// Builds the worker pool itself, so it must be called from outside any
/// tokio runtime.
pub fn run(args: ClientArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&args)?;
    init_tracing(&config.logging);

    let pool = WorkerPool::new(config.workers)?;
    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();

    pool.spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    let result = pool.block_on(crate::run(config, &pool, shutdown));
    pool.shutdown(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS));
    result?;
    Ok(())
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.as_deref().unwrap_or("info").to_string();
    let mut filters: Vec<_> = config.filters.iter().collect();
    filters.sort();
    for (module, level) in filters {
        filter_str.push(',');
        filter_str.push_str(module);
        filter_str.push('=');
        filter_str.push_str(level);
    }
    filter_str
}

fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_new(filter_directives(config)).unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.format.as_deref().unwrap_or("pretty");
    let output = config.output.as_deref().unwrap_or("stderr");

    // try_init: a second call (tests, embedding) keeps the first subscriber.
    let _ = match (format, output) {
        ("json", "stdout") => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stdout))
            .try_init(),
        ("json", _) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
        ("compact", "stdout") => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(io::stdout))
            .try_init(),
        ("compact", _) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(io::stderr))
            .try_init(),
        (_, "stdout") => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stdout))
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stderr))
            .try_init(),
    };
}
