//! Prometheus exporter for Apache ZooKeeper.

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info, warn};

use zookeeper_exporter::{
    ExporterConfig, ExporterMetrics, HttpServer, LogFormat, Scraper, init_tracing,
};

/// Prometheus exporter for Apache ZooKeeper.
#[derive(Parser, Debug)]
#[command(name = "zookeeper-exporter")]
#[command(about = "Export ZooKeeper four-letter-word statistics as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address for the metrics server, `:port` binds all interfaces (overrides config).
    #[arg(long, alias = "listen")]
    bind_addr: Option<String>,

    /// Log format, valid options are txt and json (overrides config).
    #[arg(long, env = "LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Output verbose debug information.
    #[arg(long, env = "LOG_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // Apply CLI overrides
    if let Some(bind_addr) = args.bind_addr {
        config.http.listen = bind_addr;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }
    if args.debug {
        config.logging.level = "debug".to_string();
    }
    config.validate()?;

    init_tracing(&config.logging)?;
    debug!("Enabling debug output");

    info!(version = env!("CARGO_PKG_VERSION"), "Starting zookeeper_exporter");

    let listen_addr = config.http.listen_addr()?;

    let scraper = Scraper::new(&config.zookeeper, ExporterMetrics::new());
    let http_server = HttpServer::new(scraper, listen_addr, config.http.clone());

    http_server
        .run_until(async {
            let signal = shutdown_signal().await;
            info!(signal, "Caught {} signal, exiting", signal);
        })
        .await?;

    info!("Exporter stopped");
    Ok(())
}

/// Wait for Ctrl+C, SIGTERM or SIGQUIT and return its name.
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                None
            }
        };
        let mut quit = match signal(SignalKind::quit()) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(error = %e, "Failed to install SIGQUIT handler");
                None
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = recv_or_pending(&mut terminate) => "SIGTERM",
            _ = recv_or_pending(&mut quit) => "SIGQUIT",
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "Ctrl+C"
    }
}

#[cfg(unix)]
async fn recv_or_pending(signal: &mut Option<tokio::signal::unix::Signal>) {
    match signal {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}
