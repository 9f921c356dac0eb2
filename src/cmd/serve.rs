//! `mindshift serve` — the HTTP API server.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mindshift::config::MindshiftToml;
use mindshift::server;

use super::build_engine;

pub async fn cmd_serve(
    config: &MindshiftToml,
    port: Option<u16>,
    bind: Option<String>,
    log_file: bool,
) -> Result<()> {
    let _guard = init_tracing(log_file.then(|| config.log_dir()))?;

    for warning in config.validate() {
        warn!(%warning, "configuration");
    }

    let engine = build_engine(config)?;
    let bind = bind.unwrap_or_else(|| config.bind());
    let port = match port {
        Some(port) => port,
        None => config.port()?,
    };

    server::start_server(engine, &bind, port).await
}

/// Console logging filtered by `MINDSHIFT_LOG`, plus a daily-rolling file
/// in the data dir when requested. The returned guard must stay alive for
/// the lifetime of the server so buffered file output gets flushed.
fn init_tracing(log_dir: Option<PathBuf>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("MINDSHIFT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mindshift=info"));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(&dir, "mindshift.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            Ok(None)
        }
    }
}
