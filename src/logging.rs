use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "chatbot.log";

/// Route tracing output to a log file, since the terminal belongs to the UI.
///
/// `RUST_LOG` wins over the default filter. The returned guard flushes the
/// writer on drop and must live until exit.
pub fn init(debug: bool) -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = log_dir()?;
    fs::create_dir_all(&log_dir)?;

    let appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let default_filter = if debug { "warn,chatbot=debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(file_layer).try_init()?;

    Ok((guard, log_dir.join(LOG_FILE)))
}

fn log_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .ok_or_else(|| anyhow!("Could not determine a directory for logs"))?;
    Ok(base.join("bubblechat"))
}
