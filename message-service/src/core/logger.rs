//! Tracing setup for the service process.
//!
//! Lines are plain text (no ANSI) so they read the same in a terminal, a
//! container log collector and a log file.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::{
    fmt::format::Writer,
    fmt::time::FormatTime,
    fmt::writer::{BoxMakeWriter, MakeWriterExt},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Used when `RUST_LOG` is unset. sqlx reports every statement at info.
const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn";

/// UTC timestamps with millisecond precision, e.g. `2024-05-01T12:00:00.123Z`.
struct UtcMillis;

impl FormatTime for UtcMillis {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

/// Stdout alone, or stdout teed with `log_file` (appended, parent dirs created).
fn make_writer(log_file: Option<&str>) -> io::Result<BoxMakeWriter> {
    let Some(path) = log_file else {
        return Ok(BoxMakeWriter::new(io::stdout));
    };

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BoxMakeWriter::new(io::stdout.and(Arc::new(file))))
}

/// Installs the global subscriber. `log_file` comes from `LOG_FILE`; `None`
/// keeps logs on stdout only. Filtering follows `RUST_LOG`.
pub fn init_tracing(log_file: Option<&str>) -> anyhow::Result<()> {
    let writer = make_writer(log_file)
        .with_context(|| format!("Failed to open log file {:?}", log_file))?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_timer(UtcMillis)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to set global subscriber")?;

    if let Some(path) = log_file {
        tracing::info!(log_file = path, "Logging to stdout and file");
    }
    Ok(())
}
