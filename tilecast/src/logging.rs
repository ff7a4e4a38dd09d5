//! Logging bootstrap.
//!
//! Structured `tracing` output: compact single-line console logging on
//! stderr, plus an optional non-blocking file appender. Filtering follows
//! `RUST_LOG`, defaulting to `info`.

use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the background log writer alive.
///
/// Dropping the guard flushes and closes the file appender, so hold it for
/// the lifetime of the process.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// With `log_dir` set, a daily-rolling `tilecast.log` is written there in
/// addition to the console output.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created.
pub fn init(log_dir: Option<&Path>) -> Result<LogGuard, io::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .compact();

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "tilecast.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);

            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .init();

            Ok(LogGuard { _file: Some(guard) })
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();

            Ok(LogGuard { _file: None })
        }
    }
}
