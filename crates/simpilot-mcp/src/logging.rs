//! File logging for the server.
//!
//! stdout carries the MCP transport, so logs go to `<log_dir>/simpilot-mcp.log`
//! and never to the terminal. Verbosity comes from `SIMPILOT_LOG` (an
//! `EnvFilter` directive, default `info`).

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "simpilot-mcp.log";
pub const LOG_ENV: &str = "SIMPILOT_LOG";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Keep the guard alive for the life of the
/// process; dropping it flushes and stops the writer thread.
///
/// If the log directory cannot be created the writer discards everything.
/// A subscriber already being installed is not an error.
pub fn init(log_dir: &Path) -> WorkerGuard {
    let appender = std::fs::create_dir_all(log_dir)
        .map_err(|e| e.to_string())
        .and_then(|()| {
            RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(LOG_FILE)
                .build(log_dir)
                .map_err(|e| e.to_string())
        });

    let (writer, guard) = match appender {
        Ok(appender) => tracing_appender::non_blocking(appender),
        Err(_) => tracing_appender::non_blocking(std::io::sink()),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_log_dir_falls_back_to_sink() {
        // /dev/null is a file, so nothing can be created beneath it.
        let guard = init(Path::new("/dev/null/simpilot-logs"));
        tracing::info!("discarded");
        drop(guard);
    }
}
