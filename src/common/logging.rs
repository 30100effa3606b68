//! Logging and tracing configuration
//!
//! Provides structured logging for both direct-run and server modes. The
//! server logs to a file and to stderr, keeping stdout free for tooling
//! that pipes it.

use std::path::PathBuf;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use super::paths;

/// Initialize tracing for direct script runs (stdout logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("script_dap=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing for the DAP server (file + stderr logging)
///
/// The server logs to `<data dir>/logs/server.log` when the directory is
/// writable, and always to stderr. Default level is DEBUG for this crate so
/// protocol traffic is visible; `RUST_LOG` overrides.
///
/// Returns the log file path when file logging is active.
pub fn init_server() -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("script_dap=debug,info"));

    if let Some(log_dir) = paths::log_dir() {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let log_file = log_dir.join("server.log");
            if let Ok(file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
            {
                let file_layer = fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true);

                let stderr_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true)
                    .compact();

                tracing_subscriber::registry()
                    .with(filter)
                    .with(file_layer)
                    .with(stderr_layer)
                    .init();

                return Some(log_file);
            }
        }
    }

    // Fallback: stderr only
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .compact(),
        )
        .init();

    None
}
