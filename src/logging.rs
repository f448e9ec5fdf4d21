//! Structured logging: JSONL to `~/.pqrun/logs/pqrun.jsonl` plus a
//! compact human-readable stderr stream. `RUST_LOG` overrides the
//! default `info` filter. A small ring buffer keeps the most recent
//! status lines for display on the status surface.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static STATUS_BUFFER: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();
const MAX_STATUS_LINES: usize = 50;

/// Record a status line for later display. Oldest lines are evicted
/// once the buffer holds [`MAX_STATUS_LINES`] entries.
pub fn record_status(message: &str) {
    let buffer =
        STATUS_BUFFER.get_or_init(|| Mutex::new(VecDeque::with_capacity(MAX_STATUS_LINES)));
    let mut buf = buffer.lock();
    if buf.len() >= MAX_STATUS_LINES {
        buf.pop_front();
    }
    buf.push_back(message.to_string());
}

/// Recent status lines, oldest first.
pub fn recent_statuses() -> Vec<String> {
    STATUS_BUFFER
        .get()
        .map(|buffer| buffer.lock().iter().cloned().collect())
        .unwrap_or_default()
}

/// Guard that must be kept alive for the duration of the program.
/// Dropping it flushes and closes the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the dual-output logging system.
///
/// Returns a guard the caller keeps alive until exit.
pub fn init() -> LoggingGuard {
    let log_dir = log_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("[pqrun] Failed to create log directory: {}", e);
    }
    let log_path = log_dir.join("pqrun.jsonl");

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path);

    // Non-blocking writer keeps file IO off the interactive path.
    let (non_blocking_file, file_guard) = match file {
        Ok(file) => tracing_appender::non_blocking(file),
        Err(e) => {
            eprintln!("[pqrun] Failed to open log file, logging to stderr only: {}", e);
            tracing_appender::non_blocking(std::io::sink())
        }
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE);

    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .init();

    tracing::debug!(log_path = %log_path.display(), "Logging initialized");

    LoggingGuard {
        _file_guard: file_guard,
    }
}

fn log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".pqrun").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("pqrun-logs"))
}

/// Path of the JSONL log file.
pub fn log_path() -> PathBuf {
    log_dir().join("pqrun.jsonl")
}
