//! Structured JSONL logging to file and human-readable stderr output.
//!
//! This module provides dual-output logging:
//! - **JSONL to file** (~/.easy-launcher/logs/easy-launcher.jsonl) - structured for tooling
//! - **Compact to stderr** - human-readable, warnings only unless `--verbose`
//!
//! # Usage
//!
//! ```rust,ignore
//! use easy_launcher::logging;
//!
//! // Initialize logging - MUST keep guard alive for duration of program
//! let _guard = logging::init(false);
//!
//! tracing::info!(event_type = "app_start", "Application started");
//! ```
//!
//! stdout is reserved for the launcher's own view, so nothing here writes to it.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE_NAME: &str = "easy-launcher.jsonl";

/// Guard that must be kept alive for the duration of the program.
/// Dropping this guard will flush and close the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the dual-output logging system.
///
/// Returns a guard that MUST be kept alive for the duration of the program.
/// With `verbose` false the stderr layer only shows warnings and errors; the
/// JSONL file always receives everything the env filter lets through.
pub fn init(verbose: bool) -> LoggingGuard {
    let log_dir = get_log_dir();
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("[LOGGING] Failed to create log directory: {}", e);
    }

    let log_path = log_dir.join(LOG_FILE_NAME);

    let writer: Box<dyn Write + Send> = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => Box::new(file),
        Err(e) => {
            eprintln!("[LOGGING] Failed to open log file: {}", e);
            Box::new(std::io::sink())
        }
    };

    // Non-blocking writer so script output relays never wait on disk
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(writer);

    // Environment filter - default to info, allow override via RUST_LOG
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE);

    let stderr_level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::WARN
    };
    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .compact()
        .with_filter(stderr_level);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .init();

    tracing::info!(
        event_type = "app_lifecycle",
        action = "started",
        log_path = %log_path.display(),
        "Application logging initialized"
    );

    LoggingGuard {
        _file_guard: file_guard,
    }
}

/// Get the log directory path (~/.easy-launcher/logs/)
fn get_log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".easy-launcher").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("easy-launcher-logs"))
}

/// Get the path to the JSONL log file
pub fn log_path() -> PathBuf {
    get_log_dir().join(LOG_FILE_NAME)
}

// =============================================================================
// Category logging
// =============================================================================

/// Category log function - wraps tracing::info! with a `category` field.
///
/// Prefer using tracing macros directly for structured fields:
/// ```rust
/// tracing::info!(category = "TREE", entries = 12, "Folder listed");
/// ```
pub fn log(category: &str, message: &str) {
    tracing::info!(category = category, "{}", message);
}

/// Debug-only logging - compiled out in release builds
#[cfg(debug_assertions)]
pub fn log_debug(category: &str, message: &str) {
    tracing::debug!(category = category, "{}", message);
}

#[cfg(not(debug_assertions))]
pub fn log_debug(_category: &str, _message: &str) {}

// =============================================================================
// STRUCTURED LOGGING HELPERS
// =============================================================================

/// Log a script lifecycle event with structured fields
pub fn log_script_event(script: &str, action: &str, exit_code: Option<i32>) {
    match exit_code {
        Some(code) => {
            tracing::info!(
                event_type = "script_event",
                script = script,
                action = action,
                exit_code = code,
                "Script {} {}", action, script
            );
        }
        None => {
            tracing::info!(
                event_type = "script_event",
                script = script,
                action = action,
                "Script {} {}", action, script
            );
        }
    }
}

/// Log a UI event with structured fields
pub fn log_ui_event(component: &str, action: &str, details: Option<&str>) {
    let msg = match details {
        Some(d) => format!("{} {} - {}", component, action, d),
        None => format!("{} {}", component, action),
    };

    tracing::debug!(
        event_type = "ui_event",
        component = component,
        action = action,
        details = details,
        "{}", msg
    );
}

/// Log an error with structured fields and context
pub fn log_error(category: &str, error: &str, context: Option<&str>) {
    let msg = match context {
        Some(ctx) => format!("{}: {} (context: {})", category, error, ctx),
        None => format!("{}: {}", category, error),
    };

    tracing::error!(
        event_type = "error",
        category = category,
        error_message = error,
        context = context,
        "{}", msg
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_file_name() {
        assert!(log_path().ends_with(LOG_FILE_NAME));
    }

    #[test]
    fn test_log_dir_is_under_launcher_home() {
        let dir = get_log_dir();
        assert!(dir.ends_with("logs") || dir.ends_with("easy-launcher-logs"));
    }
}
