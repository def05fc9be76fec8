use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, warn};

/// Error severity for notice display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,     // informational, user input mistakes
    Warning,  // recoverable
    Error,    // operation failed
    Critical, // requires user action
}

/// Domain-specific errors for the launcher
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Script is already running: {}", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("Script is not running: {}", .0.display())]
    NotRunning(PathBuf),

    #[error("{label} interpreter not found")]
    InterpreterNotFound { label: String },

    #[error("Invalid interpreter '{}': {reason}", path.display())]
    InvalidInterpreter { path: PathBuf, reason: String },

    #[error("Failed to spawn '{}': {source}", program.display())]
    ProcessSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for script process: {0}")]
    ProcessWait(#[source] std::io::Error),

    #[error("Failed to signal process {pid}: {message}")]
    Signal { pid: u32, message: String },

    #[error("Failed to start worker thread: {0}")]
    Worker(#[source] std::io::Error),

    #[error("Script path has no parent folder: {}", .0.display())]
    InvalidScriptPath(PathBuf),
}

impl LauncherError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AlreadyRunning(_) => ErrorSeverity::Warning,
            Self::NotRunning(_) => ErrorSeverity::Info,
            Self::InterpreterNotFound { .. } => ErrorSeverity::Critical,
            Self::InvalidInterpreter { .. } => ErrorSeverity::Error,
            Self::ProcessSpawn { .. } => ErrorSeverity::Error,
            Self::ProcessWait(_) => ErrorSeverity::Error,
            Self::Signal { .. } => ErrorSeverity::Error,
            Self::Worker(_) => ErrorSeverity::Error,
            Self::InvalidScriptPath(_) => ErrorSeverity::Error,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::AlreadyRunning(path) => {
                format!("This script is already running!\n{}", file_label(path))
            }
            Self::NotRunning(path) => {
                format!("This script is not currently running.\n{}", file_label(path))
            }
            Self::InterpreterNotFound { label } => format!(
                "{label} interpreter not found!\n\n\
                 Please install {label} or select its location with the selectInterpreter command."
            ),
            Self::InvalidInterpreter { path, .. } => format!(
                "The selected file doesn't appear to be a valid interpreter.\n{}",
                path.display()
            ),
            Self::ProcessSpawn { program, source } => {
                format!("Could not start '{}': {}", program.display(), source)
            }
            other => other.to_string(),
        }
    }
}

/// File name of a path for user-facing text, falling back to the full path
pub fn file_label(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub type Result<T> = std::result::Result<T, LauncherError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and user doesn't need to know.
///
/// # Examples
///
/// ```ignore
/// use easy_launcher::error::ResultExt;
///
/// // Preferences that fail to save are logged and otherwise ignored
/// save_preferences(&path, &prefs).warn_on_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}
