//! Interpreter lookup and validation
//!
//! Resolution order: the cached path if it still exists, then the kind's
//! executable names on `PATH`, then its conventional install locations, then
//! whatever the user picks. A picked file must pass the version probe.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::config::DEFAULT_PROBE_TIMEOUT_MS;
use crate::error::{LauncherError, Result};
use crate::logging;
use crate::scripts::ScriptKind;

/// Asks the user for an interpreter when automatic lookup fails
///
/// Called from a worker thread; implementations may block until the user answers.
pub trait InterpreterPicker: Send + Sync {
    /// `None` when the user declines to pick one
    fn pick(&self, kind: &ScriptKind) -> Option<PathBuf>;
}

/// Picker that never finds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPicker;

impl InterpreterPicker for NoPicker {
    fn pick(&self, _kind: &ScriptKind) -> Option<PathBuf> {
        None
    }
}

/// Search `PATH` and the conventional locations
pub fn find_interpreter(kind: &ScriptKind) -> Option<PathBuf> {
    for name in &kind.interpreter_names {
        if let Ok(path) = which::which(name) {
            logging::log("EXEC", &format!("  FOUND on PATH: {}", path.display()));
            return Some(path);
        }
    }

    logging::log("EXEC", "  NOT FOUND on PATH, checking install locations");
    for candidate in &kind.install_locations {
        if candidate.is_file() {
            logging::log("EXEC", &format!("  FOUND: {}", candidate.display()));
            return Some(candidate.clone());
        }
    }
    None
}

/// Resolve the interpreter for the next launch
///
/// # Errors
///
/// `InvalidInterpreter` if the picked file fails the version probe,
/// `InterpreterNotFound` if nothing was found and nothing was picked.
#[instrument(level = "debug", skip(kind, picker), fields(kind = %kind.label))]
pub fn resolve_interpreter(
    cached: Option<&Path>,
    kind: &ScriptKind,
    picker: &dyn InterpreterPicker,
) -> Result<PathBuf> {
    if let Some(path) = cached {
        if path.exists() {
            debug!(path = %path.display(), "Using cached interpreter");
            return Ok(path.to_path_buf());
        }
        warn!(path = %path.display(), "Cached interpreter no longer exists");
    }

    if let Some(path) = find_interpreter(kind) {
        info!(path = %path.display(), "Interpreter found");
        return Ok(path);
    }

    info!("Interpreter not found automatically, asking the user");
    let picked = picker
        .pick(kind)
        .filter(|p| p.exists())
        .ok_or_else(|| LauncherError::InterpreterNotFound {
            label: kind.label.clone(),
        })?;
    validate_interpreter(&picked, kind)?;
    Ok(picked)
}

/// Run the version probe against `path` and return its version text
///
/// The probe gets `DEFAULT_PROBE_TIMEOUT_MS` to finish and is killed after that.
pub fn validate_interpreter(path: &Path, kind: &ScriptKind) -> Result<String> {
    validate_interpreter_with_timeout(path, kind, Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS))
}

#[instrument(level = "debug", skip(kind), fields(path = %path.display()))]
pub fn validate_interpreter_with_timeout(
    path: &Path,
    kind: &ScriptKind,
    timeout: Duration,
) -> Result<String> {
    let invalid = |reason: String| LauncherError::InvalidInterpreter {
        path: path.to_path_buf(),
        reason,
    };

    if !path.is_file() {
        return Err(invalid("not a file".to_string()));
    }

    let mut command = Command::new(path);
    command
        .arg(&kind.version_flag)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    hide_console_window(&mut command);

    let mut child = command.spawn().map_err(|e| invalid(e.to_string()))?;

    let deadline = Instant::now() + timeout;
    let poll_interval = Duration::from_millis(20);
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(timeout_ms = timeout.as_millis() as u64, "Version probe timed out");
                return Err(invalid("version probe timed out".to_string()));
            }
            Ok(None) => thread::sleep(poll_interval),
            Err(e) => return Err(invalid(e.to_string())),
        }
    }

    // Version output is a single short line, well within the pipe buffer
    let mut output = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        let _ = stdout.read_to_string(&mut output);
    }
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut output);
    }

    if output.contains(&kind.version_marker) {
        let version = output
            .lines()
            .map(str::trim)
            .find(|l| l.contains(&kind.version_marker))
            .unwrap_or_default()
            .to_string();
        info!(version = %version, "Interpreter validated");
        Ok(version)
    } else {
        Err(invalid(format!(
            "version output does not mention {}",
            kind.version_marker
        )))
    }
}

/// Whether the interpreter runs without a console window (`pythonw`)
pub fn is_windowless(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase().ends_with('w'))
        .unwrap_or(false)
}

#[cfg(windows)]
pub(crate) fn hide_console_window(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
pub(crate) fn hide_console_window(_command: &mut Command) {}
