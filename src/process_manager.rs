//! Process Manager Module
//!
//! Tracks which scripts have a live process. The registry is keyed by the
//! script's absolute path and holds at most one entry per script.
//!
//! An entry is reserved as `Launching` before the interpreter is resolved, so
//! a second launch of the same script is rejected even while the first one is
//! still starting. It becomes `Running` once the child has a PID and is removed
//! by the worker that owns the child when the process exits.
//!
//! The registry is the only state shared between the UI loop and script
//! workers. It is cheap to clone; clones share the same map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{file_label, LauncherError, Result};
use crate::logging;

/// Lifecycle of a registered script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Interpreter resolution or spawn in progress, no PID yet
    Launching,
    Running { pid: u32 },
    /// Process has exited but is not reaped yet; its PID must not be signalled
    Exiting,
}

/// Information about a tracked script process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub script: PathBuf,
    pub state: ProcessState,
    /// When the launch was reserved
    pub started_at: DateTime<Utc>,
    /// Stop was requested; a launching script is terminated as soon as it has a PID
    pub stop_requested: bool,
}

impl ProcessInfo {
    pub fn pid(&self) -> Option<u32> {
        match self.state {
            ProcessState::Running { pid } => Some(pid),
            ProcessState::Launching | ProcessState::Exiting => None,
        }
    }
}

/// What `request_stop` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Termination signal sent to the process
    Signalled { pid: u32 },
    /// No signal sent: the script has no PID yet and is terminated right
    /// after spawn, or it has already exited
    Deferred,
}

/// Thread-safe map of running scripts
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    inner: Arc<Mutex<HashMap<PathBuf, ProcessInfo>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an entry for `script`
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if the script already has an entry. The existing
    /// entry is left untouched.
    pub fn reserve(&self, script: &Path) -> Result<()> {
        let mut processes = self.inner.lock();
        if processes.contains_key(script) {
            warn!(script = %script.display(), "Duplicate launch rejected");
            return Err(LauncherError::AlreadyRunning(script.to_path_buf()));
        }
        processes.insert(
            script.to_path_buf(),
            ProcessInfo {
                script: script.to_path_buf(),
                state: ProcessState::Launching,
                started_at: Utc::now(),
                stop_requested: false,
            },
        );
        debug!(script = %script.display(), "Launch reserved");
        Ok(())
    }

    /// Record the PID of a spawned script
    ///
    /// Returns `false` when the caller must terminate the process right away:
    /// a stop was requested during launch, or the entry is gone.
    pub fn mark_running(&self, script: &Path, pid: u32) -> bool {
        let mut processes = self.inner.lock();
        match processes.get_mut(script) {
            Some(info) => {
                info.state = ProcessState::Running { pid };
                logging::log(
                    "PROC",
                    &format!("Registered PID {} for {}", pid, file_label(script)),
                );
                !info.stop_requested
            }
            None => {
                warn!(script = %script.display(), pid, "Spawned script has no registry entry");
                false
            }
        }
    }

    /// Forget the PID of a script whose process has exited
    ///
    /// Called before the child is reaped, so a late stop can never reach a
    /// reused PID. The entry itself stays until `remove`.
    pub fn mark_exiting(&self, script: &Path) {
        if let Some(info) = self.inner.lock().get_mut(script) {
            info.state = ProcessState::Exiting;
            debug!(script = %script.display(), "Process exited");
        }
    }

    /// Drop the entry for `script`
    pub fn remove(&self, script: &Path) -> Option<ProcessInfo> {
        let removed = self.inner.lock().remove(script);
        if let Some(info) = &removed {
            logging::log(
                "PROC",
                &format!(
                    "Unregistered {} (pid {:?})",
                    file_label(script),
                    info.pid()
                ),
            );
        }
        removed
    }

    pub fn contains(&self, script: &Path) -> bool {
        self.inner.lock().contains_key(script)
    }

    pub fn get(&self, script: &Path) -> Option<ProcessInfo> {
        self.inner.lock().get(script).cloned()
    }

    /// Ask a registered script to terminate
    ///
    /// The entry stays in place; the worker removes it when the process exits.
    ///
    /// # Errors
    ///
    /// `NotRunning` if the script has no entry, or the signal error if the
    /// process could not be signalled.
    pub fn request_stop(&self, script: &Path) -> Result<StopOutcome> {
        let pid = {
            let mut processes = self.inner.lock();
            let info = processes
                .get_mut(script)
                .ok_or_else(|| LauncherError::NotRunning(script.to_path_buf()))?;
            info.stop_requested = true;
            info.pid()
        };

        match pid {
            Some(pid) => {
                info!(script = %script.display(), pid, "Stopping script");
                terminate_process(pid)?;
                Ok(StopOutcome::Signalled { pid })
            }
            None => {
                info!(script = %script.display(), "Stop requested without a live PID");
                Ok(StopOutcome::Deferred)
            }
        }
    }

    /// Request termination of every registered script
    ///
    /// Returns how many scripts were asked to stop.
    pub fn stop_all(&self) -> usize {
        let scripts: Vec<PathBuf> = self.inner.lock().keys().cloned().collect();
        if scripts.is_empty() {
            logging::log("PROC", "No active processes to stop");
            return 0;
        }

        logging::log(
            "PROC",
            &format!("Stopping {} active script(s)", scripts.len()),
        );
        let mut stopped = 0;
        for script in &scripts {
            match self.request_stop(script) {
                Ok(_) => stopped += 1,
                Err(e) => logging::log_error("PROC", &e.to_string(), Some(&file_label(script))),
            }
        }
        stopped
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Send a termination request to a script process and its children
///
/// On Unix this is SIGTERM to the process group (scripts are spawned as group
/// leaders). On Windows the process tree is asked to close with `taskkill /T`.
pub fn terminate_process(pid: u32) -> Result<()> {
    logging::log("PROC", &format!("Terminating process PID {}", pid));

    #[cfg(unix)]
    {
        let pgid = i32::try_from(pid).map_err(|_| LauncherError::Signal {
            pid,
            message: "PID out of range".to_string(),
        })?;
        // SAFETY: kill(2) has no memory-safety preconditions
        let result = unsafe { libc::kill(-pgid, libc::SIGTERM) };
        if result == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            logging::log("PROC", &format!("Process {} already exited", pid));
            return Ok(());
        }
        Err(LauncherError::Signal {
            pid,
            message: err.to_string(),
        })
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        use std::process::{Command, Stdio};

        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        let output = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T"])
            .stdin(Stdio::null())
            .creation_flags(CREATE_NO_WINDOW)
            .output()
            .map_err(|e| LauncherError::Signal {
                pid,
                message: e.to_string(),
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(LauncherError::Signal {
                pid,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        Err(LauncherError::Signal {
            pid,
            message: "process termination is not supported on this platform".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(name: &str) -> PathBuf {
        PathBuf::from("/scripts").join(name)
    }

    #[test]
    fn test_reserve_registers_launching_entry() {
        let registry = ProcessRegistry::new();
        registry.reserve(&script("a.py")).unwrap();

        assert!(registry.contains(&script("a.py")));
        let info = registry.get(&script("a.py")).unwrap();
        assert_eq!(info.state, ProcessState::Launching);
        assert_eq!(info.pid(), None);
        assert!(!info.stop_requested);
    }

    #[test]
    fn test_duplicate_reserve_rejected_without_second_entry() {
        let registry = ProcessRegistry::new();
        registry.reserve(&script("a.py")).unwrap();
        registry.mark_running(&script("a.py"), 4242);

        let err = registry.reserve(&script("a.py")).unwrap_err();
        assert!(matches!(err, LauncherError::AlreadyRunning(_)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&script("a.py")).unwrap().pid(), Some(4242));
    }

    #[test]
    fn test_multiple_scripts_tracked_independently() {
        let registry = ProcessRegistry::new();
        registry.reserve(&script("a.py")).unwrap();
        registry.reserve(&script("b.py")).unwrap();
        assert_eq!(registry.len(), 2);

        registry.remove(&script("a.py"));
        assert!(!registry.contains(&script("a.py")));
        assert!(registry.contains(&script("b.py")));
    }

    #[test]
    fn test_clones_share_state() {
        let registry = ProcessRegistry::new();
        let worker_view = registry.clone();
        registry.reserve(&script("a.py")).unwrap();
        assert!(worker_view.contains(&script("a.py")));
        worker_view.remove(&script("a.py"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_missing_is_none() {
        let registry = ProcessRegistry::new();
        assert!(registry.remove(&script("ghost.py")).is_none());
    }

    #[test]
    fn test_stop_unregistered_is_not_running() {
        let registry = ProcessRegistry::new();
        let err = registry.request_stop(&script("idle.py")).unwrap_err();
        assert!(matches!(err, LauncherError::NotRunning(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stop_during_launch_is_deferred() {
        let registry = ProcessRegistry::new();
        registry.reserve(&script("slow.py")).unwrap();

        assert_eq!(
            registry.request_stop(&script("slow.py")).unwrap(),
            StopOutcome::Deferred
        );
        // Entry stays until the worker cleans up
        assert!(registry.contains(&script("slow.py")));
        // Spawn after the stop request must be killed by the caller
        assert!(!registry.mark_running(&script("slow.py"), 1234));
    }

    #[test]
    fn test_stop_after_exit_never_signals_stale_pid() {
        let registry = ProcessRegistry::new();
        registry.reserve(&script("done.py")).unwrap();
        registry.mark_running(&script("done.py"), 4242);
        registry.mark_exiting(&script("done.py"));

        let info = registry.get(&script("done.py")).unwrap();
        assert_eq!(info.state, ProcessState::Exiting);
        assert_eq!(info.pid(), None);
        assert_eq!(
            registry.request_stop(&script("done.py")).unwrap(),
            StopOutcome::Deferred
        );
        assert!(registry.contains(&script("done.py")));
    }

    #[test]
    fn test_mark_running_without_entry() {
        let registry = ProcessRegistry::new();
        assert!(!registry.mark_running(&script("gone.py"), 1));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stop_all_on_empty_registry() {
        assert_eq!(ProcessRegistry::new().stop_all(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_exited_process_is_ok() {
        use std::os::unix::process::CommandExt;
        use std::process::Command;

        let mut child = Command::new("true").process_group(0).spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(terminate_process(pid).is_ok());
    }
}
