//! Script launching and the per-script worker
//!
//! `ScriptExecutor::launch` reserves the script in the registry and hands the
//! rest to a named worker thread. The worker resolves the interpreter, spawns
//! the child, relays its output, waits for it, and removes the registry entry
//! before posting the final `Exited` or `Failed` event. Nothing here touches
//! UI state directly; everything goes through the event channel.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;

use async_channel::Sender;
use tracing::{debug, error, info, instrument};

use super::interpreter::{
    hide_console_window, resolve_interpreter, validate_interpreter, InterpreterPicker,
};
use super::relay::{relay_lines, spawn_output_reader};
use crate::error::{file_label, LauncherError, Result, ResultExt};
use crate::logging;
use crate::process_manager::{terminate_process, ProcessRegistry, StopOutcome};
use crate::scripts::ScriptKind;

/// Messages posted from script workers to the UI loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// One line of merged stdout/stderr
    Output { script: PathBuf, line: String },
    /// Process exited; the registry entry is already gone
    Exited { script: PathBuf, code: i32 },
    /// Launch failed before or while running; the registry entry is already gone
    Failed { script: PathBuf, message: String },
    /// An interpreter other than the cached one was used and should be saved
    InterpreterResolved { path: PathBuf },
    /// A worker is waiting for the user to pick an interpreter
    InterpreterNeeded { label: String },
    /// Verdict of `check_interpreter`: the version text, or why it was rejected
    InterpreterChecked {
        path: PathBuf,
        outcome: std::result::Result<String, String>,
    },
}

/// Launches scripts on worker threads and stops them
pub struct ScriptExecutor<E> {
    tx: Sender<E>,
    registry: ProcessRegistry,
    kind: Arc<ScriptKind>,
    picker: Arc<dyn InterpreterPicker>,
}

impl<E> Clone for ScriptExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            registry: self.registry.clone(),
            kind: Arc::clone(&self.kind),
            picker: Arc::clone(&self.picker),
        }
    }
}

impl<E> ScriptExecutor<E>
where
    E: From<WorkerEvent> + Send + 'static,
{
    pub fn new(
        tx: Sender<E>,
        registry: ProcessRegistry,
        kind: ScriptKind,
        picker: Arc<dyn InterpreterPicker>,
    ) -> Self {
        Self {
            tx,
            registry,
            kind: Arc::new(kind),
            picker,
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn kind(&self) -> &ScriptKind {
        &self.kind
    }

    pub fn is_running(&self, script: &Path) -> bool {
        self.registry.contains(script)
    }

    /// Start `script` on a new worker thread
    ///
    /// `cached_interpreter` is tried first when it still exists.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if the script is registered (nothing changes), or
    /// `Worker` if the thread could not be started (the reservation is undone).
    #[instrument(skip_all, fields(script = %script.display()))]
    pub fn launch(&self, script: &Path, cached_interpreter: Option<PathBuf>) -> Result<()> {
        self.registry.reserve(script)?;

        let ctx = WorkerContext {
            script: script.to_path_buf(),
            cached_interpreter,
            tx: self.tx.clone(),
            registry: self.registry.clone(),
            kind: Arc::clone(&self.kind),
            picker: Arc::clone(&self.picker),
        };

        let spawned = thread::Builder::new()
            .name(format!("script:{}", file_label(script)))
            .spawn(move || run_worker(ctx));

        match spawned {
            Ok(_) => {
                logging::log_script_event(&file_label(script), "launched", None);
                Ok(())
            }
            Err(e) => {
                self.registry.remove(script);
                error!(error = %e, "Failed to start worker thread");
                Err(LauncherError::Worker(e))
            }
        }
    }

    /// Ask `script` to terminate; cleanup happens on the worker's exit path
    pub fn stop(&self, script: &Path) -> Result<StopOutcome> {
        let outcome = self.registry.request_stop(script)?;
        logging::log_script_event(&file_label(script), "stop requested", None);
        Ok(outcome)
    }

    /// Ask every registered script to terminate
    pub fn stop_all(&self) -> usize {
        self.registry.stop_all()
    }

    /// Run the version probe for `path` off the caller's thread
    ///
    /// The verdict is posted as `InterpreterChecked`.
    pub fn check_interpreter(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        let tx = self.tx.clone();
        let kind = Arc::clone(&self.kind);

        thread::Builder::new()
            .name("interpreter-check".to_string())
            .spawn(move || {
                let outcome = validate_interpreter(&path, &kind).map_err(|e| e.user_message());
                let event = WorkerEvent::InterpreterChecked { path, outcome };
                if tx.send_blocking(event.into()).is_err() {
                    debug!("UI channel closed before the interpreter check finished");
                }
            })
            .map(|_| ())
            .map_err(|e| {
                error!(error = %e, "Failed to start interpreter check");
                LauncherError::Worker(e)
            })
    }
}

struct WorkerContext<E> {
    script: PathBuf,
    cached_interpreter: Option<PathBuf>,
    tx: Sender<E>,
    registry: ProcessRegistry,
    kind: Arc<ScriptKind>,
    picker: Arc<dyn InterpreterPicker>,
}

impl<E: From<WorkerEvent>> WorkerContext<E> {
    fn send(&self, event: WorkerEvent) {
        if self.tx.send_blocking(event.into()).is_err() {
            debug!(script = %self.script.display(), "UI channel closed");
        }
    }
}

fn run_worker<E: From<WorkerEvent> + Send + 'static>(ctx: WorkerContext<E>) {
    let name = file_label(&ctx.script);
    let result = run_script(&ctx);

    // Registry first, so the UI never sees the final event for a script it still thinks is running
    ctx.registry.remove(&ctx.script);

    match result {
        Ok(code) => {
            logging::log_script_event(&name, "exited", Some(code));
            ctx.send(WorkerEvent::Exited {
                script: ctx.script.clone(),
                code,
            });
        }
        Err(e) => {
            logging::log_error("EXEC", &e.to_string(), Some(&name));
            ctx.send(WorkerEvent::Failed {
                script: ctx.script.clone(),
                message: e.user_message(),
            });
        }
    }
}

fn run_script<E: From<WorkerEvent> + Send + 'static>(ctx: &WorkerContext<E>) -> Result<i32> {
    let script = &ctx.script;
    let cwd = script
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| LauncherError::InvalidScriptPath(script.clone()))?;

    let interpreter = resolve_interpreter(
        ctx.cached_interpreter.as_deref(),
        &ctx.kind,
        ctx.picker.as_ref(),
    )?;
    if ctx.cached_interpreter.as_deref() != Some(interpreter.as_path()) {
        ctx.send(WorkerEvent::InterpreterResolved {
            path: interpreter.clone(),
        });
    }

    let mut child = spawn_script(&interpreter, script, cwd, &ctx.kind)?;
    let pid = child.id();
    if !ctx.registry.mark_running(script, pid) {
        info!(pid, "Stop was requested during launch, terminating");
        terminate_process(pid).log_err();
    }

    let stderr_reader = child
        .stderr
        .take()
        .and_then(|stderr| spawn_output_reader(stderr, script.clone(), ctx.tx.clone()).log_err());

    if let Some(stdout) = child.stdout.take() {
        let lines = relay_lines(stdout, script, &ctx.tx);
        debug!(lines, "stdout closed");
    }
    if let Some(handle) = stderr_reader {
        let _ = handle.join();
    }

    #[cfg(unix)]
    {
        wait_until_exited(pid);
        ctx.registry.mark_exiting(script);
    }
    let status = child.wait().map_err(LauncherError::ProcessWait)?;
    // Elsewhere the open process handle keeps the PID reserved until `child` drops
    #[cfg(not(unix))]
    {
        ctx.registry.mark_exiting(script);
    }
    Ok(exit_code(status))
}

/// Block until `pid` has exited, leaving it unreaped
#[cfg(unix)]
fn wait_until_exited(pid: u32) {
    loop {
        // SAFETY: siginfo_t is plain data and waitid only writes into it
        let rc = unsafe {
            let mut info: libc::siginfo_t = std::mem::zeroed();
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return;
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            debug!(pid, error = %err, "waitid failed");
            return;
        }
    }
}

/// Spawn `<interpreter> <script>` with piped output in `cwd`
#[instrument(skip_all, fields(interpreter = %interpreter.display(), script = %script.display()))]
pub fn spawn_script(
    interpreter: &Path,
    script: &Path,
    cwd: &Path,
    kind: &ScriptKind,
) -> Result<Child> {
    let mut command = Command::new(interpreter);
    command
        .arg(script)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &kind.env {
        command.env(key, value);
    }

    // Own process group, so a stop reaches the script's children too
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    hide_console_window(&mut command);

    let child = command.spawn().map_err(|e| {
        error!(error = %e, "Process spawn failed");
        LauncherError::ProcessSpawn {
            program: interpreter.to_path_buf(),
            source: e,
        }
    })?;

    info!(pid = child.id(), "Process spawned");
    logging::log(
        "EXEC",
        &format!("Process spawned with PID: {} (PGID: {})", child.id(), child.id()),
    );
    Ok(child)
}

/// Numeric exit code; on Unix a signal-terminated process reports `-signal`
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
