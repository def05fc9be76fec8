//! Launcher controller
//!
//! `Launcher` owns all UI-side state and is only touched from the UI loop.
//! User commands arrive as `ExternalCommand`s, worker progress as
//! `WorkerEvent`s, both wrapped in `AppEvent` on one channel. Renderers read
//! the state through accessors and pick up what changed with `take_changes`,
//! `take_notices` and the console cursor.

use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::{
    load_preferences, update_preferences, Preferences, DEFAULT_CONSOLE_MAX_LINES,
};
use crate::console::ConsoleBuffer;
use crate::error::{file_label, ErrorSeverity, LauncherError};
use crate::executor::{is_windowless, InterpreterPicker, ScriptExecutor, WorkerEvent};
use crate::file_tree::DirectoryTree;
use crate::logging;
use crate::process_manager::ProcessRegistry;
use crate::scripts::{list_scripts, ScriptKind, ScriptListing, ScriptRow};
use crate::stdin_commands::{ExternalCommand, StdinEvent};
use crate::theme::Theme;

/// Everything the UI loop receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Stdin(StdinEvent),
    Worker(WorkerEvent),
}

impl From<StdinEvent> for AppEvent {
    fn from(event: StdinEvent) -> Self {
        AppEvent::Stdin(event)
    }
}

impl From<WorkerEvent> for AppEvent {
    fn from(event: WorkerEvent) -> Self {
        AppEvent::Worker(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl From<ErrorSeverity> for NoticeLevel {
    fn from(severity: ErrorSeverity) -> Self {
        match severity {
            ErrorSeverity::Info => NoticeLevel::Info,
            ErrorSeverity::Warning => NoticeLevel::Warning,
            ErrorSeverity::Error | ErrorSeverity::Critical => NoticeLevel::Error,
        }
    }
}

/// A message box, rendered by the front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Notice {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Parts of the view that need redrawing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Changes {
    pub tree: bool,
    pub scripts: bool,
    pub selection: bool,
    pub theme: bool,
}

impl Changes {
    pub fn any(&self) -> bool {
        self.tree || self.scripts || self.selection || self.theme
    }
}

/// Interpreter picker that asks through the UI loop
///
/// The worker posts `InterpreterNeeded` and blocks until the UI answers with
/// `selectInterpreter` or `cancelInterpreter`. Only one worker asks at a time.
pub struct ChannelPicker {
    events: Sender<AppEvent>,
    replies: Receiver<Option<PathBuf>>,
    gate: Mutex<()>,
}

impl ChannelPicker {
    pub fn new(events: Sender<AppEvent>, replies: Receiver<Option<PathBuf>>) -> Self {
        ChannelPicker {
            events,
            replies,
            gate: Mutex::new(()),
        }
    }
}

impl InterpreterPicker for ChannelPicker {
    fn pick(&self, kind: &ScriptKind) -> Option<PathBuf> {
        let _turn = self.gate.lock();
        let asked = WorkerEvent::InterpreterNeeded {
            label: kind.label.clone(),
        };
        self.events.send_blocking(asked.into()).ok()?;
        self.replies.recv_blocking().ok().flatten()
    }
}

/// Startup options for `Launcher::new`
#[derive(Default)]
pub struct LauncherOptions {
    pub prefs_path: PathBuf,
    pub kind: ScriptKind,
    /// Tree roots; platform roots when `None`
    pub tree_roots: Option<Vec<PathBuf>>,
    /// Folder to open instead of the saved `last_folder`
    pub initial_folder: Option<PathBuf>,
    /// Interpreter prompt; asks through the UI loop when `None`
    pub picker: Option<Arc<dyn InterpreterPicker>>,
}

pub struct Launcher {
    prefs_path: PathBuf,
    prefs: Preferences,
    theme: Theme,
    kind: ScriptKind,
    tree: DirectoryTree,
    current_folder: Option<PathBuf>,
    listing: ScriptListing,
    selected: Option<PathBuf>,
    console: ConsoleBuffer,
    notices: VecDeque<Notice>,
    executor: ScriptExecutor<AppEvent>,
    /// Workers currently blocked on an interpreter prompt
    pending_picks: usize,
    /// Settings interpreter checks still running
    pending_checks: usize,
    pick_replies: Sender<Option<PathBuf>>,
    should_quit: bool,
    input_closed: bool,
    changes: Changes,
}

impl Launcher {
    /// Build the launcher, load preferences and restore the last folder
    #[instrument(name = "launcher_new", skip_all, fields(prefs = %options.prefs_path.display()))]
    pub fn new(events: Sender<AppEvent>, options: LauncherOptions) -> Self {
        let prefs = load_preferences(&options.prefs_path);
        let theme = Theme::from_dark_mode(prefs.dark_mode);

        let tree = match options.tree_roots {
            Some(roots) => {
                let mut tree = DirectoryTree::with_roots(roots);
                if tree.roots().len() == 1 {
                    let root = tree.roots()[0];
                    tree.open(root);
                }
                tree
            }
            None => DirectoryTree::for_platform(),
        };

        let (pick_replies, replies) = async_channel::unbounded();
        let picker: Arc<dyn InterpreterPicker> = match options.picker {
            Some(picker) => picker,
            None => Arc::new(ChannelPicker::new(events.clone(), replies)),
        };
        let executor = ScriptExecutor::new(
            events,
            ProcessRegistry::new(),
            options.kind.clone(),
            picker,
        );

        let mut launcher = Launcher {
            prefs_path: options.prefs_path,
            prefs,
            theme,
            kind: options.kind,
            tree,
            current_folder: None,
            listing: ScriptListing::Empty,
            selected: None,
            console: ConsoleBuffer::new(DEFAULT_CONSOLE_MAX_LINES),
            notices: VecDeque::new(),
            executor,
            pending_picks: 0,
            pending_checks: 0,
            pick_replies,
            should_quit: false,
            input_closed: false,
            changes: Changes {
                tree: true,
                scripts: true,
                selection: true,
                theme: true,
            },
        };

        match options.initial_folder {
            Some(folder) => launcher.select_folder(&folder),
            None => {
                if let Some(folder) = launcher.prefs.last_folder_path().filter(|p| p.is_dir()) {
                    info!(folder = %folder.display(), "Restoring last folder");
                    launcher.select_folder(&folder);
                }
            }
        }
        launcher
    }

    // ------------------------------------------------------------------
    // Event dispatch
    // ------------------------------------------------------------------

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Stdin(StdinEvent::Command(cmd)) => self.handle_command(cmd),
            AppEvent::Stdin(StdinEvent::Closed) => {
                info!("Input closed");
                self.input_closed = true;
                // Nobody is left to answer a prompt
                while self.pending_picks > 0 {
                    self.cancel_interpreter();
                }
            }
            AppEvent::Worker(event) => self.handle_worker_event(event),
        }
    }

    pub fn handle_command(&mut self, cmd: ExternalCommand) {
        logging::log_ui_event("command", &format!("{:?}", cmd), None);
        match cmd {
            ExternalCommand::SelectFolder { path } => self.select_folder(&expand_path(&path)),
            ExternalCommand::Expand { path } => self.expand(&expand_path(&path)),
            ExternalCommand::Collapse { path } => self.collapse(&expand_path(&path)),
            ExternalCommand::SelectScript { name } => self.select_script(&name),
            ExternalCommand::Run => self.run_selected(),
            ExternalCommand::Stop => self.stop_selected(),
            ExternalCommand::ToggleTheme => self.toggle_theme(),
            ExternalCommand::SelectInterpreter { path } => {
                self.select_interpreter(&expand_path(&path))
            }
            ExternalCommand::CancelInterpreter => self.cancel_interpreter(),
            ExternalCommand::ShowTree => self.changes.tree = true,
            ExternalCommand::Quit => self.should_quit = true,
        }
    }

    fn handle_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Output { line, .. } => self.console.push_line(line),
            WorkerEvent::Exited { script, code } => {
                self.console.push_line("");
                self.console
                    .push_line(format!("=== Terminated (code: {}) ===", code));
                self.refresh_if_selected(&script);
            }
            WorkerEvent::Failed { script, message } => {
                self.console.push_line("");
                self.console.push_text(&format!("❌ Error: {}", message));
                self.refresh_if_selected(&script);
            }
            WorkerEvent::InterpreterResolved { path } => {
                info!(path = %path.display(), "Caching interpreter");
                let value = path.display().to_string();
                self.save_prefs(move |p| p.python_path = Some(value.clone()));
            }
            WorkerEvent::InterpreterChecked { path, outcome } => {
                self.finish_interpreter_check(&path, outcome)
            }
            WorkerEvent::InterpreterNeeded { label } => {
                self.pending_picks += 1;
                if self.input_closed {
                    info!(label = %label, "Interpreter prompt after input closed, cancelling");
                    self.cancel_interpreter();
                    return;
                }
                self.notify(
                    NoticeLevel::Warning,
                    format!("{} Not Found", label),
                    format!(
                        "{label} interpreter was not found automatically.\n\n\
                         Send selectInterpreter with the location of the executable, \
                         or cancelInterpreter to give up."
                    ),
                );
            }
        }
    }

    fn refresh_if_selected(&mut self, script: &Path) {
        if self.selected.as_deref() == Some(script) {
            self.changes.selection = true;
        }
    }

    // ------------------------------------------------------------------
    // Tree and listing
    // ------------------------------------------------------------------

    /// Reveal `folder` in the tree and list its scripts
    pub fn select_folder(&mut self, folder: &Path) {
        // One spelling per folder, so each script has a single registry key
        let folder = normalize_path(folder);
        let folder = folder.as_path();
        if !folder.is_dir() {
            warn!(folder = %folder.display(), "Selected folder does not exist");
            self.notify(
                NoticeLevel::Warning,
                "Folder Not Found",
                format!("This folder does not exist:\n{}", folder.display()),
            );
            return;
        }

        if self.tree.reveal(folder).is_none() {
            debug!(folder = %folder.display(), "Folder is not reachable in the tree");
        }
        self.listing = list_scripts(folder, &self.kind);
        self.current_folder = Some(folder.to_path_buf());
        self.selected = None;
        self.changes.tree = true;
        self.changes.scripts = true;
        self.changes.selection = true;

        let value = folder.display().to_string();
        self.save_prefs(move |p| p.last_folder = Some(value.clone()));
    }

    pub fn expand(&mut self, path: &Path) {
        match self.tree.find(path).or_else(|| self.tree.reveal(path)) {
            Some(id) => {
                self.tree.open(id);
                self.changes.tree = true;
            }
            None => warn!(path = %path.display(), "No tree node to expand"),
        }
    }

    pub fn collapse(&mut self, path: &Path) {
        match self.tree.find(path) {
            Some(id) => {
                self.tree.collapse(id);
                self.changes.tree = true;
            }
            None => warn!(path = %path.display(), "No tree node to collapse"),
        }
    }

    /// Select a script of the current folder by file name
    pub fn select_script(&mut self, name: &str) {
        match self.listing.find(name) {
            Some(entry) => {
                self.selected = Some(entry.path.clone());
                self.changes.selection = true;
            }
            None => debug!(name, "Not a selectable script"),
        }
    }

    // ------------------------------------------------------------------
    // Running
    // ------------------------------------------------------------------

    /// Launch the selected script
    pub fn run_selected(&mut self) {
        let Some(script) = self.selected.clone() else {
            debug!("Run without a selection");
            return;
        };
        if self.executor.is_running(&script) {
            self.notify_error(&LauncherError::AlreadyRunning(script));
            return;
        }

        let name = file_label(&script);
        self.console.clear();
        self.console.push_line(format!("=== Executing {} ===", name));
        self.console.push_line("");

        match self
            .executor
            .launch(&script, self.prefs.interpreter_path())
        {
            Ok(()) => {}
            Err(e @ LauncherError::AlreadyRunning(_)) => self.notify_error(&e),
            Err(e) => {
                self.console.push_line("");
                self.console.push_text(&format!("❌ Error: {}", e.user_message()));
            }
        }
        self.changes.selection = true;
    }

    /// Ask the selected script to stop
    pub fn stop_selected(&mut self) {
        let Some(script) = self.selected.clone() else {
            return;
        };
        match self.executor.stop(&script) {
            Ok(_) => {
                self.console.push_line("");
                self.console.push_line(format!(
                    "⚠ Script interrupted by user: {}",
                    file_label(&script)
                ));
            }
            Err(e @ LauncherError::NotRunning(_)) => self.notify_error(&e),
            Err(e) => {
                self.console.push_line("");
                self.console
                    .push_line(format!("❌ Error while stopping: {}", e));
            }
        }
        self.changes.selection = true;
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn toggle_theme(&mut self) {
        let dark = !self.prefs.dark_mode;
        self.theme = Theme::from_dark_mode(dark);
        self.save_prefs(move |p| p.dark_mode = dark);
        self.changes.theme = true;
    }

    /// Answer a pending interpreter prompt, or check and save `path`
    ///
    /// The check runs off the UI loop; its verdict arrives as
    /// `InterpreterChecked`.
    pub fn select_interpreter(&mut self, path: &Path) {
        if self.pending_picks > 0 {
            self.pending_picks -= 1;
            info!(path = %path.display(), "Answering interpreter prompt");
            let _ = self.pick_replies.try_send(Some(path.to_path_buf()));
            return;
        }

        match self.executor.check_interpreter(path) {
            Ok(()) => self.pending_checks += 1,
            Err(e) => self.notify_error(&e),
        }
    }

    fn finish_interpreter_check(&mut self, path: &Path, outcome: Result<String, String>) {
        self.pending_checks = self.pending_checks.saturating_sub(1);
        match outcome {
            Ok(version) => {
                let value = path.display().to_string();
                self.save_prefs(move |p| p.python_path = Some(value.clone()));
                let exe = file_label(path);
                let exe_type = if is_windowless(path) {
                    format!("{} (no console)", exe)
                } else {
                    format!("{} (with console)", exe)
                };
                self.notify(
                    NoticeLevel::Info,
                    "Success",
                    format!(
                        "{} interpreter set successfully!\n\n{}\nType: {}\n\nLocation: {}",
                        self.kind.label,
                        version,
                        exe_type,
                        path.display()
                    ),
                );
            }
            Err(message) => {
                warn!(path = %path.display(), "Interpreter rejected");
                self.notify(NoticeLevel::Error, "Invalid File", message);
            }
        }
    }

    pub fn cancel_interpreter(&mut self) {
        if self.pending_picks > 0 {
            self.pending_picks -= 1;
            let _ = self.pick_replies.try_send(None);
        }
    }

    fn save_prefs<F>(&mut self, apply: F)
    where
        F: Fn(&mut Preferences),
    {
        apply(&mut self.prefs);
        match update_preferences(&self.prefs_path, &apply) {
            Ok(saved) => self.prefs = saved,
            Err(e) => logging::log_error(
                "CONFIG",
                &format!("{:#}", e),
                Some(&self.prefs_path.display().to_string()),
            ),
        }
    }

    // ------------------------------------------------------------------
    // Notices
    // ------------------------------------------------------------------

    fn notify(&mut self, level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) {
        let notice = Notice::new(level, title, message);
        debug!(title = %notice.title, ?level, "Notice");
        self.notices.push_back(notice);
    }

    fn notify_error(&mut self, error: &LauncherError) {
        let title = match error {
            LauncherError::AlreadyRunning(_) => "Already Running",
            LauncherError::NotRunning(_) => "Not Running",
            LauncherError::InterpreterNotFound { .. } => "Interpreter Not Found",
            _ => "Error",
        };
        self.notify(NoticeLevel::from(error.severity()), title, error.user_message());
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub fn take_changes(&mut self) -> Changes {
        std::mem::take(&mut self.changes)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Quit was requested, or input is gone and nothing is left running
    pub fn should_exit(&self) -> bool {
        self.should_quit
            || (self.input_closed
                && self.executor.registry().is_empty()
                && self.pending_picks == 0
                && self.pending_checks == 0)
    }

    /// Ask every running script to terminate
    pub fn shutdown(&mut self) {
        while self.pending_picks > 0 {
            self.cancel_interpreter();
        }
        let stopped = self.executor.stop_all();
        info!(stopped, "Launcher shut down");
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// "No file selected", "Selected: x" or "Selected: x (Running ▶)"
    pub fn selection_label(&self) -> String {
        match &self.selected {
            None => "No file selected".to_string(),
            Some(script) if self.executor.is_running(script) => {
                format!("Selected: {} (Running ▶)", file_label(script))
            }
            Some(script) => format!("Selected: {}", file_label(script)),
        }
    }

    /// Whether the selected script has a registry entry
    pub fn selection_running(&self) -> bool {
        self.selected
            .as_deref()
            .map(|s| self.executor.is_running(s))
            .unwrap_or(false)
    }

    pub fn can_run(&self) -> bool {
        self.selected.is_some()
    }

    pub fn can_stop(&self) -> bool {
        self.selection_running()
    }

    pub fn script_rows(&self) -> Vec<ScriptRow> {
        self.listing.rows(&self.kind)
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    pub fn current_folder(&self) -> Option<&Path> {
        self.current_folder.as_deref()
    }

    pub fn listing(&self) -> &ScriptListing {
        &self.listing
    }

    pub fn selected(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    /// File name of the selected script
    pub fn selected_name(&self) -> Option<String> {
        self.selected.as_deref().map(file_label)
    }

    pub fn console(&self) -> &ConsoleBuffer {
        &self.console
    }

    pub fn registry(&self) -> &ProcessRegistry {
        self.executor.registry()
    }

    pub fn kind(&self) -> &ScriptKind {
        &self.kind
    }

    pub fn pending_picks(&self) -> usize {
        self.pending_picks
    }

    pub fn pending_checks(&self) -> usize {
        self.pending_checks
    }
}

/// Expand `~`, make the path absolute and resolve `.` and `..`
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(raw.trim()).into_owned());
    normalize_path(&std::path::absolute(&expanded).unwrap_or(expanded))
}

/// Drop `.` and fold `..` into its parent without touching the filesystem
///
/// `..` never climbs above a root; leading `..` of a relative path is kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
