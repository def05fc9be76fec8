use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use easy_launcher::app::{expand_path, AppEvent, Launcher, LauncherOptions};
use easy_launcher::config::{
    default_preferences_path, load_preferences, update_preferences, DEFAULT_EVENT_CHANNEL_CAPACITY,
};
use easy_launcher::error::{file_label, ResultExt};
use easy_launcher::executor::{InterpreterPicker, ScriptExecutor, WorkerEvent};
use easy_launcher::file_tree::list_children;
use easy_launcher::logging;
use easy_launcher::process_manager::ProcessRegistry;
use easy_launcher::scripts::{list_scripts, ScriptKind};
use easy_launcher::stdin_commands;
use easy_launcher::view::TerminalView;

/// Browse folders, pick a script and run it with live output
#[derive(Parser, Debug)]
#[command(name = "easy-launcher", version)]
struct Cli {
    /// Preferences file [default: EasyLauncher.config.json beside the executable]
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// Folder to open at startup instead of the last one used
    #[arg(long, value_name = "PATH")]
    folder: Option<String>,

    /// Show all log levels on stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the subfolders of a folder
    Tree { path: String },
    /// Print the scripts of a folder
    Scripts { folder: String },
    /// Run one script, streaming its output, and exit with its exit code
    Run { script: String },
}

fn main() {
    let cli = Cli::parse();
    let guard = logging::init(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            logging::log_error("APP", &format!("{:#}", e), None);
            eprintln!("error: {:#}", e);
            1
        }
    };

    info!(event_type = "app_lifecycle", action = "exiting", code, "Application exiting");
    // Flush the log file before exiting
    drop(guard);
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let prefs_path = cli
        .config
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(default_preferences_path);
    let kind = ScriptKind::python();

    match cli.command {
        Some(Command::Tree { path }) => {
            for entry in list_children(&expand_path(&path)) {
                println!("{}", entry.name);
            }
            Ok(0)
        }
        Some(Command::Scripts { folder }) => {
            for row in list_scripts(&expand_path(&folder), &kind).rows(&kind) {
                println!("{}", row.label);
            }
            Ok(0)
        }
        Some(Command::Run { script }) => run_once(prefs_path, kind, expand_path(&script)),
        None => run_interactive(prefs_path, kind, cli.folder.as_deref().map(expand_path)),
    }
}

/// UI loop: stdin commands and worker events in, rendered changes out
fn run_interactive(prefs_path: PathBuf, kind: ScriptKind, folder: Option<PathBuf>) -> Result<i32> {
    let (tx, rx) = async_channel::bounded::<AppEvent>(DEFAULT_EVENT_CHANNEL_CAPACITY);
    stdin_commands::start_stdin_listener(tx.clone()).context("Failed to start stdin listener")?;

    let mut launcher = Launcher::new(
        tx,
        LauncherOptions {
            prefs_path,
            kind,
            tree_roots: None,
            initial_folder: folder,
            picker: None,
        },
    );

    let stdout = io::stdout();
    let color = stdout.is_terminal();
    let mut view = TerminalView::new(stdout.lock(), color);
    view.render(&mut launcher)?;

    while !launcher.should_exit() {
        let Ok(event) = rx.recv_blocking() else {
            break;
        };
        launcher.handle_event(event);
        // Apply whatever else is queued before redrawing
        while !launcher.should_exit() {
            match rx.try_recv() {
                Ok(event) => launcher.handle_event(event),
                Err(_) => break,
            }
        }
        view.render(&mut launcher)?;
    }

    launcher.shutdown();
    view.render(&mut launcher)?;
    Ok(0)
}

/// Run a single script to completion
fn run_once(prefs_path: PathBuf, kind: ScriptKind, script: PathBuf) -> Result<i32> {
    if !script.is_file() {
        bail!("Script not found: {}", script.display());
    }
    let prefs = load_preferences(&prefs_path);

    let (tx, rx) = async_channel::bounded::<WorkerEvent>(DEFAULT_EVENT_CHANNEL_CAPACITY);
    let executor = ScriptExecutor::new(tx, ProcessRegistry::new(), kind, Arc::new(TerminalPicker));
    executor.launch(&script, prefs.interpreter_path())?;

    println!("=== Executing {} ===", file_label(&script));
    println!();

    loop {
        match rx.recv_blocking().context("Script worker disconnected")? {
            WorkerEvent::Output { line, .. } => println!("{}", line),
            WorkerEvent::Exited { code, .. } => {
                println!();
                println!("=== Terminated (code: {}) ===", code);
                return Ok(code);
            }
            WorkerEvent::Failed { message, .. } => {
                eprintln!();
                eprintln!("❌ Error: {}", message);
                return Ok(1);
            }
            WorkerEvent::InterpreterResolved { path } => {
                let value = path.display().to_string();
                update_preferences(&prefs_path, |p| p.python_path = Some(value)).warn_on_err();
            }
            WorkerEvent::InterpreterNeeded { .. } | WorkerEvent::InterpreterChecked { .. } => {}
        }
    }
}

/// Asks for the interpreter location on the terminal
struct TerminalPicker;

impl InterpreterPicker for TerminalPicker {
    fn pick(&self, kind: &ScriptKind) -> Option<PathBuf> {
        eprint!(
            "{} interpreter was not found automatically.\nPath to the interpreter (empty to cancel): ",
            kind.label
        );
        io::stderr().flush().ok()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        let line = line.trim();
        if line.is_empty() {
            None
        } else {
            Some(expand_path(line))
        }
    }
}
