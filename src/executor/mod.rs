//! Script execution module
//!
//! This module handles running scripts as child processes:
//! - Interpreter resolution (cache, `PATH`, install locations, user pick)
//! - Spawning with the script's folder as working directory
//! - Merged stdout/stderr relay to the UI channel
//! - Exit and failure reporting through `WorkerEvent`s

mod interpreter;
mod relay;
mod runner;

pub use interpreter::{
    find_interpreter, is_windowless, resolve_interpreter, validate_interpreter,
    validate_interpreter_with_timeout, InterpreterPicker, NoPicker,
};

pub use relay::{relay_lines, spawn_output_reader};

pub use runner::{exit_code, spawn_script, ScriptExecutor, WorkerEvent};

#[cfg(test)]
#[path = "../executor_tests.rs"]
mod tests;
