//! Easy Launcher - browse folders, pick a script, run it and watch its output
//!
//! This library holds the launcher core: the lazy directory tree, script
//! listing, the execution manager with its process registry, preferences,
//! and the `Launcher` controller that a front-end drives.

pub mod app;
pub mod config;
pub mod console;
pub mod error;
pub mod executor;
pub mod file_tree;
pub mod logging;
pub mod process_manager;
pub mod scripts;
pub mod stdin_commands;
pub mod theme;

// Headless terminal front-end
pub mod view;
