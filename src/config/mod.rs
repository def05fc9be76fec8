//! Configuration module - persisted user preferences
//!
//! This module provides functionality for:
//! - Loading preferences from `EasyLauncher.config.json` beside the executable
//! - Default values for all settings
//! - Read-modify-write saving that keeps keys this version doesn't know about
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `types` - The `Preferences` record
//! - `loader` - File system loading and saving

mod defaults;
mod loader;
mod types;

pub use defaults::{
    DEFAULT_CONSOLE_MAX_LINES, DEFAULT_DARK_MODE, DEFAULT_EVENT_CHANNEL_CAPACITY,
    DEFAULT_PROBE_TIMEOUT_MS, PREFERENCES_FILE_NAME,
};

pub use types::Preferences;

pub use loader::{
    default_preferences_path, load_preferences, save_preferences, try_load_preferences,
    update_preferences,
};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
