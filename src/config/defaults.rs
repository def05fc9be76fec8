//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Preferences file name, stored beside the executable
pub const PREFERENCES_FILE_NAME: &str = "EasyLauncher.config.json";

/// Light theme unless the user turned dark mode on
pub const DEFAULT_DARK_MODE: bool = false;

/// Console scrollback, oldest lines are evicted beyond this
pub const DEFAULT_CONSOLE_MAX_LINES: usize = 5000;

/// How long an interpreter gets to answer the version probe
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5000;

/// Capacity of the worker -> UI event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 4096;
