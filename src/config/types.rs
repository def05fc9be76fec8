//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::DEFAULT_DARK_MODE;

/// User preferences persisted between sessions
///
/// Every field is optional on disk; missing keys fall back to defaults.
/// Keys written by other versions are kept in `extra` so a save never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Cached interpreter executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_path: Option<String>,
    /// Dark theme flag (default: false)
    #[serde(default = "default_dark_mode")]
    pub dark_mode: bool,
    /// Folder to reopen at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_folder: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_dark_mode() -> bool {
    DEFAULT_DARK_MODE
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            python_path: None,
            dark_mode: DEFAULT_DARK_MODE,
            last_folder: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl Preferences {
    /// Cached interpreter as a path, if one was saved
    pub fn interpreter_path(&self) -> Option<PathBuf> {
        self.python_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Last opened folder as a path, if one was saved
    pub fn last_folder_path(&self) -> Option<PathBuf> {
        self.last_folder
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}
