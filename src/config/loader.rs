//! Preferences loading and saving
//!
//! The file is a flat JSON object. Saves are read-modify-write and not atomic:
//! whoever writes last wins.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use super::defaults::PREFERENCES_FILE_NAME;
use super::types::Preferences;

/// Preferences path beside the running executable
///
/// Falls back to the current directory when the executable path is unknown.
pub fn default_preferences_path() -> PathBuf {
    let dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    dir.join(PREFERENCES_FILE_NAME)
}

/// Load preferences, returning `None` when the file doesn't exist
pub fn try_load_preferences(path: &Path) -> Result<Option<Preferences>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read preferences from {}", path.display()))?;
    let prefs = serde_json::from_str::<Preferences>(&contents)
        .with_context(|| format!("Failed to parse preferences in {}", path.display()))?;
    Ok(Some(prefs))
}

/// Load preferences from `path`
///
/// Returns `Preferences::default()` if the file is missing or unreadable.
#[instrument(name = "load_preferences", skip_all, fields(path = %path.display()))]
pub fn load_preferences(path: &Path) -> Preferences {
    match try_load_preferences(path) {
        Ok(Some(prefs)) => {
            info!(
                dark_mode = prefs.dark_mode,
                has_interpreter = prefs.python_path.is_some(),
                has_last_folder = prefs.last_folder.is_some(),
                "Loaded preferences"
            );
            prefs
        }
        Ok(None) => {
            info!("Preferences file not found, using defaults");
            Preferences::default()
        }
        Err(e) => {
            warn!(error = ?e, "Failed to load preferences, using defaults");
            Preferences::default()
        }
    }
}

/// Overwrite the preferences file with `prefs`
pub fn save_preferences(path: &Path, prefs: &Preferences) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string(prefs).context("Failed to serialize preferences")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write preferences to {}", path.display()))?;
    debug!(path = %path.display(), "Preferences saved");
    Ok(())
}

/// Read the current file, apply `apply`, and write the result back
///
/// A missing file starts from defaults. An unreadable or corrupt file aborts
/// the save so it isn't clobbered.
pub fn update_preferences<F>(path: &Path, apply: F) -> Result<Preferences>
where
    F: FnOnce(&mut Preferences),
{
    let mut prefs = try_load_preferences(path)?.unwrap_or_default();
    apply(&mut prefs);
    save_preferences(path, &prefs)?;
    Ok(prefs)
}
