//! Script discovery
//!
//! A `ScriptKind` describes which files count as scripts and how to find and
//! recognize their interpreter. `list_scripts` reads one folder (no recursion)
//! and returns its scripts, or a placeholder when there is nothing to show.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

/// Which files are scripts and what runs them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptKind {
    /// Human name, also used in notices ("Python")
    pub label: String,
    /// File extension without the dot, matched case-sensitively
    pub extension: String,
    /// Executable names searched on PATH, in preference order
    pub interpreter_names: Vec<String>,
    /// Conventional install locations probed after PATH
    pub install_locations: Vec<PathBuf>,
    /// Argument that makes the interpreter print its version
    pub version_flag: String,
    /// Text the version output must contain
    pub version_marker: String,
    /// Extra environment for spawned scripts
    pub env: Vec<(String, String)>,
}

impl ScriptKind {
    /// Python scripts (`.py`)
    pub fn python() -> Self {
        ScriptKind {
            label: "Python".to_string(),
            extension: "py".to_string(),
            // pythonw first: no console window on Windows
            interpreter_names: ["pythonw", "python", "python3"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            install_locations: python_install_locations(),
            version_flag: "--version".to_string(),
            version_marker: "Python".to_string(),
            // Piped stdout is block-buffered by default; the console wants lines as they happen
            env: vec![("PYTHONUNBUFFERED".to_string(), "1".to_string())],
        }
    }

    /// Whether `path` has this kind's extension
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == self.extension)
            .unwrap_or(false)
    }

    /// Placeholder text for a folder without scripts
    pub fn empty_label(&self) -> String {
        format!("(No .{} file in this folder)", self.extension)
    }
}

impl Default for ScriptKind {
    fn default() -> Self {
        Self::python()
    }
}

#[cfg(windows)]
fn python_install_locations() -> Vec<PathBuf> {
    const VERSIONS: [&str; 5] = ["313", "312", "311", "310", "39"];

    let mut dirs: Vec<PathBuf> = Vec::new();
    for v in VERSIONS {
        dirs.push(PathBuf::from(format!("C:\\Python{}", v)));
    }
    for v in VERSIONS {
        dirs.push(PathBuf::from(format!("C:\\Program Files\\Python{}", v)));
    }
    if let Some(local) = dirs::data_local_dir() {
        for v in VERSIONS {
            dirs.push(local.join("Programs").join("Python").join(format!("Python{}", v)));
        }
    }

    // Every pythonw.exe before any python.exe
    ["pythonw.exe", "python.exe"]
        .iter()
        .flat_map(|exe| dirs.iter().map(move |d| d.join(exe)))
        .collect()
}

#[cfg(not(windows))]
fn python_install_locations() -> Vec<PathBuf> {
    let mut locations = vec![
        PathBuf::from("/opt/homebrew/bin/python3"),
        PathBuf::from("/usr/local/bin/python3"),
        PathBuf::from("/usr/bin/python3"),
        PathBuf::from("/bin/python3"),
    ];
    if let Some(home) = dirs::home_dir() {
        locations.insert(0, home.join(".local/bin/python3"));
        locations.insert(0, home.join(".pyenv/shims/python3"));
    }
    locations
}

/// A script file in the listed folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    /// File name including extension
    pub name: String,
    pub path: PathBuf,
}

/// Result of listing a folder's scripts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScriptListing {
    /// At least one script, sorted case-insensitively
    Scripts(Vec<ScriptEntry>),
    /// Folder readable but holds no scripts
    #[default]
    Empty,
    /// Folder could not be read
    AccessDenied,
}

/// How a row in the script list behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// A real, selectable script
    Script,
    /// "No files" marker, not selectable
    Placeholder,
    /// "Access denied" marker, not selectable
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRow {
    pub label: String,
    pub kind: RowKind,
}

impl ScriptRow {
    pub fn is_selectable(&self) -> bool {
        self.kind == RowKind::Script
    }
}

impl ScriptListing {
    pub fn entries(&self) -> &[ScriptEntry] {
        match self {
            ScriptListing::Scripts(entries) => entries,
            _ => &[],
        }
    }

    /// Find a script by file name
    pub fn find(&self, name: &str) -> Option<&ScriptEntry> {
        self.entries().iter().find(|e| e.name == name)
    }

    /// Rows as displayed in the script list
    pub fn rows(&self, kind: &ScriptKind) -> Vec<ScriptRow> {
        match self {
            ScriptListing::Scripts(entries) => entries
                .iter()
                .map(|e| ScriptRow {
                    label: e.name.clone(),
                    kind: RowKind::Script,
                })
                .collect(),
            ScriptListing::Empty => vec![ScriptRow {
                label: kind.empty_label(),
                kind: RowKind::Placeholder,
            }],
            ScriptListing::AccessDenied => vec![ScriptRow {
                label: "(Access denied)".to_string(),
                kind: RowKind::Denied,
            }],
        }
    }
}

/// List the scripts directly inside `folder`
///
/// Only regular files whose extension matches `kind` are returned, sorted
/// case-insensitively by file name.
#[instrument(level = "debug", skip(kind), fields(extension = %kind.extension))]
pub fn list_scripts(folder: &Path, kind: &ScriptKind) -> ScriptListing {
    let read_dir = match std::fs::read_dir(folder) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            debug!(path = %folder.display(), "Permission denied listing scripts");
            return ScriptListing::AccessDenied;
        }
        Err(e) => {
            warn!(error = %e, path = %folder.display(), "Failed to read scripts folder");
            return ScriptListing::Empty;
        }
    };

    let mut scripts: Vec<ScriptEntry> = read_dir
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if !kind.matches(&path) || !path.is_file() {
                return None;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            Some(ScriptEntry { name, path })
        })
        .collect();

    scripts.sort_by_cached_key(|s| s.name.to_lowercase());

    debug!(count = scripts.len(), "Listed scripts");
    if scripts.is_empty() {
        ScriptListing::Empty
    } else {
        ScriptListing::Scripts(scripts)
    }
}

#[cfg(test)]
#[path = "scripts_tests.rs"]
mod tests;
