use super::*;
use std::fs;
use tempfile::TempDir;

fn prefs_file(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join(PREFERENCES_FILE_NAME)
}

#[test]
fn test_default_preferences() {
    let prefs = Preferences::default();
    assert_eq!(prefs.python_path, None);
    assert!(!prefs.dark_mode);
    assert_eq!(prefs.last_folder, None);
    assert!(prefs.extra.is_empty());
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let prefs = load_preferences(&prefs_file(&dir));
    assert_eq!(prefs, Preferences::default());
}

#[test]
fn test_missing_keys_yield_defaults() {
    let dir = TempDir::new().unwrap();
    let path = prefs_file(&dir);
    fs::write(&path, r#"{"dark_mode": true}"#).unwrap();

    let prefs = load_preferences(&path);
    assert!(prefs.dark_mode);
    assert_eq!(prefs.interpreter_path(), None);
    assert_eq!(prefs.last_folder_path(), None);
}

#[test]
fn test_corrupt_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let path = prefs_file(&dir);
    fs::write(&path, "{not json").unwrap();

    assert_eq!(load_preferences(&path), Preferences::default());
    assert!(try_load_preferences(&path).is_err());
}

#[test]
fn test_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = prefs_file(&dir);
    let prefs = Preferences {
        python_path: Some("/usr/bin/python3".to_string()),
        dark_mode: true,
        last_folder: Some("/home/user/scripts".to_string()),
        extra: serde_json::Map::new(),
    };

    save_preferences(&path, &prefs).unwrap();
    assert_eq!(load_preferences(&path), prefs);
}

#[test]
fn test_file_uses_flat_snake_case_keys() {
    let dir = TempDir::new().unwrap();
    let path = prefs_file(&dir);
    let prefs = Preferences {
        python_path: Some("/opt/py".to_string()),
        dark_mode: false,
        last_folder: None,
        extra: serde_json::Map::new(),
    };
    save_preferences(&path, &prefs).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["python_path"], "/opt/py");
    assert_eq!(raw["dark_mode"], false);
    assert!(raw.get("last_folder").is_none());
}

#[test]
fn test_update_preserves_other_fields_and_unknown_keys() {
    let dir = TempDir::new().unwrap();
    let path = prefs_file(&dir);
    fs::write(
        &path,
        r#"{"python_path": "/usr/bin/python3", "window": {"w": 1000}}"#,
    )
    .unwrap();

    let updated = update_preferences(&path, |p| p.dark_mode = true).unwrap();
    assert!(updated.dark_mode);

    let reloaded = load_preferences(&path);
    assert_eq!(reloaded.python_path.as_deref(), Some("/usr/bin/python3"));
    assert!(reloaded.dark_mode);
    assert_eq!(reloaded.extra["window"]["w"], 1000);
}

#[test]
fn test_update_creates_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = prefs_file(&dir);

    update_preferences(&path, |p| p.last_folder = Some("/tmp".to_string())).unwrap();
    assert_eq!(
        load_preferences(&path).last_folder_path(),
        Some(std::path::PathBuf::from("/tmp"))
    );
}

#[test]
fn test_update_refuses_to_clobber_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let path = prefs_file(&dir);
    fs::write(&path, "garbage").unwrap();

    assert!(update_preferences(&path, |p| p.dark_mode = true).is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), "garbage");
}

#[test]
fn test_empty_interpreter_path_is_ignored() {
    let prefs = Preferences {
        python_path: Some(String::new()),
        ..Preferences::default()
    };
    assert_eq!(prefs.interpreter_path(), None);
}

#[test]
fn test_default_path_file_name() {
    assert!(default_preferences_path().ends_with(PREFERENCES_FILE_NAME));
}
