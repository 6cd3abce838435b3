//! Notification settings persistence
//!
//! Settings are owned and mutated by the settings collaborator; this module
//! only loads the last-saved copy from `~/.sipnote/notification_settings.json`
//! and writes updates back. A missing file yields defaults.

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::NotificationSettings;

/// Canonical settings file path (~/.sipnote/notification_settings.json).
pub fn settings_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".sipnote").join("notification_settings.json"))
}

/// Load settings from the canonical path.
pub fn load_settings() -> Result<NotificationSettings, String> {
    load_settings_from(&settings_path()?)
}

/// Load settings from an explicit path. Missing file yields defaults.
pub fn load_settings_from(path: &Path) -> Result<NotificationSettings, String> {
    if !path.exists() {
        return Ok(NotificationSettings::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read settings: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse settings: {}", e))
}

/// Save settings to the canonical path.
pub fn save_settings(settings: &NotificationSettings) -> Result<(), String> {
    save_settings_to(&settings_path()?, settings)
}

/// Save settings to an explicit path, creating parent directories.
pub fn save_settings_to(path: &Path, settings: &NotificationSettings) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings dir: {}", e))?;
        }
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;
    fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NotificationKind, QuietHours};

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_settings_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, NotificationSettings::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("notification_settings.json");

        let mut settings = NotificationSettings::default();
        settings.timezone = "Europe/Paris".to_string();
        settings.quiet_hours = QuietHours {
            enabled: true,
            start: "22:00".to_string(),
            end: "08:00".to_string(),
        };
        settings.types.insert(NotificationKind::QuizReminder, false);

        save_settings_to(&path, &settings).unwrap();
        let loaded = load_settings_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_unparseable_file_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notification_settings.json");
        fs::write(&path, "not json").unwrap();
        assert!(load_settings_from(&path).is_err());
    }
}
