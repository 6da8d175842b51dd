use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Write,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::report::WindowKind;

pub const SETTINGS_PATH_ENV: &str = "ROLLCALL_SETTINGS";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SlotKind {
    Theory,
    Lab,
}

/// A selectable session-time label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionTimeOption {
    pub value: String,
    pub label: String,
    pub kind: SlotKind,
}

impl SessionTimeOption {
    fn new(value: &str, kind: SlotKind) -> Self {
        let suffix = match kind {
            SlotKind::Theory => "Theory",
            SlotKind::Lab => "Lab",
        };
        Self {
            value: value.to_string(),
            label: format!("{value} ({suffix})"),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionKeyStrategy {
    /// Millisecond timestamp plus a random suffix.
    TimestampWithNonce,
    /// Millisecond timestamp only, as older deployments wrote keys.
    Timestamp,
}

impl Default for SessionKeyStrategy {
    fn default() -> Self {
        SessionKeyStrategy::TimestampWithNonce
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AttendanceSettings {
    pub session_times: Vec<SessionTimeOption>,
    pub batches: Vec<u32>,
    pub default_window: WindowKind,
    pub key_strategy: SessionKeyStrategy,
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        let theory = [
            "9:00am - 10:00am",
            "10:00am - 11:00am",
            "11:20am - 12:20pm",
            "12:20pm - 1:20pm",
            "2:00pm - 3:00pm",
            "3:00pm - 4:00pm",
        ];
        let lab = ["9:00am - 11:00am", "2:00pm - 4:00pm"];

        Self {
            session_times: theory
                .iter()
                .map(|value| SessionTimeOption::new(value, SlotKind::Theory))
                .chain(lab.iter().map(|value| SessionTimeOption::new(value, SlotKind::Lab)))
                .collect(),
            batches: vec![1, 2, 3],
            default_window: WindowKind::default(),
            key_strategy: SessionKeyStrategy::default(),
        }
    }
}

impl AttendanceSettings {
    pub fn is_known_session_time(&self, value: &str) -> bool {
        self.session_times.is_empty() || self.session_times.iter().any(|opt| opt.value == value)
    }

    pub fn is_known_batch(&self, batch: u32) -> bool {
        self.batches.is_empty() || self.batches.contains(&batch)
    }
}

pub fn settings_path_from_env() -> Option<PathBuf> {
    std::env::var_os(SETTINGS_PATH_ENV).map(PathBuf::from)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AttendanceSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                AttendanceSettings::default()
            })
        } else {
            AttendanceSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Opens the file named by `ROLLCALL_SETTINGS`, or `default_path` when
    /// the variable is unset.
    pub fn from_env_or(default_path: PathBuf) -> Result<Self> {
        Self::new(settings_path_from_env().unwrap_or(default_path))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn attendance(&self) -> AttendanceSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_attendance(&self, settings: AttendanceSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    /// Writes a sibling temp file and renames it over the settings file, so
    /// a crash mid-write never leaves a truncated file behind.
    fn persist(&self, data: &AttendanceSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&temp_path)
                .with_context(|| format!("Failed to create {}", temp_path.display()))?;
            file.write_all(serialized.as_bytes())
                .with_context(|| format!("Failed to write {}", temp_path.display()))?;
            file.sync_all()
                .with_context(|| format!("Failed to sync {}", temp_path.display()))?;
        }

        if let Err(err) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(err).with_context(|| {
                format!("Failed to write settings to {}", self.path.display())
            });
        }
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: AttendanceSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_theory_and_lab_slots() {
        let settings = AttendanceSettings::default();
        assert_eq!(settings.session_times.len(), 8);
        assert_eq!(
            settings
                .session_times
                .iter()
                .filter(|opt| opt.kind == SlotKind::Lab)
                .count(),
            2
        );
        assert_eq!(settings.session_times[0].label, "9:00am - 10:00am (Theory)");
        assert_eq!(settings.batches, vec![1, 2, 3]);
        assert!(settings.is_known_session_time("2:00pm - 4:00pm"));
        assert!(!settings.is_known_session_time("midnight"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults_and_updates_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.attendance(), AttendanceSettings::default());

        let mut updated = store.attendance();
        updated.batches = vec![1, 2];
        updated.default_window = WindowKind::AllTime;
        store.update_attendance(updated.clone()).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.attendance(), updated);
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.attendance(), AttendanceSettings::default());
        assert!(store.reload().is_err());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"batches":[4]}"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().attendance();
        assert_eq!(settings.batches, vec![4]);
        assert_eq!(settings.session_times.len(), 8);
    }

    #[test]
    fn updates_replace_the_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        for batches in [vec![1], vec![1, 2, 3, 4]] {
            let mut updated = store.attendance();
            updated.batches = batches.clone();
            store.update_attendance(updated).unwrap();

            let on_disk: AttendanceSettings =
                serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
            assert_eq!(on_disk.batches, batches);
        }

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("settings.json")]);
    }

    #[test]
    fn settings_path_follows_the_environment() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("fallback.json");
        let chosen = dir.path().join("chosen.json");
        fs::write(&chosen, r#"{"batches":[7]}"#).unwrap();

        std::env::set_var(SETTINGS_PATH_ENV, &chosen);
        assert_eq!(settings_path_from_env(), Some(chosen.clone()));
        let store = SettingsStore::from_env_or(fallback.clone()).unwrap();
        assert_eq!(store.path(), &chosen);
        assert_eq!(store.attendance().batches, vec![7]);

        std::env::remove_var(SETTINGS_PATH_ENV);
        assert_eq!(settings_path_from_env(), None);
        let store = SettingsStore::from_env_or(fallback.clone()).unwrap();
        assert_eq!(store.path(), &fallback);
        assert_eq!(store.attendance(), AttendanceSettings::default());
    }
}
