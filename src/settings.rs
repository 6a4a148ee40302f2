use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::metronome::MetronomeConfig;
use crate::session::{MAX_TARGET_MINUTES, MIN_TARGET_MINUTES};

/// Returns the path to the settings file: `~/.config/cadence-rs/settings.json`
fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("cadence-rs");
    path.push("settings.json");
    path
}

/// Persisted application settings.
///
/// Serialized as JSON to the platform config directory.
/// Fields use `#[serde(default)]` so that adding new settings
/// won't break existing config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    // Session
    pub target_minutes: u32,
    pub volume_percent: u32,

    // Engine
    pub notify_interval_secs: u32,
    pub consumer_failure_threshold: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            target_minutes: 30,
            volume_percent: 50,
            notify_interval_secs: 300,
            consumer_failure_threshold: 2,
        }
    }
}

impl AppSettings {
    /// Load settings from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        Self::load_from(&settings_path())
    }

    /// Save settings to disk as pretty JSON.
    pub fn save(&self) {
        self.save_to(&settings_path());
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings.clamped()
                }
                Err(e) => {
                    log::warn!("Failed to parse settings ({}), using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                log::info!("No settings file found ({}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Failed to create config directory: {}", e);
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    log::warn!("Failed to write settings: {}", e);
                }
            }
            Err(e) => {
                log::warn!("Failed to serialize settings: {}", e);
            }
        }
    }

    /// Pull hand-edited values back into their valid ranges
    pub fn clamped(mut self) -> Self {
        self.target_minutes = self
            .target_minutes
            .clamp(MIN_TARGET_MINUTES, MAX_TARGET_MINUTES);
        self.volume_percent = self.volume_percent.min(100);
        self.consumer_failure_threshold = self.consumer_failure_threshold.max(1);
        self
    }

    /// Engine configuration with the user's overrides applied
    pub fn metronome_config(&self) -> MetronomeConfig {
        MetronomeConfig {
            notify_every_seconds: self.notify_interval_secs,
            failure_threshold: self.consumer_failure_threshold,
            ..MetronomeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("cadence-rs-test-{}-{}", std::process::id(), name));
        path.push("settings.json");
        path
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: AppSettings = serde_json::from_str(r#"{"target_minutes": 12}"#).unwrap();
        assert_eq!(settings.target_minutes, 12);
        assert_eq!(settings.volume_percent, 50);
        assert_eq!(settings.notify_interval_secs, 300);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let settings = AppSettings {
            target_minutes: 0,
            volume_percent: 250,
            notify_interval_secs: 300,
            consumer_failure_threshold: 0,
        }
        .clamped();
        assert_eq!(settings.target_minutes, 1);
        assert_eq!(settings.volume_percent, 100);
        assert_eq!(settings.consumer_failure_threshold, 1);

        let settings = AppSettings {
            target_minutes: 999,
            ..AppSettings::default()
        }
        .clamped();
        assert_eq!(settings.target_minutes, 180);
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch("save");
        let settings = AppSettings {
            target_minutes: 45,
            volume_percent: 70,
            ..AppSettings::default()
        };
        settings.save_to(&path);
        assert_eq!(AppSettings::load_from(&path), settings);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_garbage_file_falls_back_to_defaults() {
        let path = scratch("garbage");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(AppSettings::load_from(&path), AppSettings::default());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_metronome_config_overrides() {
        let settings = AppSettings {
            notify_interval_secs: 60,
            consumer_failure_threshold: 5,
            ..AppSettings::default()
        };
        let config = settings.metronome_config();
        assert_eq!(config.notify_every_seconds, 60);
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.tempo_bpm, 180);
    }
}
