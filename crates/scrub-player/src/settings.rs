use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::media::types::DecodeMode;
use crate::media::writer::ExportCodec;
use crate::player::scrub::ScrubUnit;

/// Persisted player configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSettings {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub decode_mode: DecodeMode,
    #[serde(default)]
    pub scrub_unit: ScrubUnit,
    #[serde(default)]
    pub start_paused: bool,
    #[serde(default = "default_true")]
    pub preview_on_seek: bool,
    #[serde(default = "default_true")]
    pub export_enabled: bool,
    /// Codec for reversed exports. Chosen explicitly, never copied from the source.
    #[serde(default)]
    pub export_codec: ExportCodec,
    #[serde(default = "default_export_suffix")]
    pub export_suffix: String,
    /// End the session once an export finishes.
    #[serde(default = "default_true")]
    pub quit_after_export: bool,
    #[serde(default = "default_max_predecode_secs")]
    pub max_predecode_secs: f64,
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    #[serde(default = "default_window_title")]
    pub window_title: String,
}

fn default_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_export_suffix() -> String {
    "_revers.avi".to_string()
}

fn default_max_predecode_secs() -> f64 {
    60.0
}

fn default_stop_timeout_ms() -> u64 {
    500
}

fn default_window_title() -> String {
    "video player".to_string()
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            decode_mode: DecodeMode::Stream,
            scrub_unit: ScrubUnit::Frames,
            start_paused: false,
            preview_on_seek: default_true(),
            export_enabled: default_true(),
            export_codec: ExportCodec::Rawvideo,
            export_suffix: default_export_suffix(),
            quit_after_export: default_true(),
            max_predecode_secs: default_max_predecode_secs(),
            stop_timeout_ms: default_stop_timeout_ms(),
            window_title: default_window_title(),
        }
    }
}

impl PlayerSettings {
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("scrub-player").join("settings.json")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Failed to parse settings: {e}");
                    Self::default()
                }
            },
            Err(_) => {
                log::debug!("No settings at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self) {
        self.save_to(&Self::config_path());
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create config dir: {e}");
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    log::error!("Failed to write settings: {e}");
                }
            }
            Err(e) => log::error!("Failed to serialize settings: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings() {
        let s = PlayerSettings::default();
        assert_eq!(s.export_suffix, "_revers.avi");
        assert_eq!(s.decode_mode, DecodeMode::Stream);
        assert_eq!(s.scrub_unit, ScrubUnit::Frames);
        assert_eq!(s.export_codec, ExportCodec::Rawvideo);
        assert!(!s.start_paused);
        assert!(s.quit_after_export);
    }

    #[test]
    fn empty_file_matches_default() {
        let parsed: PlayerSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            serde_json::to_value(PlayerSettings::default()).unwrap()
        );
    }

    #[test]
    fn missing_fields_use_defaults() {
        let s: PlayerSettings = serde_json::from_str(r#"{ "decode_mode": "preload" }"#).unwrap();
        assert_eq!(s.decode_mode, DecodeMode::Preload);
        assert_eq!(s.stop_timeout_ms, 500);
        assert!(s.preview_on_seek);
        assert!((s.max_predecode_secs - 60.0).abs() < 1e-9);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut s = PlayerSettings::default();
        s.scrub_unit = ScrubUnit::Percent;
        s.export_codec = ExportCodec::Mjpeg;
        s.save_to(&path);

        let loaded = PlayerSettings::load_from(&path);
        assert_eq!(loaded.scrub_unit, ScrubUnit::Percent);
        assert_eq!(loaded.export_codec, ExportCodec::Mjpeg);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let loaded = PlayerSettings::load_from(&path);
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.export_suffix, "_revers.avi");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = PlayerSettings::load_from(&dir.path().join("absent.json"));
        assert!(loaded.export_enabled);
    }
}
