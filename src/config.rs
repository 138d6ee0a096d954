use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::pacer::PacingConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "Siskin Engine".to_string(), width: 720, height: 1280, vsync: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacingFileConfig {
    #[serde(default = "PacingFileConfig::default_max_fps")]
    pub max_fps: u32,
    #[serde(default = "PacingFileConfig::default_idle_interval_ms")]
    pub idle_interval_ms: u64,
    #[serde(default = "PacingFileConfig::default_fast_frames_after_update")]
    pub fast_frames_after_update: u32,
    #[serde(default = "PacingFileConfig::default_summary_interval_ms")]
    pub summary_interval_ms: u64,
}

impl PacingFileConfig {
    const fn default_max_fps() -> u32 {
        30
    }

    const fn default_idle_interval_ms() -> u64 {
        1_000
    }

    const fn default_fast_frames_after_update() -> u32 {
        6
    }

    const fn default_summary_interval_ms() -> u64 {
        10_000
    }

    pub fn to_pacing(&self) -> PacingConfig {
        PacingConfig {
            max_fps: self.max_fps.max(1),
            idle_interval: Duration::from_millis(self.idle_interval_ms),
            fast_frames_after_update: self.fast_frames_after_update,
            summary_interval: Duration::from_millis(self.summary_interval_ms),
        }
    }
}

impl Default for PacingFileConfig {
    fn default() -> Self {
        Self {
            max_fps: Self::default_max_fps(),
            idle_interval_ms: Self::default_idle_interval_ms(),
            fast_frames_after_update: Self::default_fast_frames_after_update(),
            summary_interval_ms: Self::default_summary_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub pacing: PacingFileConfig,
    #[serde(default = "AppConfig::default_script")]
    pub script: String,
    #[serde(default = "AppConfig::default_textures")]
    pub textures: Vec<String>,
    #[serde(default = "AppConfig::default_state_file")]
    pub state_file: String,
    #[serde(default = "AppConfig::default_coordinate_scale")]
    pub coordinate_scale: f64,
    #[serde(default = "AppConfig::default_clear_color")]
    pub clear_color: [f64; 3],
}

impl AppConfig {
    fn default_script() -> String {
        "assets/scripts/main.rhai".to_string()
    }

    fn default_textures() -> Vec<String> {
        vec![
            "assets/textures/gems.png".to_string(),
            "assets/textures/tiles.png".to_string(),
            "assets/textures/backdrop.png".to_string(),
        ]
    }

    fn default_state_file() -> String {
        "siskin_state.json".to_string()
    }

    const fn default_coordinate_scale() -> f64 {
        1.0
    }

    const fn default_clear_color() -> [f64; 3] {
        [0.0, 0.25, 0.0]
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(width) = overrides.width {
            self.window.width = width;
        }
        if let Some(height) = overrides.height {
            self.window.height = height;
        }
        if let Some(vsync) = overrides.vsync {
            self.window.vsync = vsync;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            pacing: PacingFileConfig::default(),
            script: Self::default_script(),
            textures: Self::default_textures(),
            state_file: Self::default_state_file(),
            coordinate_scale: Self::default_coordinate_scale(),
            clear_color: Self::default_clear_color(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub vsync: Option<bool>,
}

/// On-disk envelope around the script's opaque save blob. Only the envelope
/// is ours; the blob's contents never get interpreted by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveFile {
    pub state: String,
}

impl SaveFile {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read state file {}", path.display()))?;
        let file = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse state file {}", path.display()))?;
        Ok(file)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string(self).context("Serializing state file")?;
        fs::write(path, text).with_context(|| format!("Failed to write state file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_config_fills_in_defaults() {
        let mut temp = NamedTempFile::new().expect("temp config");
        write!(temp, r#"{{"window":{{"title":"T","width":320,"height":480,"vsync":false}}}}"#)
            .expect("write config");

        let cfg = AppConfig::load(temp.path()).expect("parse");
        assert_eq!(cfg.window.width, 320);
        assert_eq!(cfg.pacing.max_fps, 30);
        assert_eq!(cfg.textures.len(), 3);
        assert_eq!(cfg.coordinate_scale, 1.0);
    }

    #[test]
    fn malformed_config_falls_back_to_defaults() {
        let mut temp = NamedTempFile::new().expect("temp config");
        write!(temp, "{{not json").expect("write config");
        let cfg = AppConfig::load_or_default(temp.path());
        assert_eq!(cfg.window.title, "Siskin Engine");
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(&AppConfigOverrides {
            width: Some(1080),
            height: None,
            vsync: Some(false),
        });
        assert_eq!(cfg.window.width, 1080);
        assert_eq!(cfg.window.height, 1280);
        assert!(!cfg.window.vsync);
    }

    #[test]
    fn save_file_round_trips() {
        let temp = NamedTempFile::new().expect("temp state");
        let file = SaveFile { state: r#"{"score":42}"#.to_string() };
        file.write(temp.path()).expect("write");
        assert_eq!(SaveFile::read(temp.path()).expect("read"), file);
    }
}
