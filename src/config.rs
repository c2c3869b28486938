//! Viewer configuration, read from TOML. Every field has a default so an
//! empty or missing file is a valid configuration.

use crate::enums::SortBy;
use crate::quad_view::SceneSettings;
use crate::renderer::RenderSettings;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default)]
    pub loading: LoadingConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub assetstore: AssetStoreConfig,
    #[serde(default)]
    pub presets: PresetsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionConfig {
    /// Quiet period before a gesture's shared state is committed
    #[serde(default = "default_flush_debounce_ms")]
    pub flush_debounce_ms: u64,
    /// Render quality, in percent, of passive views during a gesture
    #[serde(default = "default_interactive_quality")]
    pub interactive_quality: u8,
    #[serde(default = "default_animation_frame_interval_ms")]
    pub animation_frame_interval_ms: u64,
    #[serde(default = "default_reset_zoom")]
    pub reset_zoom: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            flush_debounce_ms: default_flush_debounce_ms(),
            interactive_quality: default_interactive_quality(),
            animation_frame_interval_ms: default_animation_frame_interval_ms(),
            reset_zoom: default_reset_zoom(),
        }
    }
}

fn default_flush_debounce_ms() -> u64 {
    300
}

fn default_interactive_quality() -> u8 {
    80
}

fn default_animation_frame_interval_ms() -> u64 {
    50
}

fn default_reset_zoom() -> f64 {
    0.8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadingConfig {
    /// Delay before a selected item is fetched
    #[serde(default = "default_load_debounce_ms")]
    pub load_debounce_ms: u64,
    /// Repeated toggles of one item within this window are ignored
    #[serde(default = "default_selection_guard_ms")]
    pub selection_guard_ms: u64,
    #[serde(default)]
    pub dicom_sort: SortBy,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            load_debounce_ms: default_load_debounce_ms(),
            selection_guard_ms: default_selection_guard_ms(),
            dicom_sort: SortBy::default(),
        }
    }
}

fn default_load_debounce_ms() -> u64 {
    1000
}

fn default_selection_guard_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Preset new volumes get in the 3D view; first catalog entry if unset
    #[serde(default)]
    pub default_preset: Option<String>,
    #[serde(default = "default_true")]
    pub obliques_visible: bool,
    #[serde(default = "default_overlay_opacity")]
    pub overlay_opacity: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            default_preset: None,
            obliques_visible: true,
            overlay_opacity: default_overlay_opacity(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_overlay_opacity() -> f64 {
    0.8
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetStoreConfig {
    /// Root directory of the local asset store
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresetsConfig {
    /// External preset table; the built-in one otherwise
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl ViewerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads `path`, or returns the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = Self::from_toml_str(&content)?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        } else {
            info!(path = %path.display(), "Configuration not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            interactive_quality: self.interaction.interactive_quality.min(100),
            frame_interval: Duration::from_millis(self.interaction.animation_frame_interval_ms),
            reset_zoom: self.interaction.reset_zoom,
        }
    }

    pub fn scene_settings(&self) -> SceneSettings {
        SceneSettings {
            render: self.render_settings(),
            obliques_visible: self.scene.obliques_visible,
            overlay_opacity: self.scene.overlay_opacity.clamp(0.0, 1.0),
            default_preset: self.scene.default_preset.clone(),
        }
    }

    pub fn flush_debounce(&self) -> Duration {
        Duration::from_millis(self.interaction.flush_debounce_ms)
    }

    pub fn load_debounce(&self) -> Duration {
        Duration::from_millis(self.loading.load_debounce_ms)
    }

    pub fn selection_guard(&self) -> Duration {
        Duration::from_millis(self.loading.selection_guard_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = ViewerConfig::from_toml_str("").unwrap();
        assert_eq!(config.interaction.flush_debounce_ms, 300);
        assert_eq!(config.loading.load_debounce_ms, 1000);
        assert_eq!(config.loading.dicom_sort, SortBy::ImagePositionPatient);
        assert!(config.scene.obliques_visible);
        assert_eq!(config.scene.overlay_opacity, 0.8);
        assert!(config.assetstore.root.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = ViewerConfig::from_toml_str(
            r#"
            [interaction]
            flush_debounce_ms = 150

            [scene]
            default_preset = "CT-Bone"
            "#,
        )
        .unwrap();
        assert_eq!(config.flush_debounce(), Duration::from_millis(150));
        assert_eq!(config.interaction.interactive_quality, 80);
        assert_eq!(config.scene_settings().default_preset.as_deref(), Some("CT-Bone"));
    }

    #[test]
    fn test_invalid_value() {
        let result = ViewerConfig::from_toml_str("[interaction]\nflush_debounce_ms = \"soon\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
