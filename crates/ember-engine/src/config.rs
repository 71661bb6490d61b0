//! Engine configuration file.
//!
//! `EngineConfig` aggregates the plain config structs of the subsystems
//! (`RuntimeConfig`, `GpuInit`, `LoggingConfig`) behind one JSON document.
//! Every section is optional; missing fields keep their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use winit::dpi::LogicalSize;

use crate::gfx::wgpu_backend::GpuInit;
use crate::logging::LoggingConfig;
use crate::scene::Camera;
use crate::window::RuntimeConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSection {
    pub title: String,
    pub width: f64,
    pub height: f64,
    /// Confine and hide the cursor while the window is focused.
    pub grab_cursor: bool,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            title: "ember".to_owned(),
            width: 1280.0,
            height: 720.0,
            grab_cursor: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsSection {
    pub vsync: bool,
    pub prefer_srgb: bool,
}

impl Default for GraphicsSection {
    fn default() -> Self {
        Self {
            vsync: true,
            prefer_srgb: true,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `env_logger` filter; `RUST_LOG` is used when absent.
    pub filter: Option<String>,
    pub color: ColorMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSection {
    pub fov_degrees: f32,
    pub move_speed: f32,
    pub sensitivity: f32,
}

impl Default for CameraSection {
    fn default() -> Self {
        let camera = Camera::default();
        Self {
            fov_degrees: camera.fov_y.to_degrees(),
            move_speed: camera.move_speed,
            sensitivity: camera.sensitivity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowSection,
    pub graphics: GraphicsSection,
    pub logging: LoggingSection,
    pub camera: CameraSection,
    pub assets_root: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: WindowSection::default(),
            graphics: GraphicsSection::default(),
            logging: LoggingSection::default(),
            camera: CameraSection::default(),
            assets_root: PathBuf::from("res"),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, falling back to defaults when it is missing or invalid.
    ///
    /// Runs before the logger exists, so problems go to stderr.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(err) => {
                eprintln!("{err}; using default configuration");
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            title: self.window.title.clone(),
            initial_size: LogicalSize::new(self.window.width, self.window.height),
            grab_cursor: self.window.grab_cursor,
        }
    }

    pub fn gpu_init(&self) -> GpuInit {
        GpuInit {
            prefer_srgb: self.graphics.prefer_srgb,
            present_mode: if self.graphics.vsync {
                wgpu::PresentMode::Fifo
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            ..GpuInit::default()
        }
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            filter: self.logging.filter.clone(),
            write_style: match self.logging.color {
                ColorMode::Auto => env_logger::WriteStyle::Auto,
                ColorMode::Always => env_logger::WriteStyle::Always,
                ColorMode::Never => env_logger::WriteStyle::Never,
            },
            ..LoggingConfig::default()
        }
    }

    pub fn apply_to_camera(&self, camera: &mut Camera) {
        camera.fov_y = self.camera.fov_degrees.to_radians();
        camera.move_speed = self.camera.move_speed;
        camera.sensitivity = self.camera.sensitivity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_preserves_values() {
        let mut config = EngineConfig::default();
        config.window.title = "demo".to_owned();
        config.graphics.vsync = false;
        config.logging.filter = Some("ember_engine=debug".to_owned());
        config.logging.color = ColorMode::Never;

        let parsed: EngineConfig = serde_json::from_str(&config.to_json()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_documents_keep_defaults() {
        let parsed: EngineConfig =
            serde_json::from_str(r#"{ "window": { "title": "x" }, "logging": { "color": "always" } }"#)
                .unwrap();
        assert_eq!(parsed.window.title, "x");
        assert_eq!(parsed.window.width, 1280.0);
        assert_eq!(parsed.logging.color, ColorMode::Always);
        assert_eq!(parsed.camera, CameraSection::default());
    }

    #[test]
    fn derived_configs_follow_sections() {
        let mut config = EngineConfig::default();
        config.graphics.vsync = false;
        config.camera.fov_degrees = 90.0;
        config.camera.move_speed = 2.0;

        assert_eq!(config.gpu_init().present_mode, wgpu::PresentMode::AutoNoVsync);
        assert_eq!(config.runtime_config().initial_size, LogicalSize::new(1280.0, 720.0));

        let mut camera = Camera::default();
        config.apply_to_camera(&mut camera);
        assert!((camera.fov_y - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(camera.move_speed, 2.0);
    }

    #[test]
    fn load_reports_path_on_errors() {
        let dir = std::env::temp_dir().join(format!("ember-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let bad = dir.join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();

        assert!(matches!(EngineConfig::load(&bad), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            EngineConfig::load(dir.join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
        assert_eq!(EngineConfig::load_or_default(dir.join("missing.json")), EngineConfig::default());
        std::fs::remove_dir_all(dir).ok();
    }
}
