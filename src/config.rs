//! Runtime configuration.
//!
//! Every field has a default so an empty TOML document is a valid config.
//! The defaults reproduce the fixed values the frame driver used to hard-code:
//! a 65° field of view, a purple background and `assets/models` as the model
//! asset directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory `mtllib` names and the startup scene are resolved against.
    pub assets_dir: PathBuf,
    /// Scene file loaded by `Device::startup`, relative to `assets_dir`.
    pub scene: String,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub znear: f32,
    pub zfar: f32,
    /// RGBA background the off-screen targets are cleared to.
    pub clear_colour: [f64; 4],
    pub camera: CameraConfig,
    pub window: WindowConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub eye: [f32; 3],
    pub target: [f32; 3],
    pub up: [f32; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets").join("models"),
            scene: "scene.obj".to_string(),
            fov: 65.0,
            znear: 0.1,
            zfar: 100.0,
            clear_colour: [0.2, 0.0, 0.2, 1.0],
            camera: CameraConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: [0.0, 0.0, 2.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "sgl-scene".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::file_open(path, e))?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn clear_colour(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_colour;
        wgpu::Color { r, g, b, a }
    }

    pub fn scene_path(&self) -> PathBuf {
        self.assets_dir.join(&self.scene)
    }
}
