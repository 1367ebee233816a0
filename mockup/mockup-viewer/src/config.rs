//! Viewer configuration. Every field has a default, so a JSON file only needs the keys it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub surface: SurfaceConfig,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub light: LightConfig,
    /// Surface clear color; with `clear_alpha` 0 the exported background stays transparent.
    pub clear_color: Color,
    pub clear_alpha: f32,
    pub surfaces: SurfaceBindings,
    /// Initial value of the host's tint control.
    pub default_tint: Color,
    pub export_file_name: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            surface: SurfaceConfig::default(),
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            light: LightConfig::default(),
            clear_color: Color::from_hex(0x131316),
            clear_alpha: 0.0,
            surfaces: SurfaceBindings::default(),
            default_tint: Color::WHITE,
            export_file_name: "custom-mug.png".to_string(),
        }
    }
}

/// Logical surface size; the backing resolution is this times the device pixel ratio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self { width: 800, height: 800 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Planes used before any asset is framed.
    pub initial_near: f32,
    pub initial_far: f32,
    /// Camera offset from the model center, in units of model size.
    pub framing_offset: [f32; 3],
    pub near_divisor: f32,
    pub far_multiplier: f32,
    pub max_distance_multiplier: f32,
    /// Bounding diagonals below this are clamped up to it.
    pub minimum_model_size: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 20.0,
            initial_near: 1e-5,
            initial_far: 1e10,
            framing_offset: [-0.2, 0.4, 1.4],
            near_divisor: 100.0,
            far_multiplier: 100.0,
            max_distance_multiplier: 50.0,
            minimum_model_size: 1e-6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub screen_space_panning: bool,
    pub auto_rotate: bool,
    /// 2.0 is one orbit per 30 s.
    pub auto_rotate_speed: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.07,
            rotate_speed: 1.25,
            pan_speed: 1.25,
            zoom_speed: 1.0,
            screen_space_panning: true,
            auto_rotate: true,
            auto_rotate_speed: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub sky: Color,
    pub ground: Color,
    pub intensity: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            sky: Color::WHITE,
            ground: Color::from_hex(0x222222),
            intensity: 1.0,
        }
    }
}

/// Mesh names bound to the two customization channels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceBindings {
    pub decal: String,
    pub tint: String,
}

impl Default for SurfaceBindings {
    fn default() -> Self {
        Self {
            decal: "Mug_Porcelain_PBR001_0".to_string(),
            tint: "Mug_Porcelain_PBR002_0".to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.surface.width == 0 || self.surface.height == 0 {
            return Err(ConfigError::Invalid("surface size must be non-zero".to_string()));
        }
        let fov = self.camera.fov_degrees;
        if !(fov > 0.0 && fov < 180.0) {
            return Err(ConfigError::Invalid(format!("fov_degrees {} outside (0, 180)", fov)));
        }
        if !(self.camera.minimum_model_size > 0.0) {
            return Err(ConfigError::Invalid("minimum_model_size must be positive".to_string()));
        }
        if !(self.camera.near_divisor > 0.0 && self.camera.far_multiplier > 0.0) {
            return Err(ConfigError::Invalid("near_divisor and far_multiplier must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.controls.damping_factor) {
            return Err(ConfigError::Invalid("damping_factor must be within [0, 1]".to_string()));
        }
        if self.export_file_name.is_empty() {
            return Err(ConfigError::Invalid("export_file_name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_product_constants() {
        let c = ViewerConfig::default();
        assert_eq!((c.surface.width, c.surface.height), (800, 800));
        assert_eq!(c.camera.fov_degrees, 20.0);
        assert_eq!(c.controls.damping_factor, 0.07);
        assert_eq!(c.controls.rotate_speed, 1.25);
        assert_eq!(c.surfaces.decal, "Mug_Porcelain_PBR001_0");
        assert_eq!(c.surfaces.tint, "Mug_Porcelain_PBR002_0");
        assert_eq!(c.export_file_name, "custom-mug.png");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let c = ViewerConfig::from_json_str(
            r##"{ "surfaces": { "tint": "Body" }, "light": { "ground": "#000000" } }"##,
        )
        .unwrap();
        assert_eq!(c.surfaces.tint, "Body");
        assert_eq!(c.surfaces.decal, "Mug_Porcelain_PBR001_0");
        assert_eq!(c.light.ground, Color::BLACK);
        assert_eq!(c.light.sky, Color::WHITE);
        assert_eq!(c.camera, CameraConfig::default());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            ViewerConfig::from_json_str(r#"{ "surface": { "width": 0 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ViewerConfig::from_json_str(r#"{ "clear_color": "blue" }"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
