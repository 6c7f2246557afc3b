use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::model::Model;

/// Background behind the model.
pub const BACKGROUND_COLOR: u32 = 0x222222;

/// sRGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color(pub Vec3);

impl Color {
    pub const WHITE: Self = Self(Vec3::ONE);

    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xff) as f32 / 255.0;
        let g = ((hex >> 8) & 0xff) as f32 / 255.0;
        let b = (hex & 0xff) as f32 / 255.0;
        Self(Vec3::new(r, g, b))
    }

    /// Converts to linear light for shading and clearing sRGB surfaces.
    pub fn to_linear(self) -> Vec3 {
        Vec3::new(
            srgb_to_linear(self.0.x),
            srgb_to_linear(self.0.y),
            srgb_to_linear(self.0.z),
        )
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Sky/ground gradient light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HemisphereLight {
    pub sky_color: Color,
    pub ground_color: Color,
    pub intensity: f32,
    pub position: Vec3,
}

/// Parallel light shining from `position` towards the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

/// The fixed three-light rig.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightRig {
    pub hemisphere: HemisphereLight,
    pub directional: DirectionalLight,
    pub ambient: AmbientLight,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            hemisphere: HemisphereLight {
                sky_color: Color::from_hex(0xffffff),
                ground_color: Color::from_hex(0x222222),
                intensity: 1.0,
                position: Vec3::new(0.0, 20.0, 0.0),
            },
            directional: DirectionalLight {
                color: Color::from_hex(0xffffff),
                intensity: 1.2,
                position: Vec3::new(10.0, 20.0, 10.0),
            },
            ambient: AmbientLight {
                color: Color::from_hex(0xffffff),
                intensity: 0.4,
            },
        }
    }
}

/// Scene root: background, lights and at most one model.
///
/// The rig is fixed at construction; the only mutation is the one-time
/// insertion of the loaded model.
#[derive(Debug, Clone)]
pub struct Scene {
    background: Color,
    lights: LightRig,
    model: Option<Model>,
    revision: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            background: Color::from_hex(BACKGROUND_COLOR),
            lights: LightRig::default(),
            model: None,
            revision: 0,
        }
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn lights(&self) -> &LightRig {
        &self.lights
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// Bumped whenever the scene content changes, so GPU caches can tell
    /// when to upload.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Adds the loaded model to the scene.
    ///
    /// Returns the model back if one is already present; a session shows a
    /// single model.
    pub fn insert_model(&mut self, model: Model) -> Result<(), Model> {
        if self.model.is_some() {
            return Err(model);
        }
        self.model = Some(model);
        self.revision += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_scene_has_fixed_rig_and_no_model() {
        let scene = Scene::new();
        assert!(scene.model().is_none());
        assert_eq!(scene.background(), Color::from_hex(0x222222));
        let lights = scene.lights();
        assert_eq!(lights.hemisphere.intensity, 1.0);
        assert_eq!(lights.hemisphere.position, Vec3::new(0.0, 20.0, 0.0));
        assert_eq!(lights.directional.intensity, 1.2);
        assert_eq!(lights.directional.position, Vec3::new(10.0, 20.0, 10.0));
        assert_eq!(lights.ambient.intensity, 0.4);
    }

    #[test]
    fn hex_colors_split_into_channels() {
        let color = Color::from_hex(0xff8000);
        assert_eq!(color.0, Vec3::new(1.0, 128.0 / 255.0, 0.0));
        assert_eq!(Color::from_hex(0xffffff), Color::WHITE);
        assert!((Color::from_hex(0x222222).to_linear().x - 0.0159).abs() < 1e-3);
    }

    #[test]
    fn only_one_model_is_accepted() {
        let mut scene = Scene::new();
        assert!(scene.insert_model(Model::default()).is_ok());
        assert_eq!(scene.revision(), 1);
        assert!(scene.insert_model(Model::default()).is_err());
        assert_eq!(scene.revision(), 1);
    }
}
