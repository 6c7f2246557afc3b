use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

use crate::camera::PerspectiveCamera;
use crate::model::{Material, Model};
use crate::scene::{Color, Scene};

/// Per-frame camera and lighting state, laid out for the shader's uniform block.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GlobalUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub sky_color: [f32; 4],
    pub ground_color: [f32; 4],
    pub hemisphere_up: [f32; 4],
    pub sun_direction: [f32; 4],
    pub sun_color: [f32; 4],
    pub ambient_color: [f32; 4],
}

impl GlobalUniform {
    /// Packs the camera and the scene's light rig. Light colors are converted
    /// to linear space and premultiplied by their intensity.
    pub fn new(scene: &Scene, camera: &PerspectiveCamera) -> Self {
        let lights = scene.lights();
        let hemisphere = &lights.hemisphere;
        let directional = &lights.directional;
        let ambient = &lights.ambient;
        Self {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).into(),
            sky_color: radiance(hemisphere.sky_color, hemisphere.intensity),
            ground_color: radiance(hemisphere.ground_color, hemisphere.intensity),
            hemisphere_up: direction(hemisphere.position),
            // Directional lights aim at the origin.
            sun_direction: direction(directional.position),
            sun_color: radiance(directional.color, directional.intensity),
            ambient_color: radiance(ambient.color, ambient.intensity),
        }
    }
}

fn radiance(color: Color, intensity: f32) -> [f32; 4] {
    (color.to_linear() * intensity).extend(1.0).into()
}

fn direction(position: Vec3) -> [f32; 4] {
    let dir = position.normalize_or_zero();
    let dir = if dir == Vec3::ZERO { Vec3::Y } else { dir };
    dir.extend(0.0).into()
}

/// Model and normal matrices for the displayed model.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
}

impl ObjectUniform {
    pub fn new(model: &Model) -> Self {
        let matrix = model.matrix();
        let normal = Mat3::from_mat4(matrix).inverse().transpose();
        Self {
            model: matrix.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
        }
    }

    pub fn identity() -> Self {
        Self {
            model: Mat4::IDENTITY.to_cols_array_2d(),
            normal: mat3_to_3x4(Mat3::IDENTITY),
        }
    }
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    /// Linear diffuse color with opacity in `w`.
    pub color: [f32; 4],
    /// Linear specular color with shininess in `w`.
    pub specular: [f32; 4],
}

impl MaterialUniform {
    pub fn new(material: &Material) -> Self {
        Self {
            color: Color(material.color)
                .to_linear()
                .extend(material.opacity.clamp(0.0, 1.0))
                .into(),
            specular: Color(material.specular)
                .to_linear()
                .extend(material.shininess.max(1.0))
                .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_pack_the_light_rig() {
        let scene = Scene::new();
        let camera = PerspectiveCamera::new(1.0);
        let globals = GlobalUniform::new(&scene, &camera);

        assert_eq!(globals.hemisphere_up, [0.0, 1.0, 0.0, 0.0]);
        let sun = Vec3::from_slice(&globals.sun_direction[..3]);
        assert!((sun - Vec3::new(10.0, 20.0, 10.0).normalize()).length() < 1e-6);
        assert!((globals.sun_color[0] - 1.2).abs() < 1e-5);
        assert!((globals.ambient_color[1] - 0.4).abs() < 1e-5);
        assert!(globals.ground_color[0] < 0.02);
        assert_eq!(globals.camera_position, [0.0, 5.0, 15.0, 1.0]);
    }

    #[test]
    fn object_uniform_tracks_model_transform() {
        let model = Model {
            scale: 0.5,
            position: Vec3::new(1.0, 2.0, 3.0),
            ..Model::default()
        };
        let uniform = ObjectUniform::new(&model);
        assert_eq!(uniform.model[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(uniform.model[0][0], 0.5);
        assert!((uniform.normal[0][0] - 2.0).abs() < 1e-6);
        assert_eq!(ObjectUniform::identity().normal[1], [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn material_uniform_carries_opacity_and_shininess() {
        let material = Material {
            opacity: 0.25,
            shininess: 0.0,
            ..Material::default()
        };
        let uniform = MaterialUniform::new(&material);
        assert!((uniform.color[0] - 1.0).abs() < 1e-5);
        assert_eq!(uniform.color[3], 0.25);
        assert_eq!(uniform.specular[3], 1.0);
    }
}
