//! In-memory representation of the loaded model and its normalization.
//!
//! A [`Model`] is a flat list of meshes sharing one uniform scale and one
//! translation. Geometry stays in the coordinates of the source file; the
//! transform is applied when computing bounds and when drawing.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Floats per interleaved vertex: `position.xyz`, `normal.xyz`, `uv.xy`.
pub const VERTEX_STRIDE: usize = 8;

/// Axis-aligned bounding box. An empty box has `min > max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    pub fn expand_by_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Extents along each axis; zero for an empty box.
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Midpoint of the box; the origin for an empty box.
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }
}

/// Decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Texture {
    /// Decodes PNG/JPEG/BMP/TGA bytes into RGBA8.
    pub fn decode(name: &str, bytes: &[u8]) -> anyhow::Result<Self> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self {
            name: name.to_string(),
            width: image.width(),
            height: image.height(),
            pixels: image.into_raw(),
        })
    }
}

/// Surface description shared by one or more meshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub color: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub opacity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<Texture>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: Vec3::ONE,
            specular: Vec3::splat(0.067),
            shininess: 30.0,
            opacity: 1.0,
            map: None,
        }
    }
}

/// Interleaved triangle geometry (see [`VERTEX_STRIDE`]).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices
            .chunks_exact(VERTEX_STRIDE)
            .map(|chunk| Vec3::new(chunk[0], chunk[1], chunk[2]))
    }

    pub fn bounding_box(&self) -> Aabb {
        let mut aabb = Aabb::EMPTY;
        for position in self.positions() {
            aabb.expand_by_point(position);
        }
        aabb
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub name: String,
    pub geometry: Geometry,
    /// Index into [`Model::materials`].
    pub material: usize,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

/// The displayed model: meshes, their materials and one shared transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub scale: f32,
    pub position: Vec3,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            name: String::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            scale: 1.0,
            position: Vec3::ZERO,
        }
    }
}

impl Model {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_scale(Vec3::splat(self.scale))
    }

    /// Bounding box in world space, with the current scale and position applied.
    pub fn bounding_box(&self) -> Aabb {
        let local = self
            .meshes
            .iter()
            .map(|mesh| mesh.geometry.bounding_box())
            .fold(Aabb::EMPTY, |acc, aabb| acc.union(&aabb));
        if local.is_empty() {
            return local;
        }
        // Uniform positive scale keeps min/max ordering.
        Aabb::new(
            local.min * self.scale + self.position,
            local.max * self.scale + self.position,
        )
    }

    /// Fits the model into a cube of edge `target_size` centered on the origin.
    ///
    /// Every mesh is flagged to cast and receive shadows. Returns the applied
    /// scale factor.
    pub fn normalize(&mut self, target_size: f32) -> f32 {
        for mesh in &mut self.meshes {
            mesh.cast_shadow = true;
            mesh.receive_shadow = true;
        }

        let size = self.bounding_box().size();
        let factor = scale_factor(size, target_size);
        self.scale = factor;

        let center = self.bounding_box().center();
        self.position -= center;
        factor
    }
}

/// Uniform scale that maps the largest extent of `size` onto `target_size`.
///
/// A degenerate box (all extents zero) is treated as having a largest extent
/// of one.
pub fn scale_factor(size: Vec3, target_size: f32) -> f32 {
    let max_dim = size.max_element();
    let max_dim = if max_dim > 0.0 { max_dim } else { 1.0 };
    target_size / max_dim
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_mesh(min: Vec3, max: Vec3) -> Mesh {
        let mut vertices = Vec::new();
        for corner in [min, max] {
            vertices.extend_from_slice(&[corner.x, corner.y, corner.z, 0.0, 1.0, 0.0, 0.0, 0.0]);
        }
        Mesh {
            name: "box".into(),
            geometry: Geometry {
                vertices,
                indices: vec![0, 1, 0],
            },
            ..Mesh::default()
        }
    }

    #[test]
    fn scale_factor_uses_largest_extent() {
        assert_eq!(scale_factor(Vec3::new(20.0, 5.0, 10.0), 10.0), 0.5);
        assert_eq!(scale_factor(Vec3::new(1.0, 4.0, 2.0), 10.0), 2.5);
    }

    #[test]
    fn scale_factor_falls_back_for_flat_boxes() {
        let factor = scale_factor(Vec3::ZERO, 10.0);
        assert_eq!(factor, 10.0);
        assert!(factor.is_finite());
    }

    #[test]
    fn empty_box_has_zero_size_and_origin_center() {
        assert_eq!(Aabb::EMPTY.size(), Vec3::ZERO);
        assert_eq!(Aabb::EMPTY.center(), Vec3::ZERO);
    }

    #[test]
    fn normalize_centers_and_scales() {
        let mut model = Model {
            meshes: vec![
                box_mesh(Vec3::new(3.0, 1.0, -2.0), Vec3::new(13.0, 6.0, 0.0)),
                box_mesh(Vec3::new(13.0, 1.0, 0.0), Vec3::new(23.0, 3.0, 8.0)),
            ],
            ..Model::default()
        };
        let factor = model.normalize(10.0);
        assert_eq!(factor, 0.5);
        assert_eq!(model.scale, 0.5);

        let aabb = model.bounding_box();
        assert!(aabb.center().length() < 1e-5);
        assert!((aabb.size() - Vec3::new(10.0, 2.5, 5.0)).length() < 1e-5);
        assert!(model
            .meshes
            .iter()
            .all(|mesh| mesh.cast_shadow && mesh.receive_shadow));
    }

    #[test]
    fn model_matrix_applies_scale_then_translation() {
        let model = Model {
            scale: 2.0,
            position: Vec3::new(1.0, 0.0, 0.0),
            ..Model::default()
        };
        let moved = model.matrix().transform_point3(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(moved, Vec3::new(3.0, 2.0, 2.0));
    }
}
