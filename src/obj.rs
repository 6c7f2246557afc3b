use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::{Geometry, VERTEX_STRIDE};

/// Geometry parsed from an OBJ file, split by object and material.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjModel {
    pub meshes: Vec<ObjMesh>,
}

/// Triangles of one object/material pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjMesh {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    pub geometry: Geometry,
}

/// Parses an OBJ file from memory.
///
/// `usemtl` statements are resolved against `materials`, the names of the
/// already loaded library, whenever the file declares an `mtllib`. Faces are
/// triangulated and vertices laid out as `position.xyz`, `normal.xyz`,
/// `uv.xy`. Meshes without faces are dropped.
pub fn load_obj_from_str(data: &str, materials: &[String]) -> Result<ObjModel> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };
    let (models, library) = tobj::load_obj_buf(&mut data.as_bytes(), &options, |path| {
        debug!("binding {} to the preloaded material library", path.display());
        material_table(materials)
    })
    .context("malformed OBJ")?;
    let library = library.context("material library unavailable")?;

    let meshes: Vec<ObjMesh> = models
        .into_iter()
        .filter(|model| !model.mesh.indices.is_empty())
        .map(|model| {
            let material = model
                .mesh
                .material_id
                .and_then(|id| library.get(id))
                .map(|material| material.name.clone());
            ObjMesh {
                name: model.name,
                material,
                geometry: build_geometry(&model.mesh),
            }
        })
        .collect();

    if meshes.is_empty() {
        return Err(anyhow!("OBJ file does not define any faces"));
    }
    Ok(ObjModel { meshes })
}

/// Presents already parsed material names to the OBJ reader.
fn material_table(names: &[String]) -> tobj::MTLLoadResult {
    let materials = names
        .iter()
        .map(|name| tobj::Material {
            name: name.clone(),
            ..Default::default()
        })
        .collect();
    let lookup = names
        .iter()
        .enumerate()
        .map(|(index, name)| (name.clone(), index))
        .collect();
    Ok((materials, lookup))
}

fn build_geometry(mesh: &tobj::Mesh) -> Geometry {
    let vertex_count = mesh.positions.len() / 3;
    // Partial attribute streams cannot be matched to vertices.
    let normals = (mesh.normals.len() == vertex_count * 3).then_some(&mesh.normals);
    let uvs = (mesh.texcoords.len() == vertex_count * 2).then_some(&mesh.texcoords);

    let mut vertices = Vec::with_capacity(vertex_count * VERTEX_STRIDE);
    for i in 0..vertex_count {
        vertices.extend_from_slice(&mesh.positions[i * 3..i * 3 + 3]);
        match normals {
            Some(normals) => vertices.extend_from_slice(&normals[i * 3..i * 3 + 3]),
            None => vertices.extend_from_slice(&[0.0; 3]),
        }
        match uvs {
            Some(uvs) => vertices.extend_from_slice(&uvs[i * 2..i * 2 + 2]),
            None => vertices.extend_from_slice(&[0.0; 2]),
        }
    }

    let mut geometry = Geometry {
        vertices,
        indices: mesh.indices.clone(),
    };
    fill_missing_normals(&mut geometry);
    geometry
}

fn normal_at(vertices: &[f32], index: usize) -> Vec3 {
    let base = index * VERTEX_STRIDE + 3;
    Vec3::from_slice(&vertices[base..base + 3])
}

/// Gives every vertex without a usable normal the average of its faces'
/// normals. Normals read from the file are left alone.
fn fill_missing_normals(geometry: &mut Geometry) {
    let vertex_count = geometry.vertex_count();
    let missing: Vec<bool> = (0..vertex_count)
        .map(|i| normal_at(&geometry.vertices, i).length_squared() <= f32::EPSILON)
        .collect();
    if !missing.contains(&true) {
        return;
    }

    let position = |vertices: &[f32], i: usize| {
        Vec3::from_slice(&vertices[i * VERTEX_STRIDE..i * VERTEX_STRIDE + 3])
    };
    let mut accum = vec![Vec3::ZERO; vertex_count];
    for triangle in geometry.indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let p0 = position(&geometry.vertices, i0);
        let p1 = position(&geometry.vertices, i1);
        let p2 = position(&geometry.vertices, i2);
        let normal = (p1 - p0).cross(p2 - p0);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    for (i, normal) in accum.into_iter().enumerate() {
        if !missing[i] {
            continue;
        }
        let normal = normal.normalize_or_zero();
        let base = i * VERTEX_STRIDE + 3;
        geometry.vertices[base..base + 3].copy_from_slice(&normal.to_array());
    }
}
