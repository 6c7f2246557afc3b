use anyhow::{Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Material definition as written in an MTL file, before textures are resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDef {
    pub name: String,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub opacity: f32,
    /// File name of the diffuse texture (`map_Kd`), relative to the asset base path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffuse_map: Option<String>,
}

impl From<tobj::Material> for MaterialDef {
    fn from(material: tobj::Material) -> Self {
        let opacity = material.dissolve.or_else(|| {
            material
                .unknown_param
                .get("Tr")
                .and_then(|value| value.split_whitespace().next())
                .and_then(|value| value.parse::<f32>().ok())
                .map(|transparency| 1.0 - transparency)
        });
        Self {
            diffuse: material.diffuse.map_or(Vec3::ONE, Vec3::from),
            specular: material.specular.map_or(Vec3::splat(0.067), Vec3::from),
            shininess: material.shininess.unwrap_or(30.0),
            opacity: opacity.unwrap_or(1.0),
            diffuse_map: material
                .diffuse_texture
                .as_deref()
                .and_then(texture_file),
            name: material.name,
        }
    }
}

/// All materials declared by one MTL file, in declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterialLibrary {
    pub materials: Vec<MaterialDef>,
}

/// Parses an MTL file from memory.
///
/// Only the diffuse color and map, specular color, shininess and opacity
/// (`d`, or `Tr` as its inverse) are kept.
pub fn load_mtl_from_str(data: &str) -> Result<MaterialLibrary> {
    let (materials, _) = tobj::load_mtl_buf(&mut data.as_bytes()).context("malformed MTL")?;
    Ok(MaterialLibrary {
        materials: materials.into_iter().map(MaterialDef::from).collect(),
    })
}

/// Extracts the file name from a texture statement, skipping option flags
/// such as `-s 1 1 1` or `-bm 0.5`.
fn texture_file(statement: &str) -> Option<String> {
    let tokens: Vec<&str> = statement.split_whitespace().collect();
    let mut index = 0;
    while index < tokens.len() && tokens[index].starts_with('-') {
        let max_args = option_arg_count(tokens[index]);
        index += 1;
        let mut taken = 0;
        while taken < max_args && index + 1 < tokens.len() && is_option_arg(tokens[index]) {
            index += 1;
            taken += 1;
        }
    }
    let file = tokens[index.min(tokens.len())..].join(" ");
    (!file.is_empty()).then_some(file)
}

fn option_arg_count(option: &str) -> usize {
    match option {
        "-o" | "-s" | "-t" => 3,
        "-mm" => 2,
        _ => 1,
    }
}

fn is_option_arg(token: &str) -> bool {
    token.parse::<f32>().is_ok()
        || matches!(token, "on" | "off" | "r" | "g" | "b" | "m" | "l" | "z")
}
