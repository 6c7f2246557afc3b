use serde::{Deserialize, Serialize};

/// Where the viewer finds its model and how large it should appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Directory (or URL prefix) that holds the material, geometry and texture files.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_material_file")]
    pub material_file: String,
    #[serde(default = "default_geometry_file")]
    pub geometry_file: String,
    /// Length of the largest bounding box extent after normalization.
    #[serde(default = "default_target_size")]
    pub target_size: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            material_file: default_material_file(),
            geometry_file: default_geometry_file(),
            target_size: default_target_size(),
        }
    }
}

impl ViewerConfig {
    /// Returns a config that reads assets from `base_path` instead of the default directory.
    pub fn with_base_path(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    /// Joins an asset file name onto the base path.
    ///
    /// The base path is used as a plain prefix, with a separator inserted when missing.
    pub fn resolve(&self, name: &str) -> String {
        if self.base_path.is_empty() || self.base_path.ends_with('/') {
            format!("{}{name}", self.base_path)
        } else {
            format!("{}/{name}", self.base_path)
        }
    }

    pub fn material_path(&self) -> String {
        self.resolve(&self.material_file)
    }

    pub fn geometry_path(&self) -> String {
        self.resolve(&self.geometry_file)
    }
}

fn default_base_path() -> String {
    "./models/".to_string()
}

fn default_material_file() -> String {
    "fotou.mtl".to_string()
}

fn default_geometry_file() -> String {
    "fotou.obj".to_string()
}

fn default_target_size() -> f32 {
    10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_models_directory() {
        let config = ViewerConfig::default();
        assert_eq!(config.material_path(), "./models/fotou.mtl");
        assert_eq!(config.geometry_path(), "./models/fotou.obj");
        assert_eq!(config.target_size, 10.0);
    }

    #[test]
    fn resolve_inserts_missing_separator() {
        let config = ViewerConfig::with_base_path("/srv/assets");
        assert_eq!(config.resolve("wood.png"), "/srv/assets/wood.png");
        let config = ViewerConfig::with_base_path("");
        assert_eq!(config.resolve("wood.png"), "wood.png");
    }
}
