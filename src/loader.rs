//! Two-stage asset loading: material library first, then geometry bound to it.
//!
//! ```text
//! Idle -> LoadingMaterials -> LoadingGeometry -> Normalizing -> Displayed
//!               |                    |
//!               +-> Failed(Material) +-> Failed(Geometry)
//! ```
//!
//! A failed load is terminal; there is no retry.

use std::borrow::Cow;
use std::fmt;

use anyhow::Context;
use log::{error, info, warn};
use thiserror::Error;

use crate::config::ViewerConfig;
use crate::model::{Material, Mesh, Model, Texture};
use crate::mtl::{load_mtl_from_str, MaterialLibrary};
use crate::obj::{load_obj_from_str, ObjModel};
use crate::source::{AssetSource, LoadProgress};
use crate::status::StatusDisplay;

/// Shown while geometry streams in and the total size is unknown.
pub const LOADING_MESSAGE: &str = "Loading model...";
pub const MATERIAL_FAILURE_MESSAGE: &str = "Failed to load materials, check the file path.";
pub const GEOMETRY_FAILURE_MESSAGE: &str =
    "Failed to load model, check the console log and local server setup.";

/// Status text for a geometry progress report.
pub fn progress_message(progress: &LoadProgress) -> String {
    match progress.percent() {
        Some(percent) => format!("{LOADING_MESSAGE} {percent}%"),
        None => LOADING_MESSAGE.to_string(),
    }
}

/// Which fetch a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Material,
    Geometry,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Material => f.write_str("material"),
            Self::Geometry => f.write_str("geometry"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    LoadingMaterials,
    LoadingGeometry,
    Normalizing,
    Displayed,
    Failed(LoadStage),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load materials from {path}")]
    Material {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to load geometry from {path}")]
    Geometry {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

impl LoadError {
    pub fn stage(&self) -> LoadStage {
        match self {
            Self::Material { .. } => LoadStage::Material,
            Self::Geometry { .. } => LoadStage::Geometry,
        }
    }

    /// Message for the status display.
    pub fn status_message(&self) -> &'static str {
        match self.stage() {
            LoadStage::Material => MATERIAL_FAILURE_MESSAGE,
            LoadStage::Geometry => GEOMETRY_FAILURE_MESSAGE,
        }
    }
}

/// Drives one load attempt for the configured model.
pub struct AssetLoader<S> {
    source: S,
    config: ViewerConfig,
    state: LoadState,
}

impl<S: AssetSource> AssetLoader<S> {
    pub fn new(source: S, config: ViewerConfig) -> Self {
        Self {
            source,
            config,
            state: LoadState::Idle,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs the whole sequence and hands the normalized model to `install`.
    ///
    /// On success the status display is hidden after `install` returns; on
    /// failure the error is logged and a stage specific message is shown.
    pub async fn load_into<D, F>(&mut self, status: &D, install: F) -> Result<(), LoadError>
    where
        D: StatusDisplay + ?Sized,
        F: FnOnce(Model),
    {
        match self.load(status).await {
            Ok(model) => {
                install(model);
                status.hide();
                self.state = LoadState::Displayed;
                Ok(())
            }
            Err(err) => {
                error!("{} load failed: {}", err.stage(), err_chain(&err));
                status.show_text(err.status_message());
                Err(err)
            }
        }
    }

    /// Loads materials and geometry and returns the normalized model.
    ///
    /// Leaves the loader in `Normalizing` on success so the caller can insert
    /// the model, or in `Failed` on error.
    pub async fn load<D>(&mut self, status: &D) -> Result<Model, LoadError>
    where
        D: StatusDisplay + ?Sized,
    {
        if self.state != LoadState::Idle {
            warn!("asset loader started twice; ignoring state {:?}", self.state);
        }

        self.state = LoadState::LoadingMaterials;
        let materials = match self.load_materials().await {
            Ok(materials) => materials,
            Err(err) => {
                self.state = LoadState::Failed(LoadStage::Material);
                return Err(err);
            }
        };

        self.state = LoadState::LoadingGeometry;
        let names: Vec<String> = materials.iter().map(|m| m.name.clone()).collect();
        let geometry = match self.load_geometry(status, &names).await {
            Ok(geometry) => geometry,
            Err(err) => {
                self.state = LoadState::Failed(LoadStage::Geometry);
                return Err(err);
            }
        };

        self.state = LoadState::Normalizing;
        let mut model = assemble_model(&self.config.geometry_file, geometry, materials);
        let factor = model.normalize(self.config.target_size);
        info!(
            "loaded {} ({} meshes, {} materials), scale factor {factor:.4}",
            model.name,
            model.meshes.len(),
            model.materials.len()
        );
        Ok(model)
    }

    async fn load_materials(&self) -> Result<Vec<Material>, LoadError> {
        let path = self.config.material_path();
        let library = self
            .fetch_text(&path, &mut |_| {})
            .await
            .and_then(|text| load_mtl_from_str(&text).context("invalid MTL data"))
            .map_err(|source| LoadError::Material {
                path: path.clone(),
                source,
            })?;
        Ok(self.preload(&library).await)
    }

    /// Resolves every material's diffuse texture. Texture failures are not
    /// fatal; the material keeps its flat color.
    async fn preload(&self, library: &MaterialLibrary) -> Vec<Material> {
        let mut materials = Vec::with_capacity(library.materials.len());
        for def in &library.materials {
            let map = match def.diffuse_map.as_deref() {
                Some(file) => self.load_texture(file).await,
                None => None,
            };
            materials.push(Material {
                name: def.name.clone(),
                color: def.diffuse,
                specular: def.specular,
                shininess: def.shininess,
                opacity: def.opacity,
                map,
            });
        }
        materials
    }

    async fn load_texture(&self, file: &str) -> Option<Texture> {
        let path = self.config.resolve(file);
        let result = match self.source.fetch(&path, &mut |_| {}).await {
            Ok(bytes) => Texture::decode(file, &bytes),
            Err(err) => Err(err),
        };
        match result {
            Ok(texture) => Some(texture),
            Err(err) => {
                warn!("texture {path} unavailable: {err:#}");
                None
            }
        }
    }

    async fn load_geometry<D>(
        &self,
        status: &D,
        materials: &[String],
    ) -> Result<ObjModel, LoadError>
    where
        D: StatusDisplay + ?Sized,
    {
        let path = self.config.geometry_path();
        let mut report = |progress: LoadProgress| status.show_text(&progress_message(&progress));
        self.fetch_text(&path, &mut report)
            .await
            .and_then(|text| load_obj_from_str(&text, materials).context("invalid OBJ data"))
            .map_err(|source| LoadError::Geometry {
                path: path.clone(),
                source,
            })
    }

    /// Fetches a text asset. Invalid UTF-8 sequences become U+FFFD.
    async fn fetch_text(
        &self,
        path: &str,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> anyhow::Result<String> {
        let bytes = self.source.fetch(path, progress).await?;
        Ok(decode_text(path, &bytes).into_owned())
    }
}

fn decode_text<'a>(path: &str, bytes: &'a [u8]) -> Cow<'a, str> {
    let text = String::from_utf8_lossy(bytes);
    if let Cow::Owned(_) = text {
        warn!("{path} is not valid UTF-8, undecodable bytes replaced");
    }
    text
}

fn err_chain(err: &LoadError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Binds parsed geometry to the preloaded materials.
///
/// Meshes whose `usemtl` names no library material (or that have none) share
/// a default material appended after the library's materials.
fn assemble_model(name: &str, geometry: ObjModel, mut materials: Vec<Material>) -> Model {
    let mut default_index = None;
    let mut meshes = Vec::with_capacity(geometry.meshes.len());

    for obj_mesh in geometry.meshes {
        let found = obj_mesh
            .material
            .as_deref()
            .and_then(|wanted| materials.iter().position(|m| m.name == wanted));
        let material = match found {
            Some(index) => index,
            None => {
                warn!("mesh {} has no known material", obj_mesh.name);
                *default_index.get_or_insert_with(|| {
                    materials.push(Material::default());
                    materials.len() - 1
                })
            }
        };
        meshes.push(Mesh {
            name: obj_mesh.name,
            geometry: obj_mesh.geometry,
            material,
            cast_shadow: false,
            receive_shadow: false,
        });
    }

    Model {
        name: name.to_string(),
        meshes,
        materials,
        ..Model::default()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use parking_lot::Mutex;

    use super::*;
    use crate::model::scale_factor;
    use crate::scene::Scene;
    use crate::source::MemorySource;

    #[derive(Debug, Clone, PartialEq)]
    enum Update {
        Text(String),
        Hidden,
    }

    #[derive(Default)]
    struct RecordingStatus {
        updates: Mutex<Vec<Update>>,
    }

    impl RecordingStatus {
        fn updates(&self) -> Vec<Update> {
            self.updates.lock().clone()
        }

        fn last(&self) -> Option<Update> {
            self.updates.lock().last().cloned()
        }
    }

    impl StatusDisplay for RecordingStatus {
        fn show_text(&self, text: &str) {
            self.updates.lock().push(Update::Text(text.to_string()));
        }

        fn hide(&self) {
            self.updates.lock().push(Update::Hidden);
        }
    }

    const MTL: &str = "newmtl wood\nKd 0.6 0.4 0.2\nnewmtl steel\nKd 0.7 0.7 0.7\nKs 1 1 1\n";

    /// Two boxes whose union spans 20 x 5 x 10, offset away from the origin.
    fn two_box_obj() -> String {
        let mut obj = String::from("mtllib fotou.mtl\n");
        let boxes = [
            (Vec3::new(5.0, 2.0, -3.0), Vec3::new(15.0, 7.0, 7.0), "wood"),
            (Vec3::new(15.0, 2.0, -3.0), Vec3::new(25.0, 4.0, 2.0), "steel"),
        ];
        for (index, (min, max, material)) in boxes.iter().enumerate() {
            let base = index * 8;
            obj.push_str(&format!("o part{index}\nusemtl {material}\n"));
            for corner in 0..8 {
                let x = if corner & 1 == 0 { min.x } else { max.x };
                let y = if corner & 2 == 0 { min.y } else { max.y };
                let z = if corner & 4 == 0 { min.z } else { max.z };
                obj.push_str(&format!("v {x} {y} {z}\n"));
            }
            for face in [
                [1, 2, 4, 3],
                [5, 7, 8, 6],
                [1, 5, 6, 2],
                [3, 4, 8, 7],
                [1, 3, 7, 5],
                [2, 6, 8, 4],
            ] {
                let [a, b, c, d] = face.map(|i| i + base);
                obj.push_str(&format!("f {a} {b} {c} {d}\n"));
            }
        }
        obj
    }

    fn full_source() -> MemorySource {
        MemorySource::new()
            .with_file("./models/fotou.mtl", MTL)
            .with_file("./models/fotou.obj", two_box_obj())
    }

    #[test]
    fn progress_message_formats_percent_or_indeterminate() {
        let known = LoadProgress {
            loaded: 512,
            total: Some(1024),
        };
        assert_eq!(progress_message(&known), "Loading model... 50%");
        let unknown = LoadProgress {
            loaded: 512,
            total: None,
        };
        assert_eq!(progress_message(&unknown), "Loading model...");
        let empty = LoadProgress {
            loaded: 0,
            total: Some(0),
        };
        assert_eq!(progress_message(&empty), "Loading model...");
    }

    #[test]
    fn loads_normalizes_and_displays_model() {
        let mut loader = AssetLoader::new(full_source(), ViewerConfig::default());
        let status = RecordingStatus::default();
        let mut scene = Scene::new();

        pollster::block_on(loader.load_into(&status, |model| {
            scene.insert_model(model).unwrap();
        }))
        .unwrap();

        assert_eq!(loader.state(), LoadState::Displayed);
        assert_eq!(status.last(), Some(Update::Hidden));
        assert!(status
            .updates()
            .contains(&Update::Text("Loading model... 100%".to_string())));

        let model = scene.model().unwrap();
        assert_eq!(model.scale, 0.5);
        assert!(model.bounding_box().center().length() < 1e-5);
        assert!((model.bounding_box().size() - Vec3::new(10.0, 2.5, 5.0)).length() < 1e-5);
        assert_eq!(model.meshes.len(), 2);
        assert!(model
            .meshes
            .iter()
            .all(|mesh| mesh.cast_shadow && mesh.receive_shadow));
        assert_eq!(model.materials[model.meshes[1].material].name, "steel");
        assert_eq!(scale_factor(Vec3::new(20.0, 5.0, 10.0), 10.0), model.scale);
    }

    #[test]
    fn material_failure_never_fetches_geometry() {
        let source = MemorySource::new().with_file("./models/fotou.obj", two_box_obj());
        let mut loader = AssetLoader::new(source, ViewerConfig::default());
        let status = RecordingStatus::default();
        let mut installed = false;

        let err = pollster::block_on(loader.load_into(&status, |_| installed = true)).unwrap_err();

        assert_eq!(err.stage(), LoadStage::Material);
        assert!(!installed);
        assert_eq!(loader.state(), LoadState::Failed(LoadStage::Material));
        assert_eq!(
            status.last(),
            Some(Update::Text(MATERIAL_FAILURE_MESSAGE.to_string()))
        );
        assert_eq!(loader.source().requests(), vec!["./models/fotou.mtl"]);
    }

    #[test]
    fn geometry_failure_reports_geometry_message() {
        let source = MemorySource::new().with_file("./models/fotou.mtl", MTL);
        let mut loader = AssetLoader::new(source, ViewerConfig::default());
        let status = RecordingStatus::default();

        let err = pollster::block_on(loader.load_into(&status, |_| {})).unwrap_err();

        assert_eq!(err.stage(), LoadStage::Geometry);
        assert_eq!(loader.state(), LoadState::Failed(LoadStage::Geometry));
        assert_eq!(
            status.last(),
            Some(Update::Text(GEOMETRY_FAILURE_MESSAGE.to_string()))
        );
        assert_eq!(
            loader.source().requests(),
            vec!["./models/fotou.mtl", "./models/fotou.obj"]
        );
    }

    #[test]
    fn unparsable_geometry_is_a_geometry_failure() {
        let source = MemorySource::new()
            .with_file("./models/fotou.mtl", MTL)
            .with_file("./models/fotou.obj", "# no vertices\n");
        let mut loader = AssetLoader::new(source, ViewerConfig::default());
        let err = pollster::block_on(loader.load(&RecordingStatus::default())).unwrap_err();
        assert!(matches!(err, LoadError::Geometry { .. }));
    }

    #[test]
    fn missing_texture_keeps_flat_material() {
        let mtl = "newmtl painted\nKd 1 0 0\nmap_Kd missing.png\n";
        let source = MemorySource::new()
            .with_file("./models/fotou.mtl", mtl)
            .with_file(
                "./models/fotou.obj",
                "mtllib fotou.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl painted\nf 1 2 3\n",
            );
        let mut loader = AssetLoader::new(source, ViewerConfig::default());
        let model = pollster::block_on(loader.load(&RecordingStatus::default())).unwrap();

        assert_eq!(loader.state(), LoadState::Normalizing);
        assert_eq!(model.materials.len(), 1);
        assert!(model.materials[0].map.is_none());
        assert!(loader
            .source()
            .requests()
            .contains(&"./models/missing.png".to_string()));
    }

    #[test]
    fn unknown_material_falls_back_to_default() {
        let source = MemorySource::new()
            .with_file("./models/fotou.mtl", MTL)
            .with_file(
                "./models/fotou.obj",
                "mtllib fotou.mtl\nv 0 0 0\nv 0 0 0\nv 0 0 0\nusemtl ghost\nf 1 2 3\n",
            );
        let mut loader = AssetLoader::new(source, ViewerConfig::default());
        let model = pollster::block_on(loader.load(&RecordingStatus::default())).unwrap();

        assert_eq!(model.materials.len(), 3);
        assert_eq!(model.meshes[0].material, 2);
        // A single point has no extent, so the fallback factor applies.
        assert_eq!(model.scale, 10.0);
        assert_eq!(model.position, Vec3::ZERO);
    }

    #[test]
    fn non_utf8_material_names_still_load() {
        let mut mtl = b"newmtl ".to_vec();
        mtl.extend_from_slice(&[0xb2, 0xc4, 0xd6, 0xca]);
        mtl.extend_from_slice(b"\nKd 0.5 0.5 0.5\nnewmtl wood\nKd 0.6 0.4 0.2\n");
        let source = MemorySource::new()
            .with_file("./models/fotou.mtl", mtl)
            .with_file(
                "./models/fotou.obj",
                "mtllib fotou.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl wood\nf 1 2 3\n",
            );
        let mut loader = AssetLoader::new(source, ViewerConfig::default());
        let model = pollster::block_on(loader.load(&RecordingStatus::default())).unwrap();

        assert_eq!(model.materials.len(), 2);
        assert!(model.materials[0].name.contains('\u{FFFD}'));
        assert_eq!(model.materials[model.meshes[0].material].name, "wood");
    }

    #[test]
    fn decode_text_replaces_invalid_bytes() {
        assert_eq!(decode_text("a.obj", b"v 1 2 3"), "v 1 2 3");
        assert_eq!(decode_text("a.obj", b"o \xff"), "o \u{FFFD}");
    }
}
