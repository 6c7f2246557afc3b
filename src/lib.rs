//! Interactive viewer for a single OBJ/MTL model.
//!
//! The crate loads a material library and the geometry bound to it, fits the
//! model into a fixed-size cube at the origin and draws it under a fixed light
//! rig with an orbiting camera. The same [`Viewer`] context runs in the
//! browser (`web`) and in a desktop window (`desktop`); everything below the
//! host layer is plain data and can be exercised headless.

pub mod app;
pub mod camera;
pub mod config;
pub mod controls;
#[cfg(not(target_arch = "wasm32"))]
pub mod desktop;
pub mod input;
pub mod loader;
pub mod model;
pub mod mtl;
pub mod obj;
pub mod render;
pub mod scene;
pub mod source;
pub mod status;
pub mod viewport;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use app::{print_model_summary, Viewer};
pub use camera::PerspectiveCamera;
pub use config::ViewerConfig;
pub use controls::OrbitControls;
pub use input::{InputEvent, InputQueue, MouseButton};
pub use loader::{AssetLoader, LoadError, LoadStage, LoadState};
pub use model::{Aabb, Geometry, Material, Mesh, Model, Texture};
pub use mtl::{load_mtl_from_str, MaterialLibrary};
pub use obj::{load_obj_from_str, ObjModel};
pub use render::{FrameRenderer, Renderer};
pub use scene::{Color, LightRig, Scene};
#[cfg(not(target_arch = "wasm32"))]
pub use source::FsSource;
pub use source::{AssetSource, LoadProgress, MemorySource};
pub use status::{ConsoleStatus, StatusDisplay, StatusLine};
pub use viewport::Viewport;
