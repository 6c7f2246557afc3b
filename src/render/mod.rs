//! Drawing the scene.
//!
//! [`FrameRenderer`] is the seam between the viewer context and the GPU; the
//! wgpu implementation lives in [`gpu`], the shader-facing data in [`common`].

use anyhow::Result;

use crate::camera::PerspectiveCamera;
use crate::scene::Scene;

pub mod common;
mod gpu;

pub use common::{GlobalUniform, MaterialUniform, ObjectUniform};
pub use gpu::Renderer;

/// Draws one frame of a scene through a camera.
pub trait FrameRenderer {
    /// Resizes the drawing buffer. `width` and `height` are logical pixels.
    fn set_size(&mut self, width: u32, height: u32, pixel_ratio: f64);

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<()>;
}
