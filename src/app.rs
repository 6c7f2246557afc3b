//! The viewer context: one owned value holding everything a session needs.

use std::sync::Arc;

use anyhow::Result;
use log::warn;

use crate::camera::PerspectiveCamera;
use crate::controls::OrbitControls;
use crate::input::InputQueue;
use crate::model::Model;
use crate::render::FrameRenderer;
use crate::scene::Scene;
use crate::viewport::Viewport;

/// Viewport, scene, camera, controls and renderer of one viewer session.
///
/// Hosts feed size changes through [`Viewer::resize`], pointer input through
/// [`Viewer::input`], and call [`Viewer::frame`] once per display refresh.
pub struct Viewer<R> {
    viewport: Viewport,
    scene: Scene,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    renderer: R,
    input: Arc<InputQueue>,
}

impl<R: FrameRenderer> Viewer<R> {
    pub fn new(width: u32, height: u32, pixel_ratio: f64, mut renderer: R) -> Self {
        let viewport = Viewport::new(width, height, pixel_ratio);
        let scene = Scene::new();
        let camera = PerspectiveCamera::new(viewport.aspect());
        let controls = OrbitControls::new(viewport.width(), viewport.height());
        renderer.set_size(viewport.width(), viewport.height(), viewport.pixel_ratio());
        Self {
            viewport,
            scene,
            camera,
            controls,
            renderer,
            input: Arc::new(InputQueue::new()),
        }
    }

    /// Applies a new container size to the camera, the controls and the
    /// drawing buffer.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.update(width, height);
        let (width, height) = self.viewport.size();
        self.camera.aspect = self.viewport.aspect();
        self.camera.update_projection_matrix();
        self.controls.set_viewport(width, height);
        self.renderer.set_size(width, height, self.viewport.pixel_ratio());
    }

    /// Applies a new device pixel ratio, keeping the logical size.
    pub fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        self.viewport.set_pixel_ratio(pixel_ratio);
        let (width, height) = self.viewport.size();
        self.renderer.set_size(width, height, self.viewport.pixel_ratio());
    }

    /// Adds the loaded model to the scene. A second model is dropped.
    pub fn insert_model(&mut self, model: Model) {
        if let Err(model) = self.scene.insert_model(model) {
            warn!("scene already holds a model, ignoring {:?}", model.name);
        }
    }

    /// Advances the controls by one step, then draws.
    pub fn frame(&mut self) -> Result<()> {
        for event in self.input.drain() {
            self.controls.handle_event(event, &self.camera);
        }
        self.controls.update(&mut self.camera);
        self.renderer.render(&self.scene, &self.camera)
    }

    /// Queue the host pushes pointer events into.
    pub fn input(&self) -> Arc<InputQueue> {
        Arc::clone(&self.input)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

/// Prints the displayed model's meshes, bounds and transform.
pub fn print_model_summary(model: &Model) {
    let bounds = model.bounding_box();
    let size = bounds.size();
    let center = bounds.center();
    println!("Model {}:", model.name);
    println!(
        " - {} meshes, {} materials",
        model.meshes.len(),
        model.materials.len()
    );
    for mesh in &model.meshes {
        let material = model
            .materials
            .get(mesh.material)
            .map_or("<none>", |material| material.name.as_str());
        println!(
            " - mesh {} vertices={} triangles={} material={}",
            mesh.name,
            mesh.geometry.vertex_count(),
            mesh.geometry.indices.len() / 3,
            material
        );
    }
    println!("scale={:.4}", model.scale);
    println!("size=({:.2}, {:.2}, {:.2})", size.x, size.y, size.z);
    println!("center=({:.2}, {:.2}, {:.2})", center.x, center.y, center.z);
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::*;
    use crate::input::{InputEvent, MouseButton};

    #[derive(Default)]
    struct RecordingRenderer {
        sizes: Vec<(u32, u32, f64)>,
        frames: Vec<(Vec3, bool)>,
    }

    impl FrameRenderer for RecordingRenderer {
        fn set_size(&mut self, width: u32, height: u32, pixel_ratio: f64) {
            self.sizes.push((width, height, pixel_ratio));
        }

        fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<()> {
            self.frames.push((camera.position, scene.model().is_some()));
            Ok(())
        }
    }

    fn viewer() -> Viewer<RecordingRenderer> {
        Viewer::new(800, 600, 2.0, RecordingRenderer::default())
    }

    #[test]
    fn construction_sizes_renderer_and_camera() {
        let viewer = viewer();
        assert_eq!(viewer.renderer().sizes, vec![(800, 600, 2.0)]);
        assert!((viewer.camera().aspect - 800.0 / 600.0).abs() < 1e-6);
        assert_eq!(viewer.camera().position, Vec3::new(0.0, 5.0, 15.0));
        assert!(viewer.scene().model().is_none());
    }

    #[test]
    fn empty_scene_still_renders() {
        let mut viewer = viewer();
        viewer.frame().unwrap();
        viewer.frame().unwrap();
        assert_eq!(viewer.renderer().frames.len(), 2);
        assert!(!viewer.renderer().frames[0].1);
    }

    #[test]
    fn resize_updates_aspect_and_drawing_buffer() {
        let mut viewer = viewer();
        viewer.resize(1024, 256);
        assert!((viewer.camera().aspect - 4.0).abs() < 1e-6);
        assert_eq!(viewer.renderer().sizes.last(), Some(&(1024, 256, 2.0)));
        assert_eq!(viewer.viewport().size(), (1024, 256));
    }

    #[test]
    fn zero_size_is_clamped() {
        let mut viewer = viewer();
        viewer.resize(0, 0);
        assert_eq!(viewer.viewport().size(), (1, 1));
        assert!(viewer.camera().aspect.is_finite());
        assert_eq!(viewer.renderer().sizes.last(), Some(&(1, 1, 2.0)));
    }

    #[test]
    fn pixel_ratio_change_keeps_logical_size() {
        let mut viewer = viewer();
        viewer.set_pixel_ratio(1.0);
        assert_eq!(viewer.renderer().sizes.last(), Some(&(800, 600, 1.0)));
        assert_eq!(viewer.viewport().drawing_buffer_size(), (800, 600));
    }

    #[test]
    fn controls_advance_before_render() {
        let mut viewer = viewer();
        viewer.controls_mut().enable_damping = false;
        let input = viewer.input();
        input.push(InputEvent::PointerDown {
            button: MouseButton::LEFT,
            position: Vec2::new(100.0, 100.0),
        });
        input.push(InputEvent::PointerMove {
            position: Vec2::new(250.0, 100.0),
        });
        input.push(InputEvent::PointerUp {
            button: MouseButton::LEFT,
        });

        viewer.frame().unwrap();
        let (rendered_from, _) = viewer.renderer().frames[0];
        assert_ne!(rendered_from, Vec3::new(0.0, 5.0, 15.0));
        assert_eq!(rendered_from, viewer.camera().position);
        assert!(input.is_empty());
    }

    #[test]
    fn only_the_first_model_is_kept() {
        let mut viewer = viewer();
        viewer.insert_model(Model {
            name: "first".into(),
            ..Model::default()
        });
        viewer.insert_model(Model {
            name: "second".into(),
            ..Model::default()
        });
        assert_eq!(viewer.scene().model().map(|m| m.name.as_str()), Some("first"));
        viewer.frame().unwrap();
        assert!(viewer.renderer().frames[0].1);
    }
}
