//! Damped orbit controls.
//!
//! The camera orbits `target` in spherical coordinates (radius, theta around
//! +Y, phi down from +Y). Pointer input accumulates rotation and pan deltas;
//! [`OrbitControls::update`] applies a `damping_factor` share of them every
//! frame and decays the remainder, which gives the drag its inertia.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use crate::camera::PerspectiveCamera;
use crate::input::{InputEvent, MouseButton};

pub const DAMPING_FACTOR: f32 = 0.05;

const EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragState {
    None,
    Rotate,
    Dolly,
    Pan,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Spherical {
    radius: f32,
    theta: f32,
    phi: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self::default();
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

/// Rotate/pan/zoom controller for a [`PerspectiveCamera`].
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_rotate: bool,
    pub enable_pan: bool,
    pub enable_zoom: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    viewport: Vec2,
    state: DragState,
    last_pointer: Vec2,
    spherical_delta: Spherical,
    pan_offset: Vec3,
    scale: f32,
}

impl OrbitControls {
    /// Creates controls orbiting the world origin with damping enabled.
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            target: Vec3::ZERO,
            enable_rotate: true,
            enable_pan: true,
            enable_zoom: true,
            enable_damping: true,
            damping_factor: DAMPING_FACTOR,
            rotate_speed: 1.0,
            pan_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            viewport: Vec2::new(viewport_width.max(1) as f32, viewport_height.max(1) as f32),
            state: DragState::None,
            last_pointer: Vec2::ZERO,
            spherical_delta: Spherical::default(),
            pan_offset: Vec3::ZERO,
            scale: 1.0,
        }
    }

    /// Drag distances are measured relative to the viewport size.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = Vec2::new(width.max(1) as f32, height.max(1) as f32);
    }

    pub fn handle_event(&mut self, event: InputEvent, camera: &PerspectiveCamera) {
        match event {
            InputEvent::PointerDown { button, position } => {
                self.state = match button {
                    MouseButton::LEFT if self.enable_rotate => DragState::Rotate,
                    MouseButton::MIDDLE if self.enable_zoom => DragState::Dolly,
                    MouseButton::RIGHT if self.enable_pan => DragState::Pan,
                    _ => DragState::None,
                };
                self.last_pointer = position;
            }
            InputEvent::PointerMove { position } => {
                let delta = position - self.last_pointer;
                self.last_pointer = position;
                match self.state {
                    DragState::Rotate => self.rotate(delta),
                    DragState::Pan => self.pan(delta, camera),
                    DragState::Dolly => self.dolly_drag(delta),
                    DragState::None => {}
                }
            }
            InputEvent::PointerUp { .. } => self.state = DragState::None,
            InputEvent::Wheel { delta_y } => {
                if !self.enable_zoom || delta_y == 0.0 {
                    return;
                }
                if delta_y < 0.0 {
                    self.zoom_in(self.zoom_scale());
                } else {
                    self.zoom_out(self.zoom_scale());
                }
            }
        }
    }

    /// Integrates pending input into the camera. Call once per frame before
    /// rendering. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let previous_position = camera.position;
        let previous_target = self.target;

        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_offset(offset);

        if self.enable_damping {
            spherical.theta += self.spherical_delta.theta * self.damping_factor;
            spherical.phi += self.spherical_delta.phi * self.damping_factor;
            self.target += self.pan_offset * self.damping_factor;
        } else {
            spherical.theta += self.spherical_delta.theta;
            spherical.phi += self.spherical_delta.phi;
            self.target += self.pan_offset;
        }

        // Keep theta bounded and phi strictly inside the poles.
        spherical.theta %= TAU;
        spherical.phi = spherical.phi.clamp(EPS, PI - EPS);
        spherical.radius =
            (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        camera.position = self.target + spherical.to_offset();
        camera.look_at(self.target);

        if self.enable_damping {
            let keep = 1.0 - self.damping_factor;
            self.spherical_delta.theta *= keep;
            self.spherical_delta.phi *= keep;
            self.pan_offset *= keep;
        } else {
            self.spherical_delta = Spherical::default();
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        camera.position.distance_squared(previous_position) > EPS
            || self.target.distance_squared(previous_target) > EPS
    }

    fn rotate(&mut self, delta: Vec2) {
        let delta = delta * self.rotate_speed;
        // A drag across the full viewport height turns the camera once.
        self.spherical_delta.theta -= TAU * delta.x / self.viewport.y;
        self.spherical_delta.phi -= TAU * delta.y / self.viewport.y;
    }

    fn pan(&mut self, delta: Vec2, camera: &PerspectiveCamera) {
        let delta = delta * self.pan_speed;
        let distance = (camera.position - self.target).length();
        // Half the visible height at the target's depth.
        let target_distance = distance * (camera.fov.to_radians() / 2.0).tan();
        let left = 2.0 * delta.x * target_distance / self.viewport.y;
        let up = 2.0 * delta.y * target_distance / self.viewport.y;
        self.pan_offset -= camera.right() * left;
        self.pan_offset += camera.camera_up() * up;
    }

    fn dolly_drag(&mut self, delta: Vec2) {
        if delta.y > 0.0 {
            self.zoom_out(self.zoom_scale());
        } else if delta.y < 0.0 {
            self.zoom_in(self.zoom_scale());
        }
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.zoom_speed)
    }

    fn zoom_in(&mut self, scale: f32) {
        self.scale *= scale;
    }

    fn zoom_out(&mut self, scale: f32) {
        self.scale /= scale;
    }
}
