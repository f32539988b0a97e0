//! Camera contract.
//!
//! Projections are expected in reversed-Z form (near plane at depth 1, far
//! at 0). [`CameraSnapshot::perspective`] builds one with an infinite far
//! plane.

use glam::{Mat4, Vec3};

/// Read-only camera accessors. Written only by host input handling.
pub trait CameraSource {
    fn view_matrix(&self) -> Mat4;

    /// Reversed-Z projection matrix.
    fn projection_matrix(&self) -> Mat4;

    /// World-space eye position.
    fn position(&self) -> Vec3;
}

/// Plain camera values captured at frame start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSnapshot {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

impl CameraSnapshot {
    #[must_use]
    pub fn capture(camera: &dyn CameraSource) -> Self {
        Self {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            position: camera.position(),
        }
    }

    /// Right-handed perspective camera looking at `target`.
    #[must_use]
    pub fn perspective(eye: Vec3, target: Vec3, fov_y_radians: f32, aspect: f32, near: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_infinite_reverse_rh(fov_y_radians, aspect, near),
            position: eye,
        }
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl CameraSource for CameraSnapshot {
    fn view_matrix(&self) -> Mat4 {
        self.view
    }

    fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    fn position(&self) -> Vec3 {
        self.position
    }
}
