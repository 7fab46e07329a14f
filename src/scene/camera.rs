//! Camera for viewing the skybox

use crate::backend::types::{ClipSpace, DEFAULT_CULL_DISTANCE_FAR, DEFAULT_CULL_DISTANCE_NEAR};
use glam::{Mat4, Vec3};

/// Perspective projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y: std::f32::consts::FRAC_PI_4, // 45 degrees
            aspect: 16.0 / 9.0,
            near: DEFAULT_CULL_DISTANCE_NEAR,
            far: DEFAULT_CULL_DISTANCE_FAR,
        }
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    /// Projection matrix in the depth convention of `clip`
    pub fn matrix(&self, clip: ClipSpace) -> Mat4 {
        clip.perspective(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }
}

/// Camera for viewing the scene
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(1.0, 1.0, 1.0),
            target: Vec3::new(4.0, 1.0, 4.0),
            up: Vec3::Y,
            projection: Projection::default(),
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            projection: Projection::default(),
        }
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get the projection matrix for a backend's clip space
    pub fn projection_matrix(&self, clip: ClipSpace) -> Mat4 {
        self.projection.matrix(clip)
    }

    /// Turn the look direction around the up axis, keeping the position
    pub fn orbit(&mut self, angle_radians: f32) {
        let rotation = Mat4::from_axis_angle(self.up.normalize(), angle_radians);
        let offset = self.target - self.position;
        self.target = self.position + rotation.transform_vector3(offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_projection_uses_cull_distances() {
        let p = Projection::default();
        assert_eq!(p.near, DEFAULT_CULL_DISTANCE_NEAR);
        assert_eq!(p.far, DEFAULT_CULL_DISTANCE_FAR);
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -2.0));
        camera.orbit(std::f32::consts::FRAC_PI_2);

        assert_eq!(camera.position, Vec3::ZERO);
        assert!((camera.target.length() - 2.0).abs() < 1e-5);
        assert!((camera.target - Vec3::new(-2.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_projection_depends_on_clip_space() {
        let camera = Camera::default();
        assert_ne!(
            camera.projection_matrix(ClipSpace::OpenGl),
            camera.projection_matrix(ClipSpace::ZeroToOneTopDown)
        );
    }
}
