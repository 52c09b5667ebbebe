//! # 3D Camera
//!
//! Perspective look-at camera producing matrices for Vulkan clip space.
//!
//! ## Coordinate System
//! Right-handed, Y-up world and view space. The projection flips Y and maps
//! depth to `[0, 1]`, so no extra correction is needed in the shaders.

use crate::foundation::math::{utils, vulkan_perspective, Mat4, Point3, Vec3};

/// Perspective camera looking from `position` towards `target`
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Point the camera is looking at in world space
    pub target: Vec3,

    /// Up vector for camera orientation (typically [0, 1, 0])
    pub up: Vec3,

    /// Vertical field of view in radians
    pub fov: f32,

    /// Aspect ratio (width / height); kept in sync with the swapchain extent
    pub aspect: f32,

    /// Distance to near clipping plane
    pub near: f32,

    /// Distance to far clipping plane
    pub far: f32,
}

impl Camera {
    /// Create a new perspective camera looking at the origin
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Aspect ratio (width / height) of the viewport
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    ///
    /// # Example
    /// ```rust
    /// use render_engine::foundation::math::Vec3;
    /// use render_engine::render::Camera;
    ///
    /// let camera = Camera::perspective(Vec3::new(0.0, 2.0, 5.0), 60.0, 16.0 / 9.0, 0.1, 100.0);
    /// assert_eq!(camera.target, Vec3::zeros());
    /// ```
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        }
    }

    /// Move the camera, keeping the target
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera position updated to: {position:?}");
    }

    /// Point the camera at `target`
    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Update the aspect ratio from a framebuffer size
    ///
    /// A zero height leaves the aspect ratio unchanged.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// World-to-view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(
            &Point3::from(self.position),
            &Point3::from(self.target),
            &self.up,
        )
    }

    /// View-to-clip matrix in Vulkan conventions
    pub fn projection_matrix(&self) -> Mat4 {
        vulkan_perspective(self.fov, self.aspect, self.near, self.far)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(Vec3::new(0.0, 1.5, 5.0), 60.0, 16.0 / 9.0, 0.1, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn viewport_updates_aspect_ratio() {
        let mut camera = Camera::default();
        camera.set_viewport(800, 400);
        assert_relative_eq!(camera.aspect, 2.0);

        camera.set_viewport(800, 0);
        assert_relative_eq!(camera.aspect, 2.0);
    }

    #[test]
    fn target_ends_up_in_front_of_the_camera() {
        let camera = Camera::perspective(Vec3::new(3.0, 0.0, 0.0), 60.0, 1.0, 0.1, 10.0);
        let target = camera.view_matrix().transform_point(&Point3::origin());
        assert_relative_eq!(target, Point3::new(0.0, 0.0, -3.0), epsilon = 1e-5);
    }
}
