//! Uniform buffer layouts shared with the GLSL shaders
//!
//! All members are 16-byte aligned vectors or column-major matrices so the
//! `#[repr(C)]` layout matches std140.

use super::camera::Camera;
use crate::foundation::math::{normal_matrix, to_columns, Mat4, Vec3};
use bytemuck::{Pod, Zeroable};

/// Set 0, binding 0: per swapchain image
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUbo {
    /// World to view
    pub view: [[f32; 4]; 4],
    /// View to clip
    pub projection: [[f32; 4]; 4],
    /// World to clip
    pub view_projection: [[f32; 4]; 4],
    /// Eye position in world space, `w` unused
    pub camera_position: [f32; 4],
}

impl CameraUbo {
    /// Snapshot of `camera`
    pub fn from_camera(camera: &Camera) -> Self {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        let eye = camera.position;
        Self {
            view: to_columns(&view),
            projection: to_columns(&projection),
            view_projection: to_columns(&(projection * view)),
            camera_position: [eye.x, eye.y, eye.z, 1.0],
        }
    }
}

/// Set 1, binding 0: per drawable and frame slot
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectUbo {
    /// Object to world
    pub model: [[f32; 4]; 4],
    /// Inverse-transpose of the model's upper 3x3, padded to 4x4
    pub normal_matrix: [[f32; 4]; 4],
}

impl ObjectUbo {
    /// Uniforms for a model matrix
    pub fn from_model(model: &Mat4) -> Self {
        Self {
            model: to_columns(model),
            normal_matrix: to_columns(&normal_matrix(model)),
        }
    }
}

impl Default for ObjectUbo {
    fn default() -> Self {
        Self::from_model(&Mat4::identity())
    }
}

/// Set 1, binding 1: per frame slot
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightingUbo {
    /// Direction the light travels, world space, `w` unused
    pub direction: [f32; 4],
    /// Light color, `w` is intensity
    pub color: [f32; 4],
    /// Ambient color, `w` is intensity
    pub ambient: [f32; 4],
}

impl LightingUbo {
    /// Single directional light plus ambient term
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32, ambient: Vec3, ambient_intensity: f32) -> Self {
        let direction = direction.try_normalize(f32::EPSILON).unwrap_or_else(|| -Vec3::y());
        Self {
            direction: [direction.x, direction.y, direction.z, 0.0],
            color: [color.x, color.y, color.z, intensity],
            ambient: [ambient.x, ambient.y, ambient.z, ambient_intensity],
        }
    }
}

impl Default for LightingUbo {
    fn default() -> Self {
        Self::directional(
            Vec3::new(-0.4, -1.0, -0.6),
            Vec3::new(1.0, 0.97, 0.92),
            1.0,
            Vec3::new(0.6, 0.65, 0.75),
            0.15,
        )
    }
}
