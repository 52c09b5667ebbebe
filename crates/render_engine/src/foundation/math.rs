//! Math utilities and types
//!
//! nalgebra aliases plus the projection conventions the renderer relies on:
//! right-handed view space, Vulkan clip space with Y pointing down and depth
//! in `[0, 1]`.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,
    /// Rotation quaternion
    pub rotation: Quat,
    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Replace the rotation with one around `axis`
    #[must_use]
    pub fn with_rotation(mut self, axis: &Unit<Vec3>, angle: f32) -> Self {
        self.rotation = Quat::from_axis_angle(axis, angle);
        self
    }

    /// Replace the scale with a uniform one
    #[must_use]
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Convert to a transformation matrix (scale, then rotate, then translate)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Perspective projection into Vulkan clip space
///
/// Depth maps `near` to 0 and `far` to 1, and clip-space Y points down.
pub fn vulkan_perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let focal = 1.0 / (fov_y * 0.5).tan();

    let mut result = Mat4::zeros();
    result[(0, 0)] = focal / aspect;
    result[(1, 1)] = -focal;
    result[(2, 2)] = far / (near - far);
    result[(2, 3)] = near * far / (near - far);
    result[(3, 2)] = -1.0;
    result
}

/// Inverse-transpose of the upper 3x3, padded to a 4x4 for std140 uniforms
pub fn normal_matrix(model: &Mat4) -> Mat4 {
    let linear: Mat3 = model.fixed_view::<3, 3>(0, 0).into_owned();
    let inverse_transpose = linear.try_inverse().unwrap_or_else(Mat3::identity).transpose();
    inverse_transpose.to_homogeneous()
}

/// Column-major array layout expected by GLSL
pub fn to_columns(matrix: &Mat4) -> [[f32; 4]; 4] {
    (*matrix).into()
}

/// Math utility functions
pub mod utils {
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn project(matrix: &Mat4, point: Vec3) -> Vec3 {
        let clip = matrix * Vec4::new(point.x, point.y, point.z, 1.0);
        Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth() {
        let projection = vulkan_perspective(utils::deg_to_rad(60.0), 1.5, 0.1, 100.0);

        assert_relative_eq!(project(&projection, Vec3::new(0.0, 0.0, -0.1)).z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(project(&projection, Vec3::new(0.0, 0.0, -100.0)).z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn perspective_flips_y_for_vulkan() {
        let projection = vulkan_perspective(utils::deg_to_rad(90.0), 1.0, 0.1, 10.0);
        let up = project(&projection, Vec3::new(0.0, 1.0, -1.0));
        assert!(up.y < 0.0);
        assert_relative_eq!(up.y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn transform_applies_scale_before_translation() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0)).with_uniform_scale(2.0);
        let moved = transform.to_matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(moved, Point3::new(3.0, 2.0, 3.0), epsilon = 1e-6);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 1.0, 1.0));
        let normal = normal_matrix(&model);
        assert_relative_eq!(normal[(0, 0)], 0.5, epsilon = 1e-6);
        assert_relative_eq!(normal[(3, 3)], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn columns_are_column_major() {
        let matrix = Mat4::new_translation(&Vec3::new(4.0, 5.0, 6.0));
        let columns = to_columns(&matrix);
        assert_eq!(columns[3], [4.0, 5.0, 6.0, 1.0]);
    }
}
