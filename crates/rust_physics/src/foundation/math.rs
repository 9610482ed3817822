//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the `Transform` every physics body carries.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, UnitQuaternion, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// World-space down vector used by the grounded probe when gravity is zero
pub const DOWN: Vec3 = Vec3::new(0.0, -1.0, 0.0);

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq)]
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
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Builder-style scale override
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Builder-style uniform scale override
    #[must_use]
    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale(Vec3::new(scale, scale, scale))
    }

    /// Builder-style rotation override
    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Convert to a transformation matrix (translation * rotation * scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Same transform moved by `offset`
    #[must_use]
    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            position: self.position + offset,
            ..*self
        }
    }

    /// Apply this transform to a model-space point
    pub fn transform_point(&self, point: &Vec3) -> Vec3 {
        self.position + self.rotation * self.scale.component_mul(point)
    }

    /// Rotation as a 3x3 matrix
    pub fn rotation_matrix(&self) -> Mat3 {
        *self.rotation.to_rotation_matrix().matrix()
    }

    /// Largest absolute scale component, used to scale radii
    pub fn max_scale(&self) -> f32 {
        self.scale.abs().max()
    }
}

/// True when every component is finite
pub fn is_finite(v: &Vec3) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// Some vector perpendicular to `v` (not normalized)
pub fn any_perpendicular(v: &Vec3) -> Vec3 {
    let candidate = v.cross(&Vec3::x());
    if candidate.norm_squared() > f32::EPSILON * v.norm_squared() {
        candidate
    } else {
        v.cross(&Vec3::y())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_matrix_matches_transform_point() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation(Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_2))
            .with_scale(Vec3::new(2.0, 1.0, 1.0));
        let local = Vec3::new(0.5, 0.25, -0.5);

        let via_matrix = transform.to_matrix().transform_point(&Point3::from(local)).coords;
        let direct = transform.transform_point(&local);

        assert_relative_eq!(via_matrix, direct, epsilon = 1e-5);
    }

    #[test]
    fn test_perpendicular_is_orthogonal() {
        for v in [Vec3::x(), Vec3::y(), Vec3::new(1.0, 2.0, 3.0)] {
            let p = any_perpendicular(&v);
            assert!(p.norm() > 0.0);
            assert_relative_eq!(p.dot(&v), 0.0, epsilon = 1e-6);
        }
    }
}
