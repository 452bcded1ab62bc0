//! Math utilities and types
//!
//! Provides the math types node properties are expressed in.

use serde::{Deserialize, Serialize};

pub use nalgebra::{Matrix4, Quaternion, Unit, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

    /// Convert to a transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Combine this transform with a child transform
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * (self.scale.component_mul(&other.position)),
            rotation: self.rotation * other.rotation,
            scale: self.scale.component_mul(&other.scale),
        }
    }

    /// Weighted blend of several transforms
    ///
    /// Positions and scales are summed by weight, rotations are blended by
    /// normalized quaternion accumulation (with hemisphere correction). The
    /// weights are used as given; callers normalize them when they need a
    /// convex combination. Returns `None` for an empty input or when the
    /// accumulated rotation degenerates to zero.
    pub fn weighted_blend(parts: &[(&Transform, f32)]) -> Option<Transform> {
        let (first, _) = parts.first()?;
        let mut position = Vec3::zeros();
        let mut scale = Vec3::zeros();
        let mut rotation = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        for (transform, weight) in parts {
            position += transform.position * *weight;
            scale += transform.scale * *weight;
            let mut q = *transform.rotation.quaternion();
            if q.dot(first.rotation.quaternion()) < 0.0 {
                q = -q;
            }
            rotation += q * *weight;
        }
        let rotation = Unit::try_new(rotation, f32::EPSILON)?;
        Some(Transform { position, rotation, scale })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_matrix() {
        assert_relative_eq!(Transform::identity().to_matrix(), Mat4::identity());
    }

    #[test]
    fn test_combine_translations() {
        let parent = Transform::from_position(Vec3::new(1.0, 0.0, 0.0));
        let child = Transform::from_position(Vec3::new(0.0, 2.0, 0.0));
        let combined = parent.combine(&child);
        assert_relative_eq!(combined.position, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_weighted_blend_halfway() {
        let a = Transform::from_position(Vec3::new(0.0, 0.0, 0.0));
        let b = Transform::from_position(Vec3::new(2.0, 4.0, 0.0));
        let blended = Transform::weighted_blend(&[(&a, 0.5), (&b, 0.5)]).unwrap();
        assert_relative_eq!(blended.position, Vec3::new(1.0, 2.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(blended.scale, Vec3::new(1.0, 1.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_weighted_blend_empty() {
        assert!(Transform::weighted_blend(&[]).is_none());
    }
}
