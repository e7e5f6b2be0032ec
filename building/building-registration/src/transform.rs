//! Rigid transformation type for registration results.

use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{RegistrationError, RegistrationResult};

/// Tolerance on `RᵀR = I` and the homogeneous row when importing a matrix.
const ORTHONORMAL_TOLERANCE: f64 = 1e-6;

/// A rigid transformation: rotation followed by translation.
///
/// The rotation is stored as a unit quaternion, so the rotation block of
/// [`to_matrix4`](Self::to_matrix4) is always orthonormal with determinant +1.
///
/// # Example
///
/// ```
/// use building_registration::RigidTransform;
/// use nalgebra::{Point3, UnitQuaternion, Vector3};
/// use std::f64::consts::PI;
///
/// // Rotate 90 degrees around Z, then translate
/// let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 2.0);
/// let transform = RigidTransform::new(rotation, Vector3::new(1.0, 2.0, 3.0));
///
/// let moved = transform.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert!((moved - Point3::new(1.0, 3.0, 3.0)).norm() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidTransform {
    /// Rotation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
    /// Translation vector.
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Creates a new rigid transform with the given rotation and translation.
    #[must_use]
    pub const fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Creates an identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Creates a transform with only translation.
    #[must_use]
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Creates a transform with only rotation.
    #[must_use]
    pub fn from_rotation(rotation: UnitQuaternion<f64>) -> Self {
        Self {
            rotation,
            translation: Vector3::zeros(),
        }
    }

    /// Builds a transform from a 4x4 homogeneous matrix.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::NotRigid`] if the bottom row is not
    /// `[0, 0, 0, 1]`, the rotation block is not orthonormal, or it is a
    /// reflection.
    pub fn from_matrix4(matrix: &Matrix4<f64>) -> RegistrationResult<Self> {
        if !matrix.iter().all(|v| v.is_finite()) {
            return Err(RegistrationError::NotRigid("non-finite entries".into()));
        }
        let bottom = [matrix[(3, 0)], matrix[(3, 1)], matrix[(3, 2)], matrix[(3, 3)] - 1.0];
        if bottom.iter().any(|v| v.abs() > ORTHONORMAL_TOLERANCE) {
            return Err(RegistrationError::NotRigid(
                "bottom row must be [0, 0, 0, 1]".into(),
            ));
        }

        let block: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let gram_error = (block.transpose() * block - Matrix3::identity()).abs().max();
        if gram_error > ORTHONORMAL_TOLERANCE {
            return Err(RegistrationError::NotRigid(format!(
                "rotation block is not orthonormal (deviation {gram_error:.2e})"
            )));
        }
        if block.determinant() < 0.0 {
            return Err(RegistrationError::NotRigid(
                "rotation block is a reflection".into(),
            ));
        }

        let rotation =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(block));
        let translation = Vector3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]);
        Ok(Self::new(rotation, translation))
    }

    /// Transforms a 3D point.
    #[must_use]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * point.coords + self.translation)
    }

    /// Transforms a 3D vector (direction). Vectors are rotated, not translated.
    #[must_use]
    pub fn transform_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * vector
    }

    /// Transforms every point of a slice.
    #[must_use]
    pub fn transform_points(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points.iter().map(|p| self.transform_point(p)).collect()
    }

    /// Composes this transform with another (self * other).
    ///
    /// The result applies `other` first, then `self`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.translation + self.rotation * other.translation,
        }
    }

    /// Computes the inverse of this transform.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.inverse();
        Self {
            rotation: inv_rotation,
            translation: inv_rotation * -self.translation,
        }
    }

    /// Converts to a 4x4 homogeneous transformation matrix.
    #[must_use]
    pub fn to_matrix4(&self) -> Matrix4<f64> {
        let mut mat = Matrix4::identity();
        mat.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(self.rotation.to_rotation_matrix().matrix());
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        mat
    }

    /// Returns true if this transform is approximately the identity.
    #[must_use]
    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.rotation.angle().abs() < epsilon && self.translation.norm() < epsilon
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_identity_transform() {
        let transform = RigidTransform::identity();
        let point = Point3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(transform.transform_point(&point), point, epsilon = 1e-10);
    }

    #[test]
    fn test_rotation_90_degrees_z() {
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 2.0);
        let transform = RigidTransform::from_rotation(rotation);
        let result = transform.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(result, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-10);
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let rotate = RigidTransform::from_rotation(UnitQuaternion::from_axis_angle(
            &Vector3::z_axis(),
            PI / 2.0,
        ));
        let shift = RigidTransform::from_translation(Vector3::new(1.0, 0.0, 0.0));

        // shift first: (0,0,0) -> (1,0,0), then rotate -> (0,1,0)
        let result = rotate.compose(&shift).transform_point(&Point3::origin());
        assert_relative_eq!(result, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-10);

        // rotate first: origin stays, then shift -> (1,0,0)
        let result = shift.compose(&rotate).transform_point(&Point3::origin());
        assert_relative_eq!(result, Point3::new(1.0, 0.0, 0.0), epsilon = 1e-10);
    }

    #[test]
    fn test_inverse_round_trip() {
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 4.0);
        let transform = RigidTransform::new(rotation, Vector3::new(1.0, 2.0, 3.0));

        let point = Point3::new(1.0, 2.0, 3.0);
        let recovered = transform
            .inverse()
            .transform_point(&transform.transform_point(&point));
        assert_relative_eq!(recovered, point, epsilon = 1e-10);
        assert!(transform.compose(&transform.inverse()).is_identity(1e-10));
    }

    #[test]
    fn test_transform_vector_ignores_translation() {
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 2.0);
        let transform = RigidTransform::new(rotation, Vector3::new(100.0, 100.0, 100.0));
        let result = transform.transform_vector(&Vector3::x());
        assert_relative_eq!(result, Vector3::y(), epsilon = 1e-10);
    }

    #[test]
    fn test_matrix4_round_trip() {
        let rotation = UnitQuaternion::from_euler_angles(0.1, -0.2, 0.3);
        let transform = RigidTransform::new(rotation, Vector3::new(-1.0, 0.5, 2.0));
        let mat = transform.to_matrix4();

        assert_relative_eq!(mat[(3, 3)], 1.0);
        assert_relative_eq!(mat.fixed_view::<3, 3>(0, 0).determinant(), 1.0, epsilon = 1e-10);

        let back = RigidTransform::from_matrix4(&mat).unwrap();
        assert_relative_eq!(back.translation, transform.translation, epsilon = 1e-12);
        assert!(back.rotation.angle_to(&transform.rotation) < 1e-10);
    }

    #[test]
    fn test_from_matrix4_rejects_scaling() {
        let mut mat = Matrix4::identity();
        mat[(0, 0)] = 2.0;
        assert!(matches!(
            RigidTransform::from_matrix4(&mat),
            Err(RegistrationError::NotRigid(_))
        ));
    }

    #[test]
    fn test_from_matrix4_rejects_reflection() {
        let mut mat = Matrix4::identity();
        mat[(2, 2)] = -1.0;
        assert!(matches!(
            RigidTransform::from_matrix4(&mat),
            Err(RegistrationError::NotRigid(_))
        ));
    }

    #[test]
    fn test_is_identity() {
        assert!(RigidTransform::identity().is_identity(1e-10));

        let translation = RigidTransform::from_translation(Vector3::new(0.001, 0.0, 0.0));
        assert!(!translation.is_identity(1e-10));
        assert!(translation.is_identity(0.01));
    }

    #[test]
    fn test_default_is_identity() {
        assert_eq!(RigidTransform::default(), RigidTransform::identity());
    }
}
