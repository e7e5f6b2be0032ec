//! Rigid transform estimation from correspondences.
//!
//! Two estimators are available:
//!
//! - [`kabsch`]: SVD-based least squares over point-to-point distances
//! - [`point_to_plane`]: one linearized Gauss-Newton step over distances to
//!   the target's tangent planes, solved from damped 6x6 normal equations
//!
//! [`estimate_transform`] is the infallible entry point used by the ICP loop:
//! degenerate input yields the identity transform instead of an error.

use nalgebra::{Matrix3, Matrix6, Point3, Rotation3, UnitQuaternion, Vector3, Vector6};
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Correspondence, RegistrationError, RegistrationResult, RigidTransform};

/// Fewest point pairs that pin down a rigid transform.
pub const MIN_CORRESPONDENCES: usize = 3;

/// Relative Levenberg damping added to the point-to-plane normal equations.
const PLANE_DAMPING: f64 = 1e-9;

/// Error metric minimized by each ICP step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EstimationMethod {
    /// Squared distance between paired points (Kabsch).
    #[default]
    PointToPoint,
    /// Squared distance from source points to the target tangent planes.
    /// Falls back to point-to-point when the system is singular.
    PointToPlane,
}

/// Computes the rigid transform that best maps `source` onto `target`.
///
/// # Errors
///
/// Returns an error if:
/// - The point sets have different lengths
/// - Fewer than [`MIN_CORRESPONDENCES`] pairs are given
/// - SVD computation fails
///
/// # Example
///
/// ```
/// use building_registration::kabsch;
/// use nalgebra::Point3;
///
/// let source = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let target: Vec<_> = source
///     .iter()
///     .map(|p| Point3::new(p.x + 1.0, p.y + 2.0, p.z + 3.0))
///     .collect();
///
/// let transform = kabsch(&source, &target).unwrap();
/// let aligned = transform.transform_point(&source[0]);
/// assert!((aligned - target[0]).norm() < 1e-9);
/// ```
pub fn kabsch(
    source: &[Point3<f64>],
    target: &[Point3<f64>],
) -> RegistrationResult<RigidTransform> {
    check_pairs(source.len(), target.len())?;

    let source_centroid = centroid(source);
    let target_centroid = centroid(target);

    // Cross-covariance H = sum(source_i * target_i^T)
    let mut h = Matrix3::zeros();
    for (s, t) in source.iter().zip(target) {
        h += (s.coords - source_centroid) * (t.coords - target_centroid).transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u.ok_or(RegistrationError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(RegistrationError::SvdFailed)?;

    let mut v = v_t.transpose();
    let mut rotation_matrix = v * u.transpose();

    // Reflection: flip the axis of the smallest singular value
    if rotation_matrix.determinant() < 0.0 {
        v.column_mut(2).neg_mut();
        rotation_matrix = v * u.transpose();
    }

    let rotation =
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation_matrix));
    let translation = target_centroid - rotation * source_centroid;

    Ok(RigidTransform::new(rotation, translation))
}

/// One linearized point-to-plane step mapping `source` toward the planes
/// through `target` with unit `target_normals`.
///
/// Points are centered on the source centroid before linearizing so far-away
/// rooms stay well conditioned.
///
/// # Errors
///
/// Returns an error if:
/// - The slices have different lengths
/// - Fewer than [`MIN_CORRESPONDENCES`] pairs are given
/// - The normal equations are singular or not finite
pub fn point_to_plane(
    source: &[Point3<f64>],
    target: &[Point3<f64>],
    target_normals: &[Vector3<f64>],
) -> RegistrationResult<RigidTransform> {
    check_pairs(source.len(), target.len())?;
    if target_normals.len() != target.len() {
        return Err(RegistrationError::MismatchedLengths {
            source_len: target.len(),
            target_len: target_normals.len(),
        });
    }

    let center = centroid(source);
    let mut ata = Matrix6::zeros();
    let mut atb = Vector6::zeros();

    for ((s, t), n) in source.iter().zip(target).zip(target_normals) {
        let s = s.coords - center;
        let t = t.coords - center;
        let rot_part = s.cross(n);
        let row = Vector6::new(rot_part.x, rot_part.y, rot_part.z, n.x, n.y, n.z);
        let residual = (s - t).dot(n);
        ata += row * row.transpose();
        atb -= row * residual;
    }

    let trace = ata.trace();
    if !trace.is_finite() || trace <= f64::EPSILON {
        return Err(RegistrationError::SingularSystem);
    }
    let damping = PLANE_DAMPING * trace;
    for i in 0..6 {
        ata[(i, i)] += damping;
    }

    let x = ata
        .cholesky()
        .ok_or(RegistrationError::SingularSystem)?
        .solve(&atb);
    if !x.iter().all(|v| v.is_finite()) {
        return Err(RegistrationError::SingularSystem);
    }

    let rotation = UnitQuaternion::from_scaled_axis(Vector3::new(x[0], x[1], x[2]));
    let step = Vector3::new(x[3], x[4], x[5]);

    // x -> R (x - c) + step + c
    Ok(RigidTransform::new(rotation, step + center - rotation * center))
}

/// Estimates the incremental transform for one ICP iteration.
///
/// `target_normals` is only read by [`EstimationMethod::PointToPlane`] and
/// is indexed by [`Correspondence::target_index`]. Fewer than
/// [`MIN_CORRESPONDENCES`] pairs or a numeric failure yields the identity.
#[must_use]
pub fn estimate_transform(
    correspondences: &[Correspondence],
    target_normals: &[Vector3<f64>],
    method: EstimationMethod,
) -> RigidTransform {
    if correspondences.len() < MIN_CORRESPONDENCES {
        warn!(
            count = correspondences.len(),
            required = MIN_CORRESPONDENCES,
            "too few correspondences, using identity step"
        );
        return RigidTransform::identity();
    }

    let (source, target): (Vec<Point3<f64>>, Vec<Point3<f64>>) = correspondences
        .iter()
        .map(|c| (c.source_point, c.target_point))
        .unzip();

    let estimate = match method {
        EstimationMethod::PointToPoint => kabsch(&source, &target),
        EstimationMethod::PointToPlane => {
            let normals: Option<Vec<Vector3<f64>>> = correspondences
                .iter()
                .map(|c| target_normals.get(c.target_index).copied())
                .collect();
            normals
                .ok_or(RegistrationError::MismatchedLengths {
                    source_len: correspondences.len(),
                    target_len: target_normals.len(),
                })
                .and_then(|n| point_to_plane(&source, &target, &n))
                .or_else(|err| {
                    warn!(%err, "point-to-plane step failed, falling back to point-to-point");
                    kabsch(&source, &target)
                })
        }
    };

    match estimate {
        Ok(transform) if is_finite(&transform) => transform,
        Ok(_) => {
            warn!("non-finite transform estimate, using identity step");
            RigidTransform::identity()
        }
        Err(err) => {
            warn!(%err, "transform estimation failed, using identity step");
            RigidTransform::identity()
        }
    }
}

fn check_pairs(source_len: usize, target_len: usize) -> RegistrationResult<()> {
    if source_len != target_len {
        return Err(RegistrationError::MismatchedLengths {
            source_len,
            target_len,
        });
    }
    if source_len < MIN_CORRESPONDENCES {
        return Err(RegistrationError::InsufficientCorrespondences {
            required: MIN_CORRESPONDENCES,
            provided: source_len,
        });
    }
    Ok(())
}

fn centroid(points: &[Point3<f64>]) -> Vector3<f64> {
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    sum / n
}

fn is_finite(transform: &RigidTransform) -> bool {
    transform.translation.iter().all(|v| v.is_finite())
        && transform.rotation.coords.iter().all(|v| v.is_finite())
}
