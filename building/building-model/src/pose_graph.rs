//! Confidence-weighted pose-graph relaxation over room poses.
//!
//! Nodes are room-to-global transforms with room 0 held fixed. Every
//! alignment is an edge predicting one room's pose from the other's. Each
//! sweep replaces a pose by the weighted mean of what its edges predict
//! (Gauss-Seidel), until no pose moves more than the threshold.

use building_registration::RigidTransform;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ModelError, ModelResult};

/// Configuration for pose-graph relaxation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoseGraphParams {
    /// Maximum relaxation sweeps.
    #[cfg_attr(feature = "serde", serde(default = "default_max_iterations"))]
    pub max_iterations: u32,

    /// Stop once the largest pose change in a sweep is below this
    /// (translation plus rotation angle).
    #[cfg_attr(feature = "serde", serde(default = "default_convergence_threshold"))]
    pub convergence_threshold: f64,

    /// A last-to-first loop closure is only used at or above this confidence.
    #[cfg_attr(feature = "serde", serde(default = "default_min_loop_confidence"))]
    pub min_loop_confidence: f64,
}

const fn default_max_iterations() -> u32 {
    100
}

const fn default_convergence_threshold() -> f64 {
    1e-6
}

const fn default_min_loop_confidence() -> f64 {
    0.5
}

impl Default for PoseGraphParams {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence_threshold(),
            min_loop_confidence: default_min_loop_confidence(),
        }
    }
}

impl PoseGraphParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of sweeps.
    #[must_use]
    pub const fn with_max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Sets the convergence threshold.
    #[must_use]
    pub const fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// Sets the minimum loop-closure confidence.
    #[must_use]
    pub const fn with_min_loop_confidence(mut self, confidence: f64) -> Self {
        self.min_loop_confidence = confidence;
        self
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] for out-of-range values.
    pub fn validate(&self) -> ModelResult<()> {
        if self.max_iterations == 0 {
            return Err(ModelError::InvalidConfig(
                "pose graph max_iterations must be positive".into(),
            ));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0.0 {
            return Err(ModelError::InvalidConfig(
                "pose graph convergence_threshold must be finite and non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_loop_confidence) {
            return Err(ModelError::InvalidConfig(format!(
                "min_loop_confidence must be in [0, 1], got {}",
                self.min_loop_confidence
            )));
        }
        Ok(())
    }
}

/// Relative pose constraint between two rooms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEdge {
    /// Room whose frame the measurement maps from.
    pub source: usize,
    /// Room whose frame the measurement maps into.
    pub target: usize,
    /// Source-to-target transform.
    pub measurement: RigidTransform,
    /// Non-negative weight; zero disables the edge.
    pub weight: f64,
}

/// Outcome of [`relax`].
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxationSummary {
    /// Sweeps performed.
    pub iterations: u32,
    /// Whether the last sweep moved every pose less than the threshold.
    pub converged: bool,
    /// Largest pose change in the last sweep.
    pub last_update: f64,
}

/// Relaxes `poses` (room-to-global transforms) against `edges` in place.
///
/// `poses[0]` is never modified. Edges referring to rooms outside `poses`,
/// and edges with non-positive or non-finite weight, are ignored.
pub fn relax(
    poses: &mut [RigidTransform],
    edges: &[PoseEdge],
    params: &PoseGraphParams,
) -> RelaxationSummary {
    let active: Vec<PoseEdge> = edges
        .iter()
        .filter(|e| e.weight.is_finite() && e.weight > 0.0)
        .filter(|e| e.source < poses.len() && e.target < poses.len())
        .copied()
        .collect();

    let mut summary = RelaxationSummary {
        iterations: 0,
        converged: true,
        last_update: 0.0,
    };
    if poses.len() < 2 || active.is_empty() {
        return summary;
    }

    summary.converged = false;
    for iteration in 0..params.max_iterations {
        let mut max_update = 0.0_f64;

        for node in 1..poses.len() {
            let Some(updated) = weighted_prediction(node, poses, &active) else {
                continue;
            };
            let update = (updated.translation - poses[node].translation).norm()
                + updated.rotation.angle_to(&poses[node].rotation);
            max_update = max_update.max(update);
            poses[node] = updated;
        }

        summary.iterations = iteration + 1;
        summary.last_update = max_update;
        if max_update < params.convergence_threshold {
            summary.converged = true;
            break;
        }
    }

    debug!(
        iterations = summary.iterations,
        converged = summary.converged,
        last_update = summary.last_update,
        edges = active.len(),
        "relaxed pose graph"
    );
    summary
}

/// Weighted mean of the poses `node`'s edges predict, or `None` if no edge
/// touches it.
fn weighted_prediction(
    node: usize,
    poses: &[RigidTransform],
    edges: &[PoseEdge],
) -> Option<RigidTransform> {
    let reference = poses[node].rotation;
    let mut translation_sum = Vector3::zeros();
    let mut rotation_sum = Quaternion::new(0.0, 0.0, 0.0, 0.0);
    let mut weight_sum = 0.0;

    for edge in edges {
        // G_source = G_target * T, so G_target = G_source * T^-1
        let predicted = if edge.source == node {
            poses[edge.target].compose(&edge.measurement)
        } else if edge.target == node {
            poses[edge.source].compose(&edge.measurement.inverse())
        } else {
            continue;
        };

        // q and -q are the same rotation; keep every sample on the reference hemisphere
        let mut q = *predicted.rotation.quaternion();
        if q.dot(reference.quaternion()) < 0.0 {
            q = -q;
        }

        translation_sum += predicted.translation * edge.weight;
        rotation_sum += q * edge.weight;
        weight_sum += edge.weight;
    }

    if weight_sum <= 0.0 {
        return None;
    }
    let rotation = UnitQuaternion::try_new(rotation_sum, f64::EPSILON).unwrap_or(reference);
    Some(RigidTransform::new(rotation, translation_sum / weight_sum))
}

/// Sum of weighted squared residuals (translation plus angle) over `edges`.
#[must_use]
pub fn total_error(poses: &[RigidTransform], edges: &[PoseEdge]) -> f64 {
    edges
        .iter()
        .filter(|e| e.source < poses.len() && e.target < poses.len())
        .map(|e| {
            let predicted = poses[e.target].compose(&e.measurement);
            let actual = &poses[e.source];
            let dt = (predicted.translation - actual.translation).norm();
            let da = predicted.rotation.angle_to(&actual.rotation);
            e.weight * (dt * dt + da * da)
        })
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn shift(x: f64, y: f64) -> RigidTransform {
        RigidTransform::from_translation(Vector3::new(x, y, 0.0))
    }

    fn edge(source: usize, target: usize, measurement: RigidTransform, weight: f64) -> PoseEdge {
        PoseEdge {
            source,
            target,
            measurement,
            weight,
        }
    }

    fn chained(edges: &[PoseEdge], n: usize) -> Vec<RigidTransform> {
        let mut poses = vec![RigidTransform::identity(); n];
        for e in edges.iter().filter(|e| e.source == e.target + 1) {
            poses[e.source] = poses[e.target].compose(&e.measurement);
        }
        poses
    }

    #[test]
    fn test_consistent_chain_is_fixed_point() {
        let edges = vec![
            edge(
                1,
                0,
                RigidTransform::new(
                    UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3),
                    Vector3::new(2.0, 0.0, 0.0),
                ),
                0.9,
            ),
            edge(2, 1, shift(0.0, 3.0), 0.8),
        ];
        let mut poses = chained(&edges, 3);
        let before = poses.clone();

        let summary = relax(&mut poses, &edges, &PoseGraphParams::default());
        assert!(summary.converged);
        for (a, b) in poses.iter().zip(&before) {
            assert_relative_eq!(a.translation, b.translation, epsilon = 1e-9);
            assert!(a.rotation.angle_to(&b.rotation) < 1e-9);
        }
    }

    #[test]
    fn test_loop_closure_spreads_drift() {
        // Truth: rooms at x = 0, 1, 2. The second chain link over-reports by 0.1.
        let edges = vec![
            edge(1, 0, shift(1.0, 0.0), 1.0),
            edge(2, 1, shift(1.1, 0.0), 1.0),
            edge(2, 0, shift(2.0, 0.0), 1.0),
        ];
        let mut poses = chained(&edges, 3);
        let error_before = total_error(&poses, &edges);

        let summary = relax(&mut poses, &edges, &PoseGraphParams::default());
        assert!(summary.converged);
        assert!(total_error(&poses, &edges) < error_before);

        // Least-squares optimum: x1 = 29/30, x2 = 61/30
        assert_relative_eq!(poses[1].translation.x, 29.0 / 30.0, epsilon = 1e-4);
        assert_relative_eq!(poses[2].translation.x, 61.0 / 30.0, epsilon = 1e-4);
        assert_eq!(poses[0], RigidTransform::identity());
    }

    #[test]
    fn test_zero_weight_edges_ignored() {
        let edges = vec![
            edge(1, 0, shift(1.0, 0.0), 1.0),
            edge(1, 0, shift(50.0, 0.0), 0.0),
            edge(1, 0, shift(-50.0, 0.0), f64::NAN),
        ];
        let mut poses = chained(&edges[..1], 2);

        relax(&mut poses, &edges, &PoseGraphParams::default());
        assert_relative_eq!(poses[1].translation.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_out_of_range_edges_ignored() {
        let edges = vec![edge(5, 0, shift(1.0, 0.0), 1.0)];
        let mut poses = vec![RigidTransform::identity(); 2];

        let summary = relax(&mut poses, &edges, &PoseGraphParams::default());
        assert_eq!(summary.iterations, 0);
        assert_eq!(poses[1], RigidTransform::identity());
    }

    #[test]
    fn test_rotation_mean_handles_sign_flip() {
        let angle = 0.2;
        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle);
        let flipped = UnitQuaternion::new_unchecked(-*q.quaternion());
        let edges = vec![
            edge(1, 0, RigidTransform::from_rotation(q), 1.0),
            edge(1, 0, RigidTransform::from_rotation(flipped), 1.0),
        ];
        let mut poses = vec![RigidTransform::identity(); 2];

        relax(&mut poses, &edges, &PoseGraphParams::default());
        assert!(poses[1].rotation.angle_to(&q) < 1e-9);
    }

    #[test]
    fn test_params_validation() {
        assert!(PoseGraphParams::default().validate().is_ok());
        assert!(PoseGraphParams::new().with_max_iterations(0).validate().is_err());
        assert!(PoseGraphParams::new().with_min_loop_confidence(1.5).validate().is_err());
        assert!(PoseGraphParams::new()
            .with_convergence_threshold(f64::INFINITY)
            .validate()
            .is_err());
    }
}
