//! Pairwise alignment of consecutive rooms.

use std::fmt;

use building_registration::{
    register_with_cancellation, CancellationToken, IcpParams, IcpResult, IcpState, RigidTransform,
    StopReason,
};
use building_types::PointCloud;
use tracing::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of registering one room onto another.
///
/// `transform` maps points from the source room's frame into the target
/// room's frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlignmentResult {
    /// Room being moved.
    pub source_room: usize,
    /// Room it was aligned to.
    pub target_room: usize,
    /// Source-to-target rigid transform.
    pub transform: RigidTransform,
    /// Residual RMS error (`+inf` when nothing overlapped).
    pub rms_error: f64,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// ICP iterations performed (0 when ICP did not run).
    pub iterations: u32,
    /// Terminal ICP state.
    pub state: IcpState,
    /// Correspondences behind `rms_error`.
    pub correspondence_count: usize,
    /// Share of source samples that found a partner.
    pub overlap_ratio: f64,
}

impl AlignmentResult {
    /// Wraps an ICP result for a room pair.
    #[must_use]
    pub fn from_icp(source_room: usize, target_room: usize, icp: &IcpResult) -> Self {
        Self {
            source_room,
            target_room,
            transform: icp.transform,
            rms_error: icp.rms_error,
            confidence: icp.confidence,
            iterations: icp.iterations,
            state: icp.state,
            correspondence_count: icp.correspondence_count,
            overlap_ratio: icp.overlap_ratio(),
        }
    }

    /// Placeholder for a pair that could not be registered: identity
    /// transform, infinite error, zero confidence.
    #[must_use]
    pub fn degenerate(source_room: usize, target_room: usize) -> Self {
        Self {
            source_room,
            target_room,
            transform: RigidTransform::identity(),
            rms_error: f64::INFINITY,
            confidence: 0.0,
            iterations: 0,
            state: IcpState::Converged,
            correspondence_count: 0,
            overlap_ratio: 0.0,
        }
    }

    /// Whether any correspondences supported the result.
    #[must_use]
    pub const fn has_overlap(&self) -> bool {
        self.correspondence_count > 0
    }
}

impl fmt::Display for AlignmentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "room {} -> room {}: confidence {:.3}, RMS {:.4}, {} iterations, overlap {:.1}%",
            self.source_room,
            self.target_room,
            self.confidence,
            self.rms_error,
            self.iterations,
            self.overlap_ratio * 100.0
        )
    }
}

/// Registers `source` onto `target`.
///
/// An empty cloud on either side skips ICP and yields
/// [`AlignmentResult::degenerate`].
#[must_use]
pub fn align_pair(
    source: &PointCloud,
    target: &PointCloud,
    params: &IcpParams,
    cancel: Option<&CancellationToken>,
) -> AlignmentResult {
    let (source_room, target_room) = (source.room_index(), target.room_index());

    if source.is_empty() || target.is_empty() {
        warn!(
            source_room,
            target_room,
            source_points = source.len(),
            target_points = target.len(),
            "empty point cloud, pair left unaligned"
        );
        return AlignmentResult::degenerate(source_room, target_room);
    }

    let icp = register_with_cancellation(source, target, params, cancel);
    let result = AlignmentResult::from_icp(source_room, target_room, &icp);

    match result.state {
        IcpState::MaxIterationsReached(StopReason::IterationLimit) => warn!(
            source_room,
            target_room,
            iterations = result.iterations,
            rms_error = result.rms_error,
            "alignment did not converge, keeping best transform"
        ),
        _ => debug!(source_room, target_room, "{result}"),
    }

    result
}

/// Aligns every room to its predecessor: room `i` onto room `i - 1`.
///
/// Returns `clouds.len() - 1` results in room order (none for fewer than two
/// rooms). A failed pair never stops the chain.
///
/// # Example
///
/// ```
/// use building_model::align_room_chain;
/// use building_registration::IcpParams;
/// use building_types::PointCloud;
///
/// let clouds = vec![PointCloud::empty(0), PointCloud::empty(1), PointCloud::empty(2)];
/// let results = align_room_chain(&clouds, &IcpParams::default(), None);
///
/// assert_eq!(results.len(), 2);
/// assert_eq!((results[1].source_room, results[1].target_room), (2, 1));
/// assert_eq!(results[1].confidence, 0.0);
/// ```
#[must_use]
pub fn align_room_chain(
    clouds: &[PointCloud],
    params: &IcpParams,
    cancel: Option<&CancellationToken>,
) -> Vec<AlignmentResult> {
    let results: Vec<AlignmentResult> = clouds
        .windows(2)
        .map(|pair| align_pair(&pair[1], &pair[0], params, cancel))
        .collect();

    if !results.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let mean_confidence =
            results.iter().map(|r| r.confidence).sum::<f64>() / results.len() as f64;
        info!(
            pairs = results.len(),
            converged = results.iter().filter(|r| r.state.is_converged()).count(),
            mean_confidence,
            "aligned room chain"
        );
    }

    results
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn lattice(room: usize, offset: Vector3<f64>) -> PointCloud {
        let mut points = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                for k in 0..3 {
                    points.push(Point3::new(f64::from(i), f64::from(j), f64::from(k)) + offset);
                }
            }
        }
        let normals = vec![Vector3::z(); points.len()];
        PointCloud::new(room, points, normals).unwrap()
    }

    #[test]
    fn test_chain_pairs_consecutive_rooms() {
        let clouds = vec![
            lattice(0, Vector3::zeros()),
            lattice(1, Vector3::new(0.1, 0.0, 0.0)),
            lattice(2, Vector3::new(0.1, 0.2, 0.0)),
        ];
        let results = align_room_chain(&clouds, &IcpParams::default(), None);

        assert_eq!(results.len(), 2);
        assert_eq!((results[0].source_room, results[0].target_room), (1, 0));
        assert_eq!((results[1].source_room, results[1].target_room), (2, 1));

        // Room 1 is shifted by +0.1 x, so it must move back
        assert_relative_eq!(
            results[0].transform.translation,
            Vector3::new(-0.1, 0.0, 0.0),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            results[1].transform.translation,
            Vector3::new(0.0, -0.2, 0.0),
            epsilon = 1e-6
        );
        assert!(results.iter().all(|r| r.confidence > 0.99));
        assert!(results.iter().all(|r| r.overlap_ratio == 1.0));
    }

    #[test]
    fn test_empty_room_does_not_break_chain() {
        let clouds = vec![
            lattice(0, Vector3::zeros()),
            PointCloud::empty(1),
            lattice(2, Vector3::zeros()),
            lattice(3, Vector3::new(0.05, 0.0, 0.0)),
        ];
        let results = align_room_chain(&clouds, &IcpParams::default(), None);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], AlignmentResult::degenerate(1, 0));
        assert_eq!(results[1], AlignmentResult::degenerate(2, 1));
        assert!(results[2].confidence > 0.99);
    }

    #[test]
    fn test_single_room_has_no_pairs() {
        let clouds = vec![lattice(0, Vector3::zeros())];
        assert!(align_room_chain(&clouds, &IcpParams::default(), None).is_empty());
        assert!(align_room_chain(&[], &IcpParams::default(), None).is_empty());
    }

    #[test]
    fn test_degenerate_result() {
        let result = AlignmentResult::degenerate(4, 3);
        assert_eq!(result.transform, RigidTransform::identity());
        assert_eq!(result.confidence, 0.0);
        assert!(result.rms_error.is_infinite());
        assert!(!result.has_overlap());
    }

    #[test]
    fn test_cancelled_chain_still_reports_every_pair() {
        let clouds = vec![
            lattice(0, Vector3::zeros()),
            lattice(1, Vector3::new(0.1, 0.0, 0.0)),
            lattice(2, Vector3::zeros()),
        ];
        let token = CancellationToken::new();
        token.cancel();

        let results = align_room_chain(&clouds, &IcpParams::default(), Some(&token));
        assert_eq!(results.len(), 2);
        for r in &results {
            assert_eq!(r.state, IcpState::MaxIterationsReached(StopReason::Cancelled));
            assert_eq!(r.transform, RigidTransform::identity());
        }
    }
}
