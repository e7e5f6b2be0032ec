//! Shared building coordinate frame built from pairwise alignments.

use std::fmt;

use building_registration::RigidTransform;
use nalgebra::{Point3, UnitQuaternion};
use tracing::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::pose_graph::{relax, total_error, PoseEdge, PoseGraphParams};
use crate::{AlignmentResult, ModelResult};

/// How room poses are derived from the alignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FramePolicy {
    /// Compose the chain: `G_i = G_{i-1} * T_i`.
    #[default]
    Chain,
    /// Start from the chain, then relax all constraints (including a loop
    /// closure) as a weighted pose graph.
    PoseGraph,
}

/// Configuration for the global frame builder.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FrameParams {
    /// Pose derivation policy.
    pub policy: FramePolicy,
    /// Relaxation settings, used by [`FramePolicy::PoseGraph`].
    pub pose_graph: PoseGraphParams,
}

impl FrameParams {
    /// Creates parameters with defaults (chain policy).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pose-graph policy with default relaxation settings.
    #[must_use]
    pub fn pose_graph() -> Self {
        Self {
            policy: FramePolicy::PoseGraph,
            pose_graph: PoseGraphParams::default(),
        }
    }

    /// Sets the policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: FramePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the relaxation settings.
    #[must_use]
    pub const fn with_pose_graph(mut self, params: PoseGraphParams) -> Self {
        self.pose_graph = params;
        self
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`](crate::ModelError::InvalidConfig)
    /// if the relaxation settings are out of range.
    pub fn validate(&self) -> ModelResult<()> {
        self.pose_graph.validate()
    }
}

/// Frame every room is placed into.
///
/// Room 0 is the reference: its local frame coincides with the building
/// frame up to `origin`, `orientation` and `scale`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlobalCoordinateSystem {
    /// Building origin.
    pub origin: Point3<f64>,
    /// Building orientation.
    pub orientation: UnitQuaternion<f64>,
    /// Uniform scale, always positive.
    pub scale: f64,
    room_transforms: Vec<RigidTransform>,
    policy: FramePolicy,
    loop_closure_applied: bool,
}

impl GlobalCoordinateSystem {
    /// Composes chain alignments into per-room transforms.
    ///
    /// Alignments are applied in order, so each target must already be
    /// placed when its source is reached (true for the `(i, i - 1)` chain).
    /// Rooms no alignment reaches stay at identity.
    #[must_use]
    pub fn from_chain(alignments: &[AlignmentResult], room_count: usize) -> Self {
        Self {
            origin: Point3::origin(),
            orientation: UnitQuaternion::identity(),
            scale: 1.0,
            room_transforms: chain_poses(alignments, room_count),
            policy: FramePolicy::Chain,
            loop_closure_applied: false,
        }
    }

    /// Builds the frame according to `params.policy`.
    ///
    /// `loop_closure` is only used by the pose-graph policy, and only when
    /// its confidence reaches `min_loop_confidence`.
    #[must_use]
    pub fn build(
        alignments: &[AlignmentResult],
        loop_closure: Option<&AlignmentResult>,
        room_count: usize,
        params: &FrameParams,
    ) -> Self {
        let mut frame = Self::from_chain(alignments, room_count);
        if params.policy == FramePolicy::Chain {
            return frame;
        }

        frame.policy = FramePolicy::PoseGraph;
        let mut edges: Vec<PoseEdge> = alignments.iter().map(edge_from).collect();

        if let Some(closure) = loop_closure {
            if closure.confidence >= params.pose_graph.min_loop_confidence {
                edges.push(edge_from(closure));
                frame.loop_closure_applied = true;
            } else {
                warn!(
                    source_room = closure.source_room,
                    target_room = closure.target_room,
                    confidence = closure.confidence,
                    min_confidence = params.pose_graph.min_loop_confidence,
                    "loop closure too weak, ignored"
                );
            }
        }

        let error_before = total_error(&frame.room_transforms, &edges);
        let summary = relax(&mut frame.room_transforms, &edges, &params.pose_graph);
        let error_after = total_error(&frame.room_transforms, &edges);

        if !summary.converged {
            warn!(
                iterations = summary.iterations,
                last_update = summary.last_update,
                "pose graph did not settle"
            );
        }
        info!(
            rooms = room_count,
            edges = edges.len(),
            iterations = summary.iterations,
            error_before,
            error_after,
            "refined room poses"
        );
        frame
    }

    /// Policy that produced the room transforms.
    #[must_use]
    pub const fn policy(&self) -> FramePolicy {
        self.policy
    }

    /// Whether a loop closure was added to the pose graph.
    ///
    /// False for the chain policy, and when the closure was too weak.
    #[must_use]
    pub const fn loop_closure_applied(&self) -> bool {
        self.loop_closure_applied
    }

    /// Number of rooms placed.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.room_transforms.len()
    }

    /// All room-to-building transforms in room order.
    #[must_use]
    pub fn room_transforms(&self) -> &[RigidTransform] {
        &self.room_transforms
    }

    /// Room-to-building transform; identity for an unknown room.
    #[must_use]
    pub fn room_transform(&self, room: usize) -> RigidTransform {
        self.room_transforms.get(room).copied().unwrap_or_default()
    }

    /// Maps a point from `room`'s local frame into the building frame.
    ///
    /// # Example
    ///
    /// ```
    /// use building_model::GlobalCoordinateSystem;
    /// use nalgebra::Point3;
    ///
    /// let frame = GlobalCoordinateSystem::from_chain(&[], 1);
    /// let p = Point3::new(1.0, 2.0, 3.0);
    /// assert_eq!(frame.to_global(0, &p), p);
    /// ```
    #[must_use]
    pub fn to_global(&self, room: usize, point: &Point3<f64>) -> Point3<f64> {
        let local = self.room_transform(room).transform_point(point);
        self.origin + self.orientation * (local.coords * self.scale)
    }

    /// Maps every point of `points` with [`to_global`](Self::to_global).
    #[must_use]
    pub fn to_global_points(&self, room: usize, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points.iter().map(|p| self.to_global(room, p)).collect()
    }
}

impl fmt::Display for GlobalCoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rooms ({:?}), origin ({:.3}, {:.3}, {:.3}), scale {}",
            self.room_transforms.len(),
            self.policy,
            self.origin.x,
            self.origin.y,
            self.origin.z,
            self.scale
        )
    }
}

fn edge_from(alignment: &AlignmentResult) -> PoseEdge {
    PoseEdge {
        source: alignment.source_room,
        target: alignment.target_room,
        measurement: alignment.transform,
        weight: alignment.confidence,
    }
}

fn chain_poses(alignments: &[AlignmentResult], room_count: usize) -> Vec<RigidTransform> {
    let mut poses = vec![RigidTransform::identity(); room_count];

    for alignment in alignments {
        let (source, target) = (alignment.source_room, alignment.target_room);
        if source >= room_count || target >= room_count {
            warn!(source, target, room_count, "alignment refers to unknown room, skipped");
            continue;
        }
        if source == 0 {
            // reference room stays fixed
            debug!(target, "alignment moves the reference room, skipped");
            continue;
        }
        poses[source] = poses[target].compose(&alignment.transform);
    }

    poses
}
