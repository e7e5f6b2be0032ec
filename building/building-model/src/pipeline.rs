//! End-to-end stitching of one building.

use building_registration::CancellationToken;
use building_types::{PointCloud, Room};
use tracing::{debug, info};

use crate::{
    align_pair, align_room_chain, assess_alignment, extract_point_clouds, CombinedBuildingModel,
    FramePolicy, GlobalCoordinateSystem, ModelResult, StitchConfig,
};

/// Stitches captured rooms into one building model.
///
/// The configuration is validated once, in [`new`](Self::new); running
/// never fails. Degenerate rooms and failed pairs end up as zero-confidence
/// alignments and quality issues.
///
/// # Example
///
/// ```
/// use building_model::{BuildingRegistration, StitchConfig};
/// use building_types::{Point3, Room, RoomBoundary};
///
/// let registration = BuildingRegistration::new(StitchConfig::default()).unwrap();
/// let kitchen = RoomBoundary::rectangle(Point3::origin(), 3.0, 4.0).unwrap();
/// let rooms = vec![Room::new("kitchen").with_boundary(kitchen)];
///
/// let model = registration.run(rooms);
/// assert_eq!(model.metrics.room_count, 1);
/// assert_eq!(model.quality.overall_score, 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct BuildingRegistration {
    config: StitchConfig,
}

impl BuildingRegistration {
    /// Creates a pipeline with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error in `config`.
    pub fn new(config: StitchConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &StitchConfig {
        &self.config
    }

    /// Stitches `rooms`, in capture order, into a building model.
    #[must_use]
    pub fn run(&self, rooms: Vec<Room>) -> CombinedBuildingModel {
        self.stitch(rooms, None)
    }

    /// Like [`run`](Self::run), but stops registering once `cancel` is set.
    ///
    /// Pairs interrupted by cancellation keep the transform reached so far;
    /// the model is still complete.
    #[must_use]
    pub fn run_with_cancellation(
        &self,
        rooms: Vec<Room>,
        cancel: &CancellationToken,
    ) -> CombinedBuildingModel {
        self.stitch(rooms, Some(cancel))
    }

    fn stitch(
        &self,
        rooms: Vec<Room>,
        cancel: Option<&CancellationToken>,
    ) -> CombinedBuildingModel {
        let config = &self.config;
        info!(rooms = rooms.len(), policy = ?config.frame.policy, "stitching building");

        let clouds = extract_point_clouds(&rooms, config.sampling_spacing);
        debug!(
            points = clouds.iter().map(PointCloud::len).sum::<usize>(),
            "extracted point clouds"
        );

        let alignments = align_room_chain(&clouds, &config.icp, cancel);

        let loop_closure = match (config.frame.policy, clouds.first(), clouds.last()) {
            (FramePolicy::PoseGraph, Some(first), Some(last)) if clouds.len() >= 3 => {
                let closure = align_pair(last, first, &config.icp, cancel);
                info!(
                    source_room = closure.source_room,
                    confidence = closure.confidence,
                    "aligned loop closure"
                );
                Some(closure)
            }
            _ => None,
        };

        let frame = GlobalCoordinateSystem::build(
            &alignments,
            loop_closure.as_ref(),
            rooms.len(),
            &config.frame,
        );
        let mut quality = assess_alignment(&alignments, &config.quality);
        if let Some(closure) = loop_closure.as_ref().filter(|_| !frame.loop_closure_applied()) {
            quality = quality.with_rejected_loop_closure(closure);
        }

        CombinedBuildingModel::assemble(
            rooms,
            frame,
            quality,
            alignments,
            loop_closure,
            &config.assembly,
        )
    }
}
