//! Multi-room building stitching.
//!
//! Takes rooms captured one at a time, each in its own local frame, and
//! places them into one building frame:
//!
//! 1. **Extraction** - Sample each room's walls, floor and ceiling into a
//!    point cloud with normals
//! 2. **Pairwise alignment** - Register room `i` onto room `i - 1` with ICP
//! 3. **Global frame** - Chain the pairwise transforms from room 0, optionally
//!    refined as a pose graph with a last-to-first loop closure
//! 4. **Quality** - Score the alignments and flag weak pairs
//! 5. **Assembly** - Combine everything into a [`CombinedBuildingModel`] with
//!    floor area, volume and bounds
//!
//! [`BuildingRegistration`] runs all stages with one [`StitchConfig`].
//!
//! # Layer 0
//!
//! No I/O and no global state. Every run owns its intermediate data, so
//! independent buildings can be stitched concurrently.
//!
//! # Example
//!
//! ```
//! use building_model::{BuildingRegistration, StitchConfig};
//! use building_types::{PlanarPatch, Point3, Room, RoomBoundary, RoomGeometry};
//!
//! let room = |name: &str, x: f64| {
//!     let corner = Point3::new(x, 0.0, 0.0);
//!     Room::new(name)
//!         .with_geometry(
//!             RoomGeometry::new().with_floor(PlanarPatch::horizontal(corner, 2.0, 2.0).unwrap()),
//!         )
//!         .with_boundary(RoomBoundary::rectangle(corner, 2.0, 2.0).unwrap())
//! };
//!
//! let registration = BuildingRegistration::new(StitchConfig::fast()).unwrap();
//! let model = registration.run(vec![room("hall", 0.0), room("study", 0.0)]);
//!
//! assert_eq!(model.metrics.room_count, 2);
//! assert!((model.metrics.total_floor_area - 8.0).abs() < 1e-9);
//! assert!(model.quality.overall_score > 0.9);
//! println!("{model}");
//! ```
//!
//! # Failure Policy
//!
//! Only configuration is validated up front. Empty rooms, rooms that do not
//! overlap and registrations that do not converge all still produce a
//! model; look at [`AlignmentQuality::issues`] to find them.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod assemble;
mod config;
mod error;
mod extract;
mod frame;
mod pairwise;
mod pipeline;
pub mod pose_graph;
mod quality;

pub use assemble::{compute_metrics, AssemblyParams, BuildingMetrics, CombinedBuildingModel};
pub use config::StitchConfig;
pub use error::{ModelError, ModelResult};
pub use extract::{
    extract_point_cloud, extract_point_clouds, try_extract_point_cloud, DEFAULT_SAMPLING_SPACING,
    MIN_SAMPLING_SPACING,
};
pub use frame::{FrameParams, FramePolicy, GlobalCoordinateSystem};
pub use pairwise::{align_pair, align_room_chain, AlignmentResult};
pub use pipeline::BuildingRegistration;
pub use pose_graph::PoseGraphParams;
pub use quality::{assess_alignment, AlignmentQuality, QualityIssue, QualityParams};

// Re-export registration types used in this crate's public API
pub use building_registration::{CancellationToken, IcpParams, IcpState, RigidTransform};
