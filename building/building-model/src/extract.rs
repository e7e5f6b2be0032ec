//! Point cloud extraction from captured room geometry.

use building_types::{PointCloud, Room, RoomGeometry};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::ModelResult;

/// Default distance between neighboring samples.
pub const DEFAULT_SAMPLING_SPACING: f64 = 0.1;

/// Finest spacing accepted by [`StitchConfig`](crate::StitchConfig).
pub const MIN_SAMPLING_SPACING: f64 = 1e-3;

/// Samples every surface of a room into one point cloud.
///
/// Walls come first, then the floor, then the ceiling; each surface is a
/// regular grid at `spacing` with the surface's oriented normal on every
/// point.
///
/// # Errors
///
/// Returns [`ModelError::Geometry`](crate::ModelError::Geometry) if a
/// surface would need more than
/// [`MAX_SURFACE_SAMPLES`](building_types::MAX_SURFACE_SAMPLES) samples at
/// `spacing`, or if the samples do not form a valid cloud.
pub fn try_extract_point_cloud(
    room_index: usize,
    geometry: &RoomGeometry,
    spacing: f64,
) -> ModelResult<PointCloud> {
    let mut points = Vec::new();
    let mut normals = Vec::new();

    for surface in geometry.surfaces() {
        let (p, n) = surface.try_sample(spacing)?;
        debug!(room_index, kind = surface.kind(), samples = p.len(), "sampled surface");
        points.extend(p);
        normals.extend(n);
    }

    Ok(PointCloud::new(room_index, points, normals)?)
}

/// Samples every surface of a room, falling back to an empty cloud.
///
/// A room without geometry, or geometry that cannot be sampled, yields an
/// empty cloud so the rest of the pipeline can still place the room.
///
/// # Example
///
/// ```
/// use building_model::extract_point_cloud;
/// use building_types::{PlanarPatch, Point3, RoomGeometry};
///
/// let geometry = RoomGeometry::new()
///     .with_floor(PlanarPatch::horizontal(Point3::origin(), 1.0, 1.0).unwrap());
///
/// let cloud = extract_point_cloud(3, &geometry, 0.5);
/// assert_eq!(cloud.room_index(), 3);
/// assert_eq!(cloud.len(), 9);
/// ```
#[must_use]
pub fn extract_point_cloud(room_index: usize, geometry: &RoomGeometry, spacing: f64) -> PointCloud {
    let cloud = try_extract_point_cloud(room_index, geometry, spacing).unwrap_or_else(|err| {
        warn!(room_index, %err, "could not sample room geometry, using empty cloud");
        PointCloud::empty(room_index)
    });

    if cloud.is_empty() {
        warn!(
            room_index,
            surfaces = geometry.surface_count(),
            "room produced no samples"
        );
    }
    cloud
}

/// Extracts one cloud per room, tagged with the room's position in `rooms`.
///
/// Rooms are sampled in parallel; the output order matches the input.
#[must_use]
pub fn extract_point_clouds(rooms: &[Room], spacing: f64) -> Vec<PointCloud> {
    rooms
        .par_iter()
        .enumerate()
        .map(|(i, room)| extract_point_cloud(i, &room.geometry, spacing))
        .collect()
}
