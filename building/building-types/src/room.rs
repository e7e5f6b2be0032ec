//! Captured room as delivered by the capture pipeline.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{RoomBoundary, RoomGeometry};

/// One scanned room in its own local coordinate frame.
///
/// # Example
///
/// ```
/// use building_types::{Point3, Room, RoomBoundary};
///
/// let room = Room::new("hall")
///     .with_boundary(RoomBoundary::rectangle(Point3::origin(), 2.0, 2.0).unwrap())
///     .with_ceiling_height(2.7);
///
/// assert_eq!(room.name, "hall");
/// assert!((room.floor_area() - 4.0).abs() < 1e-10);
/// assert_eq!(room.ceiling_height, Some(2.7));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Room {
    /// Display name given by the user or the capture app.
    pub name: String,
    /// Captured wall, floor and ceiling surfaces.
    pub geometry: RoomGeometry,
    /// Floor outline, when the capture produced one.
    pub boundary: Option<RoomBoundary>,
    /// Measured floor-to-ceiling height, when available.
    pub ceiling_height: Option<f64>,
}

impl Room {
    /// Creates a room with no geometry, boundary or measured height.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the captured surfaces.
    #[must_use]
    pub fn with_geometry(mut self, geometry: RoomGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Sets the floor outline.
    #[must_use]
    pub fn with_boundary(mut self, boundary: RoomBoundary) -> Self {
        self.boundary = Some(boundary);
        self
    }

    /// Sets the measured ceiling height.
    #[must_use]
    pub fn with_ceiling_height(mut self, height: f64) -> Self {
        self.ceiling_height = Some(height);
        self
    }

    /// Boundary area, or 0.0 for a room without a boundary.
    #[must_use]
    pub fn floor_area(&self) -> f64 {
        self.boundary.as_ref().map_or(0.0, RoomBoundary::area)
    }

    /// Measured ceiling height if it is a usable positive value.
    #[must_use]
    pub fn measured_height(&self) -> Option<f64> {
        self.ceiling_height.filter(|h| h.is_finite() && *h > 0.0)
    }
}
