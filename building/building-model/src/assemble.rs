//! Building model assembly and whole-building metrics.

use std::fmt;

use building_types::{Aabb, Room};
use tracing::info;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{AlignmentQuality, AlignmentResult, GlobalCoordinateSystem, ModelError, ModelResult};

/// Configuration for metric computation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AssemblyParams {
    /// Height used for rooms without a measured ceiling height.
    pub default_ceiling_height: f64,
}

impl Default for AssemblyParams {
    fn default() -> Self {
        Self {
            default_ceiling_height: 2.5,
        }
    }
}

impl AssemblyParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback ceiling height.
    #[must_use]
    pub const fn with_default_ceiling_height(mut self, height: f64) -> Self {
        self.default_ceiling_height = height;
        self
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] if the height is not a positive
    /// finite value.
    pub fn validate(&self) -> ModelResult<()> {
        if !self.default_ceiling_height.is_finite() || self.default_ceiling_height <= 0.0 {
            return Err(ModelError::InvalidConfig(format!(
                "default_ceiling_height must be positive, got {}",
                self.default_ceiling_height
            )));
        }
        Ok(())
    }
}

/// Whole-building figures.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BuildingMetrics {
    /// Sum of room floor areas.
    pub total_floor_area: f64,
    /// Sum of floor area times ceiling height.
    pub total_volume: f64,
    /// Number of rooms, with or without a boundary.
    pub room_count: usize,
    /// `total_floor_area / room_count`, or 0.0 without rooms.
    pub average_room_size: f64,
    /// Bounds of every boundary vertex in the building frame; empty when no
    /// room has a boundary.
    pub bounding_box: Aabb,
}

impl fmt::Display for BuildingMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rooms, floor area {:.2}, volume {:.2}, average room {:.2}",
            self.room_count, self.total_floor_area, self.total_volume, self.average_room_size
        )
    }
}

/// Computes building metrics. Pure: identical inputs give identical output.
#[must_use]
pub fn compute_metrics(
    rooms: &[Room],
    frame: &GlobalCoordinateSystem,
    params: &AssemblyParams,
) -> BuildingMetrics {
    let mut total_floor_area = 0.0;
    let mut total_volume = 0.0;
    let mut bounding_box = Aabb::empty();

    for (index, room) in rooms.iter().enumerate() {
        let area = room.floor_area();
        let height = room.measured_height().unwrap_or(params.default_ceiling_height);
        total_floor_area += area;
        total_volume += area * height;

        if let Some(boundary) = &room.boundary {
            for vertex in boundary.vertices() {
                bounding_box.expand_to_include(&frame.to_global(index, vertex));
            }
        }
    }

    let room_count = rooms.len();
    #[allow(clippy::cast_precision_loss)]
    let average_room_size = if room_count == 0 {
        0.0
    } else {
        total_floor_area / room_count as f64
    };

    BuildingMetrics {
        total_floor_area,
        total_volume,
        room_count,
        average_room_size,
        bounding_box,
    }
}

/// Stitched building: rooms, their placement, and how much to trust it.
///
/// A snapshot of one run; rebuild it to change anything.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CombinedBuildingModel {
    /// Rooms as received, in input order.
    pub rooms: Vec<Room>,
    /// Shared frame with one transform per room.
    pub frame: GlobalCoordinateSystem,
    /// Quality of the chain alignments.
    pub quality: AlignmentQuality,
    /// Chain alignments, room `i` onto room `i - 1`.
    pub alignments: Vec<AlignmentResult>,
    /// Last-to-first alignment, when one was attempted.
    pub loop_closure: Option<AlignmentResult>,
    /// Whole-building figures.
    pub metrics: BuildingMetrics,
}

impl CombinedBuildingModel {
    /// Assembles a model and computes its metrics.
    #[must_use]
    pub fn assemble(
        rooms: Vec<Room>,
        frame: GlobalCoordinateSystem,
        quality: AlignmentQuality,
        alignments: Vec<AlignmentResult>,
        loop_closure: Option<AlignmentResult>,
        params: &AssemblyParams,
    ) -> Self {
        let metrics = compute_metrics(&rooms, &frame, params);
        info!(
            rooms = metrics.room_count,
            total_floor_area = metrics.total_floor_area,
            total_volume = metrics.total_volume,
            overall_score = quality.overall_score,
            "assembled building model"
        );

        Self {
            rooms,
            frame,
            quality,
            alignments,
            loop_closure,
            metrics,
        }
    }

    /// Number of rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl fmt::Display for CombinedBuildingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Building: {}", self.metrics)?;
        writeln!(f, "Alignment: {}", self.quality)?;
        for alignment in &self.alignments {
            writeln!(f, "  {alignment}")?;
        }
        for issue in &self.quality.issues {
            writeln!(f, "  ! {issue}")?;
        }
        Ok(())
    }
}
