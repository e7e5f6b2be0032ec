//! Captured room surfaces: walls, floor and ceiling.
//!
//! The capture pipeline reports every surface as a planar rectangle. Each one
//! is stored as a [`PlanarPatch`]; the [`Surface`] enum tags it with its role
//! and gives every kind the same [`sample`](Surface::sample) capability.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{GeometryError, GeometryResult};

/// Tolerance for the in-plane axes to count as orthonormal.
const AXIS_TOLERANCE: f64 = 1e-6;

/// Slack added before flooring `extent / spacing` so exact multiples keep their far edge.
const SAMPLE_SLACK: f64 = 1e-9;

/// Upper bound on the number of grid samples taken from a single surface.
pub const MAX_SURFACE_SAMPLES: usize = 4_000_000;

/// A planar rectangle: a corner, two orthonormal in-plane axes and two extents.
///
/// Fields are private so a patch is always valid once constructed.
///
/// # Example
///
/// ```
/// use building_types::{PlanarPatch, Point3};
///
/// let wall = PlanarPatch::wall(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(4.0, 0.0, 0.0),
///     2.5,
/// )
/// .unwrap();
///
/// assert!((wall.width() - 4.0).abs() < 1e-12);
/// assert!((wall.area() - 10.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlanarPatch {
    origin: Point3<f64>,
    u_axis: Vector3<f64>,
    v_axis: Vector3<f64>,
    width: f64,
    height: f64,
}

impl PlanarPatch {
    /// Creates a patch spanning `width` along `u_axis` and `height` along `v_axis`.
    ///
    /// The axes are normalized and must be orthogonal.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::NonFinite`] for NaN/infinite input and
    /// [`GeometryError::DegeneratePatch`] for zero-length or non-orthogonal
    /// axes or non-positive extents.
    pub fn new(
        origin: Point3<f64>,
        u_axis: Vector3<f64>,
        v_axis: Vector3<f64>,
        width: f64,
        height: f64,
    ) -> GeometryResult<Self> {
        let finite = origin.coords.iter().all(|c| c.is_finite())
            && u_axis.iter().all(|c| c.is_finite())
            && v_axis.iter().all(|c| c.is_finite())
            && width.is_finite()
            && height.is_finite();
        if !finite {
            return Err(GeometryError::NonFinite("planar patch"));
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(GeometryError::DegeneratePatch(format!(
                "extents must be positive, got {width} x {height}"
            )));
        }

        let u = u_axis
            .try_normalize(f64::EPSILON)
            .ok_or_else(|| GeometryError::DegeneratePatch("zero-length u axis".to_string()))?;
        let v = v_axis
            .try_normalize(f64::EPSILON)
            .ok_or_else(|| GeometryError::DegeneratePatch("zero-length v axis".to_string()))?;
        if u.dot(&v).abs() > AXIS_TOLERANCE {
            return Err(GeometryError::DegeneratePatch(
                "in-plane axes are not orthogonal".to_string(),
            ));
        }

        Ok(Self {
            origin,
            u_axis: u,
            v_axis: v,
            width,
            height,
        })
    }

    /// A horizontal rectangle with one corner at `corner`, spanning +X and +Y.
    ///
    /// # Errors
    ///
    /// Same as [`PlanarPatch::new`].
    pub fn horizontal(corner: Point3<f64>, width_x: f64, depth_y: f64) -> GeometryResult<Self> {
        Self::new(corner, Vector3::x(), Vector3::y(), width_x, depth_y)
    }

    /// A vertical wall rising `height` from the base line `start -> end`.
    ///
    /// The base line is projected onto the horizontal plane through `start`.
    ///
    /// # Errors
    ///
    /// Same as [`PlanarPatch::new`]; a vertical base line is degenerate.
    pub fn wall(start: Point3<f64>, end: Point3<f64>, height: f64) -> GeometryResult<Self> {
        let run = Vector3::new(end.x - start.x, end.y - start.y, 0.0);
        Self::new(start, run, Vector3::z(), run.norm(), height)
    }

    /// Corner the patch is spanned from.
    #[must_use]
    pub const fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// Unit axis along the width.
    #[must_use]
    pub const fn u_axis(&self) -> Vector3<f64> {
        self.u_axis
    }

    /// Unit axis along the height.
    #[must_use]
    pub const fn v_axis(&self) -> Vector3<f64> {
        self.v_axis
    }

    /// Extent along the u axis.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Extent along the v axis.
    #[must_use]
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Right-handed unit normal `u x v`.
    #[must_use]
    pub fn normal(&self) -> Vector3<f64> {
        self.u_axis.cross(&self.v_axis)
    }

    /// Patch area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Center of the rectangle.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        self.origin + self.u_axis * (self.width * 0.5) + self.v_axis * (self.height * 0.5)
    }

    /// Regular grid positions at `spacing`, row-major along u then v.
    ///
    /// Both edges are included when the extent is a multiple of the spacing.
    /// A non-positive or non-finite spacing yields no samples, and so does a
    /// spacing fine enough to exceed [`MAX_SURFACE_SAMPLES`]; use
    /// [`try_grid_points`](Self::try_grid_points) to tell the two apart.
    #[must_use]
    pub fn grid_points(&self, spacing: f64) -> Vec<Point3<f64>> {
        self.try_grid_points(spacing).unwrap_or_default()
    }

    /// Regular grid positions at `spacing`, failing instead of allocating an
    /// oversized grid.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::TooManySamples`] if the grid would hold more
    /// than [`MAX_SURFACE_SAMPLES`] points.
    pub fn try_grid_points(&self, spacing: f64) -> GeometryResult<Vec<Point3<f64>>> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Ok(Vec::new());
        }
        let too_many = GeometryError::TooManySamples {
            limit: MAX_SURFACE_SAMPLES,
        };
        let (Some(nu), Some(nv)) = (
            samples_along(self.width, spacing),
            samples_along(self.height, spacing),
        ) else {
            return Err(too_many);
        };
        let total = match nu.checked_mul(nv) {
            Some(total) if total <= MAX_SURFACE_SAMPLES => total,
            _ => return Err(too_many),
        };

        let mut points = Vec::with_capacity(total);
        for j in 0..nv {
            #[allow(clippy::cast_precision_loss)]
            let dv = j as f64 * spacing;
            for i in 0..nu {
                #[allow(clippy::cast_precision_loss)]
                let du = i as f64 * spacing;
                points.push(self.origin + self.u_axis * du + self.v_axis * dv);
            }
        }
        Ok(points)
    }
}

/// Number of grid samples along an extent, counting both ends.
///
/// `None` when the count would not stay under [`MAX_SURFACE_SAMPLES`].
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn samples_along(extent: f64, spacing: f64) -> Option<usize> {
    let steps = (extent / spacing + SAMPLE_SLACK).floor();
    if !steps.is_finite() || steps >= MAX_SURFACE_SAMPLES as f64 {
        return None;
    }
    Some(steps as usize + 1)
}

/// A captured surface tagged with its role in the room.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Surface {
    /// A vertical wall segment.
    Wall(PlanarPatch),
    /// The floor; sampled normals point up (+Z).
    Floor(PlanarPatch),
    /// The ceiling; sampled normals point down (-Z).
    Ceiling(PlanarPatch),
}

impl Surface {
    /// The underlying rectangle.
    #[must_use]
    pub const fn patch(&self) -> &PlanarPatch {
        match self {
            Self::Wall(p) | Self::Floor(p) | Self::Ceiling(p) => p,
        }
    }

    /// Short lowercase name of the surface kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Wall(_) => "wall",
            Self::Floor(_) => "floor",
            Self::Ceiling(_) => "ceiling",
        }
    }

    /// Unit normal oriented for this kind of surface.
    #[must_use]
    pub fn normal(&self) -> Vector3<f64> {
        let n = self.patch().normal();
        match self {
            Self::Wall(_) => n,
            Self::Floor(_) if n.z < 0.0 => -n,
            Self::Ceiling(_) if n.z > 0.0 => -n,
            Self::Floor(_) | Self::Ceiling(_) => n,
        }
    }

    /// Samples the surface on a regular grid, pairing every point with the surface normal.
    ///
    /// # Example
    ///
    /// ```
    /// use building_types::{PlanarPatch, Point3, Surface};
    ///
    /// let floor = PlanarPatch::horizontal(Point3::origin(), 1.0, 1.0).unwrap();
    /// let (points, normals) = Surface::Floor(floor).sample(0.1);
    ///
    /// assert_eq!(points.len(), 121);
    /// assert_eq!(normals.len(), points.len());
    /// assert!((normals[0].z - 1.0).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn sample(&self, spacing: f64) -> (Vec<Point3<f64>>, Vec<Vector3<f64>>) {
        self.try_sample(spacing).unwrap_or_default()
    }

    /// Like [`sample`](Self::sample), but reports an oversized grid.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::TooManySamples`] if the spacing is too fine
    /// for the surface extent.
    pub fn try_sample(
        &self,
        spacing: f64,
    ) -> GeometryResult<(Vec<Point3<f64>>, Vec<Vector3<f64>>)> {
        let points = self.patch().try_grid_points(spacing)?;
        let normals = vec![self.normal(); points.len()];
        Ok((points, normals))
    }
}

/// All surfaces captured for one room, in the room's local frame.
///
/// At most one floor and one ceiling; any number of walls.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoomGeometry {
    /// Wall segments.
    pub walls: Vec<PlanarPatch>,
    /// Floor surface, if captured.
    pub floor: Option<PlanarPatch>,
    /// Ceiling surface, if captured.
    pub ceiling: Option<PlanarPatch>,
}

impl RoomGeometry {
    /// Creates empty geometry (a failed capture).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a wall segment.
    #[must_use]
    pub fn with_wall(mut self, wall: PlanarPatch) -> Self {
        self.walls.push(wall);
        self
    }

    /// Sets the floor surface, replacing any previous one.
    #[must_use]
    pub fn with_floor(mut self, floor: PlanarPatch) -> Self {
        self.floor = Some(floor);
        self
    }

    /// Sets the ceiling surface, replacing any previous one.
    #[must_use]
    pub fn with_ceiling(mut self, ceiling: PlanarPatch) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// Iterates over every surface: walls first, then floor, then ceiling.
    pub fn surfaces(&self) -> impl Iterator<Item = Surface> + '_ {
        self.walls
            .iter()
            .copied()
            .map(Surface::Wall)
            .chain(self.floor.map(Surface::Floor))
            .chain(self.ceiling.map(Surface::Ceiling))
    }

    /// Number of surfaces.
    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.walls.len() + usize::from(self.floor.is_some()) + usize::from(self.ceiling.is_some())
    }

    /// True when nothing usable was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surface_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_patch_rejects_bad_extents() {
        let result = PlanarPatch::horizontal(Point3::origin(), 0.0, 1.0);
        assert!(matches!(result, Err(GeometryError::DegeneratePatch(_))));

        let result = PlanarPatch::horizontal(Point3::origin(), f64::NAN, 1.0);
        assert!(matches!(result, Err(GeometryError::NonFinite(_))));
    }

    #[test]
    fn test_patch_rejects_non_orthogonal_axes() {
        let result = PlanarPatch::new(
            Point3::origin(),
            Vector3::x(),
            Vector3::new(1.0, 1.0, 0.0),
            1.0,
            1.0,
        );
        assert!(matches!(result, Err(GeometryError::DegeneratePatch(_))));
    }

    #[test]
    fn test_vertical_wall_base_is_degenerate() {
        let result = PlanarPatch::wall(Point3::origin(), Point3::new(0.0, 0.0, 3.0), 2.5);
        assert!(matches!(result, Err(GeometryError::DegeneratePatch(_))));
    }

    #[test]
    fn test_wall_geometry() {
        let wall = PlanarPatch::wall(Point3::new(1.0, 1.0, 0.0), Point3::new(1.0, 4.0, 0.0), 2.0)
            .unwrap();
        assert_relative_eq!(wall.width(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(wall.normal(), Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(wall.center(), Point3::new(1.0, 2.5, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_grid_counts_include_edges() {
        let patch = PlanarPatch::horizontal(Point3::origin(), 2.0, 1.0).unwrap();
        // 21 samples along 2.0, 11 along 1.0
        assert_eq!(patch.grid_points(0.1).len(), 21 * 11);
        // Extent not a multiple of spacing: far edge is not reached
        assert_eq!(patch.grid_points(0.3).len(), 7 * 4);
    }

    #[test]
    fn test_grid_invalid_spacing_is_empty() {
        let patch = PlanarPatch::horizontal(Point3::origin(), 1.0, 1.0).unwrap();
        assert!(patch.grid_points(0.0).is_empty());
        assert!(patch.grid_points(-1.0).is_empty());
        assert!(patch.grid_points(f64::NAN).is_empty());
    }

    #[test]
    fn test_tiny_spacing_is_capped() {
        let patch = PlanarPatch::horizontal(Point3::origin(), 1.0, 1.0).unwrap();
        let too_many = GeometryError::TooManySamples {
            limit: MAX_SURFACE_SAMPLES,
        };

        assert_eq!(patch.try_grid_points(1e-300), Err(too_many.clone()));
        assert!(patch.grid_points(1e-300).is_empty());
        // Each axis fits under the cap on its own, the product does not
        assert_eq!(patch.try_grid_points(1e-4), Err(too_many.clone()));
        assert_eq!(Surface::Floor(patch).try_sample(f64::MIN_POSITIVE), Err(too_many));
    }

    #[test]
    fn test_huge_extent_is_capped() {
        let patch = PlanarPatch::horizontal(Point3::origin(), 1e12, 1.0).unwrap();
        assert!(patch.try_grid_points(0.1).is_err());

        let (points, normals) = Surface::Floor(patch).sample(0.1);
        assert!(points.is_empty());
        assert!(normals.is_empty());
    }

    #[test]
    fn test_grid_points_lie_on_patch() {
        let patch = PlanarPatch::wall(Point3::new(0.0, 0.0, 0.0), Point3::new(3.0, 4.0, 0.0), 2.0)
            .unwrap();
        let n = patch.normal();
        for p in patch.grid_points(0.25) {
            assert!((p - patch.origin()).dot(&n).abs() < 1e-12);
            assert!(p.z >= -1e-12 && p.z <= 2.0 + 1e-12);
        }
    }

    #[test]
    fn test_floor_and_ceiling_orientation() {
        // Patch whose right-handed normal points down
        let flipped = PlanarPatch::new(Point3::origin(), Vector3::y(), Vector3::x(), 1.0, 1.0)
            .unwrap();
        assert!(flipped.normal().z < 0.0);

        assert_relative_eq!(Surface::Floor(flipped).normal(), Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(Surface::Ceiling(flipped).normal(), -Vector3::z(), epsilon = 1e-12);

        let up = PlanarPatch::horizontal(Point3::new(0.0, 0.0, 2.5), 1.0, 1.0).unwrap();
        assert_relative_eq!(Surface::Ceiling(up).normal(), -Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_room_geometry_surface_order() {
        let wall = PlanarPatch::wall(Point3::origin(), Point3::new(1.0, 0.0, 0.0), 1.0).unwrap();
        let floor = PlanarPatch::horizontal(Point3::origin(), 1.0, 1.0).unwrap();
        let ceiling = PlanarPatch::horizontal(Point3::new(0.0, 0.0, 1.0), 1.0, 1.0).unwrap();

        let geometry = RoomGeometry::new()
            .with_ceiling(ceiling)
            .with_wall(wall)
            .with_floor(floor);

        let kinds: Vec<&str> = geometry.surfaces().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec!["wall", "floor", "ceiling"]);
        assert_eq!(geometry.surface_count(), 3);
        assert!(RoomGeometry::new().is_empty());
    }
}
