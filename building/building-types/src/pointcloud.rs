//! Per-room sampled point cloud.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Aabb, GeometryError, GeometryResult};

/// Surface samples of one room in that room's local frame.
///
/// Every point has exactly one unit normal (`points.len() == normals.len()`).
/// The cloud is immutable once built; registration only reads it.
///
/// # Example
///
/// ```
/// use building_types::{PointCloud, Point3, Vector3};
///
/// let cloud = PointCloud::new(
///     2,
///     vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
///     vec![Vector3::new(0.0, 0.0, 2.0), Vector3::new(0.0, 0.0, 1.0)],
/// )
/// .unwrap();
///
/// assert_eq!(cloud.room_index(), 2);
/// assert_eq!(cloud.len(), 2);
/// assert!((cloud.normals()[0].norm() - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointCloud {
    room_index: usize,
    points: Vec<Point3<f64>>,
    normals: Vec<Vector3<f64>>,
}

impl PointCloud {
    /// Builds a cloud from parallel point and normal lists.
    ///
    /// Normals are normalized.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::LengthMismatch`] if the lists differ in length,
    /// [`GeometryError::NonFinite`] for NaN/infinite coordinates, and
    /// [`GeometryError::ZeroNormal`] for a normal that cannot be normalized.
    pub fn new(
        room_index: usize,
        points: Vec<Point3<f64>>,
        normals: Vec<Vector3<f64>>,
    ) -> GeometryResult<Self> {
        if points.len() != normals.len() {
            return Err(GeometryError::LengthMismatch {
                points: points.len(),
                normals: normals.len(),
            });
        }
        if points.iter().any(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return Err(GeometryError::NonFinite("point cloud points"));
        }

        let mut unit_normals = Vec::with_capacity(normals.len());
        for (i, n) in normals.into_iter().enumerate() {
            let unit = n
                .try_normalize(f64::EPSILON)
                .ok_or(GeometryError::ZeroNormal(i))?;
            unit_normals.push(unit);
        }

        Ok(Self {
            room_index,
            points,
            normals: unit_normals,
        })
    }

    /// An empty cloud for a room whose capture produced no usable geometry.
    #[must_use]
    pub const fn empty(room_index: usize) -> Self {
        Self {
            room_index,
            points: Vec::new(),
            normals: Vec::new(),
        }
    }

    /// Index of the room this cloud was sampled from.
    #[must_use]
    pub const fn room_index(&self) -> usize {
        self.room_index
    }

    /// Sampled positions.
    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Unit normals, parallel to [`points`](Self::points).
    #[must_use]
    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the cloud holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounding box of all points (empty box for an empty cloud).
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.points.iter())
    }

    /// Mean of all points, or `None` for an empty cloud.
    #[must_use]
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.points.is_empty() {
            return None;
        }
        let sum: Vector3<f64> = self.points.iter().map(|p| p.coords).sum();
        #[allow(clippy::cast_precision_loss)]
        let n = self.points.len() as f64;
        Some(Point3::from(sum / n))
    }
}
