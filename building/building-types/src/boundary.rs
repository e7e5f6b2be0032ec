//! Room boundary polygons.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Aabb, GeometryError, GeometryResult};

/// Minimum number of distinct vertices in a boundary loop.
const MIN_VERTICES: usize = 3;

/// Closed floor polygon of a room.
///
/// The loop is implicitly closed: the last vertex connects back to the first.
/// Center, area and perimeter are computed once at construction.
///
/// Area uses Newell's method, so the polygon may lie in any plane, not only
/// the horizontal one.
///
/// # Example
///
/// ```
/// use building_types::{Point3, RoomBoundary};
///
/// let boundary = RoomBoundary::new(vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(3.0, 0.0, 0.0),
///     Point3::new(3.0, 4.0, 0.0),
///     Point3::new(0.0, 4.0, 0.0),
/// ])
/// .unwrap();
///
/// assert!((boundary.area() - 12.0).abs() < 1e-10);
/// assert!((boundary.perimeter() - 14.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoomBoundary {
    vertices: Vec<Point3<f64>>,
    center: Point3<f64>,
    area: f64,
    perimeter: f64,
}

impl RoomBoundary {
    /// Builds a boundary from an ordered vertex loop.
    ///
    /// A trailing vertex equal to the first one (an explicitly closed loop)
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InsufficientVertices`] for fewer than three
    /// vertices and [`GeometryError::NonFinite`] for NaN/infinite coordinates.
    pub fn new(mut vertices: Vec<Point3<f64>>) -> GeometryResult<Self> {
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < MIN_VERTICES {
            return Err(GeometryError::InsufficientVertices {
                required: MIN_VERTICES,
                provided: vertices.len(),
            });
        }
        if vertices
            .iter()
            .any(|v| !v.coords.iter().all(|c| c.is_finite()))
        {
            return Err(GeometryError::NonFinite("boundary vertices"));
        }

        let center = vertex_mean(&vertices);
        let area = newell_normal(&vertices).norm() * 0.5;
        let perimeter = closed_loop_length(&vertices);

        Ok(Self {
            vertices,
            center,
            area,
            perimeter,
        })
    }

    /// Axis-aligned rectangle in the horizontal plane through `corner`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::NonFinite`] for NaN/infinite input.
    pub fn rectangle(corner: Point3<f64>, width_x: f64, depth_y: f64) -> GeometryResult<Self> {
        Self::new(vec![
            corner,
            corner + Vector3::new(width_x, 0.0, 0.0),
            corner + Vector3::new(width_x, depth_y, 0.0),
            corner + Vector3::new(0.0, depth_y, 0.0),
        ])
    }

    /// Ordered polygon vertices (closing edge implied).
    #[must_use]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// Mean of the vertices.
    #[must_use]
    pub const fn center(&self) -> Point3<f64> {
        self.center
    }

    /// Enclosed area.
    #[must_use]
    pub const fn area(&self) -> f64 {
        self.area
    }

    /// Length of the closed loop.
    #[must_use]
    pub const fn perimeter(&self) -> f64 {
        self.perimeter
    }

    /// Bounding box of the vertices.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter())
    }
}

fn vertex_mean(vertices: &[Point3<f64>]) -> Point3<f64> {
    let sum: Vector3<f64> = vertices.iter().map(|p| p.coords).sum();
    #[allow(clippy::cast_precision_loss)]
    let n = vertices.len() as f64;
    Point3::from(sum / n)
}

/// Newell's polygon normal; its length is twice the polygon area.
fn newell_normal(vertices: &[Point3<f64>]) -> Vector3<f64> {
    // Relative to the first vertex to keep cross products small for far-away rooms
    let anchor = vertices[0];
    let mut normal = Vector3::zeros();
    for (i, current) in vertices.iter().enumerate() {
        let next = vertices[(i + 1) % vertices.len()];
        normal += (current - anchor).cross(&(next - anchor));
    }
    normal
}

fn closed_loop_length(vertices: &[Point3<f64>]) -> f64 {
    vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|(a, b)| (b - a).norm())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rectangle_metrics() {
        let boundary = RoomBoundary::rectangle(Point3::new(1.0, 1.0, 0.0), 3.0, 4.0).unwrap();
        assert_relative_eq!(boundary.area(), 12.0, epsilon = 1e-10);
        assert_relative_eq!(boundary.perimeter(), 14.0, epsilon = 1e-10);
        assert_relative_eq!(boundary.center(), Point3::new(2.5, 3.0, 0.0), epsilon = 1e-10);
    }

    #[test]
    fn test_clockwise_loop_has_positive_area() {
        let boundary = RoomBoundary::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ])
        .unwrap();
        assert_relative_eq!(boundary.area(), 4.0, epsilon = 1e-10);
    }

    #[test]
    fn test_l_shaped_room() {
        // 4x4 square with a 2x2 notch removed
        let boundary = RoomBoundary::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(4.0, 2.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(2.0, 4.0, 0.0),
            Point3::new(0.0, 4.0, 0.0),
        ])
        .unwrap();
        assert_relative_eq!(boundary.area(), 12.0, epsilon = 1e-10);
        assert_relative_eq!(boundary.perimeter(), 16.0, epsilon = 1e-10);
    }

    #[test]
    fn test_tilted_polygon_area() {
        // Unit square rotated into the XZ plane
        let boundary = RoomBoundary::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, 1.0),
        ])
        .unwrap();
        assert_relative_eq!(boundary.area(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_explicitly_closed_loop() {
        let boundary = RoomBoundary::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(boundary.vertices().len(), 3);
        assert_relative_eq!(boundary.area(), 0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_too_few_vertices() {
        let result = RoomBoundary::new(vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)]);
        assert!(matches!(
            result,
            Err(GeometryError::InsufficientVertices {
                required: 3,
                provided: 2
            })
        ));
    }

    #[test]
    fn test_non_finite_vertex() {
        let result = RoomBoundary::new(vec![
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(f64::INFINITY, 1.0, 0.0),
        ]);
        assert!(matches!(result, Err(GeometryError::NonFinite(_))));
    }
}
