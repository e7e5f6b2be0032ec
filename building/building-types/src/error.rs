//! Error types for room geometry construction.

use thiserror::Error;

/// Errors raised when building geometry values from captured data.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum GeometryError {
    /// Points and normals of a point cloud differ in length.
    #[error("point cloud has {points} points but {normals} normals")]
    LengthMismatch {
        /// Number of points.
        points: usize,
        /// Number of normals.
        normals: usize,
    },

    /// A boundary polygon has too few distinct vertices.
    #[error("boundary needs at least {required} vertices, got {provided}")]
    InsufficientVertices {
        /// Minimum vertex count.
        required: usize,
        /// Vertex count provided.
        provided: usize,
    },

    /// A coordinate or extent is NaN or infinite.
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    /// A planar patch has a zero-length or non-orthogonal axis, or a non-positive extent.
    #[error("degenerate planar patch: {0}")]
    DegeneratePatch(String),

    /// A normal vector has zero length and cannot be normalized.
    #[error("normal at index {0} has zero length")]
    ZeroNormal(usize),

    /// Sampling a surface at the requested spacing would exceed the sample cap.
    #[error("sampling would produce more than {limit} points on one surface")]
    TooManySamples {
        /// Maximum samples per surface.
        limit: usize,
    },
}

/// Result type for geometry construction.
pub type GeometryResult<T> = Result<T, GeometryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_message() {
        let err = GeometryError::LengthMismatch {
            points: 3,
            normals: 2,
        };
        assert_eq!(format!("{err}"), "point cloud has 3 points but 2 normals");
    }

    #[test]
    fn test_insufficient_vertices_message() {
        let err = GeometryError::InsufficientVertices {
            required: 3,
            provided: 2,
        };
        assert_eq!(
            format!("{err}"),
            "boundary needs at least 3 vertices, got 2"
        );
    }

    #[test]
    fn test_too_many_samples_message() {
        let err = GeometryError::TooManySamples { limit: 4_000_000 };
        assert_eq!(
            format!("{err}"),
            "sampling would produce more than 4000000 points on one surface"
        );
    }
}
