//! Error types for building model assembly.

use building_registration::RegistrationError;
use building_types::GeometryError;
use thiserror::Error;

/// Errors raised while setting up a stitching run.
///
/// Running a validated pipeline never fails; these only surface from
/// configuration checks and the strict extraction entry point.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ModelError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Registration parameters were rejected.
    #[error("registration: {0}")]
    Registration(#[from] RegistrationError),

    /// Captured geometry could not be turned into a point cloud.
    #[error("geometry: {0}")]
    Geometry(#[from] GeometryError),
}

/// Result type for building model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_error_converts() {
        let err: ModelError = RegistrationError::InvalidParameter("max_error".into()).into();
        assert!(matches!(err, ModelError::Registration(_)));
        assert_eq!(format!("{err}"), "registration: invalid parameter: max_error");
    }

    #[test]
    fn test_geometry_error_converts() {
        let err: ModelError = GeometryError::ZeroNormal(3).into();
        assert!(matches!(err, ModelError::Geometry(GeometryError::ZeroNormal(3))));
    }
}
