//! Error types for registration operations.

use thiserror::Error;

/// Errors that can occur during registration.
///
/// The ICP loop itself never returns these for degenerate data; it falls back
/// to the identity transform. They surface from parameter validation and from
/// the low-level estimators for callers that want the strict variants.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum RegistrationError {
    /// Too few point pairs to estimate a rigid transform.
    #[error("at least {required} correspondences required, got {provided}")]
    InsufficientCorrespondences {
        /// Number required.
        required: usize,
        /// Number provided.
        provided: usize,
    },

    /// Paired point sets differ in length.
    #[error("point sets must have equal length: {source_len} vs {target_len}")]
    MismatchedLengths {
        /// Length of the source set.
        source_len: usize,
        /// Length of the target set.
        target_len: usize,
    },

    /// SVD computation failed during transform estimation.
    #[error("SVD computation failed during transform estimation")]
    SvdFailed,

    /// The point-to-plane normal equations are singular.
    #[error("point-to-plane system is singular")]
    SingularSystem,

    /// A 4x4 matrix does not hold a proper rotation.
    #[error("matrix is not a rigid transform: {0}")]
    NotRigid(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;
