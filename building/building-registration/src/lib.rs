//! Rigid registration of room point clouds.
//!
//! This crate provides the numerical core used to stitch rooms together:
//! - **Correspondence search** - Nearest neighbors within a distance limit,
//!   brute force or through a uniform hash grid
//! - **Transform estimation** - Kabsch (SVD) and linearized point-to-plane
//! - **ICP (Iterative Closest Point)** - The registration loop with
//!   convergence control, confidence scoring, cancellation and a time budget
//!
//! # Layer 0
//!
//! This is a Layer 0 crate: no I/O, no global state. Correspondence search
//! runs in parallel on the rayon pool; everything else is sequential.
//!
//! # Quick Start
//!
//! ```
//! use building_registration::{register, IcpParams, IcpState};
//! use building_types::PointCloud;
//! use nalgebra::{Point3, Vector3};
//!
//! let points: Vec<_> = (0..4)
//!     .flat_map(|i| (0..4).flat_map(move |j| (0..4).map(move |k| (i, j, k))))
//!     .map(|(i, j, k)| Point3::new(f64::from(i), f64::from(j), f64::from(k)))
//!     .collect();
//! let normals = vec![Vector3::z(); points.len()];
//!
//! let target = PointCloud::new(0, points.clone(), normals.clone()).unwrap();
//! let source_points = points.iter().map(|p| p + Vector3::new(0.2, -0.1, 0.0)).collect();
//! let source = PointCloud::new(1, source_points, normals).unwrap();
//!
//! let result = register(&source, &target, &IcpParams::default());
//!
//! assert_eq!(result.state, IcpState::Converged);
//! assert!(result.confidence > 0.99);
//! println!("{result}");
//! ```
//!
//! # Failure Policy
//!
//! Registration never fails on degenerate data. Too few correspondences,
//! empty clouds and numeric breakdowns fall back to the identity transform
//! and show up as infinite error and zero confidence. Errors are reserved
//! for invalid parameters and for the strict low-level estimators.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod cancel;
mod correspondence;
mod error;
mod estimate;
mod icp;
mod transform;

pub use cancel::CancellationToken;
pub use correspondence::{find_correspondences, Correspondence, NeighborSearch, TargetIndex};
pub use error::{RegistrationError, RegistrationResult};
pub use estimate::{
    estimate_transform, kabsch, point_to_plane, EstimationMethod, MIN_CORRESPONDENCES,
};
pub use icp::{
    confidence_from_error, register, register_with_cancellation, IcpParams, IcpResult, IcpState,
    StopReason,
};
pub use transform::RigidTransform;
