//! Core types for multi-room building scans.
//!
//! This crate provides the foundational types shared by the registration
//! and model-assembly crates:
//!
//! - [`PointCloud`] - Sampled surface points with unit normals, tagged with a room index
//! - [`PlanarPatch`] and [`Surface`] - Captured wall, floor and ceiling geometry
//! - [`RoomGeometry`] - All surfaces captured for one room
//! - [`RoomBoundary`] - Closed floor polygon with cached area, perimeter and center
//! - [`Room`] - One captured room as handed over by the capture pipeline
//! - [`Aabb`] - Axis-aligned bounding box
//!
//! # Layer 0 Crate
//!
//! This crate only depends on `nalgebra` and `thiserror` (plus `serde`
//! behind the `serde` feature). It performs no I/O and holds no global state.
//!
//! # Units
//!
//! All coordinates are `f64` and unit-agnostic. Capture pipelines usually
//! deliver meters.
//!
//! # Coordinate System
//!
//! Right-handed, **Z up**:
//! - X: width
//! - Y: depth
//! - Z: height
//!
//! # Example
//!
//! ```
//! use building_types::{PlanarPatch, Point3, Room, RoomBoundary, RoomGeometry};
//!
//! let floor = PlanarPatch::horizontal(Point3::new(0.0, 0.0, 0.0), 3.0, 4.0).unwrap();
//! let geometry = RoomGeometry::new().with_floor(floor);
//! let boundary = RoomBoundary::rectangle(Point3::new(0.0, 0.0, 0.0), 3.0, 4.0).unwrap();
//!
//! let room = Room::new("kitchen")
//!     .with_geometry(geometry)
//!     .with_boundary(boundary);
//!
//! assert!((room.floor_area() - 12.0).abs() < 1e-10);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod boundary;
mod bounds;
mod error;
mod pointcloud;
mod room;
mod surface;

pub use boundary::RoomBoundary;
pub use bounds::Aabb;
pub use error::{GeometryError, GeometryResult};
pub use pointcloud::PointCloud;
pub use room::Room;
pub use surface::{PlanarPatch, RoomGeometry, Surface, MAX_SURFACE_SAMPLES};

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};
