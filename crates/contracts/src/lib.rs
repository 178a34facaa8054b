//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Uses the device's monotonic capture timestamp (`Duration`) as primary clock
//! - A `Frame` carries the timestamp of the capture it was assembled from
//!
//! ## Units
//! - Depth samples and raw tracker joints: millimeters
//! - Published joint positions and world-space points: meters

mod blueprint;
mod body;
mod calibration;
mod capture;
mod device;
mod device_config;
mod error;
mod frame;
mod geometry;

pub use blueprint::*;
pub use body::*;
pub use calibration::*;
pub use capture::*;
pub use device::*;
pub use device_config::*;
pub use error::*;
pub use frame::*;
pub use geometry::*;
