//! # Coordinate Mapper
//!
//! Conversions between color pixels, depth pixels and metric camera space,
//! driven by a device `Calibration`.
//!
//! - [`Transformation`]: stateless point and image transforms (millimeters)
//! - [`CoordinateMapper`]: per-cycle session that caches the depth-in-color
//!   reprojection and answers queries in meters

mod lens;
mod mapper;
mod transformation;

pub use mapper::*;
pub use transformation::*;
