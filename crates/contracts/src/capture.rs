//! Capture - raw hardware data for one acquisition cycle.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Vector3;

/// Pixel layout of a raw image buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// Motion JPEG compressed frame
    Mjpg,
    /// Planar Y followed by interleaved UV, 4:2:0
    Nv12,
    /// Packed YUYV 4:2:2
    Yuy2,
    /// 8-bit B, G, R, A
    Bgra32,
    /// 16-bit little-endian depth in millimeters
    Depth16,
    /// One byte per pixel body index
    Custom8,
}

impl ImageFormat {
    /// Bytes per pixel for uncompressed packed formats
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Bgra32 => Some(4),
            Self::Depth16 | Self::Yuy2 => Some(2),
            Self::Custom8 => Some(1),
            Self::Mjpg | Self::Nv12 => None,
        }
    }
}

/// Raw image as delivered by the device
#[derive(Debug, Clone)]
pub struct Image {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes (0 for compressed formats)
    pub stride: u32,
    pub data: Bytes,
}

impl Image {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Hardware-synchronized bundle of color + depth + temperature
///
/// Owned by the producer for one cycle; anything that outlives the cycle is
/// copied out first.
#[derive(Debug, Clone)]
pub struct Capture {
    pub color: Option<Image>,
    pub depth: Option<Image>,
    /// Device temperature (°C)
    pub temperature_c: f32,
    /// Monotonic device timestamp
    pub device_timestamp: Duration,
}

/// One inertial reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImuSample {
    /// Linear acceleration (m/s²)
    pub accelerometer: Vector3,
    /// Angular velocity (rad/s)
    pub gyroscope: Vector3,
    /// IMU die temperature (°C)
    pub temperature_c: f32,
    pub accelerometer_timestamp: Duration,
    pub gyroscope_timestamp: Duration,
}
