//! Calibration - fixed optical parameters of one open device.

use serde::{Deserialize, Serialize};

use crate::{ColorResolution, DepthMode};

/// Which optical element a coordinate belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationType {
    Depth,
    Color,
}

/// Pinhole intrinsics with Brown-Conrady distortion
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    // radial
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub k4: f32,
    pub k5: f32,
    pub k6: f32,
    // tangential
    pub p1: f32,
    pub p2: f32,
}

impl Intrinsics {
    /// Distortion-free pinhole model
    pub fn pinhole(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            ..Default::default()
        }
    }

    pub fn has_distortion(&self) -> bool {
        [
            self.k1, self.k2, self.k3, self.k4, self.k5, self.k6, self.p1, self.p2,
        ]
        .iter()
        .any(|&k| k != 0.0)
    }
}

/// Rigid transform between two optical elements
///
/// `p_target = rotation * p_source + translation`, millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    /// Row-major 3x3 rotation
    pub rotation: [f32; 9],
    /// Translation in millimeters
    pub translation: [f32; 3],
}

impl Extrinsics {
    pub const IDENTITY: Self = Self {
        rotation: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        translation: [0.0; 3],
    };
}

impl Default for Extrinsics {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Calibration of a single camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub resolution_width: u32,
    pub resolution_height: u32,
    pub intrinsics: Intrinsics,
    /// Radius (normalized image plane) beyond which the model is invalid; 0 = unlimited
    pub metric_radius: f32,
}

impl CameraCalibration {
    /// Placeholder for a stream that is turned off
    pub const DISABLED: Self = Self {
        resolution_width: 0,
        resolution_height: 0,
        intrinsics: Intrinsics {
            fx: 0.0,
            fy: 0.0,
            cx: 0.0,
            cy: 0.0,
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
            k4: 0.0,
            k5: 0.0,
            k6: 0.0,
            p1: 0.0,
            p2: 0.0,
        },
        metric_radius: 0.0,
    };

    pub fn is_enabled(&self) -> bool {
        self.resolution_width > 0 && self.resolution_height > 0
    }
}

/// Device calibration
///
/// Created once per session start; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub depth_mode: DepthMode,
    pub color_resolution: ColorResolution,
    pub depth_camera: CameraCalibration,
    pub color_camera: CameraCalibration,
    /// Depth camera frame -> color camera frame
    pub depth_to_color: Extrinsics,
}

impl Calibration {
    pub fn camera(&self, kind: CalibrationType) -> &CameraCalibration {
        match kind {
            CalibrationType::Depth => &self.depth_camera,
            CalibrationType::Color => &self.color_camera,
        }
    }

    /// Whether the stream behind `kind` is on
    pub fn is_enabled(&self, kind: CalibrationType) -> bool {
        self.camera(kind).is_enabled()
    }
}
