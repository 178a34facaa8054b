//! Hardware seams - depth camera and skeletal tracker abstractions
//!
//! The acquisition pipeline only talks to these traits, so a real SDK binding
//! and the mock hardware share one code path.
//!
//! # Ownership
//!
//! `DeviceDriver::open` and `TrackerEngine::create` hand out owned handles. The
//! producer loop takes ownership of both for the whole `Running` phase; nothing
//! else touches them until the loop has been joined.

use std::time::Duration;

use crate::{
    Calibration, Capture, ConfidenceLevel, DeviceConfig, DeviceError, Image, ImuSample, JointId,
    Quaternion, TrackerConfig, Vector3,
};

/// Device enumeration and open
pub trait DeviceDriver: Send + Sync {
    /// Camera handle type returned by `open`
    type Camera: DepthCamera;

    /// Number of devices currently attached
    fn installed_count(&self) -> u32;

    /// Open the device at `index`
    ///
    /// # Errors
    /// `DeviceUnavailable` if the device is claimed elsewhere or disconnected.
    fn open(&self, index: u32) -> Result<Self::Camera, DeviceError>;
}

/// An opened depth camera with an inertial unit
pub trait DepthCamera: Send + 'static {
    /// Device serial number (diagnostics)
    fn serial_number(&self) -> String;

    /// Start color/depth streaming
    ///
    /// # Errors
    /// `InvalidConfiguration` when the mode combination is not supported.
    fn start_cameras(&mut self, config: &DeviceConfig) -> Result<(), DeviceError>;

    /// Start the inertial stream; requires running cameras
    fn start_imu(&mut self) -> Result<(), DeviceError>;

    /// Calibration for the mode the cameras were started with
    fn calibration(&self) -> Result<Calibration, DeviceError>;

    /// Block until the next capture or until `timeout` elapses
    fn get_capture(&mut self, timeout: Duration) -> Result<Capture, DeviceError>;

    /// Next queued inertial sample, `Ok(None)` if none arrived within `timeout`
    fn get_imu_sample(&mut self, timeout: Duration) -> Result<Option<ImuSample>, DeviceError>;

    fn stop_cameras(&mut self) -> Result<(), DeviceError>;

    fn stop_imu(&mut self) -> Result<(), DeviceError>;

    /// Release the device; later calls fail with `Disposed`
    fn close(&mut self) -> Result<(), DeviceError>;
}

/// Factory for tracker sessions bound to a calibration
pub trait TrackerEngine: Send + Sync {
    type Tracker: BodyTracker;

    fn create(
        &self,
        calibration: &Calibration,
        config: &TrackerConfig,
    ) -> Result<Self::Tracker, DeviceError>;
}

/// Asynchronous skeletal tracker session
///
/// Results may lag the most recently enqueued capture by several frames.
pub trait BodyTracker: Send + 'static {
    /// Submit a capture without blocking
    ///
    /// # Errors
    /// `QueueFull` if inference is behind; the capture is not retained.
    fn enqueue_capture(&mut self, capture: &Capture) -> Result<(), DeviceError>;

    /// Pop the oldest finished result
    ///
    /// With `Duration::ZERO` this never waits; `Ok(None)` means nothing is ready.
    fn pop_result(&mut self, timeout: Duration) -> Result<Option<BodyFrame>, DeviceError>;

    /// Stop inference and release the session
    fn shutdown(&mut self) -> Result<(), DeviceError>;
}

/// Raw joint as reported by the tracker (millimeters)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkeletonJoint {
    pub position_mm: Vector3,
    pub orientation: Quaternion,
    pub confidence: ConfidenceLevel,
}

impl Default for SkeletonJoint {
    fn default() -> Self {
        Self {
            position_mm: Vector3::ZERO,
            orientation: Quaternion::IDENTITY,
            confidence: ConfidenceLevel::None,
        }
    }
}

/// Raw skeleton as reported by the tracker
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    pub body_id: u32,
    pub joints: [SkeletonJoint; JointId::COUNT],
}

/// Tracker output for one processed capture
#[derive(Debug, Clone)]
pub struct BodyFrame {
    /// Timestamp of the capture this result belongs to
    pub device_timestamp: Duration,
    pub skeletons: Vec<Skeleton>,
    /// `Custom8` image in depth geometry, 255 = background
    pub body_index_map: Option<Image>,
}
