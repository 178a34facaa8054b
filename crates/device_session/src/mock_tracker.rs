//! Mock 人体追踪器
//!
//! 从深度图分割出前景列块，每个列块当作一个人，
//! 并在其质心处摆放一副模板骨架。结果按配置延迟若干帧才可取出。

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    BodyFrame, BodyTracker, Calibration, CalibrationType, CameraCalibration, Capture,
    ConfidenceLevel, DepthImage, DeviceError, Image, ImageFormat, JointId, Quaternion, Skeleton,
    SkeletonJoint, TrackerConfig, TrackerEngine, Vector3,
};
use tracing::{debug, instrument};

use crate::mock_driver::{CallLog, MockConfig};
use crate::mock_scene::{FOREGROUND_LIMIT_MM, MAX_BODIES};

/// 背景像素的 body index
const BACKGROUND: u8 = 255;

/// Mock 追踪器工厂
pub struct MockTrackerEngine {
    config: MockConfig,
    calls: CallLog,
}

impl MockTrackerEngine {
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            calls: CallLog::default(),
        }
    }

    /// 与驱动共享调用记录
    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }
}

impl Default for MockTrackerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerEngine for MockTrackerEngine {
    type Tracker = MockTracker;

    #[instrument(name = "mock_tracker_create", skip(self, calibration), fields(depth_mode = ?calibration.depth_mode))]
    fn create(
        &self,
        calibration: &Calibration,
        config: &TrackerConfig,
    ) -> Result<MockTracker, DeviceError> {
        if self.config.fail_tracker_create {
            return Err(DeviceError::hardware("mock tracker model failed to load"));
        }
        if !calibration.is_enabled(CalibrationType::Depth) {
            return Err(DeviceError::Unsupported {
                message: "body tracking requires depth calibration".to_string(),
            });
        }
        self.calls.record("tracker_create");
        Ok(MockTracker {
            depth_camera: calibration.depth_camera,
            config: *config,
            latency: self.config.tracker_latency_frames as usize,
            capacity: self.config.tracker_queue_capacity.max(1),
            fail_release: self.config.fail_release,
            in_flight: VecDeque::new(),
            shut_down: false,
            calls: self.calls.clone(),
        })
    }
}

/// Mock 追踪器会话
pub struct MockTracker {
    depth_camera: CameraCalibration,
    config: TrackerConfig,
    latency: usize,
    capacity: usize,
    fail_release: bool,
    /// 已提交、尚未取走的结果
    in_flight: VecDeque<BodyFrame>,
    shut_down: bool,
    calls: CallLog,
}

impl MockTracker {
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl BodyTracker for MockTracker {
    fn enqueue_capture(&mut self, capture: &Capture) -> Result<(), DeviceError> {
        if self.shut_down {
            return Err(DeviceError::disposed("tracker"));
        }
        if self.in_flight.len() >= self.capacity {
            return Err(DeviceError::QueueFull);
        }
        let raw = capture.depth.as_ref().ok_or_else(|| DeviceError::Unsupported {
            message: "capture has no depth image".to_string(),
        })?;
        let depth = acquisition::depth_to_millimeters(raw)
            .map_err(|e| DeviceError::hardware(format!("tracker input rejected: {e}")))?;

        let (mask, skeletons) = segment(&depth, &self.depth_camera);
        self.in_flight.push_back(BodyFrame {
            device_timestamp: capture.device_timestamp,
            skeletons,
            body_index_map: Some(Image {
                format: ImageFormat::Custom8,
                width: depth.width,
                height: depth.height,
                stride: depth.width,
                data: Bytes::from(mask),
            }),
        });
        Ok(())
    }

    fn pop_result(&mut self, _timeout: Duration) -> Result<Option<BodyFrame>, DeviceError> {
        if self.shut_down {
            return Err(DeviceError::disposed("tracker"));
        }
        if self.in_flight.len() > self.latency {
            Ok(self.in_flight.pop_front())
        } else {
            Ok(None)
        }
    }

    #[instrument(name = "mock_tracker_shutdown", skip(self))]
    fn shutdown(&mut self) -> Result<(), DeviceError> {
        if self.shut_down {
            return Err(DeviceError::disposed("tracker"));
        }
        self.calls.record("tracker_shutdown");
        self.shut_down = true;
        debug!(dropped = self.in_flight.len(), "mock tracker shut down");
        self.in_flight.clear();
        if self.fail_release {
            return Err(DeviceError::hardware("mock tracker shutdown failed"));
        }
        Ok(())
    }
}

/// 前景列块的累计量
#[derive(Default)]
struct Blob {
    sum_x: f64,
    sum_y: f64,
    sum_depth: f64,
    pixels: u64,
}

/// 按列分割前景：连续含前景的列组成一个人
fn segment(depth: &DepthImage, camera: &CameraCalibration) -> (Vec<u8>, Vec<Skeleton>) {
    let width = depth.width as usize;
    let is_foreground = |d: u16| d > 0 && d < FOREGROUND_LIMIT_MM;

    let mut occupied = vec![false; width];
    for (i, &d) in depth.data.iter().enumerate() {
        if is_foreground(d) {
            occupied[i % width] = true;
        }
    }

    let mut labels = vec![None; width];
    let mut next = 0u8;
    for x in 0..width {
        if !occupied[x] {
            continue;
        }
        if x > 0 && occupied[x - 1] {
            labels[x] = labels[x - 1];
        } else if u32::from(next) < MAX_BODIES {
            labels[x] = Some(next);
            next += 1;
        }
    }

    let mut blobs: Vec<Blob> = (0..next).map(|_| Blob::default()).collect();
    let mut mask = vec![BACKGROUND; depth.data.len()];
    for (i, &d) in depth.data.iter().enumerate() {
        if !is_foreground(d) {
            continue;
        }
        let x = i % width;
        if let Some(label) = labels[x] {
            mask[i] = label;
            let blob = &mut blobs[label as usize];
            blob.sum_x += x as f64;
            blob.sum_y += (i / width) as f64;
            blob.sum_depth += f64::from(d);
            blob.pixels += 1;
        }
    }

    let skeletons = blobs
        .iter()
        .enumerate()
        .filter(|(_, blob)| blob.pixels > 0)
        .map(|(i, blob)| {
            let n = blob.pixels as f64;
            let z = (blob.sum_depth / n) as f32;
            let u = (blob.sum_x / n) as f32;
            let v = (blob.sum_y / n) as f32;
            let k = &camera.intrinsics;
            let pelvis = Vector3::new((u - k.cx) / k.fx * z, (v - k.cy) / k.fy * z, z);
            template_skeleton(i as u32 + 1, pelvis)
        })
        .collect();

    (mask, skeletons)
}

/// 站立姿态模板骨架（mm，相机坐标系 +y 向下）
fn template_skeleton(body_id: u32, pelvis: Vector3) -> Skeleton {
    let mut joints = [SkeletonJoint::default(); JointId::COUNT];
    for id in JointId::ALL {
        let (dx, dy, dz) = template_offset(id);
        joints[id.index()] = SkeletonJoint {
            position_mm: Vector3::new(pelvis.x + dx, pelvis.y + dy, pelvis.z + dz),
            orientation: Quaternion::IDENTITY,
            confidence: template_confidence(id),
        };
    }
    Skeleton { body_id, joints }
}

fn template_offset(id: JointId) -> (f32, f32, f32) {
    use JointId::*;
    match id {
        Pelvis => (0.0, 0.0, 0.0),
        SpineNavel => (0.0, -200.0, 0.0),
        SpineChest => (0.0, -380.0, 0.0),
        Neck => (0.0, -560.0, 0.0),
        Head => (0.0, -680.0, 0.0),
        Nose => (0.0, -700.0, -90.0),
        EyeLeft => (35.0, -720.0, -70.0),
        EyeRight => (-35.0, -720.0, -70.0),
        EarLeft => (75.0, -700.0, 0.0),
        EarRight => (-75.0, -700.0, 0.0),
        ClavicleLeft => (60.0, -520.0, 0.0),
        ShoulderLeft => (180.0, -500.0, 0.0),
        ElbowLeft => (220.0, -250.0, 0.0),
        WristLeft => (240.0, -20.0, 0.0),
        HandLeft => (245.0, 50.0, 0.0),
        HandTipLeft => (250.0, 130.0, 0.0),
        ThumbLeft => (220.0, 60.0, -30.0),
        ClavicleRight => (-60.0, -520.0, 0.0),
        ShoulderRight => (-180.0, -500.0, 0.0),
        ElbowRight => (-220.0, -250.0, 0.0),
        WristRight => (-240.0, -20.0, 0.0),
        HandRight => (-245.0, 50.0, 0.0),
        HandTipRight => (-250.0, 130.0, 0.0),
        ThumbRight => (-220.0, 60.0, -30.0),
        HipLeft => (100.0, 0.0, 0.0),
        KneeLeft => (110.0, 420.0, 0.0),
        AnkleLeft => (110.0, 820.0, 0.0),
        FootLeft => (110.0, 860.0, -120.0),
        HipRight => (-100.0, 0.0, 0.0),
        KneeRight => (-110.0, 420.0, 0.0),
        AnkleRight => (-110.0, 820.0, 0.0),
        FootRight => (-110.0, 860.0, -120.0),
    }
}

fn template_confidence(id: JointId) -> ConfidenceLevel {
    use JointId::*;
    match id {
        HandTipLeft | HandTipRight | ThumbLeft | ThumbRight => ConfidenceLevel::Low,
        Nose | EyeLeft | EyeRight | EarLeft | EarRight => ConfidenceLevel::Low,
        _ => ConfidenceLevel::Medium,
    }
}
