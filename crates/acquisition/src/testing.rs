//! Scripted hardware for unit tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    BodyFrame, BodyTracker, Calibration, CameraCalibration, Capture, ColorResolution,
    ConfidenceLevel, DepthCamera, DepthMode, DeviceConfig, DeviceError, Extrinsics, Image,
    ImageFormat, ImuSample, Intrinsics, JointId, Skeleton, SkeletonJoint, Vector3,
};

use crate::ProducerStatus;

pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 6;

pub fn calibration() -> Calibration {
    let camera = CameraCalibration {
        resolution_width: WIDTH,
        resolution_height: HEIGHT,
        intrinsics: Intrinsics::pinhole(8.0, 8.0, 3.5, 2.5),
        metric_radius: 0.0,
    };
    Calibration {
        depth_mode: DepthMode::NfovBinned2x2,
        color_resolution: ColorResolution::R720p,
        depth_camera: camera,
        color_camera: camera,
        depth_to_color: Extrinsics::IDENTITY,
    }
}

pub fn capture(ms: u64) -> Capture {
    let depth: Vec<u8> = std::iter::repeat(1500u16.to_le_bytes())
        .take((WIDTH * HEIGHT) as usize)
        .flatten()
        .collect();
    let color: Vec<u8> = std::iter::repeat([40u8, 80, 120, 255])
        .take((WIDTH * HEIGHT) as usize)
        .flatten()
        .collect();
    Capture {
        color: Some(Image {
            format: ImageFormat::Bgra32,
            width: WIDTH,
            height: HEIGHT,
            stride: WIDTH * 4,
            data: Bytes::from(color),
        }),
        depth: Some(Image {
            format: ImageFormat::Depth16,
            width: WIDTH,
            height: HEIGHT,
            stride: WIDTH * 2,
            data: Bytes::from(depth),
        }),
        temperature_c: 30.0,
        device_timestamp: Duration::from_millis(ms),
    }
}

pub enum Step {
    Capture(u64),
    Fail(DeviceError),
    /// Flip the running flag off, then fail (stop() racing the cycle)
    StopThenFail(DeviceError),
    Panic(&'static str),
}

/// Camera replaying a fixed script; times out once the script is exhausted
pub struct ScriptedCamera {
    pub steps: VecDeque<Step>,
    pub status: Option<Arc<ProducerStatus>>,
    pub imu: Result<Option<ImuSample>, DeviceError>,
}

impl ScriptedCamera {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            status: None,
            imu: Ok(Some(ImuSample {
                accelerometer: Vector3::new(0.0, 0.0, -9.81),
                ..Default::default()
            })),
        }
    }
}

impl DepthCamera for ScriptedCamera {
    fn serial_number(&self) -> String {
        "scripted".to_string()
    }

    fn start_cameras(&mut self, _config: &DeviceConfig) -> Result<(), DeviceError> {
        Ok(())
    }

    fn start_imu(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn calibration(&self) -> Result<Calibration, DeviceError> {
        Ok(calibration())
    }

    fn get_capture(&mut self, timeout: Duration) -> Result<Capture, DeviceError> {
        match self.steps.pop_front() {
            Some(Step::Capture(ms)) => Ok(capture(ms)),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::StopThenFail(err)) => {
                if let Some(status) = &self.status {
                    status.request_stop();
                }
                Err(err)
            }
            Some(Step::Panic(message)) => panic!("{message}"),
            None => {
                std::thread::sleep(Duration::from_millis(1));
                Err(DeviceError::CaptureTimeout {
                    waited_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    fn get_imu_sample(&mut self, _timeout: Duration) -> Result<Option<ImuSample>, DeviceError> {
        self.imu.clone()
    }

    fn stop_cameras(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn stop_imu(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Tracker that answers every enqueue with one full-body result
#[derive(Default)]
pub struct EchoTracker {
    pub pending: VecDeque<BodyFrame>,
    pub enqueued: usize,
    pub queue_full: bool,
    /// Don't produce results at all
    pub silent: bool,
}

impl BodyTracker for EchoTracker {
    fn enqueue_capture(&mut self, capture: &Capture) -> Result<(), DeviceError> {
        if self.queue_full {
            return Err(DeviceError::QueueFull);
        }
        self.enqueued += 1;
        if self.silent {
            return Ok(());
        }
        let joint = SkeletonJoint {
            position_mm: Vector3::new(0.0, 0.0, 1500.0),
            confidence: ConfidenceLevel::Medium,
            ..Default::default()
        };
        let mut mask = vec![255u8; (WIDTH * HEIGHT) as usize];
        mask[..WIDTH as usize].fill(0);
        self.pending.push_back(BodyFrame {
            device_timestamp: capture.device_timestamp,
            skeletons: vec![Skeleton {
                body_id: 1,
                joints: [joint; JointId::COUNT],
            }],
            body_index_map: Some(Image {
                format: ImageFormat::Custom8,
                width: WIDTH,
                height: HEIGHT,
                stride: WIDTH,
                data: Bytes::from(mask),
            }),
        });
        Ok(())
    }

    fn pop_result(&mut self, _timeout: Duration) -> Result<Option<BodyFrame>, DeviceError> {
        Ok(self.pending.pop_front())
    }

    fn shutdown(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}
