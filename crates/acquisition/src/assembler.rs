//! Frame Assembler - one capture in, one immutable frame out.

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    AcquisitionSettings, BodyTracker, Calibration, DepthCamera, DeviceError, Frame,
};
use coordinate_mapper::CoordinateMapper;
use tracing::{debug, trace, warn};

use crate::convert;
use crate::error::{AcquisitionError, Result};
use crate::metrics::AcquisitionMetrics;
use crate::producer::ProducerStatus;

/// Assembler configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblerConfig {
    /// Upper bound for one capture wait
    pub capture_timeout: Duration,
    /// Reproject depth into the color grid every cycle
    pub align_depth_to_color: bool,
    /// Resample color into the depth grid every cycle
    pub align_color_to_depth: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self::from(&AcquisitionSettings::default())
    }
}

impl From<&AcquisitionSettings> for AssemblerConfig {
    fn from(settings: &AcquisitionSettings) -> Self {
        Self {
            capture_timeout: Duration::from_millis(settings.capture_timeout_ms),
            align_depth_to_color: settings.align_depth_to_color,
            align_color_to_depth: settings.align_color_to_depth,
        }
    }
}

/// Owns the camera and tracker while the session runs
pub struct FrameAssembler<C, T> {
    camera: C,
    tracker: T,
    mapper: CoordinateMapper,
    config: AssemblerConfig,
    metrics: Arc<AcquisitionMetrics>,
}

impl<C: DepthCamera, T: BodyTracker> FrameAssembler<C, T> {
    pub fn new(
        camera: C,
        tracker: T,
        calibration: Calibration,
        config: AssemblerConfig,
        metrics: Arc<AcquisitionMetrics>,
    ) -> Self {
        Self {
            camera,
            tracker,
            mapper: CoordinateMapper::new(calibration),
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Hand the hardware handles back for release
    pub fn into_parts(self) -> (C, T) {
        (self.camera, self.tracker)
    }

    /// Run one acquisition cycle
    ///
    /// `Ok(None)` means the cycle was abandoned (stop requested between
    /// hardware calls, or a capture without depth). The capture is released
    /// when this returns, on every path.
    pub fn run_cycle(&mut self, status: &ProducerStatus) -> Result<Option<Frame>> {
        let capture = self
            .camera
            .get_capture(self.config.capture_timeout)
            .map_err(|e| AcquisitionError::device("capture", e))?;
        if !status.is_running() {
            return Ok(None);
        }

        let Some(raw_depth) = capture.depth.as_ref() else {
            debug!(
                timestamp_us = capture.device_timestamp.as_micros() as u64,
                "capture without depth skipped"
            );
            return Ok(None);
        };
        let depth = convert::depth_to_millimeters(raw_depth)?;
        let color = capture
            .color
            .as_ref()
            .map(convert::color_to_bgra)
            .transpose()?;

        let imu = match self.camera.get_imu_sample(Duration::ZERO) {
            Ok(sample) => sample,
            Err(e) if e.is_disposed() => return Err(AcquisitionError::device("imu", e)),
            Err(e) => {
                debug!(error = %e, "imu sample unavailable");
                None
            }
        };
        if imu.is_none() {
            self.metrics.record_imu_missing();
        }
        if !status.is_running() {
            return Ok(None);
        }

        match self.tracker.enqueue_capture(&capture) {
            Ok(()) => {}
            Err(DeviceError::QueueFull) => {
                warn!("tracker queue full, capture not submitted");
                self.metrics.record_tracker_queue_full();
            }
            Err(e) => return Err(AcquisitionError::device("tracker_enqueue", e)),
        }
        // never wait for inference here
        let tracked = self
            .tracker
            .pop_result(Duration::ZERO)
            .map_err(|e| AcquisitionError::device("tracker_pop", e))?;

        let (bodies, body_index) = match tracked {
            Some(result) => {
                self.metrics.record_tracker_result();
                observability::record_tracker_result(result.skeletons.len());
                let mask = result
                    .body_index_map
                    .as_ref()
                    .map(convert::body_index_map)
                    .transpose()?;
                let bodies = result
                    .skeletons
                    .iter()
                    .map(convert::skeleton_to_body)
                    .collect();
                (bodies, mask)
            }
            None => (Vec::new(), None),
        };
        if !status.is_running() {
            return Ok(None);
        }

        let depth_in_color = if self.config.align_depth_to_color && color.is_some() {
            self.mapper.update(&depth);
            self.mapper.depth_in_color().cloned()
        } else {
            None
        };
        let color_in_depth = match (&color, self.config.align_color_to_depth) {
            (Some(color), true) => self
                .mapper
                .transformation()
                .color_image_to_depth_camera(&depth, color),
            _ => None,
        };

        trace!(
            timestamp_us = capture.device_timestamp.as_micros() as u64,
            bodies = bodies.len(),
            "frame assembled"
        );

        Ok(Some(Frame {
            timestamp: capture.device_timestamp,
            temperature_c: capture.temperature_c,
            color,
            depth,
            body_index,
            depth_in_color,
            color_in_depth,
            bodies,
            imu,
        }))
    }
}
