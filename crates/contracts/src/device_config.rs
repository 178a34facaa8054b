//! DeviceConfig - camera and tracker configuration supplied once at start.

use serde::{Deserialize, Serialize};

use crate::DeviceError;

/// Camera frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRate {
    Fps5,
    Fps15,
    #[default]
    Fps30,
}

impl FrameRate {
    pub fn hz(self) -> u32 {
        match self {
            Self::Fps5 => 5,
            Self::Fps15 => 15,
            Self::Fps30 => 30,
        }
    }

    /// Nominal time between two captures
    pub fn frame_interval(self) -> std::time::Duration {
        std::time::Duration::from_micros(1_000_000 / u64::from(self.hz()))
    }
}

/// Raw color image format delivered by the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    #[default]
    Mjpg,
    Nv12,
    Yuy2,
    Bgra32,
}

/// Color camera resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorResolution {
    Off,
    R720p,
    #[default]
    R1080p,
    R1440p,
    R1536p,
    R2160p,
    R3072p,
}

impl ColorResolution {
    /// Pixel dimensions (width, height); `None` when the stream is off
    pub fn dimensions(self) -> Option<(u32, u32)> {
        match self {
            Self::Off => None,
            Self::R720p => Some((1280, 720)),
            Self::R1080p => Some((1920, 1080)),
            Self::R1440p => Some((2560, 1440)),
            Self::R1536p => Some((2048, 1536)),
            Self::R2160p => Some((3840, 2160)),
            Self::R3072p => Some((4096, 3072)),
        }
    }

    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }
}

/// Depth sensor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthMode {
    Off,
    NfovBinned2x2,
    #[default]
    NfovUnbinned,
    WfovBinned2x2,
    WfovUnbinned,
    PassiveIr,
}

impl DepthMode {
    /// Pixel dimensions (width, height); `None` when the stream is off
    pub fn dimensions(self) -> Option<(u32, u32)> {
        match self {
            Self::Off => None,
            Self::NfovBinned2x2 => Some((320, 288)),
            Self::NfovUnbinned => Some((640, 576)),
            Self::WfovBinned2x2 => Some((512, 512)),
            Self::WfovUnbinned => Some((1024, 1024)),
            Self::PassiveIr => Some((1024, 1024)),
        }
    }

    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }

    /// Whether the mode produces range data (passive IR does not)
    pub fn produces_depth(self) -> bool {
        !matches!(self, Self::Off | Self::PassiveIr)
    }

    /// Horizontal field of view in degrees
    pub fn field_of_view_deg(self) -> f32 {
        match self {
            Self::NfovBinned2x2 | Self::NfovUnbinned => 75.0,
            Self::WfovBinned2x2 | Self::WfovUnbinned | Self::PassiveIr => 120.0,
            Self::Off => 0.0,
        }
    }
}

/// Multi-device wiring role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WiredSyncMode {
    #[default]
    Standalone,
    Master,
    Subordinate,
}

/// Where skeletal inference runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerProcessingMode {
    Cpu,
    #[default]
    Gpu,
}

/// Physical mounting orientation of the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorOrientation {
    #[default]
    Default,
    Clockwise90,
    CounterClockwise90,
    Flip180,
}

/// Skeletal tracker settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub processing_mode: TrackerProcessingMode,
    #[serde(default)]
    pub sensor_orientation: SensorOrientation,
}

/// Device configuration
///
/// Immutable once handed to `DeviceSession::start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub camera_fps: FrameRate,
    #[serde(default)]
    pub color_format: ColorFormat,
    #[serde(default)]
    pub color_resolution: ColorResolution,
    #[serde(default)]
    pub depth_mode: DepthMode,
    #[serde(default)]
    pub wired_sync_mode: WiredSyncMode,
    #[serde(default = "default_true")]
    pub synchronized_images_only: bool,
    #[serde(default)]
    pub disable_streaming_indicator: bool,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub device_index: u32,
}

fn default_true() -> bool {
    true
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            camera_fps: FrameRate::default(),
            color_format: ColorFormat::default(),
            color_resolution: ColorResolution::default(),
            depth_mode: DepthMode::default(),
            wired_sync_mode: WiredSyncMode::default(),
            synchronized_images_only: true,
            disable_streaming_indicator: false,
            tracker: TrackerConfig::default(),
            device_index: 0,
        }
    }
}

impl DeviceConfig {
    /// Check the mode combination against what the hardware supports
    ///
    /// The camera runs the same check when streaming starts, so an invalid
    /// combination never degrades silently.
    pub fn validate(&self) -> Result<(), DeviceError> {
        if !self.color_resolution.is_enabled() && !self.depth_mode.is_enabled() {
            return Err(DeviceError::invalid_configuration(
                "color and depth streams are both off",
            ));
        }

        if self.camera_fps == FrameRate::Fps30 {
            if self.color_resolution == ColorResolution::R3072p {
                return Err(DeviceError::invalid_configuration(
                    "30 fps is not supported with 3072p color",
                ));
            }
            if self.depth_mode == DepthMode::WfovUnbinned {
                return Err(DeviceError::invalid_configuration(
                    "30 fps is not supported with unbinned wide field-of-view depth",
                ));
            }
        }

        if matches!(self.color_format, ColorFormat::Nv12 | ColorFormat::Yuy2)
            && self.color_resolution.is_enabled()
            && self.color_resolution != ColorResolution::R720p
        {
            return Err(DeviceError::invalid_configuration(format!(
                "{:?} color is only available at 720p, got {:?}",
                self.color_format, self.color_resolution
            )));
        }

        if self.synchronized_images_only
            && (!self.color_resolution.is_enabled() || !self.depth_mode.is_enabled())
        {
            return Err(DeviceError::invalid_configuration(
                "synchronized_images_only requires both color and depth streams",
            ));
        }

        if !self.depth_mode.produces_depth() {
            return Err(DeviceError::invalid_configuration(format!(
                "body tracking requires a depth mode, got {:?}",
                self.depth_mode
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DeviceConfig::default();
        assert_eq!(config.camera_fps, FrameRate::Fps30);
        assert_eq!(config.color_format, ColorFormat::Mjpg);
        assert_eq!(config.color_resolution, ColorResolution::R1080p);
        assert_eq!(config.depth_mode, DepthMode::NfovUnbinned);
        assert!(config.synchronized_images_only);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_30fps_with_3072p_rejected() {
        let config = DeviceConfig {
            color_resolution: ColorResolution::R3072p,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DeviceError::InvalidConfiguration { .. }));
        assert!(err.to_string().contains("3072p"));
    }

    #[test]
    fn test_15fps_with_3072p_accepted() {
        let config = DeviceConfig {
            camera_fps: FrameRate::Fps15,
            color_resolution: ColorResolution::R3072p,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_30fps_with_wfov_unbinned_rejected() {
        let config = DeviceConfig {
            depth_mode: DepthMode::WfovUnbinned,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yuy2_requires_720p() {
        let mut config = DeviceConfig {
            color_format: ColorFormat::Yuy2,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.color_resolution = ColorResolution::R720p;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_synchronized_requires_both_streams() {
        let mut config = DeviceConfig {
            color_resolution: ColorResolution::Off,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.synchronized_images_only = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_passive_ir_rejected_for_tracking() {
        let config = DeviceConfig {
            depth_mode: DepthMode::PassiveIr,
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("body tracking"), "got: {err}");
    }

    #[test]
    fn test_mode_dimensions() {
        assert_eq!(ColorResolution::R720p.dimensions(), Some((1280, 720)));
        assert_eq!(ColorResolution::Off.dimensions(), None);
        assert_eq!(DepthMode::NfovUnbinned.dimensions(), Some((640, 576)));
        assert_eq!(DepthMode::NfovBinned2x2.dimensions(), Some((320, 288)));
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(FrameRate::Fps30.frame_interval().as_micros(), 33_333);
        assert_eq!(FrameRate::Fps5.frame_interval().as_millis(), 200);
    }
}
