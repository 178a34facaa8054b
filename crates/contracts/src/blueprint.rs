//! StreamBlueprint - Config Loader 输出
//!
//! 描述完整的采集配置：设备模式、采集循环参数、消费端节拍、Mock 硬件参数。

use serde::{Deserialize, Serialize};

use crate::DeviceConfig;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的采集配置蓝图
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 设备与追踪器配置
    #[serde(default)]
    pub device: DeviceConfig,

    /// 生产者循环配置
    #[serde(default)]
    pub acquisition: AcquisitionSettings,

    /// 消费端配置
    #[serde(default)]
    pub consumer: ConsumerSettings,

    /// Mock 硬件配置 (无真实设备时使用)
    #[serde(default)]
    pub mock: MockSettings,
}

/// 生产者循环配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// 单次等待 capture 的上限 (毫秒)，必须 > 0
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,

    /// 每帧将深度重投影到彩色像素网格
    #[serde(default = "default_true")]
    pub align_depth_to_color: bool,

    /// 每帧将彩色重采样到深度像素网格 (背景移除)
    #[serde(default)]
    pub align_color_to_depth: bool,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            capture_timeout_ms: default_capture_timeout_ms(),
            align_depth_to_color: true,
            align_color_to_depth: false,
        }
    }
}

fn default_capture_timeout_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

/// 消费端配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumerSettings {
    /// 轮询节拍 (Hz)，必须 > 0
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f64,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
        }
    }
}

fn default_tick_hz() -> f64 {
    60.0
}

/// Mock 硬件配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MockSettings {
    /// 模拟的已连接设备数量
    #[serde(default = "default_device_count")]
    pub device_count: u32,

    /// 场景中模拟的人数
    #[serde(default = "default_body_count")]
    pub body_count: u32,

    /// 追踪结果相对输入的延迟 (帧)
    #[serde(default = "default_tracker_latency")]
    pub tracker_latency_frames: u32,
}

impl MockSettings {
    /// 模拟场景最多能放下的人数
    pub const MAX_BODY_COUNT: u32 = 6;
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            device_count: default_device_count(),
            body_count: default_body_count(),
            tracker_latency_frames: default_tracker_latency(),
        }
    }
}

fn default_device_count() -> u32 {
    1
}

fn default_body_count() -> u32 {
    1
}

fn default_tracker_latency() -> u32 {
    2
}
