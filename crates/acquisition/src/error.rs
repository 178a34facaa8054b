//! Acquisition 错误类型

use contracts::DeviceError;
use thiserror::Error;

/// 一个采集周期内的失败
#[derive(Debug, Clone, Error)]
pub enum AcquisitionError {
    /// 硬件调用失败
    #[error("{stage} failed: {source}")]
    Device {
        /// 失败的步骤 (capture / imu / tracker_enqueue / tracker_pop)
        stage: &'static str,
        #[source]
        source: DeviceError,
    },

    /// 原始缓冲区无法转换
    #[error("failed to convert {modality}: {message}")]
    Conversion {
        /// 模态 (color / depth / body_index)
        modality: &'static str,
        message: String,
    },

    /// 生产者线程 panic
    #[error("producer thread panicked: {message}")]
    ProducerPanicked { message: String },
}

/// 失败分类，决定生产者循环如何继续
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 重试 (capture 超时)
    Transient,
    /// `stop()` 正在拆除资源，静默退出
    TeardownRace,
    /// 终止循环并上报
    Unrecoverable,
}

impl AcquisitionError {
    pub fn device(stage: &'static str, source: DeviceError) -> Self {
        Self::Device { stage, source }
    }

    pub fn conversion(modality: &'static str, message: impl Into<String>) -> Self {
        Self::Conversion {
            modality,
            message: message.into(),
        }
    }

    /// 按当前运行标志分类
    ///
    /// 已释放的句柄只有在停止过程中才算预期内的竞争。
    pub fn classify(&self, running: bool) -> FailureKind {
        match self {
            Self::Device { source, .. } if source.is_timeout() => FailureKind::Transient,
            Self::Device { source, .. } if source.is_disposed() && !running => {
                FailureKind::TeardownRace
            }
            _ => FailureKind::Unrecoverable,
        }
    }

    /// 底层设备错误 (如有)
    pub fn device_error(&self) -> Option<&DeviceError> {
        match self {
            Self::Device { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Acquisition Result 类型别名
pub type Result<T> = std::result::Result<T, AcquisitionError>;
