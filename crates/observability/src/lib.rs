//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式)
//! - Prometheus 指标导出
//! - 采集管道指标与消费端统计
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::StreamStatsAggregator;
//!
//! // 初始化
//! observability::init()?;
//!
//! // 消费端统计
//! let mut stats = StreamStatsAggregator::new();
//! if let Some(frame) = consumer.take_if_new() {
//!     observability::record_frame_consumed(stats.update(&frame));
//! }
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    record_bodies_tracked, record_capture_timeout, record_cycle_duration, record_frame_consumed,
    record_frame_published, record_frame_superseded, record_producer_failure,
    record_tracker_result, MetricsSummary, RunningStats, StatsSummary, StreamStatsAggregator,
};

/// 初始化可观测性（Tracing，不开启 Prometheus）
///
/// - Tracing: Pretty 格式，支持 RUST_LOG 环境变量
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
    /// 默认日志级别 (RUST_LOG 未设置时使用)
    pub default_log_level: String,
    /// 忽略 RUST_LOG，只输出 warn 及以上
    pub quiet: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_port: None,
            default_log_level: "info".to_string(),
            quiet: false,
        }
    }
}

impl ObservabilityConfig {
    /// 按 `-v` 次数选择默认级别 (0 = info, 1 = debug, 2+ = trace)
    pub fn with_verbosity(mut self, verbose: u8, quiet: bool) -> Self {
        self.default_log_level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
        .to_string();
        self.quiet = quiet;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        if self.quiet {
            return EnvFilter::new("warn");
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_log_level))
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    Json,
    /// 人类可读格式
    #[default]
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 使用自定义配置初始化
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    // 1. Initialize Tracing
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_thread_names(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    // 2. Initialize Prometheus Exporter (if enabled)
    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// 仅初始化 Prometheus 指标（不初始化 Tracing）
///
/// 用于 Tracing 已由其他模块初始化的场景。
pub fn init_metrics_only(port: u16) -> Result<()> {
    let builder = PrometheusBuilder::new();
    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.default_log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_verbosity_levels() {
        let config = ObservabilityConfig::default().with_verbosity(1, false);
        assert_eq!(config.default_log_level, "debug");
        let config = ObservabilityConfig::default().with_verbosity(3, false);
        assert_eq!(config.default_log_level, "trace");
        assert!(ObservabilityConfig::default().with_verbosity(0, true).quiet);
    }
}
