//! 采集管道指标收集模块
//!
//! 生产者循环与帧交接区通过这些函数上报 Prometheus 指标；
//! 消费端用 `StreamStatsAggregator` 在内存中聚合统计。

use std::time::Duration;

use contracts::Frame;
use metrics::{counter, gauge, histogram};

/// 记录帧发布
pub fn record_frame_published() {
    counter!("kinect_stream_frames_published_total").increment(1);
}

/// 记录被覆盖 (从未被消费) 的帧
pub fn record_frame_superseded() {
    counter!("kinect_stream_frames_superseded_total").increment(1);
}

/// 记录 capture 超时 (会被重试)
pub fn record_capture_timeout() {
    counter!("kinect_stream_capture_timeouts_total").increment(1);
}

/// 记录附带追踪结果的周期
pub fn record_tracker_result(skeletons: usize) {
    counter!("kinect_stream_tracker_results_total").increment(1);
    histogram!("kinect_stream_tracker_skeletons").record(skeletons as f64);
}

/// 记录终止生产者循环的失败
pub fn record_producer_failure(stage: &str) {
    counter!(
        "kinect_stream_producer_failures_total",
        "stage" => stage.to_string()
    )
    .increment(1);
}

/// 记录单个采集周期耗时
pub fn record_cycle_duration(elapsed: Duration) {
    histogram!("kinect_stream_cycle_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}

/// 记录最新帧中的人数
pub fn record_bodies_tracked(bodies: usize) {
    gauge!("kinect_stream_bodies_tracked").set(bodies as f64);
}

/// 记录消费端取到帧时的延迟 (设备时间戳间隔)
pub fn record_frame_consumed(interval_ms: Option<f64>) {
    counter!("kinect_stream_frames_consumed_total").increment(1);
    if let Some(interval) = interval_ms {
        histogram!("kinect_stream_frame_interval_ms").record(interval);
    }
}

/// 消费端统计聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct StreamStatsAggregator {
    /// 已消费帧数
    pub total_frames: u64,

    /// 含至少一个人的帧数
    pub frames_with_bodies: u64,

    /// 含 IMU 样本的帧数
    pub frames_with_imu: u64,

    /// 相邻消费帧的设备时间戳间隔 (毫秒)
    pub interval_stats: RunningStats,

    /// 每帧人数
    pub body_stats: RunningStats,

    /// 设备温度
    pub temperature_stats: RunningStats,

    last_timestamp: Option<Duration>,
}

impl StreamStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 用一帧更新统计，返回与上一帧的间隔 (毫秒)
    pub fn update(&mut self, frame: &Frame) -> Option<f64> {
        self.total_frames += 1;
        if frame.has_bodies() {
            self.frames_with_bodies += 1;
        }
        if frame.imu.is_some() {
            self.frames_with_imu += 1;
        }

        let interval = self
            .last_timestamp
            .filter(|last| frame.timestamp > *last)
            .map(|last| (frame.timestamp - last).as_secs_f64() * 1000.0);
        if let Some(ms) = interval {
            self.interval_stats.push(ms);
        }
        self.last_timestamp = Some(frame.timestamp);

        self.body_stats.push(frame.bodies.len() as f64);
        self.temperature_stats.push(f64::from(frame.temperature_c));
        interval
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames,
            frames_with_bodies: self.frames_with_bodies,
            frames_with_imu: self.frames_with_imu,
            body_rate: if self.total_frames > 0 {
                self.frames_with_bodies as f64 / self.total_frames as f64 * 100.0
            } else {
                0.0
            },
            frame_interval_ms: StatsSummary::from(&self.interval_stats),
            bodies_per_frame: StatsSummary::from(&self.body_stats),
            temperature_c: StatsSummary::from(&self.temperature_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub frames_with_bodies: u64,
    pub frames_with_imu: u64,
    pub body_rate: f64,
    pub frame_interval_ms: StatsSummary,
    pub bodies_per_frame: StatsSummary,
    pub temperature_c: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Stream Summary ===")?;
        writeln!(f, "Frames consumed: {}", self.total_frames)?;
        writeln!(
            f,
            "Frames with bodies: {} ({:.2}%)",
            self.frames_with_bodies, self.body_rate
        )?;
        writeln!(f, "Frames with IMU: {}", self.frames_with_imu)?;
        writeln!(f, "Frame interval (ms): {}", self.frame_interval_ms)?;
        writeln!(f, "Bodies per frame: {}", self.bodies_per_frame)?;
        writeln!(f, "Temperature (°C): {}", self.temperature_c)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
