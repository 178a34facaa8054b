//! Pipeline statistics and metrics.

use std::time::Duration;

use acquisition::AcquisitionSnapshot;
use observability::StreamStatsAggregator;

/// Why the consume loop ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    #[default]
    MaxFrames,
    Timeout,
    Interrupted,
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Device serial number
    pub serial: Option<String>,

    /// Consumer ticks that found a new frame
    pub frames_consumed: u64,

    /// Consumer ticks that found nothing new
    pub idle_ticks: u64,

    /// Total duration of the run
    pub duration: Duration,

    pub stop_reason: StopReason,

    /// Consumer-side aggregation
    pub stream: StreamStatsAggregator,

    /// Producer-side counters at shutdown
    pub acquisition: AcquisitionSnapshot,
}

impl PipelineStats {
    /// Consumed frames per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_consumed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Published frames the consumer never saw, as percentage
    pub fn skip_rate(&self) -> f64 {
        let published = self.acquisition.frames_published;
        if published > 0 {
            published.saturating_sub(self.frames_consumed) as f64 / published as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");

        println!("Overview");
        println!("   ├─ Device: {}", self.serial.as_deref().unwrap_or("-"));
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Stopped by: {:?}", self.stop_reason);
        println!("   ├─ Frames consumed: {}", self.frames_consumed);
        println!("   ├─ Idle ticks: {}", self.idle_ticks);
        println!("   └─ FPS: {:.2}", self.fps());

        let producer = &self.acquisition;
        println!("\nProducer");
        println!("   ├─ Cycles: {}", producer.cycles);
        println!("   ├─ Frames published: {}", producer.frames_published);
        println!("   ├─ Not consumed: {:.2}%", self.skip_rate());
        println!("   ├─ Capture timeouts: {}", producer.capture_timeouts);
        println!("   ├─ Tracker results: {}", producer.tracker_results);
        println!("   ├─ Tracker queue full: {}", producer.tracker_queue_full);
        println!("   └─ IMU missing: {}", producer.imu_missing);

        println!("\n{}", self.stream.summary());
    }
}
