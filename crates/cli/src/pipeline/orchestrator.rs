//! Pipeline orchestrator - runs a device session and a ticking consumer.

use std::future::Future;
use std::time::{Duration, Instant};

use acquisition::AssemblerConfig;
use anyhow::{Context, Result};
use contracts::StreamBlueprint;
use device_session::{tick_interval, DeviceSession, MockConfig, MockDeviceDriver, MockTrackerEngine};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{PipelineStats, StopReason};
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The stream blueprint configuration
    pub blueprint: StreamBlueprint,

    /// Maximum number of frames to consume (None = unlimited)
    pub max_frames: Option<u64>,

    /// Run timeout (None = no timeout)
    pub timeout: Option<Duration>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the frame limit, the timeout or `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let blueprint = &self.config.blueprint;
        let mock = MockConfig::from(&blueprint.mock);
        let driver = MockDeviceDriver::with_config(mock.clone());
        let engine = MockTrackerEngine::with_config(mock);

        let mut session = DeviceSession::new(driver, engine)
            .with_assembler_config(AssemblerConfig::from(&blueprint.acquisition));
        let start_time = Instant::now();

        session
            .start(&blueprint.device)
            .map_err(CliError::from)
            .context("Failed to start device session")?;

        let mut stats = PipelineStats {
            serial: session.serial_number().map(str::to_string),
            ..Default::default()
        };

        let result = self.consume(&mut session, &mut stats, shutdown).await;

        info!("Shutting down device session...");
        session.stop();

        stats.duration = start_time.elapsed();
        stats.acquisition = session.metrics();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            fps = format!("{:.2}", stats.fps()),
            "Pipeline shutdown complete"
        );

        result.map(|()| stats)
    }

    async fn consume(
        &self,
        session: &mut DeviceSession<MockDeviceDriver, MockTrackerEngine>,
        stats: &mut PipelineStats,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let blueprint = &self.config.blueprint;
        let mut consumer = session.subscribe();
        let mut ticker = tokio::time::interval(tick_interval(blueprint.consumer.tick_hz));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let timeout = self.config.timeout;
        let deadline = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(shutdown);
        tokio::pin!(deadline);

        info!(
            max_frames = ?self.config.max_frames,
            tick_hz = blueprint.consumer.tick_hz,
            "Pipeline running (MOCK mode)"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping pipeline...");
                    stats.stop_reason = StopReason::Interrupted;
                    return Ok(());
                }
                _ = &mut deadline => {
                    warn!(timeout_secs = timeout.map(|t| t.as_secs()), "Pipeline timed out");
                    stats.stop_reason = StopReason::Timeout;
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if !session.is_running() {
                        let error = session
                            .last_error()
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "producer exited".to_string());
                        anyhow::bail!("Producer stopped unexpectedly: {error}");
                    }

                    let Some(frame) = consumer.take_if_new() else {
                        stats.idle_ticks += 1;
                        continue;
                    };
                    stats.frames_consumed += 1;
                    let interval = stats.stream.update(&frame);
                    observability::record_frame_consumed(interval);

                    debug!(
                        timestamp_us = frame.timestamp.as_micros() as u64,
                        bodies = frame.bodies.len(),
                        imu = frame.imu.is_some(),
                        "Frame consumed"
                    );

                    if let Some(max) = self.config.max_frames {
                        if stats.frames_consumed >= max {
                            info!(frames = stats.frames_consumed, "Reached max frames limit");
                            stats.stop_reason = StopReason::MaxFrames;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
