//! DeviceSession 核心实现
//!
//! 打开设备、启动相机/IMU/追踪器、托管生产者线程，并负责停止与回滚。

use std::fmt;
use std::sync::Arc;

use acquisition::{
    panic_message, spawn_producer, AcquisitionError, AcquisitionMetrics, AcquisitionSnapshot,
    AssemblerConfig, FrameAssembler, ProducerContext, ProducerHandle, ProducerSpawnError,
    ProducerStatus,
};
use contracts::{
    BodyTracker, Calibration, DepthCamera, DeviceConfig, DeviceDriver, DeviceError, TrackerEngine,
};
use frame_store::{FrameConsumer, FrameStore};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, SessionError};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Running,
    /// 正在停止，或生产者已失败退出、等待 `stop()`
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// 运行期间才存在的资源
struct Active<C, T> {
    serial: String,
    calibration: Calibration,
    producer: ProducerHandle<C, T>,
}

/// 生产者线程的启动方式
type Spawner<C, T> = fn(
    FrameAssembler<C, T>,
    ProducerContext,
) -> std::result::Result<ProducerHandle<C, T>, ProducerSpawnError<C, T>>;

/// Device Session
///
/// 负责设备的完整生命周期：`Stopped → Starting → Running → Stopping → Stopped`。
/// 运行期间相机和追踪器归生产者线程所有，`stop()` 等线程退出拿回句柄后再释放。
///
/// # 原子性保证
/// `start` 任何一步失败，都会按 tracker → cameras → IMU → close 的顺序回滚
/// 已经打开的资源，会话保持 `Stopped`。
pub struct DeviceSession<D: DeviceDriver, E: TrackerEngine> {
    driver: D,
    engine: E,
    assembler_config: AssemblerConfig,
    state: SessionState,
    store: Arc<FrameStore>,
    status: Arc<ProducerStatus>,
    metrics: Arc<AcquisitionMetrics>,
    active: Option<Active<D::Camera, E::Tracker>>,
    spawner: Spawner<D::Camera, E::Tracker>,
}

impl<D: DeviceDriver, E: TrackerEngine> DeviceSession<D, E> {
    /// 创建新的会话（不触碰硬件）
    pub fn new(driver: D, engine: E) -> Self {
        Self {
            driver,
            engine,
            assembler_config: AssemblerConfig::default(),
            state: SessionState::Stopped,
            store: FrameStore::new(),
            status: ProducerStatus::new(),
            metrics: Arc::new(AcquisitionMetrics::new()),
            active: None,
            spawner: spawn_producer,
        }
    }

    /// 覆盖采集参数（下一次 `start` 生效）
    pub fn with_assembler_config(mut self, config: AssemblerConfig) -> Self {
        self.assembler_config = config;
        self
    }

    #[cfg(test)]
    fn with_spawner(mut self, spawner: Spawner<D::Camera, E::Tracker>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// 打开设备并启动生产者
    ///
    /// # Errors
    /// - `AlreadyStarted`：会话不处于 `Stopped`（包括生产者已失败但尚未 `stop()`）
    /// - `Device(..)`：`NoDeviceFound` / `DeviceUnavailable` / `InvalidConfiguration` 等
    /// - `Spawn`：无法创建生产者线程
    #[instrument(
        name = "device_session_start",
        skip(self, config),
        fields(device_index = config.device_index, depth_mode = ?config.depth_mode)
    )]
    pub fn start(&mut self, config: &DeviceConfig) -> Result<()> {
        if self.state != SessionState::Stopped {
            warn!(state = %self.state(), "start rejected");
            return Err(SessionError::AlreadyStarted);
        }

        self.transition(SessionState::Starting);
        match self.open_and_spawn(config) {
            Ok(active) => {
                info!(
                    serial = %active.serial,
                    fps = config.camera_fps.hz(),
                    "device session running"
                );
                self.active = Some(active);
                self.transition(SessionState::Running);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "device session failed to start");
                self.transition(SessionState::Stopped);
                Err(e)
            }
        }
    }

    fn open_and_spawn(&mut self, config: &DeviceConfig) -> Result<Active<D::Camera, E::Tracker>> {
        let installed = self.driver.installed_count();
        if installed == 0 {
            return Err(DeviceError::NoDeviceFound.into());
        }
        if config.device_index >= installed {
            return Err(DeviceError::device_unavailable(
                config.device_index,
                format!("only {installed} device(s) attached"),
            )
            .into());
        }

        let mut camera = self.driver.open(config.device_index)?;
        let serial = camera.serial_number();
        debug!(serial = %serial, "device opened");

        if let Err(e) = camera.start_cameras(config) {
            rollback(&mut camera, None::<&mut E::Tracker>, Started::Nothing);
            return Err(e.into());
        }
        if let Err(e) = camera.start_imu() {
            rollback(&mut camera, None::<&mut E::Tracker>, Started::Cameras);
            return Err(e.into());
        }
        let calibration = match camera.calibration() {
            Ok(calibration) => calibration,
            Err(e) => {
                rollback(&mut camera, None::<&mut E::Tracker>, Started::CamerasAndImu);
                return Err(e.into());
            }
        };
        let tracker = match self.engine.create(&calibration, &config.tracker) {
            Ok(tracker) => tracker,
            Err(e) => {
                rollback(&mut camera, None::<&mut E::Tracker>, Started::CamerasAndImu);
                return Err(e.into());
            }
        };

        // 新会话的时间戳从头开始
        self.store.reset();
        self.status.begin();
        let assembler = FrameAssembler::new(
            camera,
            tracker,
            calibration.clone(),
            self.assembler_config,
            Arc::clone(&self.metrics),
        );
        let ctx = ProducerContext {
            store: Arc::clone(&self.store),
            status: Arc::clone(&self.status),
            metrics: Arc::clone(&self.metrics),
        };
        let producer = match (self.spawner)(assembler, ctx) {
            Ok(producer) => producer,
            Err(ProducerSpawnError { source, parts }) => {
                self.status.request_stop();
                if let Some((mut camera, mut tracker)) = parts {
                    rollback(&mut camera, Some(&mut tracker), Started::CamerasAndImu);
                }
                return Err(SessionError::spawn(source.to_string()));
            }
        };

        Ok(Active {
            serial,
            calibration,
            producer,
        })
    }

    /// 停止生产者并释放硬件
    ///
    /// 对未启动的会话是空操作；释放过程中的错误只记录日志。
    #[instrument(name = "device_session_stop", skip(self))]
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            debug!("stop on a session that is not running");
            return;
        };

        self.transition(SessionState::Stopping);
        self.status.request_stop();

        match active.producer.join() {
            Ok(Some((mut camera, mut tracker))) => {
                rollback(&mut camera, Some(&mut tracker), Started::CamerasAndImu);
            }
            // panic 已由生产者记录，句柄在展开时被丢弃
            Ok(None) => debug!("producer handles were lost to a panic"),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(message = %message, "producer thread panicked");
                self.metrics.record_failure();
                observability::record_producer_failure("panic");
                self.status
                    .fail(AcquisitionError::ProducerPanicked { message });
            }
        }

        self.transition(SessionState::Stopped);
        info!(
            serial = %active.serial,
            frames_published = self.metrics.snapshot().frames_published,
            "device session stopped"
        );
    }

    /// 生产者是否仍在运行
    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// 当前状态
    ///
    /// 生产者失败退出（或 panic）后、`stop()` 之前报告 `Stopping`。
    pub fn state(&self) -> SessionState {
        match (&self.state, &self.active) {
            (SessionState::Running, Some(active))
                if !self.status.is_running() || active.producer.is_finished() =>
            {
                SessionState::Stopping
            }
            (state, _) => *state,
        }
    }

    /// 最近一次不可恢复的生产者失败（下次 `start` 时清除）
    pub fn last_error(&self) -> Option<SessionError> {
        self.status.last_error().map(SessionError::Producer)
    }

    /// 新建一个独立的帧消费者
    pub fn subscribe(&self) -> FrameConsumer {
        self.store.subscribe()
    }

    /// 运行期间的标定
    pub fn calibration(&self) -> Option<Calibration> {
        self.active.as_ref().map(|a| a.calibration.clone())
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.serial.as_str())
    }

    /// 采集计数快照
    pub fn metrics(&self) -> AcquisitionSnapshot {
        self.metrics.snapshot()
    }

    pub fn store(&self) -> &Arc<FrameStore> {
        &self.store
    }

    fn transition(&mut self, to: SessionState) {
        debug!(from = %self.state, to = %to, "session state");
        self.state = to;
    }
}

impl<D: DeviceDriver, E: TrackerEngine> Drop for DeviceSession<D, E> {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.stop();
        }
    }
}

/// 需要回滚的硬件阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Started {
    Nothing,
    Cameras,
    CamerasAndImu,
}

/// 释放硬件：tracker → cameras → IMU → close
///
/// 每一步失败只记录日志，不中断后续步骤。
fn rollback<C: DepthCamera, T: BodyTracker>(
    camera: &mut C,
    tracker: Option<&mut T>,
    started: Started,
) {
    if let Some(tracker) = tracker {
        release_safe("tracker_shutdown", tracker.shutdown());
    }
    if started >= Started::Cameras {
        release_safe("stop_cameras", camera.stop_cameras());
    }
    if started >= Started::CamerasAndImu {
        release_safe("stop_imu", camera.stop_imu());
    }
    release_safe("close", camera.close());
}

fn release_safe(step: &'static str, result: std::result::Result<(), DeviceError>) {
    match result {
        Ok(()) => debug!(step, "released"),
        Err(e) => warn!(step, error = %e, "release step failed, continuing"),
    }
}
