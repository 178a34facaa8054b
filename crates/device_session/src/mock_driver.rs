//! Mock 深度相机驱动
//!
//! 用于测试、demo 和 CLI 的 mock 实现，支持注入失败场景。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use contracts::{
    Calibration, Capture, DepthCamera, DeviceConfig, DeviceDriver, DeviceError, ImuSample,
    MockSettings, Vector3,
};
use tracing::{debug, instrument};

use crate::mock_scene::{mock_calibration, MockScene};

/// Mock 硬件配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 已连接设备数量
    pub device_count: u32,
    /// 被其他进程占用的设备 index
    pub unavailable_devices: Vec<u32>,
    /// start_cameras 失败
    pub fail_start_cameras: bool,
    /// start_imu 失败
    pub fail_start_imu: bool,
    /// 读取标定失败
    pub fail_calibration: bool,
    /// 创建追踪器失败
    pub fail_tracker_create: bool,
    /// stop_* / close / shutdown 返回错误（资源仍然释放）
    pub fail_release: bool,
    /// 成功交付 N 帧后设备"断开"
    pub fail_capture_after: Option<u64>,
    /// 每第 N 次 capture 超时
    pub timeout_every: Option<u64>,
    /// 成功交付 N 帧后 capture 线程 panic
    pub panic_after: Option<u64>,
    /// 场景中的人数
    pub body_count: u32,
    /// 追踪结果延迟 (帧)
    pub tracker_latency_frames: u32,
    /// 追踪器输入队列容量
    pub tracker_queue_capacity: usize,
    /// 按设定帧率节流；关闭时尽快交付
    pub realtime: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self::from(&MockSettings::default())
    }
}

impl From<&MockSettings> for MockConfig {
    fn from(settings: &MockSettings) -> Self {
        Self {
            device_count: settings.device_count,
            unavailable_devices: Vec::new(),
            fail_start_cameras: false,
            fail_start_imu: false,
            fail_calibration: false,
            fail_tracker_create: false,
            fail_release: false,
            fail_capture_after: None,
            timeout_every: None,
            panic_after: None,
            body_count: settings.body_count,
            tracker_latency_frames: settings.tracker_latency_frames,
            tracker_queue_capacity: 8,
            realtime: true,
        }
    }
}

/// 硬件调用记录，按调用顺序保存
///
/// 驱动、相机和追踪器共享同一份记录，便于断言释放顺序。
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Position of the first call named `call`
    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Mock 驱动
pub struct MockDeviceDriver {
    config: MockConfig,
    /// 已打开的设备 index
    claimed: Arc<Mutex<HashSet<u32>>>,
    calls: CallLog,
}

impl MockDeviceDriver {
    /// 创建默认 mock 驱动（1 台设备，1 个人）
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// 使用配置创建 mock 驱动
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            claimed: Arc::new(Mutex::new(HashSet::new())),
            calls: CallLog::default(),
        }
    }

    /// 共享调用记录（传给 `MockTrackerEngine::with_call_log`）
    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    pub fn call_log(&self) -> &CallLog {
        &self.calls
    }

    /// 当前处于打开状态的设备数量
    pub fn open_count(&self) -> usize {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for MockDeviceDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDriver for MockDeviceDriver {
    type Camera = MockCamera;

    fn installed_count(&self) -> u32 {
        self.config.device_count
    }

    #[instrument(name = "mock_driver_open", skip(self))]
    fn open(&self, index: u32) -> Result<MockCamera, DeviceError> {
        if index >= self.config.device_count {
            return Err(DeviceError::device_unavailable(index, "not connected"));
        }
        if self.config.unavailable_devices.contains(&index) {
            return Err(DeviceError::device_unavailable(
                index,
                "claimed by another process",
            ));
        }
        if !self
            .claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index)
        {
            return Err(DeviceError::device_unavailable(index, "already open"));
        }

        self.calls.record("open");
        Ok(MockCamera {
            index,
            config: self.config.clone(),
            claimed: Arc::clone(&self.claimed),
            calls: self.calls.clone(),
            streaming: None,
            imu_started: false,
            closed: false,
            delivered: 0,
            attempts: 0,
            next_due: Instant::now(),
            last_timestamp: Duration::ZERO,
        })
    }
}

/// 正在推流的模式与预渲染场景
struct Streaming {
    config: DeviceConfig,
    scene: MockScene,
}

/// Mock 相机
///
/// 每次 capture 交付同一个预渲染场景，时间戳按帧率递增。
pub struct MockCamera {
    index: u32,
    config: MockConfig,
    claimed: Arc<Mutex<HashSet<u32>>>,
    calls: CallLog,
    streaming: Option<Streaming>,
    imu_started: bool,
    closed: bool,
    /// 成功交付的 capture 数
    delivered: u64,
    /// get_capture 调用次数
    attempts: u64,
    next_due: Instant,
    last_timestamp: Duration,
}

impl MockCamera {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn ensure_open(&self, resource: &str) -> Result<(), DeviceError> {
        if self.closed {
            Err(DeviceError::disposed(resource))
        } else {
            Ok(())
        }
    }

    fn release_claim(&self) {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.index);
    }

    fn release_result(&self, step: &str) -> Result<(), DeviceError> {
        if self.config.fail_release {
            Err(DeviceError::hardware(format!("mock {step} failed")))
        } else {
            Ok(())
        }
    }

    /// Wait for the next frame slot; `false` if the slot lies beyond `timeout`
    fn pace(&mut self, interval: Duration, timeout: Duration) -> bool {
        if !self.config.realtime {
            return true;
        }
        let now = Instant::now();
        if self.next_due > now {
            let wait = self.next_due - now;
            if wait > timeout {
                thread::sleep(timeout);
                return false;
            }
            thread::sleep(wait);
        }
        self.next_due = self.next_due.max(Instant::now()) + interval;
        true
    }
}

impl DepthCamera for MockCamera {
    fn serial_number(&self) -> String {
        format!("MOCK{:08}", self.index)
    }

    #[instrument(name = "mock_camera_start_cameras", skip(self, config), fields(index = self.index))]
    fn start_cameras(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        self.ensure_open("device")?;
        if self.streaming.is_some() {
            return Err(DeviceError::hardware("cameras already started"));
        }
        config.validate()?;
        if self.config.fail_start_cameras {
            return Err(DeviceError::hardware("mock camera refused to stream"));
        }

        let scene = MockScene::render(config, self.config.body_count)?;
        self.calls.record("start_cameras");
        self.streaming = Some(Streaming {
            config: config.clone(),
            scene,
        });
        self.next_due = Instant::now();
        Ok(())
    }

    #[instrument(name = "mock_camera_start_imu", skip(self), fields(index = self.index))]
    fn start_imu(&mut self) -> Result<(), DeviceError> {
        self.ensure_open("device")?;
        if self.streaming.is_none() {
            return Err(DeviceError::Unsupported {
                message: "imu requires running cameras".to_string(),
            });
        }
        if self.config.fail_start_imu {
            return Err(DeviceError::hardware("mock imu failed to start"));
        }
        self.calls.record("start_imu");
        self.imu_started = true;
        Ok(())
    }

    fn calibration(&self) -> Result<Calibration, DeviceError> {
        self.ensure_open("device")?;
        if self.config.fail_calibration {
            return Err(DeviceError::hardware("mock calibration blob corrupt"));
        }
        let streaming = self.streaming.as_ref().ok_or_else(|| DeviceError::Unsupported {
            message: "calibration requires running cameras".to_string(),
        })?;
        Ok(mock_calibration(&streaming.config))
    }

    fn get_capture(&mut self, timeout: Duration) -> Result<Capture, DeviceError> {
        self.ensure_open("camera")?;
        let Some(interval) = self.streaming.as_ref().map(|s| s.config.camera_fps.frame_interval())
        else {
            return Err(DeviceError::hardware("cameras not started"));
        };
        self.attempts += 1;

        if let Some(limit) = self.config.panic_after {
            if self.delivered >= limit {
                panic!("mock camera firmware crash after {limit} captures");
            }
        }
        if let Some(limit) = self.config.fail_capture_after {
            if self.delivered >= limit {
                return Err(DeviceError::hardware("mock device disconnected"));
            }
        }
        let waited_ms = timeout.as_millis() as u64;
        if let Some(every) = self.config.timeout_every.filter(|n| *n > 0) {
            if self.attempts % every == 0 {
                thread::sleep(timeout.min(interval));
                return Err(DeviceError::CaptureTimeout { waited_ms });
            }
        }
        if !self.pace(interval, timeout) {
            return Err(DeviceError::CaptureTimeout { waited_ms });
        }

        self.delivered += 1;
        // device clock keeps ticking through timeouts
        let timestamp = interval * self.attempts as u32;
        self.last_timestamp = timestamp;
        let scene = match &self.streaming {
            Some(streaming) => &streaming.scene,
            None => return Err(DeviceError::hardware("cameras not started")),
        };
        Ok(Capture {
            color: scene.color.clone(),
            depth: scene.depth.clone(),
            temperature_c: 30.0 + (self.delivered % 20) as f32 * 0.05,
            device_timestamp: timestamp,
        })
    }

    fn get_imu_sample(&mut self, _timeout: Duration) -> Result<Option<ImuSample>, DeviceError> {
        self.ensure_open("imu")?;
        if !self.imu_started {
            return Ok(None);
        }
        let wobble = (self.delivered % 8) as f32 * 0.001;
        Ok(Some(ImuSample {
            accelerometer: Vector3::new(0.05, -9.81 + wobble, 0.12),
            gyroscope: Vector3::new(wobble, -wobble, 0.0),
            temperature_c: 31.5,
            accelerometer_timestamp: self.last_timestamp,
            gyroscope_timestamp: self.last_timestamp,
        }))
    }

    #[instrument(name = "mock_camera_stop_cameras", skip(self), fields(index = self.index))]
    fn stop_cameras(&mut self) -> Result<(), DeviceError> {
        self.ensure_open("device")?;
        self.calls.record("stop_cameras");
        self.streaming = None;
        self.release_result("stop_cameras")
    }

    #[instrument(name = "mock_camera_stop_imu", skip(self), fields(index = self.index))]
    fn stop_imu(&mut self) -> Result<(), DeviceError> {
        self.ensure_open("device")?;
        self.calls.record("stop_imu");
        self.imu_started = false;
        self.release_result("stop_imu")
    }

    #[instrument(name = "mock_camera_close", skip(self), fields(index = self.index))]
    fn close(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Ok(());
        }
        self.calls.record("close");
        self.closed = true;
        self.streaming = None;
        self.imu_started = false;
        self.release_claim();
        debug!(
            delivered = self.delivered,
            attempts = self.attempts,
            "mock camera closed"
        );
        self.release_result("close")
    }
}

impl Drop for MockCamera {
    fn drop(&mut self) {
        // 未 close 就被丢弃（如生产者线程 panic）时归还设备
        if !self.closed {
            self.release_claim();
        }
    }
}
