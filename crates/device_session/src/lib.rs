//! # Device Session
//!
//! 设备会话：打开深度相机、启动追踪器、托管后台生产者线程。
//!
//! ## 职责
//!
//! - 按 `DeviceConfig` 启动相机、IMU 和人体追踪器
//! - 启动失败时按相反顺序回滚
//! - 停止时等待生产者线程退出后再释放硬件
//! - 对外暴露帧消费者、标定和采集计数
//!
//! ## 使用示例
//!
//! ```ignore
//! use device_session::{DeviceSession, MockDeviceDriver, MockTrackerEngine};
//!
//! let mut session = DeviceSession::new(MockDeviceDriver::new(), MockTrackerEngine::new());
//! session.start(&DeviceConfig::default())?;
//!
//! let mut consumer = session.subscribe();
//! if let Some(frame) = consumer.take_if_new() {
//!     println!("{} bodies", frame.bodies.len());
//! }
//!
//! session.stop();
//! ```

mod consumer;
mod error;
mod mock_driver;
mod mock_scene;
mod mock_tracker;
mod session;

pub use consumer::*;
pub use error::*;
pub use mock_driver::*;
pub use mock_scene::{mock_calibration, BACKDROP_MM, FOREGROUND_LIMIT_MM, MAX_BODIES, PERSON_MM};
pub use mock_tracker::*;
pub use session::*;
