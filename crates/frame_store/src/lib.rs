//! # Frame Store
//!
//! 生产者线程与消费端之间的单槽交接区。
//!
//! - 最新帧覆盖旧帧 (丢帧而不是排队)
//! - 每个 `FrameConsumer` 独立记录已读时间戳
//!
//! ## 使用示例
//!
//! ```ignore
//! use frame_store::FrameStore;
//!
//! let store = FrameStore::new();
//! let mut consumer = store.subscribe();
//!
//! // producer thread
//! store.publish(frame);
//!
//! // consumer tick
//! if let Some(frame) = consumer.take_if_new() {
//!     render(&frame);
//! }
//! ```

mod store;

pub use store::*;
