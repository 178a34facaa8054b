//! 异步消费端辅助函数
//!
//! 消费者按固定节拍轮询 `FrameConsumer`，从不阻塞生产者。

use std::sync::Arc;
use std::time::Duration;

use contracts::Frame;
use frame_store::FrameConsumer;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// 节拍频率 → 轮询间隔（非正数按 1 Hz 处理）
pub fn tick_interval(tick_hz: f64) -> Duration {
    if tick_hz.is_finite() && tick_hz > 0.0 {
        Duration::from_secs_f64(1.0 / tick_hz)
    } else {
        Duration::from_secs(1)
    }
}

/// 每个节拍检查一次，直到取到新帧或超时
///
/// 超时返回 `None`。
pub async fn wait_for_frame(
    consumer: &mut FrameConsumer,
    tick: Duration,
    limit: Duration,
) -> Option<Arc<Frame>> {
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    timeout(limit, async {
        loop {
            ticker.tick().await;
            if let Some(frame) = consumer.take_if_new() {
                return frame;
            }
        }
    })
    .await
    .ok()
}
