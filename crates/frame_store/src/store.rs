//! Single-slot, newest-wins frame hand-off.
//!
//! One writer (the producer loop) replaces the slot; any number of
//! [`FrameConsumer`] handles read it. The lock only guards an `Arc` swap,
//! never frame construction.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::Frame;
use tracing::trace;

#[derive(Debug, Default)]
struct Slot {
    frame: Option<Arc<Frame>>,
    /// Whether any consumer has taken `frame`
    taken: bool,
    /// Bumped by `reset`; a new session may repeat old timestamps
    generation: u64,
}

/// Hand-off counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStoreStats {
    /// Frames accepted by `publish`
    pub published: u64,
    /// Frames replaced before any consumer took them
    pub superseded: u64,
    /// Frames refused because their timestamp was not newer
    pub rejected: u64,
}

/// Synchronized frame store
#[derive(Default)]
pub struct FrameStore {
    slot: Mutex<Slot>,
    published: AtomicU64,
    superseded: AtomicU64,
    rejected: AtomicU64,
}

impl fmt::Debug for FrameStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameStore")
            .field("latest", &self.latest_timestamp())
            .field("stats", &self.stats())
            .finish()
    }
}

impl FrameStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A poisoned lock still holds a valid `Option<Arc<Frame>>`
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the stored frame
    ///
    /// Returns `false` (and drops `frame`) when its timestamp is not newer than
    /// the one already stored, so readers always see non-decreasing timestamps.
    pub fn publish(&self, frame: Frame) -> bool {
        let timestamp = frame.timestamp;
        let frame = Arc::new(frame);

        let previous = {
            let mut slot = self.lock();
            let stale = slot
                .frame
                .as_ref()
                .is_some_and(|current| timestamp <= current.timestamp);
            if stale {
                drop(slot);
                self.rejected.fetch_add(1, Ordering::Relaxed);
                trace!(
                    timestamp_us = timestamp.as_micros() as u64,
                    "stale frame rejected"
                );
                return false;
            }
            let was_taken = std::mem::replace(&mut slot.taken, false);
            slot.frame.replace(frame).map(|prev| (prev, was_taken))
        };

        self.published.fetch_add(1, Ordering::Relaxed);
        observability::record_frame_published();
        if let Some((_, false)) = previous {
            self.superseded.fetch_add(1, Ordering::Relaxed);
            observability::record_frame_superseded();
        }
        // the superseded Arc is released here, outside the lock
        true
    }

    /// Clear the slot (session restart)
    pub fn reset(&self) {
        let previous = {
            let mut slot = self.lock();
            slot.generation += 1;
            slot.taken = false;
            slot.frame.take()
        };
        drop(previous);
    }

    /// Newest frame without any staleness tracking
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.lock().frame.clone()
    }

    pub fn latest_timestamp(&self) -> Option<Duration> {
        self.lock().frame.as_ref().map(|f| f.timestamp)
    }

    /// New consumer handle with its own last-seen timestamp
    pub fn subscribe(self: &Arc<Self>) -> FrameConsumer {
        FrameConsumer {
            store: Arc::clone(self),
            seen: None,
        }
    }

    pub fn stats(&self) -> FrameStoreStats {
        FrameStoreStats {
            published: self.published.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Per-consumer reader of a [`FrameStore`]
///
/// Each handle remembers the timestamp it last returned, so independent
/// consumers never hide frames from each other.
#[derive(Debug)]
pub struct FrameConsumer {
    store: Arc<FrameStore>,
    /// (store generation, timestamp) of the last frame returned
    seen: Option<(u64, Duration)>,
}

impl FrameConsumer {
    /// Newest frame, only if this consumer has not seen it yet
    ///
    /// Never blocks on the producer beyond the slot lock.
    pub fn take_if_new(&mut self) -> Option<Arc<Frame>> {
        let mut slot = self.store.lock();
        let frame = slot.frame.as_ref()?;
        let key = (slot.generation, frame.timestamp);
        // equality rather than `>` so a restarted device clock is still delivered
        if self.seen == Some(key) {
            return None;
        }
        let frame = Arc::clone(frame);
        slot.taken = true;
        drop(slot);

        self.seen = Some(key);
        Some(frame)
    }

    /// Timestamp of the last frame returned to this consumer
    pub fn last_seen(&self) -> Option<Duration> {
        self.seen.map(|(_, timestamp)| timestamp)
    }

    pub fn store(&self) -> &Arc<FrameStore> {
        &self.store
    }
}

impl Clone for FrameConsumer {
    /// A clone is a fresh consumer: it has seen nothing yet
    fn clone(&self) -> Self {
        self.store.subscribe()
    }
}
