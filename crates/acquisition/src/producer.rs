//! Producer loop - background thread turning captures into published frames.

use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use contracts::{BodyTracker, DepthCamera};
use frame_store::FrameStore;
use tracing::{debug, error, info, warn};

use crate::assembler::FrameAssembler;
use crate::error::{AcquisitionError, FailureKind};
use crate::metrics::AcquisitionMetrics;

/// Liveness flag plus last-error slot shared by the producer and its owner
#[derive(Debug, Default)]
pub struct ProducerStatus {
    running: AtomicBool,
    last_error: Mutex<Option<AcquisitionError>>,
}

impl ProducerStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark running and forget any previous failure
    pub fn begin(&self) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.running.store(true, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the loop to exit; returns whether it was running
    pub fn request_stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }

    /// Record an unrecoverable failure and clear the running flag
    pub fn fail(&self, err: AcquisitionError) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err);
        self.running.store(false, Ordering::Release);
    }

    pub fn last_error(&self) -> Option<AcquisitionError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Everything the producer thread shares with its owner
#[derive(Debug, Clone)]
pub struct ProducerContext {
    pub store: Arc<FrameStore>,
    pub status: Arc<ProducerStatus>,
    pub metrics: Arc<AcquisitionMetrics>,
}

/// Producer thread handle; `None` when the loop panicked and the handles were lost
pub type ProducerHandle<C, T> = JoinHandle<Option<(C, T)>>;

/// The OS refused to create the producer thread
///
/// The camera and tracker come back in `parts` so the owner can release them.
pub struct ProducerSpawnError<C, T> {
    pub source: io::Error,
    pub parts: Option<(C, T)>,
}

impl<C, T> fmt::Debug for ProducerSpawnError<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerSpawnError")
            .field("source", &self.source)
            .field("parts_returned", &self.parts.is_some())
            .finish()
    }
}

impl<C, T> fmt::Display for ProducerSpawnError<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to spawn producer thread: {}", self.source)
    }
}

/// Start the producer on a dedicated thread
///
/// The join handle yields the camera and tracker back once the loop exits.
/// A panic inside the loop is recorded on `ctx.status` as soon as it happens.
pub fn spawn_producer<C, T>(
    assembler: FrameAssembler<C, T>,
    ctx: ProducerContext,
) -> Result<ProducerHandle<C, T>, ProducerSpawnError<C, T>>
where
    C: DepthCamera,
    T: BodyTracker,
{
    let handoff = Arc::new(Mutex::new(Some(assembler)));
    let slot = Arc::clone(&handoff);

    let spawned = thread::Builder::new()
        .name("frame-producer".to_string())
        .spawn(move || {
            let assembler = slot.lock().unwrap_or_else(PoisonError::into_inner).take()?;
            run_guarded(assembler, ctx)
        });

    spawned.map_err(|source| {
        // the rejected closure has been dropped, so the slot is ours again
        let parts = handoff
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(FrameAssembler::into_parts);
        ProducerSpawnError { source, parts }
    })
}

fn run_guarded<C, T>(assembler: FrameAssembler<C, T>, ctx: ProducerContext) -> Option<(C, T)>
where
    C: DepthCamera,
    T: BodyTracker,
{
    let status = Arc::clone(&ctx.status);
    let metrics = Arc::clone(&ctx.metrics);

    match panic::catch_unwind(AssertUnwindSafe(|| run_producer(assembler, ctx))) {
        Ok(parts) => Some(parts),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(message = %message, "producer thread panicked");
            metrics.record_failure();
            observability::record_producer_failure("panic");
            status.fail(AcquisitionError::ProducerPanicked { message });
            None
        }
    }
}

/// Text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Producer loop body; runs until stopped or an unrecoverable failure
pub fn run_producer<C, T>(mut assembler: FrameAssembler<C, T>, ctx: ProducerContext) -> (C, T)
where
    C: DepthCamera,
    T: BodyTracker,
{
    info!("producer loop started");

    while ctx.status.is_running() {
        let started = Instant::now();

        match assembler.run_cycle(&ctx.status) {
            Ok(Some(frame)) => {
                let bodies = frame.bodies.len();
                if ctx.store.publish(frame) {
                    ctx.metrics.record_published();
                    observability::record_bodies_tracked(bodies);
                }
            }
            Ok(None) => {}
            Err(err) => match err.classify(ctx.status.is_running()) {
                FailureKind::Transient => {
                    warn!(error = %err, "capture timed out, retrying");
                    ctx.metrics.record_capture_timeout();
                    observability::record_capture_timeout();
                }
                FailureKind::TeardownRace => {
                    debug!(error = %err, "handle closed while stopping");
                    break;
                }
                FailureKind::Unrecoverable => {
                    error!(error = %err, "producer loop failed");
                    ctx.metrics.record_failure();
                    observability::record_producer_failure(failure_stage(&err));
                    ctx.status.fail(err);
                    break;
                }
            },
        }

        ctx.metrics.record_cycle();
        observability::record_cycle_duration(started.elapsed());
    }

    info!(
        frames_published = ctx.metrics.snapshot().frames_published,
        "producer loop exited"
    );
    assembler.into_parts()
}

fn failure_stage(err: &AcquisitionError) -> &'static str {
    match err {
        AcquisitionError::Device { stage, .. } => *stage,
        AcquisitionError::Conversion { modality, .. } => *modality,
        AcquisitionError::ProducerPanicked { .. } => "panic",
    }
}
