//! # Acquisition
//!
//! Frame acquisition pipeline.
//!
//! Responsibilities:
//! - Pull one capture per cycle and copy every modality out of it
//! - Submit captures to the body tracker and poll results without waiting
//! - Reproject depth/color through the coordinate mapper
//! - Publish each assembled `Frame` into the `FrameStore`
//!
//! ## Usage Example
//!
//! ```ignore
//! use acquisition::{spawn_producer, AssemblerConfig, FrameAssembler, ProducerContext};
//!
//! let assembler = FrameAssembler::new(camera, tracker, calibration, config, metrics.clone());
//! let handle = spawn_producer(assembler, ctx.clone())?;
//!
//! // later
//! ctx.status.request_stop();
//! if let Ok(Some((camera, tracker))) = handle.join() {
//!     // release camera and tracker
//! }
//! ```

mod assembler;
mod compositing;
mod convert;
mod error;
mod metrics;
mod producer;

#[cfg(test)]
mod testing;

// Re-exports
pub use assembler::{AssemblerConfig, FrameAssembler};
pub use compositing::compose_foreground;
pub use convert::{body_index_map, color_to_bgra, depth_to_millimeters, skeleton_to_body};
pub use error::{AcquisitionError, FailureKind, Result};
pub use metrics::{AcquisitionMetrics, AcquisitionSnapshot};
pub use producer::{
    panic_message, run_producer, spawn_producer, ProducerContext, ProducerHandle,
    ProducerSpawnError, ProducerStatus,
};
