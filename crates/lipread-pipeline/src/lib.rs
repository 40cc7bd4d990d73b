// lipread-pipeline/src/lib.rs
// ============================================================
// Real-time capture → windowed sampling → slow processing
// ------------------------------------------------------------
//   capture thread : FrameSource → FrameBuffer (paced)
//   sampler thread : FrameBuffer → Window → hand-off (drop on busy)
//   worker thread  : hand-off → Processor (seconds-scale, blocking)
//   caller thread  : UI / render loop, triggers shutdown
// ------------------------------------------------------------
// Public API
//   * Pipeline::start(source, processor, config)
//   * Pipeline::open(|| Camera::open(..), processor, config)
//   * Pipeline::shutdown() → ShutdownReport
// ============================================================

//! lipread – scheduling and hand-off fabric
//!
//! Feeds a slow, blocking [`Processor`] fixed-size windows of recent
//! frames at a bounded rate, without ever stalling frame acquisition.
//! The pipeline is deliberately lossy: windows produced while the worker
//! is busy are dropped (see [`sampler`]) and at most one window is ever
//! waiting or in flight (see [`handoff`]).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};
use lipread_camera::{CameraError, Frame, FrameBuffer, FrameSource};
use log::info;
use thiserror::Error;

pub mod capture;
pub mod config;
pub mod handoff;
pub mod lifecycle;
pub mod sampler;
pub mod shutdown;
pub mod stats;
pub mod ui;
pub mod window;
pub mod worker;

pub use capture::CaptureLoop;
pub use config::PipelineConfig;
pub use lifecycle::{Lifecycle, PipelineState};
pub use sampler::{TickOutcome, WindowSampler};
pub use shutdown::{ShutdownCoordinator, ShutdownReport, StageExit};
pub use stats::{PipelineStats, StatsSnapshot};
pub use ui::{render_until_quit, Viewer};
pub use window::Window;
pub use worker::ProcessingWorker;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("Failed to spawn {stage} thread: {source}")]
    Spawn {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// The slow downstream stage (detector → model → refiner).
///
/// Runs on the worker thread only, one window at a time. Errors and
/// panics are logged and counted; the next window is still accepted.
pub trait Processor: Send + 'static {
    type Output: Send + 'static;

    fn process(&mut self, window: &Window) -> anyhow::Result<Self::Output>;
}

impl<F, T> Processor for F
where
    F: FnMut(&Window) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn process(&mut self, window: &Window) -> anyhow::Result<T> {
        self(window)
    }
}

/// A successful processing result.
#[derive(Debug, Clone)]
pub struct Processed<T> {
    pub sequence: u64,
    pub output: T,
    pub latency: Duration,
}

/// A running pipeline. Dropping it runs the same bounded shutdown as
/// [`Pipeline::shutdown`].
pub struct Pipeline<S: FrameSource, T> {
    buffer: Arc<FrameBuffer>,
    lifecycle: Lifecycle,
    stats: Arc<PipelineStats>,
    results: Receiver<Processed<T>>,
    coordinator: ShutdownCoordinator<S>,
}

impl<S: FrameSource, T: Send + 'static> Pipeline<S, T> {
    /// Open the device, then start. Nothing is spawned when opening fails.
    pub fn open<P, F>(open: F, processor: P, config: PipelineConfig) -> Result<Self>
    where
        P: Processor<Output = T>,
        F: FnOnce() -> lipread_camera::Result<S>,
    {
        config.validate()?;
        let source = open()?;
        Self::start(source, processor, config)
    }

    /// Spawn worker, capture and sampler threads, in that order.
    pub fn start<P>(source: S, processor: P, config: PipelineConfig) -> Result<Self>
    where
        P: Processor<Output = T>,
    {
        config.validate()?;

        let buffer = Arc::new(FrameBuffer::new(config.window_size));
        let lifecycle = Lifecycle::new();
        let stats = Arc::new(PipelineStats::default());
        let (results_tx, results) = bounded(config.results_capacity);
        let (offer_side, take_side) = handoff::channel();

        let mut coordinator = ShutdownCoordinator::new(lifecycle.clone(), config.join_timeout);
        info!("starting pipeline on {}", source.name());

        let worker = ProcessingWorker::new(
            processor,
            take_side,
            lifecycle.clone(),
            Arc::clone(&stats),
            config.poll_interval,
            results_tx,
        )
        .spawn()
        .map_err(|source| PipelineError::Spawn { stage: "worker", source })?;
        coordinator.set_worker(worker);

        // from here on a failed spawn must stop what already runs
        let mut pipeline = Self {
            buffer: Arc::clone(&buffer),
            lifecycle: lifecycle.clone(),
            stats: Arc::clone(&stats),
            results,
            coordinator,
        };

        let capture = CaptureLoop::new(
            source,
            Arc::clone(&buffer),
            lifecycle.clone(),
            Arc::clone(&stats),
            &config,
        )
        .spawn()
        .map_err(|source| PipelineError::Spawn { stage: "capture", source })?;
        pipeline.coordinator.set_capture(capture);

        let sampler = WindowSampler::new(buffer, offer_side, lifecycle, stats, &config)
            .spawn()
            .map_err(|source| PipelineError::Spawn { stage: "sampler", source })?;
        pipeline.coordinator.set_sampler(sampler);

        Ok(pipeline)
    }

    /// Shared frame store, for the render loop.
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn latest_frame(&self) -> Option<Frame> {
        self.buffer.latest()
    }

    /// Successful processing results, oldest first.
    pub fn results(&self) -> &Receiver<Processed<T>> {
        &self.results
    }

    pub fn state(&self) -> PipelineState {
        self.lifecycle.state()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn shutdown(self) -> ShutdownReport {
        self.shutdown_with(|| {})
    }

    /// Shut down and run `teardown` once the device has been released.
    pub fn shutdown_with<F: FnOnce()>(mut self, teardown: F) -> ShutdownReport {
        let stats = Arc::clone(&self.stats);
        self.coordinator.shutdown(move || stats.snapshot(), teardown)
    }
}

impl<S: FrameSource, T> Drop for Pipeline<S, T> {
    fn drop(&mut self) {
        if self.lifecycle.state() != PipelineState::Stopped {
            let stats = Arc::clone(&self.stats);
            self.coordinator.shutdown(move || stats.snapshot(), || {});
        }
    }
}
