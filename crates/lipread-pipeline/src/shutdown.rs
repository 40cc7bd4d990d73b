//! Ordered shutdown: producers first, then drain the worker, then release
//! the device. Every join is bounded; a stage that overruns is logged and
//! left behind rather than allowed to hang process exit.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use lipread_camera::FrameSource;
use log::{info, warn};

use crate::{Lifecycle, PipelineState, StatsSnapshot};

const JOIN_POLL: Duration = Duration::from_millis(2);

/// How a stage's thread ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExit {
    Clean,
    Panicked,
    TimedOut,
    /// The stage was never started.
    NotStarted,
}

#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub capture: StageExit,
    pub sampler: StageExit,
    pub worker: StageExit,
    pub source_released: bool,
    pub elapsed: Duration,
    pub stats: StatsSnapshot,
}

impl ShutdownReport {
    /// True when every started stage exited on its own within its timeout
    /// and the device, if capture ever ran, was released.
    pub fn is_clean(&self) -> bool {
        [self.capture, self.sampler, self.worker]
            .iter()
            .all(|s| matches!(s, StageExit::Clean | StageExit::NotStarted))
            && (self.source_released || self.capture == StageExit::NotStarted)
    }
}

enum Joined<T> {
    Done(T),
    Panicked,
    TimedOut,
}

/// Join `handle` unless it is still running at `deadline`.
fn join_until<T>(handle: JoinHandle<T>, deadline: Instant) -> Joined<T> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            // dropping the handle detaches the thread
            return Joined::TimedOut;
        }
        thread::sleep(JOIN_POLL);
    }
    match handle.join() {
        Ok(v) => Joined::Done(v),
        Err(_) => Joined::Panicked,
    }
}

fn exit_of<T>(stage: &str, joined: &Joined<T>, timeout: Duration) -> StageExit {
    match joined {
        Joined::Done(_) => StageExit::Clean,
        Joined::Panicked => {
            warn!("{stage} thread panicked");
            StageExit::Panicked
        }
        Joined::TimedOut => {
            warn!("{stage} thread did not stop within {timeout:?}; leaving it behind");
            StageExit::TimedOut
        }
    }
}

/// Owns the stage threads and drives `RUNNING → STOPPING → DRAINING → STOPPED`.
pub struct ShutdownCoordinator<S> {
    lifecycle: Lifecycle,
    join_timeout: Duration,
    capture: Option<JoinHandle<S>>,
    sampler: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: FrameSource> ShutdownCoordinator<S> {
    pub fn new(lifecycle: Lifecycle, join_timeout: Duration) -> Self {
        Self {
            lifecycle,
            join_timeout,
            capture: None,
            sampler: None,
            worker: None,
        }
    }

    pub fn set_capture(&mut self, handle: JoinHandle<S>) {
        self.capture = Some(handle);
    }

    pub fn set_sampler(&mut self, handle: JoinHandle<()>) {
        self.sampler = Some(handle);
    }

    pub fn set_worker(&mut self, handle: JoinHandle<()>) {
        self.worker = Some(handle);
    }

    /// Run the full stop sequence. `teardown` runs in the final phase,
    /// after the device has been released (display windows and the like).
    /// Calling it again after completion is a no-op that reports every
    /// stage as not started.
    pub fn shutdown<F: FnOnce()>(
        &mut self,
        stats: impl Fn() -> StatsSnapshot,
        teardown: F,
    ) -> ShutdownReport {
        let started = Instant::now();
        let timeout = self.join_timeout;

        self.lifecycle.advance(PipelineState::Stopping);
        info!("shutdown: {}", PipelineState::Stopping);

        // both producers share one deadline
        let deadline = Instant::now() + timeout;
        let sampler = match self.sampler.take() {
            Some(h) => exit_of("sampler", &join_until(h, deadline), timeout),
            None => StageExit::NotStarted,
        };
        let (capture, source) = match self.capture.take() {
            Some(h) => match join_until(h, deadline) {
                Joined::Done(source) => (StageExit::Clean, Some(source)),
                other => (exit_of("capture", &other, timeout), None),
            },
            None => (StageExit::NotStarted, None),
        };

        self.lifecycle.advance(PipelineState::Draining);
        info!("shutdown: {}", PipelineState::Draining);

        let worker = match self.worker.take() {
            Some(h) => exit_of("worker", &join_until(h, Instant::now() + timeout), timeout),
            None => StageExit::NotStarted,
        };

        self.lifecycle.advance(PipelineState::Stopped);
        let source_released = match source {
            Some(mut source) => {
                source.release();
                true
            }
            None => {
                if capture != StageExit::NotStarted {
                    warn!("frame source still held by the capture thread; not released");
                }
                false
            }
        };
        teardown();

        let report = ShutdownReport {
            capture,
            sampler,
            worker,
            source_released,
            elapsed: started.elapsed(),
            stats: stats(),
        };
        info!("shutdown: {} in {:?}", PipelineState::Stopped, report.elapsed);
        report
    }
}
