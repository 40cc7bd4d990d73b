//! Periodic sampling of the frame history into windows.
//!
//! Freshness over completeness: when the worker is busy the window is
//! dropped, never queued, and the sampler moves on to the next period.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use lipread_camera::FrameBuffer;
use log::{debug, info, warn};

use crate::handoff::{HandoffSender, OfferError};
use crate::{Lifecycle, PipelineConfig, PipelineStats, Window};

/// What a single sampling decision did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The period since the last tick has not elapsed.
    NotDue,
    /// History holds fewer than `window_size` frames.
    WarmingUp { frames: usize },
    /// Window `sequence` was accepted by the slot.
    Offered { sequence: u64 },
    /// Window `sequence` was refused and discarded.
    Dropped { sequence: u64 },
}

pub struct WindowSampler {
    buffer: Arc<FrameBuffer>,
    sender: HandoffSender,
    lifecycle: Lifecycle,
    stats: Arc<PipelineStats>,
    window_size: usize,
    interval: Duration,
    offer_timeout: Duration,
    idle_sleep: Duration,
    drop_warn_after: u32,
    baseline: Option<Instant>,
    next_sequence: u64,
    consecutive_drops: u32,
}

impl WindowSampler {
    pub fn new(
        buffer: Arc<FrameBuffer>,
        sender: HandoffSender,
        lifecycle: Lifecycle,
        stats: Arc<PipelineStats>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            buffer,
            sender,
            lifecycle,
            stats,
            window_size: config.window_size,
            interval: config.processing_interval,
            offer_timeout: config.offer_timeout,
            idle_sleep: config.idle_sleep,
            drop_warn_after: config.drop_warn_after,
            baseline: None,
            next_sequence: 0,
            consecutive_drops: 0,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("sampler".into())
            .spawn(move || self.run())
    }

    /// Tick on every idle wake-up until the pipeline leaves `Running`.
    pub fn run(mut self) {
        info!(
            "sampler started: {} frames every {:?}",
            self.window_size, self.interval
        );
        while self.lifecycle.is_running() {
            self.tick(Instant::now());
            thread::sleep(self.idle_sleep);
        }
        info!("sampler stopped after {} windows", self.next_sequence);
    }

    /// Make one sampling decision as of `now`.
    ///
    /// Every due tick consumes its period, whatever the outcome, so a
    /// dropped window is not retried until the next period.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if let Some(baseline) = self.baseline {
            if now.saturating_duration_since(baseline) < self.interval {
                return TickOutcome::NotDue;
            }
        }
        self.advance_baseline(now);

        let mut frames = self.buffer.history_snapshot();
        if frames.len() < self.window_size {
            self.stats.warmup_skipped();
            debug!("warming up: {}/{} frames", frames.len(), self.window_size);
            return TickOutcome::WarmingUp { frames: frames.len() };
        }
        let recent = frames.split_off(frames.len() - self.window_size);

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        match self.sender.offer(Window::new(sequence, recent), self.offer_timeout) {
            Ok(()) => {
                self.stats.window_sampled();
                self.consecutive_drops = 0;
                debug!("window #{sequence} handed off");
                TickOutcome::Offered { sequence }
            }
            Err(err) => {
                self.stats.window_dropped();
                debug!("{err}");
                if matches!(err, OfferError::Full(_)) {
                    self.note_drop();
                }
                TickOutcome::Dropped { sequence }
            }
        }
    }

    fn advance_baseline(&mut self, now: Instant) {
        self.baseline = Some(match self.baseline {
            Some(prev) => prev.max(now),
            None => now,
        });
    }

    fn note_drop(&mut self) {
        self.consecutive_drops += 1;
        if self.drop_warn_after > 0 && self.consecutive_drops >= self.drop_warn_after {
            warn!(
                "{} windows in a row dropped; processing stage is not keeping up",
                self.consecutive_drops
            );
            self.consecutive_drops = 0;
        }
    }
}
