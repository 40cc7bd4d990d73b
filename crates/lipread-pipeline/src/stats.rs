//! Counters shared by every stage.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_captured: AtomicU64,
    read_failures: AtomicU64,
    windows_sampled: AtomicU64,
    windows_dropped: AtomicU64,
    warmup_skips: AtomicU64,
    windows_processed: AtomicU64,
    processing_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub read_failures: u64,
    /// Windows accepted by the hand-off slot.
    pub windows_sampled: u64,
    /// Windows discarded under backpressure.
    pub windows_dropped: u64,
    pub warmup_skips: u64,
    pub windows_processed: u64,
    pub processing_failures: u64,
}

macro_rules! bump {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            pub(crate) fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl PipelineStats {
    bump! {
        frame_captured => frames_captured,
        read_failed => read_failures,
        window_sampled => windows_sampled,
        window_dropped => windows_dropped,
        warmup_skipped => warmup_skips,
        window_processed => windows_processed,
        processing_failed => processing_failures,
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            windows_sampled: self.windows_sampled.load(Ordering::Relaxed),
            windows_dropped: self.windows_dropped.load(Ordering::Relaxed),
            warmup_skips: self.warmup_skips.load(Ordering::Relaxed),
            windows_processed: self.windows_processed.load(Ordering::Relaxed),
            processing_failures: self.processing_failures.load(Ordering::Relaxed),
        }
    }
}
