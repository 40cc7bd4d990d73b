use std::time::{Duration, Instant};

use lipread_camera::Frame;

/// An ordered, oldest-first run of consecutive frames: one unit of
/// downstream work.
///
/// The frames are a snapshot taken out of the history, so later captures
/// never change a window that is already in flight.
#[derive(Debug, Clone)]
pub struct Window {
    sequence: u64,
    sampled_at: Instant,
    frames: Vec<Frame>,
}

impl Window {
    pub fn new(sequence: u64, frames: Vec<Frame>) -> Self {
        Self {
            sequence,
            sampled_at: Instant::now(),
            frames,
        }
    }

    /// Order in which the sampler produced this window.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn sampled_at(&self) -> Instant {
        self.sampled_at
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// How old the newest frame already was when the window was sampled.
    pub fn staleness(&self) -> Option<Duration> {
        let newest = self.frames.last()?;
        Some(self.sampled_at.saturating_duration_since(newest.captured_at()))
    }

    /// Capture indices of the first and last frame.
    pub fn span(&self) -> Option<(u64, u64)> {
        Some((self.frames.first()?.index(), self.frames.last()?.index()))
    }
}
