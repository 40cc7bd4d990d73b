// lipread-camera/src/synthetic.rs
//! Deterministic frame source for tests and camera-less runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::{Rgb, RgbImage};

use crate::{CameraError, Frame, FrameSource, Result};

/// Produces solid-colour frames whose red channel encodes the frame index.
///
/// Can simulate a slow device (`with_frame_delay`), a flaky one that drops
/// every n-th read (`with_drop_every`) and a finite stream (`with_limit`).
pub struct SyntheticSource {
    width: u32,
    height: u32,
    next_index: u64,
    reads: u64,
    drop_every: Option<u64>,
    frame_delay: Duration,
    limit: Option<u64>,
    released: Arc<AtomicBool>,
}

impl SyntheticSource {
    pub fn open(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CameraError::InvalidGeometry { width, height });
        }
        Ok(Self {
            width,
            height,
            next_index: 0,
            reads: 0,
            drop_every: None,
            frame_delay: Duration::ZERO,
            limit: None,
            released: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Every `n`-th read returns no frame.
    pub fn with_drop_every(mut self, n: u64) -> Self {
        self.drop_every = (n > 0).then_some(n);
        self
    }

    /// Block this long inside every read, like a device waiting on vsync.
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    /// Stop producing frames after `count` have been delivered.
    pub fn with_limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Flag flipped by [`FrameSource::release`]; lets callers observe
    /// shutdown after the source has moved into the capture thread.
    pub fn release_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }

    fn render(&self, index: u64) -> RgbImage {
        let red = (index % 256) as u8;
        let green = ((index / 256) % 256) as u8;
        RgbImage::from_pixel(self.width, self.height, Rgb([red, green, 0]))
    }
}

impl FrameSource for SyntheticSource {
    fn read_frame(&mut self) -> Option<Frame> {
        if self.released.load(Ordering::Acquire) {
            return None;
        }
        if !self.frame_delay.is_zero() {
            thread::sleep(self.frame_delay);
        }
        self.reads += 1;
        if let Some(n) = self.drop_every {
            if self.reads % n == 0 {
                return None;
            }
        }
        if self.limit.is_some_and(|limit| self.next_index >= limit) {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(Frame::new(index, self.render(index)))
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::Release);
    }

    fn name(&self) -> &str {
        "SyntheticSource"
    }
}
