// lipread-camera/src/buffer.rs
//! Latest frame plus a fixed-capacity history, behind one lock.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::Frame;

#[derive(Debug)]
struct Inner {
    latest: Option<Frame>,
    history: VecDeque<Frame>,
}

/// Thread-safe holder of the newest frame and the last `capacity` frames.
///
/// Writes come from the capture thread only; readers get owned values
/// (cheap [`Frame`] clones), never a view into the locked state.
#[derive(Debug)]
pub struct FrameBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl FrameBuffer {
    /// # Panics
    /// Panics if capacity is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "FrameBuffer capacity must be greater than 0");
        Self {
            inner: Mutex::new(Inner {
                latest: None,
                history: VecDeque::with_capacity(capacity),
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the latest frame and append it to history, evicting the
    /// oldest entry once full.
    pub fn capture(&self, frame: Frame) {
        let mut inner = self.lock();
        if inner.history.len() >= self.capacity {
            inner.history.pop_front();
        }
        inner.history.push_back(frame.clone());
        inner.latest = Some(frame);
    }

    pub fn latest(&self) -> Option<Frame> {
        self.lock().latest.clone()
    }

    /// Oldest-first copy of the whole history.
    pub fn history_snapshot(&self) -> Vec<Frame> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().history.is_empty()
    }

    // Every critical section leaves `Inner` consistent, so a panic on
    // another thread cannot leave a half-written history behind.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn frame(i: u64) -> Frame {
        Frame::new(i, RgbImage::new(2, 2))
    }

    fn indices(frames: &[Frame]) -> Vec<u64> {
        frames.iter().map(Frame::index).collect()
    }

    #[test]
    fn empty_buffer() {
        let buf = FrameBuffer::new(4);
        assert!(buf.latest().is_none());
        assert!(buf.history_snapshot().is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn keeps_last_window_in_capture_order() {
        let buf = FrameBuffer::new(4);
        for i in 1..=6 {
            buf.capture(frame(i));
        }
        assert_eq!(indices(&buf.history_snapshot()), vec![3, 4, 5, 6]);
    }

    #[test]
    fn history_len_is_min_of_captures_and_capacity() {
        for n in 0..10u64 {
            let buf = FrameBuffer::new(5);
            for i in 0..n {
                buf.capture(frame(i));
            }
            let snap = buf.history_snapshot();
            assert_eq!(snap.len(), (n as usize).min(5));
            let expected: Vec<u64> = (n.saturating_sub(5)..n).collect();
            assert_eq!(indices(&snap), expected);
        }
    }

    #[test]
    fn latest_matches_newest_history_entry() {
        let buf = FrameBuffer::new(3);
        for i in 0..5 {
            buf.capture(frame(i));
            let latest = buf.latest().unwrap();
            let snap = buf.history_snapshot();
            assert!(latest.same_capture(snap.last().unwrap()));
        }
    }

    #[test]
    fn snapshot_is_not_affected_by_later_captures() {
        let buf = FrameBuffer::new(3);
        buf.capture(frame(1));
        buf.capture(frame(2));
        let snap = buf.history_snapshot();
        buf.capture(frame(3));
        buf.capture(frame(4));
        assert_eq!(indices(&snap), vec![1, 2]);
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn zero_capacity_panics() {
        let _ = FrameBuffer::new(0);
    }
}
