//! Capture thread: device → FrameBuffer, at an optional target rate.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use lipread_camera::{FrameBuffer, FrameSource};
use log::{debug, info};

use crate::{Lifecycle, PipelineConfig, PipelineStats};

pub struct CaptureLoop<S> {
    source: S,
    buffer: Arc<FrameBuffer>,
    lifecycle: Lifecycle,
    stats: Arc<PipelineStats>,
    frame_period: Option<Duration>,
    backoff: Duration,
}

impl<S: FrameSource> CaptureLoop<S> {
    pub fn new(
        source: S,
        buffer: Arc<FrameBuffer>,
        lifecycle: Lifecycle,
        stats: Arc<PipelineStats>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            source,
            buffer,
            lifecycle,
            stats,
            frame_period: config.frame_period(),
            backoff: config.read_backoff,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<S>> {
        thread::Builder::new()
            .name("capture".into())
            .spawn(move || self.run())
    }

    /// Loop until the pipeline leaves `Running`; hands the source back so
    /// the coordinator can release it.
    pub fn run(self) -> S {
        let Self {
            mut source,
            buffer,
            lifecycle,
            stats,
            frame_period,
            backoff,
        } = self;
        info!("capture loop started on {}", source.name());

        let mut captured = 0u64;
        while lifecycle.is_running() {
            let started = Instant::now();
            match source.read_frame() {
                Some(frame) => {
                    buffer.capture(frame);
                    stats.frame_captured();
                    captured += 1;
                    // sleep only what is left of the period, never catch up
                    if let Some(period) = frame_period {
                        if let Some(rest) = period.checked_sub(started.elapsed()) {
                            thread::sleep(rest);
                        }
                    }
                }
                None => {
                    stats.read_failed();
                    debug!("no frame from {}, retrying in {:?}", source.name(), backoff);
                    thread::sleep(backoff);
                }
            }
        }

        info!("capture loop stopped after {captured} frames");
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineState;
    use lipread_camera::SyntheticSource;

    fn config(fps: Option<f64>) -> PipelineConfig {
        PipelineConfig {
            window_size: 8,
            target_fps: fps,
            read_backoff: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[test]
    fn fills_buffer_and_returns_source() {
        let buffer = Arc::new(FrameBuffer::new(8));
        let lifecycle = Lifecycle::new();
        let stats = Arc::new(PipelineStats::default());
        let src = SyntheticSource::open(4, 4).unwrap().with_drop_every(4);
        let handle = CaptureLoop::new(
            src,
            Arc::clone(&buffer),
            lifecycle.clone(),
            Arc::clone(&stats),
            &config(None),
        )
        .spawn()
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while buffer.len() < 8 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        lifecycle.advance(PipelineState::Stopping);
        let mut src = handle.join().unwrap();
        src.release();

        let snap = stats.snapshot();
        assert_eq!(buffer.len(), 8);
        assert!(snap.frames_captured >= 8);
        assert!(snap.read_failures >= 1);
        assert_eq!(buffer.latest().unwrap().index() + 1, snap.frames_captured);
    }

    #[test]
    fn paces_to_target_fps() {
        let buffer = Arc::new(FrameBuffer::new(64));
        let lifecycle = Lifecycle::new();
        let stats = Arc::new(PipelineStats::default());
        let handle = CaptureLoop::new(
            SyntheticSource::open(2, 2).unwrap(),
            Arc::clone(&buffer),
            lifecycle.clone(),
            Arc::clone(&stats),
            &config(Some(50.0)),
        )
        .spawn()
        .unwrap();

        thread::sleep(Duration::from_millis(200));
        lifecycle.advance(PipelineState::Stopping);
        handle.join().unwrap();

        // 50 fps over ~200 ms is ~10 frames; unpaced would be thousands
        let captured = stats.snapshot().frames_captured;
        assert!((3..=20).contains(&captured), "captured {captured}");
    }

    #[test]
    fn slow_device_is_not_followed_by_catch_up_burst() {
        let delay = Duration::from_millis(30);
        let buffer = Arc::new(FrameBuffer::new(64));
        let lifecycle = Lifecycle::new();
        let stats = Arc::new(PipelineStats::default());
        let started = Instant::now();
        // 100 fps target, but the device needs 30 ms per frame
        let handle = CaptureLoop::new(
            SyntheticSource::open(2, 2).unwrap().with_frame_delay(delay),
            Arc::clone(&buffer),
            lifecycle.clone(),
            Arc::clone(&stats),
            &config(Some(100.0)),
        )
        .spawn()
        .unwrap();

        thread::sleep(Duration::from_millis(300));
        lifecycle.advance(PipelineState::Stopping);
        handle.join().unwrap();
        let elapsed = started.elapsed();

        let captured = stats.snapshot().frames_captured;
        let bound = (elapsed.as_millis() / delay.as_millis()) as u64 + 1;
        assert!(captured >= 2, "captured {captured}");
        assert!(captured <= bound, "captured {captured} in {elapsed:?}");

        let frames = buffer.history_snapshot();
        for pair in frames.windows(2) {
            let gap = pair[1].captured_at() - pair[0].captured_at();
            assert!(gap >= Duration::from_millis(25), "burst: frames {gap:?} apart");
        }
    }

    #[test]
    fn exits_immediately_when_not_running() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(PipelineState::Stopping);
        let stats = Arc::new(PipelineStats::default());
        CaptureLoop::new(
            SyntheticSource::open(2, 2).unwrap(),
            Arc::new(FrameBuffer::new(4)),
            lifecycle,
            Arc::clone(&stats),
            &config(None),
        )
        .run();
        assert_eq!(stats.snapshot().frames_captured, 0);
    }
}
