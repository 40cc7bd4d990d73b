//! Boundary to whatever draws the live preview.

use std::thread;
use std::time::Duration;

use lipread_camera::{Frame, FrameBuffer};

/// A display surface polled from the caller's thread.
pub trait Viewer {
    fn render_latest(&mut self, frame: &Frame) -> anyhow::Result<()>;

    /// Must be cheap; called once per render-loop iteration.
    fn poll_quit_requested(&mut self) -> bool;

    /// Close windows and free display resources.
    fn teardown(&mut self) {}
}

/// Draw the newest frame every `frame_interval` until the viewer asks to
/// quit. Returns the number of frames rendered.
pub fn render_until_quit<V: Viewer + ?Sized>(
    viewer: &mut V,
    buffer: &FrameBuffer,
    frame_interval: Duration,
) -> anyhow::Result<u64> {
    let mut rendered = 0u64;
    let mut last_index = None;
    loop {
        if let Some(frame) = buffer.latest() {
            if last_index != Some(frame.index()) {
                viewer.render_latest(&frame)?;
                last_index = Some(frame.index());
                rendered += 1;
            }
        }
        if viewer.poll_quit_requested() {
            return Ok(rendered);
        }
        thread::sleep(frame_interval);
    }
}
