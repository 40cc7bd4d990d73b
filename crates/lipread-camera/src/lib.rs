// lipread-camera/src/lib.rs
// ============================================================
// Camera capture layer for lipread
// Frames are RGB8 images held behind an `Arc`, so every holder
// (history, window, display) shares one immutable pixel buffer.
// ------------------------------------------------------------
// Public API:
//   * FrameSource        – contract every capture device implements
//   * FrameBuffer        – latest frame + bounded history
//   * SyntheticSource    – deterministic source for tests/demos
//   * Camera (gstreamer) – live device, `--features gstreamer`
// ============================================================

//! lipread – camera capture layer
//!
//! A [`FrameSource`] is opened synchronously (failing with
//! [`CameraError::DeviceUnavailable`]) and then polled for frames one
//! at a time. Captured frames land in a [`FrameBuffer`], the only piece
//! of shared mutable state in the pipeline.

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use thiserror::Error;

mod buffer;
mod synthetic;
#[cfg(feature = "gstreamer")]
mod gst_camera;

pub use buffer::FrameBuffer;
pub use synthetic::SyntheticSource;
#[cfg(feature = "gstreamer")]
pub use gst_camera::Camera;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera {index} unavailable: {reason}")]
    DeviceUnavailable { index: u32, reason: String },
    #[error("Invalid frame geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },
    #[cfg(feature = "gstreamer")]
    #[error("GStreamer init failed: {0}")]
    GstInit(#[source] gst::glib::Error),
    #[cfg(feature = "gstreamer")]
    #[error("Failed to parse pipeline: {0}")]
    ParsePipeline(#[source] gst::glib::Error),
    #[cfg(feature = "gstreamer")]
    #[error("Pipeline is not a gst::Pipeline")]
    NotPipeline,
    #[cfg(feature = "gstreamer")]
    #[error("AppSink element not found")]
    AppSinkNotFound,
}

pub type Result<T> = std::result::Result<T, CameraError>;

/// One captured RGB8 image.
///
/// Cloning is cheap and never aliases mutable memory: the pixels are
/// frozen once the frame is built.
#[derive(Debug, Clone)]
pub struct Frame {
    index: u64,
    captured_at: Instant,
    pixels: Arc<RgbImage>,
}

impl Frame {
    pub fn new(index: u64, pixels: RgbImage) -> Self {
        Self {
            index,
            captured_at: Instant::now(),
            pixels: Arc::new(pixels),
        }
    }

    /// Monotonic sequence number assigned by the source.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Detached deep copy of the pixel data.
    pub fn to_rgb_image(&self) -> RgbImage {
        self.pixels.as_ref().clone()
    }

    /// True when both handles point at the same captured image.
    pub fn same_capture(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// A capture device.
///
/// Construction is the `Open` step: implementors expose a constructor
/// returning [`CameraError::DeviceUnavailable`] when the device cannot be
/// opened, so a value of this trait is always a usable handle.
pub trait FrameSource: Send + 'static {
    /// Grab one frame. `None` is a transient miss (dropped frame, pull
    /// timeout); callers back off and retry.
    fn read_frame(&mut self) -> Option<Frame>;

    /// Give the device back. Called once during shutdown; implementors
    /// also release on drop.
    fn release(&mut self) {}

    fn name(&self) -> &str;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Option<Frame> {
        (**self).read_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
