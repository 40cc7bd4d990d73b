// lipread-camera/src/gst_camera.rs
// ============================================================
// Live camera source built on a GStreamer pipeline:
//   libcamerasrc | v4l2src → videoconvert → videoflip (mirror)
//   → RGB caps → leaky queue(1) → appsink
// Frames are copied out of the mapped buffer row by row, since
// GStreamer pads RGB rows to 4-byte strides.
// ============================================================

use std::time::Duration;

use gst::prelude::*;
use image::RgbImage;
use log::{debug, info};

use crate::{CameraError, Frame, FrameSource, Result};

/// How long one `read_frame` waits on the appsink before reporting a miss.
const PULL_TIMEOUT: Duration = Duration::from_millis(100);
/// How long `open` waits for the device to reach *Playing*.
const START_TIMEOUT: Duration = Duration::from_secs(3);

/// Camera handle – owns the pipeline and *appsink*.
pub struct Camera {
    index: u32,
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    next_index: u64,
    released: bool,
}

impl Camera {
    /// Build a pipeline for camera `index` and bring it to *Playing*.
    ///
    /// Any failure to reach *Playing* (missing device, permissions, caps
    /// negotiation) is reported as [`CameraError::DeviceUnavailable`].
    ///
    /// ```no_run
    /// use lipread_camera::{Camera, FrameSource};
    /// let mut cam = Camera::open(0, 640, 480, 30).unwrap();
    /// if let Some(frame) = cam.read_frame() {
    ///     println!("{}×{}", frame.width(), frame.height());
    /// }
    /// ```
    pub fn open(index: u32, width: u32, height: u32, fps: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CameraError::InvalidGeometry { width, height });
        }
        gst::init().map_err(CameraError::GstInit)?;

        let src = if gst::ElementFactory::find("libcamerasrc").is_some() {
            // Pi (libcamera) stack
            "libcamerasrc".to_string()
        } else {
            // PC webcam
            format!("v4l2src device=/dev/video{index}")
        };

        let pipe_str = format!(
            "{src} ! videoconvert ! videoflip method=horizontal-flip ! videoscale \
            ! video/x-raw,format=RGB,width={w},height={h},framerate={f}/1 \
            ! queue leaky=2 max-size-buffers=1 \
            ! appsink name=sink max-buffers=1 drop=true sync=false",
            src = src, w = width, h = height, f = fps.max(1)
        );
        debug!("camera {index}: {pipe_str}");

        let pipeline = gst::parse::launch(&pipe_str)
            .map_err(CameraError::ParsePipeline)?
            .downcast::<gst::Pipeline>()
            .map_err(|_| CameraError::NotPipeline)?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or(CameraError::AppSinkNotFound)?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| CameraError::AppSinkNotFound)?;

        let unavailable = |reason: String| CameraError::DeviceUnavailable { index, reason };

        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(unavailable(e.to_string()));
        }
        let (result, _, _) = pipeline.state(gst::ClockTime::from_mseconds(
            START_TIMEOUT.as_millis() as u64,
        ));
        if let Err(e) = result {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(unavailable(e.to_string()));
        }

        info!("camera {index} opened at {width}x{height}@{fps}");
        Ok(Self {
            index,
            pipeline,
            appsink,
            next_index: 0,
            released: false,
        })
    }

    /// Convert a `gst::Sample` into an owned RGB image.
    fn sample_to_image(sample: &gst::Sample) -> Option<RgbImage> {
        let buffer = sample.buffer()?;
        let caps = sample.caps()?;
        let s = caps.structure(0)?;
        let width = s.get::<i32>("width").ok()? as usize;
        let height = s.get::<i32>("height").ok()? as usize;
        if width == 0 || height == 0 {
            return None;
        }

        let map = buffer.map_readable().ok()?;
        let data = map.as_slice();
        let row = width * 3;
        let stride = data.len() / height;
        if stride < row {
            return None;
        }

        let mut pixels = Vec::with_capacity(row * height);
        for y in 0..height {
            pixels.extend_from_slice(&data[y * stride..y * stride + row]);
        }
        RgbImage::from_raw(width as u32, height as u32, pixels)
    }
}

impl FrameSource for Camera {
    fn read_frame(&mut self) -> Option<Frame> {
        if self.released {
            return None;
        }
        let sample = self
            .appsink
            .try_pull_sample(gst::ClockTime::from_mseconds(PULL_TIMEOUT.as_millis() as u64))?;
        let image = Self::sample_to_image(&sample)?;
        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Some(frame)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            let _ = self.pipeline.set_state(gst::State::Null);
            info!("camera {} released", self.index);
        }
    }

    fn name(&self) -> &str {
        "GStreamerCamera"
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.release();
    }
}
