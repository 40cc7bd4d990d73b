//! Live preview window with lip-reading running behind it.
//! Press `q` or ESC in the window to quit.
//!
//! Usage: cargo run -p demos --bin preview --features preview,gstreamer

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::Receiver;
use lipread_camera::Frame;
use lipread_model::Reading;
use lipread_pipeline::{render_until_quit, Processed, Viewer};
use log::warn;
use opencv::{core, highgui, prelude::*};

mod common;

const WINDOW_NAME: &str = "lipread";
const KEY_ESC: i32 = 27;

struct Preview {
    results: Receiver<Processed<Reading>>,
}

/// RGB8 frame → BGR Mat for highgui.
fn frame_to_mat(frame: &Frame) -> Result<Mat> {
    let rgb = frame.pixels();
    let mut mat = Mat::new_rows_cols_with_default(
        rgb.height() as i32,
        rgb.width() as i32,
        core::CV_8UC3,
        core::Scalar::all(0.0),
    )?;
    let bgr = mat.data_bytes_mut()?;
    for (dst, px) in bgr.chunks_exact_mut(3).zip(rgb.pixels()) {
        dst.copy_from_slice(&[px[2], px[1], px[0]]);
    }
    Ok(mat)
}

impl Viewer for Preview {
    fn render_latest(&mut self, frame: &Frame) -> anyhow::Result<()> {
        highgui::imshow(WINDOW_NAME, &frame_to_mat(frame)?)?;
        Ok(())
    }

    fn poll_quit_requested(&mut self) -> bool {
        common::drain_readings(&self.results);
        match highgui::wait_key(1) {
            Ok(key) => key == KEY_ESC || key == 'q' as i32,
            Err(e) => {
                warn!("highgui: {e}");
                true
            }
        }
    }

    fn teardown(&mut self) {
        if let Err(e) = highgui::destroy_all_windows() {
            warn!("closing preview window: {e}");
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = common::Args::parse();

    let pipeline = common::start(&args)?;
    highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE)?;

    let fps = args.fps.unwrap_or(30.0).max(1.0);
    let mut viewer = Preview {
        results: pipeline.results().clone(),
    };
    let rendered = render_until_quit(
        &mut viewer,
        pipeline.buffer(),
        Duration::from_secs_f64(1.0 / fps),
    );

    let report = pipeline.shutdown_with(|| viewer.teardown());
    common::print_report(&report);
    log::info!("{} frames shown", rendered?);
    Ok(())
}
