//! Headless lip-reading pipeline. Prints readings as they arrive and
//! shuts down cleanly on Ctrl-C.
//!
//! Usage: cargo run -p demos --bin lipread -- --synthetic --interval-ms 1500

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

mod common;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = common::Args::parse();

    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit = Arc::clone(&quit);
        ctrlc::set_handler(move || quit.store(true, Ordering::SeqCst))
            .context("installing Ctrl-C handler")?;
    }

    let pipeline = common::start(&args)?;
    info!("running; press Ctrl-C to stop");

    while !quit.load(Ordering::SeqCst) {
        common::drain_readings(pipeline.results());
        thread::sleep(Duration::from_millis(100));
    }

    info!("stopping");
    let report = pipeline.shutdown();
    common::print_report(&report);
    if !report.is_clean() {
        anyhow::bail!("pipeline did not stop cleanly");
    }
    Ok(())
}
