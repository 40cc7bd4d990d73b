//! Bits shared by the `lipread` and `preview` binaries.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::Receiver;
use lipread_camera::{Frame, FrameSource, SyntheticSource};
use lipread_model::{
    FaceMesh, Landmark, LipReader, LipReadingPipeline, LipTrack, MeshLipDetector, ModelError,
    OllamaRefiner, PassthroughRefiner, Reading, Refiner, DEFAULT_OLLAMA_MODEL,
};
use lipread_pipeline::{Pipeline, PipelineConfig, Processed, ShutdownReport};
use log::info;
use rand::Rng;

#[derive(Parser, Debug)]
#[command(about = "Live lip-reading pipeline")]
pub struct Args {
    /// JSON pipeline config; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub window_size: Option<usize>,

    /// Sampling period in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    #[arg(long)]
    pub fps: Option<f64>,

    /// Camera index (/dev/video<N>)
    #[arg(long, default_value_t = 0)]
    pub camera: u32,

    #[arg(long, default_value_t = 640)]
    pub width: u32,

    #[arg(long, default_value_t = 480)]
    pub height: u32,

    /// Use a generated test pattern instead of a camera
    #[arg(long)]
    pub synthetic: bool,

    /// Extra time the simulated model spends per window
    #[arg(long, default_value_t = 3000)]
    pub simulated_latency_ms: u64,

    /// Probability in [0, 1] that the simulated model fails a window
    #[arg(long, default_value_t = 0.0)]
    pub failure_rate: f64,

    /// Post-process readings with a local ollama model
    #[arg(long)]
    pub refine: bool,

    #[arg(long, default_value = DEFAULT_OLLAMA_MODEL)]
    pub ollama_model: String,
}

impl Args {
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(n) = self.window_size {
            config.window_size = n;
        }
        if let Some(ms) = self.interval_ms {
            config.processing_interval = Duration::from_millis(ms);
        }
        if let Some(fps) = self.fps {
            config.target_fps = Some(fps);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn open_source(&self) -> lipread_camera::Result<Box<dyn FrameSource>> {
        if self.synthetic {
            return Ok(Box::new(SyntheticSource::open(self.width, self.height)?));
        }
        self.open_camera()
    }

    #[cfg(feature = "gstreamer")]
    fn open_camera(&self) -> lipread_camera::Result<Box<dyn FrameSource>> {
        let fps = self.fps.unwrap_or(30.0).round().max(1.0) as u32;
        let camera = lipread_camera::Camera::open(self.camera, self.width, self.height, fps)?;
        Ok(Box::new(camera))
    }

    #[cfg(not(feature = "gstreamer"))]
    fn open_camera(&self) -> lipread_camera::Result<Box<dyn FrameSource>> {
        Err(lipread_camera::CameraError::DeviceUnavailable {
            index: self.camera,
            reason: "built without the `gstreamer` feature; pass --synthetic".into(),
        })
    }

    pub fn refiner(&self) -> Result<Box<dyn Refiner>> {
        if self.refine {
            let ollama = OllamaRefiner::new(&self.ollama_model)
                .context("starting the refiner runtime")?;
            info!(
                "refining readings with ollama model {} (timeout {:?})",
                self.ollama_model,
                ollama.timeout()
            );
            Ok(Box::new(ollama))
        } else {
            Ok(Box::new(PassthroughRefiner))
        }
    }
}

/// Stand-in face mesh: one face, mouth in the middle of the frame.
pub struct CentredFace;

impl FaceMesh for CentredFace {
    fn faces(&mut self, _frame: &Frame) -> lipread_model::Result<Vec<Vec<Landmark>>> {
        let mut mesh = vec![Landmark::new(0.5, 0.4); 468];
        for (k, p) in mesh[61..=90].iter_mut().enumerate() {
            let t = k as f32 / 30.0 * std::f32::consts::TAU;
            *p = Landmark::new(0.5 + 0.08 * t.cos(), 0.7 + 0.03 * t.sin());
        }
        Ok(vec![mesh])
    }
}

/// Stand-in lip-reading model: takes its time and sometimes fails.
pub struct SimulatedReader {
    latency: Duration,
    failure_rate: f64,
}

impl SimulatedReader {
    pub fn new(latency: Duration, failure_rate: f64) -> Self {
        Self {
            latency,
            failure_rate: if failure_rate.is_nan() { 0.0 } else { failure_rate.clamp(0.0, 1.0) },
        }
    }
}

impl LipReader for SimulatedReader {
    fn predict(&mut self, tracks: &[LipTrack]) -> lipread_model::Result<String> {
        thread::sleep(self.latency);
        if rand::thread_rng().gen_bool(self.failure_rate) {
            return Err(ModelError::Prediction("simulated model failure".into()));
        }
        Ok(format!("Hello World! ({} frames with lips)", tracks.len()))
    }
}

pub type DemoProcessor =
    LipReadingPipeline<MeshLipDetector<CentredFace>, SimulatedReader, Box<dyn Refiner>>;

pub fn start(args: &Args) -> Result<Pipeline<Box<dyn FrameSource>, Reading>> {
    let config = args.pipeline_config()?;
    let processor: DemoProcessor = LipReadingPipeline::new(
        MeshLipDetector::new(CentredFace),
        SimulatedReader::new(
            Duration::from_millis(args.simulated_latency_ms),
            args.failure_rate,
        ),
        args.refiner()?,
    );
    let pipeline = Pipeline::open(|| args.open_source(), processor, config)
        .context("starting pipeline")?;
    Ok(pipeline)
}

/// Print readings that arrived since the last call.
pub fn drain_readings(results: &Receiver<Processed<Reading>>) {
    for r in results.try_iter() {
        println!("Prediction #{} ({:.1?}): {}", r.sequence, r.latency, r.output);
    }
}

pub fn print_report(report: &ShutdownReport) {
    let s = &report.stats;
    info!(
        "stopped in {:.1?}: capture {:?}, sampler {:?}, worker {:?}, device released: {}",
        report.elapsed, report.capture, report.sampler, report.worker, report.source_released
    );
    info!(
        "frames {} (misses {}), windows {} processed / {} accepted / {} dropped / {} failed",
        s.frames_captured,
        s.read_failures,
        s.windows_processed,
        s.windows_sampled,
        s.windows_dropped,
        s.processing_failures
    );
}
