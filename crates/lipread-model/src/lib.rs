// lipread-model/src/lib.rs
// ============================================================
// lipread-model  –  the slow stage behind the hand-off slot
// ------------------------------------------------------------
// Window → LipDetector (per frame) → LipReader → Refiner
//        → Reading::{NoFace, Text { raw, refined }}
// ------------------------------------------------------------
// Public API
//   * LipReadingPipeline::new(detector, reader, refiner)
//       implements lipread_pipeline::Processor
//   * OllamaRefiner::new(model)   – `ollama run <model>`
//   * PassthroughRefiner          – no post-processing
// ------------------------------------------------------------
//   Build notes
//     * Face mesh and model weights are supplied by the caller
//       through the traits below; nothing here links a runtime.
// ============================================================

//! lipread – model layer
//!
//! Everything here runs on the pipeline's worker thread, one window at a
//! time, and is allowed to take seconds. The traits are the seams where a
//! real face-mesh detector and lip-reading network plug in.

use thiserror::Error;

pub mod landmarks;
pub mod processor;
pub mod reader;
pub mod refine;

pub use landmarks::{lip_points, FaceMesh, Landmark, LipDetector, MeshLipDetector, LIP_LANDMARKS};
pub use processor::{LipReadingPipeline, Reading};
pub use reader::{ConstantReader, LipReader, LipTrack};
pub use refine::{OllamaRefiner, PassthroughRefiner, Refiner, DEFAULT_OLLAMA_MODEL, LIPREAD_PROMPT};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Lip detection failed: {0}")]
    Detection(String),
    #[error("Lip reading failed: {0}")]
    Prediction(String),
    #[error("Failed to start refiner `{program}`: {source}")]
    RefinerSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Refiner I/O error: {0}")]
    RefinerIo(#[from] std::io::Error),
    #[error("Refiner exited with {status}: {stderr}")]
    RefinerFailed { status: String, stderr: String },
    #[error("Refiner did not answer within {0:?}")]
    RefinerTimeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, ModelError>;
