//! Composition of detector, reader and refiner into one window processor.

use std::fmt;

use lipread_pipeline::{Processor, Window};
use log::debug;

use crate::{LipDetector, LipReader, LipTrack, Refiner};

/// What a window turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    /// No frame of the window contained a face; the model was not run.
    NoFace,
    Text { raw: String, refined: String },
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::NoFace => write!(f, "<no face>"),
            Reading::Text { refined, .. } => write!(f, "{refined}"),
        }
    }
}

pub struct LipReadingPipeline<D, R, F> {
    detector: D,
    reader: R,
    refiner: F,
}

impl<D, R, F> LipReadingPipeline<D, R, F>
where
    D: LipDetector,
    R: LipReader,
    F: Refiner,
{
    pub fn new(detector: D, reader: R, refiner: F) -> Self {
        Self {
            detector,
            reader,
            refiner,
        }
    }

    /// Lip tracks of the frames that contain a face, oldest first.
    pub fn tracks(&mut self, window: &Window) -> crate::Result<Vec<LipTrack>> {
        let mut tracks = Vec::with_capacity(window.len());
        for frame in window.frames() {
            if let Some(points) = self.detector.extract_lips(frame)? {
                tracks.push(LipTrack {
                    frame_index: frame.index(),
                    points,
                });
            }
        }
        Ok(tracks)
    }
}

impl<D, R, F> Processor for LipReadingPipeline<D, R, F>
where
    D: LipDetector + 'static,
    R: LipReader + 'static,
    F: Refiner + 'static,
{
    type Output = Reading;

    fn process(&mut self, window: &Window) -> anyhow::Result<Reading> {
        let tracks = self.tracks(window)?;
        if tracks.is_empty() {
            debug!("window #{}: no face", window.sequence());
            return Ok(Reading::NoFace);
        }
        debug!(
            "window #{}: lips in {}/{} frames",
            window.sequence(),
            tracks.len(),
            window.len()
        );
        let raw = self.reader.predict(&tracks)?;
        let refined = self.refiner.refine(&raw)?;
        Ok(Reading::Text { raw, refined })
    }
}
