use crate::Result;

/// Lip outline of one frame of a window.
#[derive(Debug, Clone, PartialEq)]
pub struct LipTrack {
    pub frame_index: u64,
    pub points: Vec<(i32, i32)>,
}

/// A lip-reading model: ordered lip tracks in, raw transcript out.
pub trait LipReader: Send {
    fn predict(&mut self, tracks: &[LipTrack]) -> Result<String>;
}

/// Answers every window with the same text. Stands in for a trained
/// model when running the pipeline end to end.
#[derive(Debug, Clone)]
pub struct ConstantReader {
    text: String,
}

impl ConstantReader {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Default for ConstantReader {
    fn default() -> Self {
        Self::new("Hello World!")
    }
}

impl LipReader for ConstantReader {
    fn predict(&mut self, _tracks: &[LipTrack]) -> Result<String> {
        Ok(self.text.clone())
    }
}
