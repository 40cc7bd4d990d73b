//! Process-wide lifecycle flag polled by every loop.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Pipeline phase. Only ever moves forward:
/// `Running → Stopping → Draining → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PipelineState {
    Running = 0,
    Stopping = 1,
    Draining = 2,
    Stopped = 3,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Running,
            1 => Self::Stopping,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Draining => "DRAINING",
            Self::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Shared handle on the current [`PipelineState`].
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: Arc<AtomicU8>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PipelineState::Running as u8)),
        }
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }

    /// Move to `next` if it is later than the current state.
    ///
    /// Returns `true` when this call performed the transition; backward or
    /// repeated moves are ignored.
    pub fn advance(&self, next: PipelineState) -> bool {
        let prev = self.state.fetch_max(next as u8, Ordering::AcqRel);
        prev < next as u8
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
