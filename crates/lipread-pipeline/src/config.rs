//! Pipeline configuration.
//!
//! Durations are stored as [`Duration`] and (de)serialised as whole
//! milliseconds under `*_ms` keys, so a JSON config reads naturally.
//! Sub-millisecond durations are rejected by [`PipelineConfig::validate`]
//! since they could not be written back out:
//!
//! ```json
//! { "window_size": 32, "processing_interval_ms": 1500, "target_fps": 25.0 }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{PipelineError, Result};

/// Frames per window, and therefore the history capacity.
pub const DEFAULT_WINDOW_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Window length and history capacity.
    pub window_size: usize,
    /// Period between sampling attempts.
    #[serde(rename = "processing_interval_ms", with = "duration_ms")]
    pub processing_interval: Duration,
    /// Capture pacing; `None` reads as fast as the device delivers.
    pub target_fps: Option<f64>,
    /// How long the sampler waits for a busy slot before dropping.
    #[serde(rename = "offer_timeout_ms", with = "duration_ms")]
    pub offer_timeout: Duration,
    /// Bounded join per stage during shutdown.
    #[serde(rename = "join_timeout_ms", with = "duration_ms")]
    pub join_timeout: Duration,
    /// Sleep after the device returned no frame.
    #[serde(rename = "read_backoff_ms", with = "duration_ms")]
    pub read_backoff: Duration,
    /// Worker's bounded wait on the slot between lifecycle checks.
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,
    /// Sampler's nap between tick checks.
    #[serde(rename = "idle_sleep_ms", with = "duration_ms")]
    pub idle_sleep: Duration,
    /// Consecutive drops before a warning is logged.
    pub drop_warn_after: u32,
    /// Depth of the results channel handed to the caller.
    pub results_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            processing_interval: Duration::from_secs(2),
            target_fps: Some(30.0),
            offer_timeout: Duration::from_millis(50),
            join_timeout: Duration::from_secs(3),
            read_backoff: Duration::from_millis(5),
            poll_interval: Duration::from_millis(50),
            idle_sleep: Duration::from_millis(10),
            drop_warn_after: 10,
            results_capacity: 16,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Capture period implied by `target_fps`. `None` also when the rate
    /// has no representable period; `validate` rejects such rates.
    pub fn frame_period(&self) -> Option<Duration> {
        self.target_fps
            .and_then(|fps| Duration::try_from_secs_f64(1.0 / fps).ok())
    }

    fn durations(&self) -> [(&'static str, Duration); 6] {
        [
            ("processing_interval", self.processing_interval),
            ("offer_timeout", self.offer_timeout),
            ("join_timeout", self.join_timeout),
            ("read_backoff", self.read_backoff),
            ("poll_interval", self.poll_interval),
            ("idle_sleep", self.idle_sleep),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.window_size == 0 {
            return invalid("window_size must be positive".into());
        }
        if self.processing_interval.is_zero() {
            return invalid("processing_interval must be positive".into());
        }
        if let Some(fps) = self.target_fps {
            if !fps.is_finite() || fps <= 0.0 {
                return invalid(format!("target_fps must be a positive rate, got {fps}"));
            }
            if Duration::try_from_secs_f64(1.0 / fps).is_err() {
                return invalid(format!("target_fps {fps} is too low to pace capture"));
            }
        }
        for (name, d) in self.durations() {
            if d.subsec_nanos() % 1_000_000 != 0 {
                return invalid(format!("{name} ({d:?}) must be a whole number of milliseconds"));
            }
        }
        if self.offer_timeout >= self.processing_interval {
            return invalid(format!(
                "offer_timeout ({:?}) must be shorter than processing_interval ({:?})",
                self.offer_timeout, self.processing_interval
            ));
        }
        if let Some(period) = self.frame_period() {
            if self.read_backoff >= period {
                return invalid(format!(
                    "read_backoff ({:?}) must be shorter than the frame period ({period:?})",
                    self.read_backoff
                ));
            }
        }
        if self.poll_interval.is_zero() || self.idle_sleep.is_zero() {
            return invalid("poll_interval and idle_sleep must be positive".into());
        }
        if self.results_capacity == 0 {
            return invalid("results_capacity must be positive".into());
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
