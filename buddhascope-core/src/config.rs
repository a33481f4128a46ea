//! Runtime settings and their startup validation.
//!
//! Settings are plain serde data loaded from JSON. [`Settings::validate`]
//! must succeed before any device work starts.

use crate::view::check_view;
use crate::{ChunkLayout, ConfigError, PathPolicy, Point, ScorePolicy, ThresholdSet, ViewState};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub particle_count: u32,
    pub thresholds: ThresholdSet,
    /// Raster size the histograms are computed at.
    pub width: u32,
    pub height: u32,
    /// Chunk size of the phase-1 maximum reduction.
    pub maximum_size: u32,
    /// Particle steps dispatched per displayed frame.
    pub frame_steps: u32,
    /// Weight of the newest sample in the diff moving average.
    pub alpha: f32,
    pub scale: f64,
    pub center_x: f64,
    pub center_y: f64,
    pub theta: f64,
    pub path_type: PathPolicy,
    pub score_type: ScorePolicy,
    /// Squared magnitude past which an iterate counts as escaped.
    pub escape_bound: f32,
    /// Request a hardware adapter; false selects the software fallback.
    pub use_gpu: bool,
    pub verbose: bool,
    /// Fixed seed for the particle generators. Entropy when absent.
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            particle_count: 2048,
            thresholds: ThresholdSet::default(),
            width: 1080,
            height: 720,
            maximum_size: 32,
            frame_steps: 256,
            alpha: 0.05,
            scale: 1.3,
            center_x: -0.5,
            center_y: 0.0,
            theta: 0.0,
            path_type: PathPolicy::default(),
            score_type: ScorePolicy::default(),
            escape_bound: 16.0,
            use_gpu: true,
            verbose: false,
            seed: None,
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn threshold_count(&self) -> u32 {
        self.thresholds.count() as u32
    }

    /// Runs every startup check and returns the reduction layout they imply.
    pub fn validate(&self) -> Result<ChunkLayout, ConfigError> {
        let layout = ChunkLayout::new(
            self.threshold_count(),
            self.width,
            self.height,
            self.maximum_size,
        )?;
        if self.particle_count == 0 {
            return Err(ConfigError::NoParticles);
        }
        if self.frame_steps == 0 {
            return Err(ConfigError::NoFrameSteps);
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::Alpha(self.alpha));
        }
        check_view(
            self.scale,
            Point::new(self.center_x, self.center_y),
            self.theta,
        )?;
        if !(self.escape_bound > 0.0) {
            return Err(ConfigError::EscapeBound(self.escape_bound));
        }
        Ok(layout)
    }

    pub fn initial_view(&self) -> ViewState {
        ViewState::new(
            self.scale,
            Point::new(self.center_x, self.center_y),
            self.theta,
            self.width,
            self.height,
        )
    }

    /// Human-readable dump, logged once at startup.
    pub fn summary(&self) -> String {
        format!(
            "particles={} thresholds={:?} raster={}x{} maximum_size={} frame_steps={} \
             alpha={} view=({}, {}, {}, theta={}) path={} score={}",
            self.particle_count,
            self.thresholds.as_slice(),
            self.width,
            self.height,
            self.maximum_size,
            self.frame_steps,
            self.alpha,
            self.scale,
            self.center_x,
            self.center_y,
            self.theta,
            self.path_type,
            self.score_type,
        )
    }
}
