//! Error types shared by every crate in the workspace.

use thiserror::Error;

/// Startup configuration problems. Always reported before any device work.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("raster size must be non-zero, got {width}x{height}")]
    EmptyRaster { width: u32, height: u32 },

    #[error("maximum_size must be non-zero")]
    ZeroChunkSize,

    #[error("image size ({cells}) % sampling size ({maximum_size}) != 0 ({remainder})")]
    ChunkSize {
        cells: u64,
        maximum_size: u32,
        remainder: u64,
    },

    #[error("at least one threshold is required")]
    NoThresholds,

    #[error("at most {max} thresholds are supported, got {count}")]
    TooManyThresholds { count: usize, max: usize },

    #[error("thresholds must be non-zero and strictly ascending, got {0:?}")]
    UnorderedThresholds(Vec<u32>),

    #[error("particle_count must be non-zero")]
    NoParticles,

    #[error("frame_steps must be non-zero")]
    NoFrameSteps,

    #[error("alpha must lie strictly between 0 and 1, got {0}")]
    Alpha(f32),

    #[error("scale must be positive and finite, got {0}")]
    Scale(f64),

    #[error("center must be finite, got ({x}, {y})")]
    Center { x: f64, y: f64 },

    #[error("theta must be finite, got {0}")]
    Theta(f64),

    #[error("zoom factor must be positive and finite, got {0}")]
    ZoomFactor(f64),

    #[error("pan offset must be finite, got ({x}, {y})")]
    PanDelta { x: f64, y: f64 },

    #[error("raster of {cells} cells over {thresholds} thresholds exceeds u32 indexing")]
    RasterTooLarge { cells: u64, thresholds: usize },

    #[error("escape_bound must be positive, got {0}")]
    EscapeBound(f32),

    #[error("unknown path type {0:?}")]
    UnknownPathType(String),

    #[error("unknown score type {0:?}")]
    UnknownScoreType(String),

    #[error("failed to read settings: {0}")]
    Io(String),

    #[error("failed to parse settings: {0}")]
    Parse(String),
}

/// Invariant violations. These indicate a bug rather than bad input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConsistencyError {
    #[error("cached rotation out of sync: theta={theta}, sin={sin_theta}, cos={cos_theta}")]
    RotationDesync {
        theta: f64,
        sin_theta: f64,
        cos_theta: f64,
    },

    #[error(
        "degenerate view: scale=({scale_x}, {scale_y}), center=({center_x}, {center_y}), \
         theta={theta}"
    )]
    DegenerateView {
        scale_x: f64,
        scale_y: f64,
        center_x: f64,
        center_y: f64,
        theta: f64,
    },

    #[error("view generation {current} not bound to kernels (bound generation {bound})")]
    StaleView { bound: u64, current: u64 },

    #[error("histogram holds {actual} cells, expected {expected}")]
    HistogramSize { expected: usize, actual: usize },
}
