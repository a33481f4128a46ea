pub mod config;
pub mod diff;
pub mod error;
pub mod particle;
pub mod points;
pub mod policy;
pub mod reduction;
pub mod seed;
pub mod snapshot;
pub mod thresholds;
pub mod view;
pub mod window;

pub use config::Settings;
pub use error::{ConfigError, ConsistencyError};
pub use particle::Particle;
pub use points::Point;
pub use policy::{PathPolicy, ScorePolicy, StepVariant, COUNT_CEILING};
pub use reduction::{ChunkLayout, MaximumSet};
pub use seed::{SeedPair, SeedSource};
pub use snapshot::Snapshot;
pub use thresholds::{ThresholdSet, MAX_THRESHOLDS};
pub use view::{check_view, fractal_to_pixel, pixel_to_fractal, rotate, ViewHistory, ViewState};
pub use window::WindowSettings;
