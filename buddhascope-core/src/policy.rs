//! Path-weighting and scoring policies for the particle step kernel.
//!
//! Every (path, score) combination is compiled into its own step-kernel
//! variant at startup. At dispatch time the variant is picked by
//! [`StepVariant::index`], never by name.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed-point scale of one weighted histogram sample.
pub const WEIGHT_SCALE: f32 = 8.0;

/// Largest amount a single sample adds to a cell.
pub const MAX_SAMPLE: f32 = 65535.0;

/// Histogram cells saturate here. One sample never exceeds
/// [`MAX_SAMPLE`], so a cell below the ceiling cannot wrap on its next add.
pub const COUNT_CEILING: u32 = u32::MAX - MAX_SAMPLE as u32;

/// How strongly interior path points are recorded relative to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathPolicy {
    #[default]
    Constant,
    Sqrt,
    Linear,
    Square,
}

/// Transform applied to a particle's score before it weights a histogram hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorePolicy {
    #[default]
    None,
    Sqrt,
    Square,
    Norm,
    SqNorm,
}

impl PathPolicy {
    pub const ALL: [PathPolicy; 4] = [
        PathPolicy::Constant,
        PathPolicy::Sqrt,
        PathPolicy::Linear,
        PathPolicy::Square,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PathPolicy::Constant => "constant",
            PathPolicy::Sqrt => "sqrt",
            PathPolicy::Linear => "linear",
            PathPolicy::Square => "square",
        }
    }

    /// Value of the `PATH_TYPE` override in the step kernel.
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Weight of the point at `position` (0-based) of a `len`-point segment.
    /// The endpoint always weighs 1.
    pub fn weight(&self, position: u32, len: u32) -> f32 {
        let f = (position + 1) as f32 / len.max(1) as f32;
        match self {
            PathPolicy::Constant => 1.0,
            PathPolicy::Sqrt => f.sqrt(),
            PathPolicy::Linear => f,
            PathPolicy::Square => f * f,
        }
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.code() as usize + 1) % Self::ALL.len()]
    }
}

impl ScorePolicy {
    pub const ALL: [ScorePolicy; 5] = [
        ScorePolicy::None,
        ScorePolicy::Sqrt,
        ScorePolicy::Square,
        ScorePolicy::Norm,
        ScorePolicy::SqNorm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScorePolicy::None => "none",
            ScorePolicy::Sqrt => "sqrt",
            ScorePolicy::Square => "square",
            ScorePolicy::Norm => "norm",
            ScorePolicy::SqNorm => "sqnorm",
        }
    }

    /// Value of the `SCORE_TYPE` override in the step kernel.
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Applies the policy to a raw score, the squared iterate magnitude at
    /// the threshold crossing. Norm variants divide by the escape bound so
    /// surviving particles score within [0, 1].
    pub fn apply(&self, score: f32, escape_bound: f32) -> f32 {
        match self {
            ScorePolicy::None => 1.0,
            ScorePolicy::Sqrt => score.sqrt(),
            ScorePolicy::Square => score * score,
            ScorePolicy::Norm => score / escape_bound,
            ScorePolicy::SqNorm => {
                let n = score / escape_bound;
                n * n
            }
        }
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.code() as usize + 1) % Self::ALL.len()]
    }
}

impl FromStr for PathPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownPathType(s.to_string()))
    }
}

impl FromStr for ScorePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownScoreType(s.to_string()))
    }
}

impl fmt::Display for PathPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ScorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One precompiled step kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StepVariant {
    pub path: PathPolicy,
    pub score: ScorePolicy,
}

impl StepVariant {
    pub const COUNT: usize = PathPolicy::ALL.len() * ScorePolicy::ALL.len();

    pub fn new(path: PathPolicy, score: ScorePolicy) -> Self {
        Self { path, score }
    }

    /// Dense index into the variant table.
    pub fn index(&self) -> usize {
        self.path.code() as usize * ScorePolicy::ALL.len() + self.score.code() as usize
    }

    pub fn all() -> impl Iterator<Item = StepVariant> {
        PathPolicy::ALL.into_iter().flat_map(|path| {
            ScorePolicy::ALL
                .into_iter()
                .map(move |score| StepVariant { path, score })
        })
    }

    /// Amount the step kernel adds to a cell for the point at `position`
    /// of a `len`-point segment whose endpoint scored `score`. Every
    /// recorded point adds at least 1.
    pub fn sample_amount(&self, position: u32, len: u32, score: f32, escape_bound: f32) -> u32 {
        let weight = self.path.weight(position, len) * self.score.apply(score, escape_bound);
        let scaled = (weight * WEIGHT_SCALE).clamp(0.0, MAX_SAMPLE).round_ties_even();
        (scaled as u32).max(1)
    }

    /// Kernel name used when declaring the variant.
    pub fn kernel_name(&self) -> String {
        format!("mandel_step_{}_{}", self.path, self.score)
    }
}
