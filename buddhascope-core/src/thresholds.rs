//! Escape-iteration thresholds that split the accumulation into buckets.

use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Upper bound on the number of threshold buckets.
pub const MAX_THRESHOLDS: usize = 8;

/// Strictly ascending, non-empty list of escape-iteration thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct ThresholdSet(Vec<u32>);

impl ThresholdSet {
    pub fn new(values: Vec<u32>) -> Result<Self, ConfigError> {
        if values.is_empty() {
            return Err(ConfigError::NoThresholds);
        }
        if values.len() > MAX_THRESHOLDS {
            return Err(ConfigError::TooManyThresholds {
                count: values.len(),
                max: MAX_THRESHOLDS,
            });
        }
        let ascending = values[0] > 0 && values.windows(2).all(|w| w[0] < w[1]);
        if !ascending {
            return Err(ConfigError::UnorderedThresholds(values));
        }
        Ok(Self(values))
    }

    pub fn count(&self) -> usize {
        self.0.len()
    }

    /// The largest threshold; particles iterating past it are reseeded.
    pub fn max(&self) -> u32 {
        // Non-empty by construction
        self.0[self.0.len() - 1]
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Index of the bucket whose threshold equals `iteration`, if any.
    pub fn bucket_of(&self, iteration: u32) -> Option<usize> {
        self.0.binary_search(&iteration).ok()
    }

    /// Iteration at which the previous bucket was crossed (0 for the first).
    pub fn previous(&self, bucket: usize) -> u32 {
        if bucket == 0 {
            0
        } else {
            self.0[bucket - 1]
        }
    }
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self(vec![250, 500, 1000, 2000, 4000])
    }
}

impl TryFrom<Vec<u32>> for ThresholdSet {
    type Error = ConfigError;

    fn try_from(values: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<ThresholdSet> for Vec<u32> {
    fn from(set: ThresholdSet) -> Self {
        set.0
    }
}
