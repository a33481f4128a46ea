//! Host-side seeds for the per-particle device random generators.

use bytemuck::{Pod, Zeroable};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Initial state and stream selector for one particle's generator.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SeedPair {
    pub state: u64,
    pub sequence: u64,
}

/// Produces independent seed pairs, one per particle.
pub struct SeedSource {
    rng: StdRng,
}

impl SeedSource {
    /// Seeds from operating-system entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible seeds, for tests and `Settings::seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_pair(&mut self) -> SeedPair {
        SeedPair {
            state: self.rng.next_u64(),
            sequence: self.rng.next_u64(),
        }
    }

    /// Split into the `(states, sequences)` arrays the device consumes.
    pub fn generate(&mut self, particle_count: usize) -> (Vec<u64>, Vec<u64>) {
        (0..particle_count)
            .map(|_| {
                let pair = self.next_pair();
                (pair.state, pair.sequence)
            })
            .unzip()
    }
}
