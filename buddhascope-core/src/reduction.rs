//! Chunked two-phase maximum reduction over threshold histograms.
//!
//! Phase 1 splits each threshold's `width * height` cells into contiguous
//! chunks of `maximum_size` cells and writes one partial maximum per chunk.
//! Phase 2 folds the partials of each threshold into a single scalar. The
//! device kernels `find_max1` / `find_max2` implement exactly this layout;
//! the host functions here are the reference they are checked against.

use crate::ConfigError;

/// Geometry of the chunked reduction for one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    threshold_count: u32,
    cells_per_threshold: u32,
    chunk_size: u32,
}

impl ChunkLayout {
    /// Validates that the raster divides evenly into chunks.
    pub fn new(
        threshold_count: u32,
        width: u32,
        height: u32,
        maximum_size: u32,
    ) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyRaster { width, height });
        }
        if maximum_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        let cells = width as u64 * height as u64;
        let remainder = cells % maximum_size as u64;
        if remainder != 0 {
            return Err(ConfigError::ChunkSize {
                cells,
                maximum_size,
                remainder,
            });
        }
        // Device kernels index the histograms and the RGB image with u32.
        let planes = u64::from(threshold_count.max(3));
        let cells_per_threshold = match cells.checked_mul(planes) {
            Some(total) if total <= u64::from(u32::MAX) => cells as u32,
            _ => {
                return Err(ConfigError::RasterTooLarge {
                    cells,
                    thresholds: threshold_count as usize,
                })
            }
        };
        Ok(Self {
            threshold_count,
            cells_per_threshold,
            chunk_size: maximum_size,
        })
    }

    pub fn threshold_count(&self) -> u32 {
        self.threshold_count
    }

    pub fn cells_per_threshold(&self) -> u32 {
        self.cells_per_threshold
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Number of chunks (partial maxima) per threshold.
    pub fn chunks_per_threshold(&self) -> u32 {
        self.cells_per_threshold / self.chunk_size
    }

    /// Total number of partial maxima, i.e. the phase-1 work size.
    pub fn partial_count(&self) -> u32 {
        self.threshold_count * self.chunks_per_threshold()
    }

    /// Cells in one threshold plane, i.e. `width * height`.
    pub fn cells(&self) -> usize {
        self.cells_per_threshold as usize
    }

    /// Total histogram cells across all thresholds.
    pub fn total_cells(&self) -> usize {
        self.threshold_count as usize * self.cells_per_threshold as usize
    }

    /// Phase 1: one maximum per chunk, thresholds laid out back to back.
    pub fn find_max_chunks(&self, counts: &[u32]) -> Vec<u32> {
        debug_assert_eq!(counts.len(), self.total_cells());
        counts
            .chunks_exact(self.chunk_size as usize)
            .map(|chunk| chunk.iter().copied().max().unwrap_or(0))
            .collect()
    }

    /// Phase 2: fold each threshold's partials to a single maximum.
    pub fn reduce_partials(&self, partials: &[u32]) -> Vec<u32> {
        debug_assert_eq!(partials.len(), self.partial_count() as usize);
        partials
            .chunks_exact(self.chunks_per_threshold() as usize)
            .map(|chunk| chunk.iter().copied().max().unwrap_or(0))
            .collect()
    }

    /// Both phases in sequence.
    pub fn find_max(&self, counts: &[u32]) -> MaximumSet {
        MaximumSet::from(self.reduce_partials(&self.find_max_chunks(counts)))
    }
}

/// Per-threshold maxima for the current frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaximumSet(Vec<u32>);

impl MaximumSet {
    pub fn zeroed(threshold_count: usize) -> Self {
        Self(vec![0; threshold_count])
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.0
    }

    pub fn get(&self, threshold: usize) -> u32 {
        self.0.get(threshold).copied().unwrap_or(0)
    }

    /// A frame with every maximum at zero has nothing to show.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&m| m == 0)
    }

    /// `value / maximum` for one threshold, 0.0 when the maximum is zero.
    pub fn normalize(&self, threshold: usize, value: u32) -> f32 {
        match self.get(threshold) {
            0 => 0.0,
            max => (value as f32 / max as f32).min(1.0),
        }
    }
}

impl From<Vec<u32>> for MaximumSet {
    fn from(values: Vec<u32>) -> Self {
        Self(values)
    }
}
