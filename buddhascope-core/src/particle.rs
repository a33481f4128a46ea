//! Host mirror of the device particle record.

use crate::Point;
use bytemuck::{Pod, Zeroable};

/// One particle. The host struct is 4-byte aligned; its 40-byte layout
/// matches `struct Particle` in the step kernel, where the `vec2<f32>`
/// fields make the device struct 8-byte aligned.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// Seed point `c` of the recurrence.
    pub position: [f32; 2],
    /// Current iterate `z`.
    pub offset: [f32; 2],
    /// Iterate recorded on the previous step, for overlay drawing.
    pub previous_offset: [f32; 2],
    pub iteration_count: u32,
    /// Iteration count reached before the last reseed.
    pub best_iteration_count: u32,
    pub score: f32,
    pub previous_score: f32,
}

impl Particle {
    pub fn position(&self) -> Point {
        Point::new(self.position[0] as f64, self.position[1] as f64)
    }

    pub fn offset(&self) -> Point {
        Point::new(self.offset[0] as f64, self.offset[1] as f64)
    }

    pub fn previous_offset(&self) -> Point {
        Point::new(self.previous_offset[0] as f64, self.previous_offset[1] as f64)
    }
}
