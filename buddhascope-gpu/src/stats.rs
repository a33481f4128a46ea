//! Per-frame counters kept by the renderer.

use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Frames rendered since startup.
    pub frame: u64,
    pub last_frame_time: Duration,
    /// Particle steps since startup.
    pub total_particle_steps: u64,
    /// Particle steps since the last accumulation reset.
    pub accumulated_particle_steps: u64,
    pub resets: u64,
}

impl FrameStats {
    pub fn record_frame(&mut self, elapsed: Duration, particle_steps: u64) {
        self.frame += 1;
        self.last_frame_time = elapsed;
        self.total_particle_steps += particle_steps;
        self.accumulated_particle_steps += particle_steps;
    }

    pub fn record_reset(&mut self) {
        self.resets += 1;
        self.accumulated_particle_steps = 0;
    }

    /// Particle steps per second over the last frame.
    pub fn steps_per_second(&self, particle_steps: u64) -> f64 {
        let secs = self.last_frame_time.as_secs_f64();
        if secs > 0.0 {
            particle_steps as f64 / secs
        } else {
            0.0
        }
    }
}
