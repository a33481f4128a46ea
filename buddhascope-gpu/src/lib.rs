//! GPU Buddhabrot accumulation using wgpu compute.

mod buffers;
mod device;
mod error;
mod kernel;
mod pipeline;
mod program;
mod renderer;
mod stats;
#[cfg(test)]
mod tests;

pub use buffers::{
    buffer_specs, names, BufferSpec, DiffParams, RasterParams, StepParams, ViewUniform,
};
pub use device::{GpuAvailability, GpuContext};
pub use error::GpuError;
pub use kernel::{ArgSlot, BufferId, KernelArg, KernelId, KernelSpec, WorkSize};
pub use pipeline::ComputePipeline;
pub use program::{kernel_specs, kernels, SHADER_SOURCE, STEP_VIEW_SLOT};
pub use renderer::{BuddhabrotRenderer, Command};
pub use stats::FrameStats;
