//! GPU error types.

use buddhascope_core::{ConfigError, ConsistencyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("No GPU adapter found")]
    NoAdapter,

    #[error("Failed to create device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("GPU unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to allocate buffer [{name}] ({size} bytes): {message}")]
    Allocation {
        name: String,
        size: u64,
        message: String,
    },

    #[error("Failed to build program:\n{log}")]
    ProgramBuild { log: String },

    #[error("Failed to create kernel [{name}] from entry point [{entry_point}]: {message}")]
    KernelCreation {
        name: String,
        entry_point: String,
        message: String,
    },

    #[error("Failed on {operation} [{name}]: {message}")]
    Backend {
        operation: &'static str,
        name: String,
        message: String,
    },

    #[error("Unknown buffer [{0}]")]
    UnknownBuffer(String),

    #[error("Unknown kernel [{0}]")]
    UnknownKernel(String),

    #[error("Name [{0}] declared twice")]
    DuplicateName(String),

    #[error("Kernel [{kernel}] has {slots} argument slots, got index {index}")]
    ArgumentIndex {
        kernel: String,
        index: u32,
        slots: usize,
    },

    #[error("Kernel [{kernel}] argument {index} expects {expected}")]
    ArgumentKind {
        kernel: String,
        index: u32,
        expected: &'static str,
    },

    #[error("Kernel [{kernel}] argument {index} expects {expected} bytes, got {actual}")]
    ArgumentSize {
        kernel: String,
        index: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Kernel [{kernel}] dispatched with unbound arguments {unbound:?}")]
    UnboundArguments { kernel: String, unbound: Vec<u32> },

    #[error(
        "Kernel [{kernel}] needs {workgroups} workgroups along one axis, device allows {limit}"
    )]
    WorkSize {
        kernel: String,
        workgroups: u32,
        limit: u32,
    },

    #[error("Buffer [{name}] holds {expected} bytes, host data has {actual}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

impl GpuError {
    /// True for mistakes in the declared buffers, kernels or bindings, as
    /// opposed to failures reported by the device.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GpuError::UnknownBuffer(_)
                | GpuError::UnknownKernel(_)
                | GpuError::DuplicateName(_)
                | GpuError::ArgumentIndex { .. }
                | GpuError::ArgumentKind { .. }
                | GpuError::ArgumentSize { .. }
                | GpuError::UnboundArguments { .. }
                | GpuError::WorkSize { .. }
                | GpuError::SizeMismatch { .. }
                | GpuError::Config(_)
        )
    }
}
