//! Kernel declarations and argument bookkeeping.
//!
//! A kernel is one entry point of the shared program, compiled with its own
//! argument layout. Argument slot `i` is bind group 0, binding `i`. Buffer
//! slots are read-write storage buffers resolved by name at dispatch time.
//! Value slots are small uniform blocks owned by the kernel.

use crate::error::GpuError;
use bytemuck::Pod;

/// Workgroup size used when a kernel leaves its local size at 0. Must match
/// the `@workgroup_size` of the entry points in the program.
pub const DEFAULT_LOCAL_1D: u32 = 64;
pub const DEFAULT_LOCAL_2D: (u32, u32) = (8, 8);

/// Index of a declared buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) usize);

/// Index of a declared kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelId(pub(crate) usize);

/// One argument slot of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSlot {
    Buffer,
    Value { size: usize },
}

impl ArgSlot {
    pub fn value_of<T: Pod>() -> Self {
        ArgSlot::Value {
            size: std::mem::size_of::<T>(),
        }
    }
}

/// A value to bind into an argument slot.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelArg {
    Buffer(String),
    Value(Vec<u8>),
}

impl KernelArg {
    pub fn buffer(name: impl Into<String>) -> Self {
        KernelArg::Buffer(name.into())
    }

    pub fn value<T: Pod>(value: &T) -> Self {
        KernelArg::Value(bytemuck::bytes_of(value).to_vec())
    }
}

/// Global and local work sizes. A local size of 0 means the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkSize {
    OneD { global: u32, local: u32 },
    TwoD { global: (u32, u32), local: (u32, u32) },
}

impl WorkSize {
    pub fn one_d(global: u32) -> Self {
        WorkSize::OneD { global, local: 0 }
    }

    pub fn two_d(width: u32, height: u32) -> Self {
        WorkSize::TwoD {
            global: (width, height),
            local: (0, 0),
        }
    }

    pub fn dimensions(&self) -> u32 {
        match self {
            WorkSize::OneD { .. } => 1,
            WorkSize::TwoD { .. } => 2,
        }
    }

    /// Number of workgroups to dispatch along x and y.
    pub fn workgroups(&self) -> (u32, u32) {
        match *self {
            WorkSize::OneD { global, local } => {
                let local = if local == 0 { DEFAULT_LOCAL_1D } else { local };
                (global.div_ceil(local), 1)
            }
            WorkSize::TwoD { global, local } => {
                let local = if local == (0, 0) {
                    DEFAULT_LOCAL_2D
                } else {
                    local
                };
                (global.0.div_ceil(local.0), global.1.div_ceil(local.1))
            }
        }
    }
}

/// Declarative description of a kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelSpec {
    pub name: String,
    pub entry_point: String,
    pub work_size: WorkSize,
    pub slots: Vec<ArgSlot>,
    /// Pipeline-overridable constants baked in at creation.
    pub constants: Vec<(String, f64)>,
}

impl KernelSpec {
    pub fn new(
        name: impl Into<String>,
        entry_point: impl Into<String>,
        work_size: WorkSize,
        slots: Vec<ArgSlot>,
    ) -> Self {
        Self {
            name: name.into(),
            entry_point: entry_point.into(),
            work_size,
            slots,
            constants: Vec::new(),
        }
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: f64) -> Self {
        self.constants.push((name.into(), value));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Buffer(BufferId),
    Value,
}

/// Tracks what is bound to each slot of one kernel.
#[derive(Debug, Clone)]
pub struct ArgumentTable {
    kernel: String,
    slots: Vec<ArgSlot>,
    bound: Vec<Option<Bound>>,
}

impl ArgumentTable {
    pub fn new(kernel: impl Into<String>, slots: Vec<ArgSlot>) -> Self {
        let bound = vec![None; slots.len()];
        Self {
            kernel: kernel.into(),
            slots,
            bound,
        }
    }

    pub fn slots(&self) -> &[ArgSlot] {
        &self.slots
    }

    fn slot(&self, index: u32) -> Result<ArgSlot, GpuError> {
        self.slots
            .get(index as usize)
            .copied()
            .ok_or_else(|| GpuError::ArgumentIndex {
                kernel: self.kernel.clone(),
                index,
                slots: self.slots.len(),
            })
    }

    pub fn bind_buffer(&mut self, index: u32, buffer: BufferId) -> Result<(), GpuError> {
        match self.slot(index)? {
            ArgSlot::Buffer => {
                self.bound[index as usize] = Some(Bound::Buffer(buffer));
                Ok(())
            }
            ArgSlot::Value { .. } => Err(GpuError::ArgumentKind {
                kernel: self.kernel.clone(),
                index,
                expected: "an inline value",
            }),
        }
    }

    pub fn bind_value(&mut self, index: u32, len: usize) -> Result<(), GpuError> {
        match self.slot(index)? {
            ArgSlot::Value { size } if size == len => {
                self.bound[index as usize] = Some(Bound::Value);
                Ok(())
            }
            ArgSlot::Value { size } => Err(GpuError::ArgumentSize {
                kernel: self.kernel.clone(),
                index,
                expected: size,
                actual: len,
            }),
            ArgSlot::Buffer => Err(GpuError::ArgumentKind {
                kernel: self.kernel.clone(),
                index,
                expected: "a buffer",
            }),
        }
    }

    pub fn buffer_at(&self, index: usize) -> Option<BufferId> {
        match self.bound.get(index) {
            Some(Some(Bound::Buffer(id))) => Some(*id),
            _ => None,
        }
    }

    pub fn references(&self, buffer: BufferId) -> bool {
        self.bound.contains(&Some(Bound::Buffer(buffer)))
    }

    /// Fails unless every slot has been bound at least once.
    pub fn check_complete(&self) -> Result<(), GpuError> {
        let unbound: Vec<u32> = self
            .bound
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_none())
            .map(|(i, _)| i as u32)
            .collect();
        if unbound.is_empty() {
            Ok(())
        } else {
            Err(GpuError::UnboundArguments {
                kernel: self.kernel.clone(),
                unbound,
            })
        }
    }
}
