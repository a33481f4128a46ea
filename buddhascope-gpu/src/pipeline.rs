//! Named buffers and kernels on a single in-order queue.
//!
//! All buffers and kernels are declared once at startup. Dispatches, writes
//! and reads are submitted to the one queue in call order; only reads block.

use crate::buffers::BufferSpec;
use crate::device::GpuContext;
use crate::error::GpuError;
use crate::kernel::{ArgSlot, ArgumentTable, BufferId, KernelArg, KernelId, KernelSpec, WorkSize};
use bytemuck::Pod;
use std::collections::HashMap;

/// Uniform blocks are allocated in multiples of this many bytes.
const UNIFORM_ALIGN: usize = 16;

struct NamedBuffer {
    name: String,
    size: u64,
    buffer: wgpu::Buffer,
}

struct NamedKernel {
    name: String,
    work_size: WorkSize,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    args: ArgumentTable,
    /// One uniform buffer per value slot, `None` for buffer slots.
    values: Vec<Option<wgpu::Buffer>>,
    /// Rebuilt lazily after a buffer binding or swap touches this kernel.
    bind_group: Option<wgpu::BindGroup>,
    dispatches: u64,
}

/// Owns the program, every named buffer and every named kernel.
pub struct ComputePipeline {
    context: GpuContext,
    module: wgpu::ShaderModule,
    buffers: Vec<NamedBuffer>,
    buffer_ids: HashMap<String, BufferId>,
    kernels: Vec<NamedKernel>,
    kernel_ids: HashMap<String, KernelId>,
    staging: HashMap<BufferId, wgpu::Buffer>,
}

impl ComputePipeline {
    /// Compiles the shared program. Fails with the full compiler log.
    pub async fn new(context: GpuContext, label: &str, source: &str) -> Result<Self, GpuError> {
        context
            .device
            .push_error_scope(wgpu::ErrorFilter::Validation);
        let module = context
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let info = module.get_compilation_info().await;
        let scope_error = context.device.pop_error_scope().await;

        let log = info
            .messages
            .iter()
            .map(|m| match &m.location {
                Some(loc) => format!(
                    "{:?} {}:{}: {}",
                    m.message_type, loc.line_number, loc.line_position, m.message
                ),
                None => format!("{:?}: {}", m.message_type, m.message),
            })
            .collect::<Vec<_>>()
            .join("\n");
        let failed = info
            .messages
            .iter()
            .any(|m| m.message_type == wgpu::CompilationMessageType::Error);

        if failed || scope_error.is_some() {
            let log = match scope_error {
                Some(e) if log.is_empty() => e.to_string(),
                Some(e) => format!("{log}\n{e}"),
                None => log,
            };
            return Err(GpuError::ProgramBuild { log });
        }
        if !log.is_empty() {
            log::debug!("Program [{label}] build log:\n{log}");
        }

        Ok(Self {
            context,
            module,
            buffers: Vec::new(),
            buffer_ids: HashMap::new(),
            kernels: Vec::new(),
            kernel_ids: HashMap::new(),
            staging: HashMap::new(),
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Allocates one read-write device buffer of `size` bytes.
    pub async fn declare_buffer(&mut self, name: &str, size: u64) -> Result<BufferId, GpuError> {
        if self.buffer_ids.contains_key(name) {
            return Err(GpuError::DuplicateName(name.to_string()));
        }
        let limits = self.context.device.limits();
        let limit = limits
            .max_buffer_size
            .min(limits.max_storage_buffer_binding_size as u64);
        if size == 0 || size > limit || size % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(GpuError::Allocation {
                name: name.to_string(),
                size,
                message: format!(
                    "size must be a non-zero multiple of {} up to {limit}",
                    wgpu::COPY_BUFFER_ALIGNMENT
                ),
            });
        }

        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(name),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let validation = device.pop_error_scope().await;
        let out_of_memory = device.pop_error_scope().await;
        if let Some(e) = validation.or(out_of_memory) {
            return Err(GpuError::Allocation {
                name: name.to_string(),
                size,
                message: e.to_string(),
            });
        }

        let id = BufferId(self.buffers.len());
        self.buffers.push(NamedBuffer {
            name: name.to_string(),
            size,
            buffer,
        });
        self.buffer_ids.insert(name.to_string(), id);
        log::debug!("Declared buffer [{name}] ({size} bytes)");
        Ok(id)
    }

    /// Creates a kernel from one entry point of the program.
    pub async fn declare_kernel(&mut self, spec: &KernelSpec) -> Result<KernelId, GpuError> {
        if self.kernel_ids.contains_key(&spec.name) {
            return Err(GpuError::DuplicateName(spec.name.clone()));
        }
        let limit = self
            .context
            .device
            .limits()
            .max_compute_workgroups_per_dimension;
        let (x, y) = spec.work_size.workgroups();
        if x.max(y) > limit {
            return Err(GpuError::WorkSize {
                kernel: spec.name.clone(),
                workgroups: x.max(y),
                limit,
            });
        }

        let device = &self.context.device;
        let entries: Vec<wgpu::BindGroupLayoutEntry> = spec
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| wgpu::BindGroupLayoutEntry {
                binding: i as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: match slot {
                        ArgSlot::Buffer => wgpu::BufferBindingType::Storage { read_only: false },
                        ArgSlot::Value { .. } => wgpu::BufferBindingType::Uniform,
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&spec.name),
            entries: &entries,
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&spec.name),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let constants: HashMap<String, f64> = spec.constants.iter().cloned().collect();
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(&spec.name),
            layout: Some(&layout),
            module: &self.module,
            entry_point: Some(&spec.entry_point),
            compilation_options: wgpu::PipelineCompilationOptions {
                constants: &constants,
                zero_initialize_workgroup_memory: true,
            },
            cache: None,
        });
        if let Some(e) = device.pop_error_scope().await {
            return Err(GpuError::KernelCreation {
                name: spec.name.clone(),
                entry_point: spec.entry_point.clone(),
                message: e.to_string(),
            });
        }

        let values = spec
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| match slot {
                ArgSlot::Buffer => None,
                ArgSlot::Value { size } => Some(device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("{}_arg{i}", spec.name)),
                    size: (*size).max(1).next_multiple_of(UNIFORM_ALIGN) as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })),
            })
            .collect();

        let id = KernelId(self.kernels.len());
        self.kernels.push(NamedKernel {
            name: spec.name.clone(),
            work_size: spec.work_size,
            pipeline,
            bind_group_layout,
            args: ArgumentTable::new(spec.name.clone(), spec.slots.clone()),
            values,
            bind_group: None,
            dispatches: 0,
        });
        self.kernel_ids.insert(spec.name.clone(), id);
        log::debug!(
            "Declared kernel [{}] -> {} ({}D, {:?} workgroups)",
            spec.name,
            spec.entry_point,
            spec.work_size.dimensions(),
            (x, y)
        );
        Ok(id)
    }

    pub fn buffer_id(&self, name: &str) -> Result<BufferId, GpuError> {
        self.buffer_ids
            .get(name)
            .copied()
            .ok_or_else(|| GpuError::UnknownBuffer(name.to_string()))
    }

    pub fn kernel_id(&self, name: &str) -> Result<KernelId, GpuError> {
        self.kernel_ids
            .get(name)
            .copied()
            .ok_or_else(|| GpuError::UnknownKernel(name.to_string()))
    }

    pub fn buffer_size(&self, name: &str) -> Result<u64, GpuError> {
        Ok(self.buffers[self.buffer_id(name)?.0].size)
    }

    /// Binds one argument slot. The binding persists until rebound.
    pub fn bind(&mut self, kernel: &str, index: u32, arg: KernelArg) -> Result<(), GpuError> {
        let id = self.kernel_id(kernel)?;
        match arg {
            KernelArg::Buffer(name) => {
                let buffer = self.buffer_id(&name)?;
                self.bind_buffer_id(id, index, buffer)
            }
            KernelArg::Value(bytes) => self.bind_value_id(id, index, &bytes),
        }
    }

    pub fn bind_buffer(&mut self, kernel: &str, index: u32, buffer: &str) -> Result<(), GpuError> {
        self.bind(kernel, index, KernelArg::buffer(buffer))
    }

    pub fn bind_value<T: Pod>(
        &mut self,
        kernel: &str,
        index: u32,
        value: &T,
    ) -> Result<(), GpuError> {
        let id = self.kernel_id(kernel)?;
        self.bind_value_id(id, index, bytemuck::bytes_of(value))
    }

    pub fn bind_buffer_id(
        &mut self,
        kernel: KernelId,
        index: u32,
        buffer: BufferId,
    ) -> Result<(), GpuError> {
        let k = &mut self.kernels[kernel.0];
        k.args.bind_buffer(index, buffer)?;
        k.bind_group = None;
        Ok(())
    }

    /// Writes an inline value into the kernel's uniform block for `index`.
    /// Takes effect for every dispatch submitted after this call.
    pub fn bind_value_id(
        &mut self,
        kernel: KernelId,
        index: u32,
        bytes: &[u8],
    ) -> Result<(), GpuError> {
        let k = &mut self.kernels[kernel.0];
        k.args.bind_value(index, bytes.len())?;
        if let Some(Some(uniform)) = k.values.get(index as usize) {
            let mut padded = bytes.to_vec();
            padded.resize(bytes.len().next_multiple_of(4), 0);
            self.context.queue.write_buffer(uniform, 0, &padded);
        }
        self.context.check("bind value", &k.name)
    }

    /// Copies host data into the whole buffer. The data is staged before this
    /// returns, so the host slice may be reused immediately.
    pub fn write<T: Pod>(&mut self, name: &str, data: &[T]) -> Result<(), GpuError> {
        let id = self.buffer_id(name)?;
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let target = &self.buffers[id.0];
        if bytes.len() as u64 != target.size {
            return Err(GpuError::SizeMismatch {
                name: name.to_string(),
                expected: target.size,
                actual: bytes.len() as u64,
            });
        }
        self.context.queue.write_buffer(&target.buffer, 0, bytes);
        self.context.check("write buffer", name)
    }

    /// Reads the whole buffer back, blocking until every earlier submission
    /// has completed.
    pub async fn read<T: Pod>(&mut self, name: &str) -> Result<Vec<T>, GpuError> {
        let id = self.buffer_id(name)?;
        let size = self.buffers[id.0].size;
        if size % std::mem::size_of::<T>() as u64 != 0 {
            return Err(GpuError::SizeMismatch {
                name: name.to_string(),
                expected: size,
                actual: size - size % std::mem::size_of::<T>() as u64,
            });
        }

        let device = &self.context.device;
        let staging = self.staging.entry(id).or_insert_with(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{name}_staging")),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("read_encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.buffers[id.0].buffer, 0, staging, 0, size);
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = futures_channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        device.poll(wgpu::Maintain::Wait);

        rx.await
            .map_err(|_| GpuError::Unavailable("Channel closed".into()))?
            .map_err(GpuError::BufferMap)?;

        let data = {
            let view = slice.get_mapped_range();
            bytemuck::pod_collect_to_vec::<u8, T>(&view)
        };
        staging.unmap();

        self.context.check("read buffer", name)?;
        Ok(data)
    }

    /// Reads the whole buffer into `out`, which must match its size exactly.
    pub async fn read_into<T: Pod>(&mut self, name: &str, out: &mut [T]) -> Result<(), GpuError> {
        let expected = self.buffer_size(name)?;
        let actual = std::mem::size_of_val(out) as u64;
        if expected != actual {
            return Err(GpuError::SizeMismatch {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        let data: Vec<T> = self.read(name).await?;
        out.copy_from_slice(&data);
        Ok(())
    }

    /// Queues `repeat` back-to-back runs of a kernel over its full work size.
    pub fn dispatch(&mut self, kernel: &str, repeat: u32) -> Result<(), GpuError> {
        let id = self.kernel_id(kernel)?;
        self.dispatch_id(id, repeat)
    }

    pub fn dispatch_id(&mut self, kernel: KernelId, repeat: u32) -> Result<(), GpuError> {
        let device = &self.context.device;
        let buffers = &self.buffers;
        let k = &mut self.kernels[kernel.0];
        k.args.check_complete()?;

        if k.bind_group.is_none() {
            let entries: Vec<wgpu::BindGroupEntry> = k
                .args
                .slots()
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| {
                    let buffer = match slot {
                        ArgSlot::Buffer => &buffers[k.args.buffer_at(i)?.0].buffer,
                        ArgSlot::Value { .. } => k.values[i].as_ref()?,
                    };
                    Some(wgpu::BindGroupEntry {
                        binding: i as u32,
                        resource: buffer.as_entire_binding(),
                    })
                })
                .collect();
            k.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&k.name),
                layout: &k.bind_group_layout,
                entries: &entries,
            }));
        }
        let Some(bind_group) = k.bind_group.as_ref() else {
            return Err(GpuError::UnboundArguments {
                kernel: k.name.clone(),
                unbound: Vec::new(),
            });
        };

        let (x, y) = k.work_size.workgroups();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&k.name),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&k.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&k.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            for _ in 0..repeat {
                pass.dispatch_workgroups(x, y, 1);
            }
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
        k.dispatches += repeat as u64;

        self.context.check("dispatch", &k.name)
    }

    /// Exchanges the device storage behind two names without copying.
    /// Kernels bound to either name see the other buffer from their next
    /// dispatch on.
    pub fn swap(&mut self, a: &str, b: &str) -> Result<(), GpuError> {
        let ia = self.buffer_id(a)?;
        let ib = self.buffer_id(b)?;
        if ia == ib {
            return Ok(());
        }
        let (sa, sb) = (self.buffers[ia.0].size, self.buffers[ib.0].size);
        if sa != sb {
            return Err(GpuError::SizeMismatch {
                name: b.to_string(),
                expected: sa,
                actual: sb,
            });
        }

        let (lo, hi) = (ia.0.min(ib.0), ia.0.max(ib.0));
        let (head, tail) = self.buffers.split_at_mut(hi);
        std::mem::swap(&mut head[lo].buffer, &mut tail[0].buffer);
        log::trace!("Swapped buffers {} and {}", head[lo].name, tail[0].name);

        for k in &mut self.kernels {
            if k.args.references(ia) || k.args.references(ib) {
                k.bind_group = None;
            }
        }
        Ok(())
    }

    /// Submits everything queued so far. Does not wait for completion.
    pub fn flush(&mut self) -> Result<(), GpuError> {
        self.context.queue.submit(std::iter::empty());
        self.context.check("flush", "queue")
    }

    /// Dispatch counts per kernel, in declaration order.
    pub fn dispatch_counts(&self) -> Vec<(&str, u64)> {
        self.kernels
            .iter()
            .map(|k| (k.name.as_str(), k.dispatches))
            .collect()
    }

    /// Declares every buffer and kernel from declarative lists.
    pub async fn declare_all(
        &mut self,
        buffers: &[BufferSpec],
        kernels: &[KernelSpec],
    ) -> Result<(), GpuError> {
        for spec in buffers {
            self.declare_buffer(&spec.name, spec.size).await?;
        }
        for spec in kernels {
            self.declare_kernel(spec).await?;
        }
        Ok(())
    }
}
