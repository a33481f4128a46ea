//! GPU device initialization and capability detection.

use crate::error::GpuError;
use std::sync::{Arc, Mutex};

/// Holds the wgpu device and queue.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    errors: Arc<Mutex<Vec<String>>>,
}

/// Result of GPU initialization attempt.
pub enum GpuAvailability {
    Available(GpuContext),
    Unavailable(String),
}

impl GpuContext {
    /// Attempt to initialize a hardware GPU. Returns Unavailable on any failure.
    pub async fn try_init() -> GpuAvailability {
        Self::try_init_with(false).await
    }

    /// Like [`GpuContext::try_init`], optionally forcing the software fallback adapter.
    pub async fn try_init_with(force_fallback: bool) -> GpuAvailability {
        match Self::init_internal(force_fallback).await {
            Ok(ctx) => GpuAvailability::Available(ctx),
            Err(e) => {
                log::warn!("GPU initialization failed: {e}");
                GpuAvailability::Unavailable(e.to_string())
            }
        }
    }

    async fn init_internal(force_fallback: bool) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: force_fallback,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        log::info!("GPU adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("buddhascope"),
                    required_features: wgpu::Features::empty(),
                    // Histogram and path buffers exceed the default binding
                    // size limits, so take whatever the adapter offers.
                    required_limits: adapter.limits(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        device.on_uncaptured_error(Box::new(move |error| {
            log::error!("Uncaptured device error: {error}");
            if let Ok(mut pending) = sink.lock() {
                pending.push(error.to_string());
            }
        }));

        Ok(Self {
            device,
            queue,
            errors,
        })
    }

    /// Drains device errors reported since the last call.
    pub fn take_errors(&self) -> Option<String> {
        let mut pending = self.errors.lock().ok()?;
        if pending.is_empty() {
            None
        } else {
            Some(pending.drain(..).collect::<Vec<_>>().join("\n"))
        }
    }

    /// Converts any pending device error into a [`GpuError::Backend`].
    pub fn check(&self, operation: &'static str, name: &str) -> Result<(), GpuError> {
        match self.take_errors() {
            Some(message) => Err(GpuError::Backend {
                operation,
                name: name.to_string(),
                message,
            }),
            None => Ok(()),
        }
    }
}
