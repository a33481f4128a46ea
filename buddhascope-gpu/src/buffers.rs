//! Buffer declarations and the uniform blocks passed as inline kernel values.

use buddhascope_core::{ChunkLayout, Particle, Settings, ViewState};
use bytemuck::{Pod, Zeroable};

/// A named device buffer and its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSpec {
    pub name: String,
    pub size: u64,
}

impl BufferSpec {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// `count` elements of `T`.
    pub fn of<T>(name: impl Into<String>, count: u64) -> Self {
        Self::new(name, count * std::mem::size_of::<T>() as u64)
    }
}

/// Names of every buffer the renderer declares.
pub mod names {
    pub const IMAGE: &str = "image";
    pub const COUNT: &str = "count";
    pub const PREV_COUNT: &str = "prev_count";
    pub const COUNT_DIFF: &str = "count_diff";
    pub const PARTICLES: &str = "particles";
    pub const PATH: &str = "path";
    pub const THRESHOLD: &str = "threshold";
    pub const MAXIMA: &str = "maxima";
    pub const MAXIMUM: &str = "maximum";
    pub const RANDOM_STATE: &str = "random_state";
    pub const RANDOM_INCREMENT: &str = "random_increment";
    pub const INIT_STATE: &str = "init_state";
    pub const INIT_SEQ: &str = "init_seq";
}

/// The full buffer list for one renderer configuration.
pub fn buffer_specs(settings: &Settings, layout: &ChunkLayout) -> Vec<BufferSpec> {
    let cells = layout.cells() as u64;
    let thresholds = settings.threshold_count() as u64;
    let particles = settings.particle_count as u64;
    let path_len = particles * settings.thresholds.max() as u64;

    vec![
        BufferSpec::of::<u32>(names::IMAGE, 3 * cells),
        BufferSpec::of::<u32>(names::COUNT, thresholds * cells),
        BufferSpec::of::<u32>(names::PREV_COUNT, thresholds * cells),
        BufferSpec::of::<u32>(names::COUNT_DIFF, thresholds * cells),
        BufferSpec::of::<Particle>(names::PARTICLES, particles),
        BufferSpec::of::<[f32; 2]>(names::PATH, path_len),
        BufferSpec::of::<u32>(names::THRESHOLD, thresholds),
        BufferSpec::of::<u32>(names::MAXIMA, layout.partial_count() as u64),
        BufferSpec::of::<u32>(names::MAXIMUM, thresholds),
        BufferSpec::of::<u32>(names::RANDOM_STATE, particles),
        BufferSpec::of::<u32>(names::RANDOM_INCREMENT, particles),
        BufferSpec::of::<u64>(names::INIT_STATE, particles),
        BufferSpec::of::<u64>(names::INIT_SEQ, particles),
    ]
}

/// Current view as the step kernels see it. Matches `struct View` in the
/// shader (48 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ViewUniform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub center_x: f32,
    pub center_y: f32,
    pub theta: f32,
    pub sin_theta: f32,
    pub cos_theta: f32,
    pub _pad0: f32,
    pub width: i32,
    pub height: i32,
    pub _pad1: [i32; 2],
}

impl From<&ViewState> for ViewUniform {
    fn from(view: &ViewState) -> Self {
        let center = view.center();
        Self {
            scale_x: view.scale_x() as f32,
            scale_y: view.scale_y() as f32,
            center_x: center.x as f32,
            center_y: center.y as f32,
            theta: view.theta() as f32,
            sin_theta: view.sin_theta() as f32,
            cos_theta: view.cos_theta() as f32,
            _pad0: 0.0,
            width: view.raster_width() as i32,
            height: view.raster_height() as i32,
            _pad1: [0; 2],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StepParams {
    pub threshold_count: u32,
    pub max_threshold: u32,
    pub escape_bound: f32,
    pub _pad: u32,
}

impl StepParams {
    pub fn new(settings: &Settings) -> Self {
        Self {
            threshold_count: settings.threshold_count(),
            max_threshold: settings.thresholds.max(),
            escape_bound: settings.escape_bound,
            _pad: 0,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct RasterParams {
    pub width: u32,
    pub height: u32,
    pub threshold_count: u32,
    /// Non-zero when the rendered histogram holds `f32` bits.
    pub float_cells: u32,
}

impl RasterParams {
    pub fn new(settings: &Settings) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            threshold_count: settings.threshold_count(),
            float_cells: 0,
        }
    }

    /// Parameters for rendering the diff moving average.
    pub fn diff(settings: &Settings) -> Self {
        Self {
            float_cells: 1,
            ..Self::new(settings)
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DiffParams {
    /// Weight of the newest per-frame delta.
    pub alpha: f32,
    pub width: u32,
    pub height: u32,
    pub threshold_count: u32,
}

impl DiffParams {
    pub fn new(settings: &Settings) -> Self {
        Self {
            alpha: settings.alpha,
            width: settings.width,
            height: settings.height,
            threshold_count: settings.threshold_count(),
        }
    }
}
