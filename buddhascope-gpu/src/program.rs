//! The Buddhabrot program: shader source, kernel list and static bindings.

use crate::buffers::{names, DiffParams, RasterParams, StepParams, ViewUniform};
use crate::error::GpuError;
use crate::kernel::{ArgSlot, KernelArg, KernelSpec, WorkSize};
use crate::pipeline::ComputePipeline;
use buddhascope_core::{ChunkLayout, Settings, StepVariant};

pub const SHADER_SOURCE: &str = include_str!("shaders/buddhabrot.wgsl");

/// Kernel names, other than the step variants.
pub mod kernels {
    pub const SEED_NOISE: &str = "seed_noise";
    pub const INIT_PARTICLES: &str = "init_particles";
    pub const RESET_COUNT: &str = "reset_count";
    pub const RESET_PREV: &str = "reset_prev";
    pub const RESET_DIFF: &str = "reset_diff";
    pub const RESET_IMAGE: &str = "reset_image";
    pub const FIND_MAX1: &str = "find_max1";
    pub const FIND_MAX_DIFF: &str = "find_max_diff";
    pub const FIND_MAX2: &str = "find_max2";
    pub const UPDATE_DIFF: &str = "update_diff";
    pub const RENDER_IMAGE: &str = "render_image";
    pub const RENDER_IMAGE_DIFF: &str = "render_image_diff";
}

/// Slot of the view uniform in every step kernel.
pub const STEP_VIEW_SLOT: u32 = 7;

/// Every kernel the renderer declares, step variants last.
pub fn kernel_specs(settings: &Settings, layout: &ChunkLayout) -> Vec<KernelSpec> {
    let particles = WorkSize::one_d(settings.particle_count);
    let partials = WorkSize::one_d(layout.partial_count());
    let image_chunks = WorkSize::one_d(3 * layout.chunks_per_threshold());
    let raster = WorkSize::two_d(settings.width, settings.height);
    let u32_value = ArgSlot::value_of::<u32>();
    let raster_slots = vec![
        ArgSlot::Buffer,
        ArgSlot::Buffer,
        ArgSlot::Buffer,
        ArgSlot::value_of::<RasterParams>(),
    ];

    let mut specs = vec![
        KernelSpec::new(
            kernels::SEED_NOISE,
            "seed_noise",
            particles,
            vec![ArgSlot::Buffer; 4],
        ),
        KernelSpec::new(
            kernels::INIT_PARTICLES,
            "init_particles",
            particles,
            vec![ArgSlot::Buffer; 3],
        ),
        KernelSpec::new(
            kernels::RESET_COUNT,
            "reset_histogram",
            partials,
            vec![ArgSlot::Buffer, u32_value],
        ),
        KernelSpec::new(
            kernels::RESET_PREV,
            "reset_histogram",
            partials,
            vec![ArgSlot::Buffer, u32_value],
        ),
        KernelSpec::new(
            kernels::RESET_DIFF,
            "reset_histogram",
            partials,
            vec![ArgSlot::Buffer, u32_value],
        ),
        KernelSpec::new(
            kernels::RESET_IMAGE,
            "reset_histogram",
            image_chunks,
            vec![ArgSlot::Buffer, u32_value],
        ),
        KernelSpec::new(
            kernels::FIND_MAX1,
            "find_max1",
            partials,
            vec![ArgSlot::Buffer, ArgSlot::Buffer, u32_value],
        ),
        KernelSpec::new(
            kernels::FIND_MAX_DIFF,
            "find_max1",
            partials,
            vec![ArgSlot::Buffer, ArgSlot::Buffer, u32_value],
        ),
        KernelSpec::new(
            kernels::FIND_MAX2,
            "find_max2",
            WorkSize::one_d(settings.threshold_count()),
            vec![ArgSlot::Buffer, ArgSlot::Buffer, u32_value],
        ),
        KernelSpec::new(
            kernels::UPDATE_DIFF,
            "update_diff",
            raster,
            vec![
                ArgSlot::Buffer,
                ArgSlot::Buffer,
                ArgSlot::Buffer,
                ArgSlot::value_of::<DiffParams>(),
            ],
        ),
        KernelSpec::new(
            kernels::RENDER_IMAGE,
            "render_image",
            raster,
            raster_slots.clone(),
        ),
        KernelSpec::new(
            kernels::RENDER_IMAGE_DIFF,
            "render_image",
            raster,
            raster_slots,
        ),
    ];

    specs.extend(StepVariant::all().map(|variant| {
        KernelSpec::new(
            variant.kernel_name(),
            "mandel_step",
            particles,
            vec![
                ArgSlot::Buffer,
                ArgSlot::Buffer,
                ArgSlot::Buffer,
                ArgSlot::Buffer,
                ArgSlot::Buffer,
                ArgSlot::Buffer,
                ArgSlot::value_of::<StepParams>(),
                ArgSlot::value_of::<ViewUniform>(),
            ],
        )
        .with_constant("PATH_TYPE", variant.path.code() as f64)
        .with_constant("SCORE_TYPE", variant.score.code() as f64)
    }));

    specs
}

/// Binds every argument that stays fixed for the renderer's lifetime. The
/// view slot of the step kernels is bound separately.
pub fn bind_static_arguments(
    pipeline: &mut ComputePipeline,
    settings: &Settings,
    layout: &ChunkLayout,
) -> Result<(), GpuError> {
    use kernels::*;

    let buffers: [(&str, &[&str]); 11] = [
        (
            SEED_NOISE,
            &[
                names::RANDOM_STATE,
                names::RANDOM_INCREMENT,
                names::INIT_STATE,
                names::INIT_SEQ,
            ],
        ),
        (
            INIT_PARTICLES,
            &[
                names::PARTICLES,
                names::RANDOM_STATE,
                names::RANDOM_INCREMENT,
            ],
        ),
        (RESET_COUNT, &[names::COUNT]),
        (RESET_PREV, &[names::PREV_COUNT]),
        (RESET_DIFF, &[names::COUNT_DIFF]),
        (RESET_IMAGE, &[names::IMAGE]),
        (FIND_MAX1, &[names::COUNT, names::MAXIMA]),
        (FIND_MAX_DIFF, &[names::COUNT_DIFF, names::MAXIMA]),
        (FIND_MAX2, &[names::MAXIMA, names::MAXIMUM]),
        (
            UPDATE_DIFF,
            &[names::COUNT, names::PREV_COUNT, names::COUNT_DIFF],
        ),
        (RENDER_IMAGE, &[names::COUNT, names::MAXIMUM, names::IMAGE]),
    ];
    for (kernel, args) in buffers {
        bind_buffers(pipeline, kernel, args)?;
    }
    bind_buffers(
        pipeline,
        RENDER_IMAGE_DIFF,
        &[names::COUNT_DIFF, names::MAXIMUM, names::IMAGE],
    )?;

    let chunk_size = layout.chunk_size();
    for kernel in [RESET_COUNT, RESET_PREV, RESET_DIFF, RESET_IMAGE] {
        pipeline.bind_value(kernel, 1, &chunk_size)?;
    }
    for kernel in [FIND_MAX1, FIND_MAX_DIFF] {
        pipeline.bind_value(kernel, 2, &chunk_size)?;
    }
    pipeline.bind_value(FIND_MAX2, 2, &layout.chunks_per_threshold())?;
    pipeline.bind_value(UPDATE_DIFF, 3, &DiffParams::new(settings))?;
    pipeline.bind_value(RENDER_IMAGE, 3, &RasterParams::new(settings))?;
    pipeline.bind_value(RENDER_IMAGE_DIFF, 3, &RasterParams::diff(settings))?;

    let step_params = StepParams::new(settings);
    for variant in StepVariant::all() {
        let name = variant.kernel_name();
        bind_buffers(
            pipeline,
            &name,
            &[
                names::PARTICLES,
                names::COUNT,
                names::THRESHOLD,
                names::PATH,
                names::RANDOM_STATE,
                names::RANDOM_INCREMENT,
            ],
        )?;
        pipeline.bind(&name, 6, KernelArg::value(&step_params))?;
    }
    Ok(())
}

fn bind_buffers(
    pipeline: &mut ComputePipeline,
    kernel: &str,
    buffers: &[&str],
) -> Result<(), GpuError> {
    for (index, buffer) in buffers.iter().enumerate() {
        pipeline.bind_buffer(kernel, index as u32, buffer)?;
    }
    Ok(())
}
