//! Frame orchestration and the command surface for the input layer.

use crate::buffers::{buffer_specs, names, ViewUniform};
use crate::device::GpuContext;
use crate::error::GpuError;
use crate::kernel::KernelId;
use crate::pipeline::ComputePipeline;
use crate::program::{bind_static_arguments, kernel_specs, kernels, SHADER_SOURCE, STEP_VIEW_SLOT};
use crate::stats::FrameStats;
use buddhascope_core::{
    ChunkLayout, ConsistencyError, MaximumSet, Particle, PathPolicy, Point, ScorePolicy,
    SeedSource, Settings, Snapshot, StepVariant, ViewHistory, ViewState, WindowSettings,
};
use std::time::Instant;

/// A discrete input-layer command. Each maps to one renderer method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetView { scale: f64, center: Point, theta: f64 },
    /// Drag between two raster points.
    SelectRegion { start: Point, end: Point },
    UndoView,
    Pan(Point),
    Zoom(f64),
    Rotate(f64),
    SetPathType(PathPolicy),
    SetScoreType(ScorePolicy),
    ToggleDiffMode,
    ToggleUpdateView,
    ResetAccumulation,
    ReseedParticles,
    HardReset,
}

/// Runs the Buddhabrot frame loop on a [`ComputePipeline`].
///
/// Owns the view and its undo stack. Every view change is written to the
/// step kernels and followed by a full reset before the next frame.
pub struct BuddhabrotRenderer {
    pipeline: ComputePipeline,
    settings: Settings,
    layout: ChunkLayout,
    history: ViewHistory,
    /// Indexed by [`StepVariant::index`].
    step_kernels: Vec<KernelId>,
    variant: StepVariant,
    show_diff: bool,
    update_view: bool,
    pixels: Vec<u32>,
    maximum: MaximumSet,
    /// View generation last written to the step kernels.
    bound_generation: u64,
    seeds: SeedSource,
    stats: FrameStats,
}

impl BuddhabrotRenderer {
    /// Validates the settings, builds the program, declares and binds every
    /// buffer and kernel, seeds the generators and resets accumulation.
    pub async fn new(context: GpuContext, settings: Settings) -> Result<Self, GpuError> {
        let layout = settings.validate()?;
        log::info!("Settings: {}", settings.summary());

        let mut pipeline = ComputePipeline::new(context, "buddhabrot", SHADER_SOURCE).await?;
        pipeline
            .declare_all(
                &buffer_specs(&settings, &layout),
                &kernel_specs(&settings, &layout),
            )
            .await?;
        bind_static_arguments(&mut pipeline, &settings, &layout)?;
        pipeline.write(names::THRESHOLD, settings.thresholds.as_slice())?;

        let step_kernels = StepVariant::all()
            .map(|variant| pipeline.kernel_id(&variant.kernel_name()))
            .collect::<Result<Vec<_>, _>>()?;

        let seeds = match settings.seed {
            Some(seed) => SeedSource::from_seed(seed),
            None => SeedSource::from_entropy(),
        };
        let threshold_count = settings.threshold_count() as usize;
        let cells = layout.cells();

        let mut renderer = Self {
            pipeline,
            history: ViewHistory::new(settings.initial_view()),
            variant: StepVariant::new(settings.path_type, settings.score_type),
            layout,
            step_kernels,
            show_diff: false,
            update_view: true,
            pixels: vec![0; 3 * cells],
            maximum: MaximumSet::zeroed(threshold_count),
            bound_generation: 0,
            seeds,
            stats: FrameStats::default(),
            settings,
        };
        renderer.seed_generators()?;
        renderer.apply_view()?;
        renderer.pipeline.flush()?;

        log::info!(
            "Renderer ready: {} particles, {} thresholds, {}x{} raster, {} partial maxima",
            renderer.settings.particle_count,
            threshold_count,
            renderer.settings.width,
            renderer.settings.height,
            renderer.layout.partial_count()
        );
        Ok(renderer)
    }

    /// Advances every particle `frame_steps` times, then reduces and renders.
    /// The maxima are read back every frame, the image only while
    /// [`update_view`](Self::update_view) is on.
    pub async fn render_frame(&mut self) -> Result<(), GpuError> {
        let started = Instant::now();
        let current = self.history.generation();
        if self.bound_generation != current {
            return Err(ConsistencyError::StaleView {
                bound: self.bound_generation,
                current,
            }
            .into());
        }

        let step = self.step_kernels[self.variant.index()];
        self.pipeline.dispatch_id(step, self.settings.frame_steps)?;
        self.pipeline.dispatch(kernels::UPDATE_DIFF, 1)?;

        let (find_max, render) = if self.show_diff {
            (kernels::FIND_MAX_DIFF, kernels::RENDER_IMAGE_DIFF)
        } else {
            (kernels::FIND_MAX1, kernels::RENDER_IMAGE)
        };
        self.pipeline.dispatch(find_max, 1)?;
        self.pipeline.dispatch(kernels::FIND_MAX2, 1)?;
        self.pipeline.dispatch(render, 1)?;

        self.pipeline
            .read_into(names::MAXIMUM, self.maximum.as_mut_slice())
            .await?;
        if self.update_view {
            self.pipeline.read_into(names::IMAGE, &mut self.pixels).await?;
        }
        self.pipeline.flush()?;

        let steps = self.steps_per_frame();
        self.stats.record_frame(started.elapsed(), steps);
        log::debug!(
            "Frame {} ({}): {:.2}ms, {:.3e} steps/s, maxima {:?}",
            self.stats.frame,
            self.variant.kernel_name(),
            self.stats.last_frame_time.as_secs_f64() * 1000.0,
            self.stats.steps_per_second(steps),
            self.maximum.as_slice()
        );
        Ok(())
    }

    fn steps_per_frame(&self) -> u64 {
        self.settings.frame_steps as u64 * self.settings.particle_count as u64
    }

    // ------------------------------------------------------------------
    // View commands
    // ------------------------------------------------------------------

    pub fn set_view(&mut self, scale: f64, center: Point, theta: f64) -> Result<(), GpuError> {
        self.history.set_view(scale, center, theta)?;
        self.apply_view()
    }

    /// Returns false, leaving everything untouched, for a zero-length drag.
    pub fn select_region(&mut self, start: Point, end: Point) -> Result<bool, GpuError> {
        if !self.history.select_region(start, end) {
            return Ok(false);
        }
        self.apply_view()?;
        Ok(true)
    }

    /// [`select_region`](Self::select_region) with window coordinates.
    pub fn select_screen_region(
        &mut self,
        window: &WindowSettings,
        start: Point,
        end: Point,
    ) -> Result<bool, GpuError> {
        self.select_region(window.screen_to_pixel(start), window.screen_to_pixel(end))
    }

    /// Restores the previous view. Returns false when there is nothing to undo.
    pub fn undo_view(&mut self) -> Result<bool, GpuError> {
        if !self.history.pop_view() {
            log::debug!("Undo stack is empty");
            return Ok(false);
        }
        self.apply_view()?;
        Ok(true)
    }

    pub fn pan(&mut self, delta: Point) -> Result<(), GpuError> {
        self.history.pan(delta)?;
        self.apply_view()
    }

    pub fn zoom(&mut self, factor: f64) -> Result<(), GpuError> {
        self.history.zoom(factor)?;
        self.apply_view()
    }

    pub fn rotate(&mut self, delta: f64) -> Result<(), GpuError> {
        self.history.rotate_by(delta)?;
        self.apply_view()
    }

    /// Writes the current view into every step kernel, then resets
    /// accumulation and reseeds all particles.
    fn apply_view(&mut self) -> Result<(), GpuError> {
        let view = self.history.current();
        view.check_consistency()?;
        let uniform = ViewUniform::from(view);
        for &kernel in &self.step_kernels {
            self.pipeline
                .bind_value_id(kernel, STEP_VIEW_SLOT, bytemuck::bytes_of(&uniform))?;
        }
        self.bound_generation = self.history.generation();
        log::debug!(
            "View {}: scale={} center={:?} theta={}",
            self.bound_generation,
            view.scale(),
            view.center(),
            view.theta()
        );
        self.hard_reset()
    }

    // ------------------------------------------------------------------
    // Policy and display commands
    // ------------------------------------------------------------------

    /// Selects the step variant used from the next frame on. Accumulated
    /// counts are kept.
    pub fn set_path_type(&mut self, path: PathPolicy) {
        self.variant.path = path;
        log::info!("Path weighting: {path}");
    }

    pub fn set_score_type(&mut self, score: ScorePolicy) {
        self.variant.score = score;
        log::info!("Scoring: {score}");
    }

    pub fn toggle_diff_mode(&mut self) -> bool {
        self.show_diff = !self.show_diff;
        log::info!("Diff mode {}", if self.show_diff { "on" } else { "off" });
        self.show_diff
    }

    /// Holds or releases the displayed image. Accumulation continues while
    /// held.
    pub fn toggle_update_view(&mut self) -> bool {
        self.update_view = !self.update_view;
        log::info!("View updates {}", if self.update_view { "on" } else { "held" });
        self.update_view
    }

    // ------------------------------------------------------------------
    // Accumulation commands
    // ------------------------------------------------------------------

    /// Zeroes the count, previous-count and diff histograms together with
    /// the device image and its host copy.
    pub fn reset_accumulation(&mut self) -> Result<(), GpuError> {
        for kernel in [
            kernels::RESET_COUNT,
            kernels::RESET_PREV,
            kernels::RESET_DIFF,
            kernels::RESET_IMAGE,
        ] {
            self.pipeline.dispatch(kernel, 1)?;
        }
        self.maximum.as_mut_slice().fill(0);
        self.pixels.fill(0);
        self.stats.record_reset();
        Ok(())
    }

    /// Draws a fresh start point for every particle and clears its progress.
    pub fn reseed_particles(&mut self) -> Result<(), GpuError> {
        self.pipeline.dispatch(kernels::INIT_PARTICLES, 1)
    }

    /// Reset and reseed as one command.
    pub fn hard_reset(&mut self) -> Result<(), GpuError> {
        self.reset_accumulation()?;
        self.reseed_particles()
    }

    /// Uploads fresh host seed pairs and derives the device generator state.
    fn seed_generators(&mut self) -> Result<(), GpuError> {
        let (states, sequences) = self
            .seeds
            .generate(self.settings.particle_count as usize);
        self.pipeline.write(names::INIT_STATE, &states)?;
        self.pipeline.write(names::INIT_SEQ, &sequences)?;
        self.pipeline.dispatch(kernels::SEED_NOISE, 1)?;
        self.pipeline.flush()
    }

    pub fn execute(&mut self, command: Command) -> Result<(), GpuError> {
        log::debug!("Command: {command:?}");
        match command {
            Command::SetView {
                scale,
                center,
                theta,
            } => self.set_view(scale, center, theta)?,
            Command::SelectRegion { start, end } => {
                self.select_region(start, end)?;
            }
            Command::UndoView => {
                self.undo_view()?;
            }
            Command::Pan(delta) => self.pan(delta)?,
            Command::Zoom(factor) => self.zoom(factor)?,
            Command::Rotate(delta) => self.rotate(delta)?,
            Command::SetPathType(path) => self.set_path_type(path),
            Command::SetScoreType(score) => self.set_score_type(score),
            Command::ToggleDiffMode => {
                self.toggle_diff_mode();
            }
            Command::ToggleUpdateView => {
                self.toggle_update_view();
            }
            Command::ResetAccumulation => self.reset_accumulation()?,
            Command::ReseedParticles => self.reseed_particles()?,
            Command::HardReset => self.hard_reset()?,
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Readback
    // ------------------------------------------------------------------

    /// RGB samples from the last frame that read the image back. All zero
    /// after a reset.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn maximum(&self) -> &MaximumSet {
        &self.maximum
    }

    pub fn view(&self) -> &ViewState {
        self.history.current()
    }

    pub fn history(&self) -> &ViewHistory {
        &self.history
    }

    pub fn variant(&self) -> StepVariant {
        self.variant
    }

    pub fn show_diff(&self) -> bool {
        self.show_diff
    }

    pub fn update_view(&self) -> bool {
        self.update_view
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn pipeline(&self) -> &ComputePipeline {
        &self.pipeline
    }

    /// Mutable access for diagnostics reads of arbitrary buffers.
    pub fn pipeline_mut(&mut self) -> &mut ComputePipeline {
        &mut self.pipeline
    }

    /// Current particle records, for overlays and diagnostics.
    pub async fn read_particles(&mut self) -> Result<Vec<Particle>, GpuError> {
        self.pipeline.read(names::PARTICLES).await
    }

    /// Raw count histograms, `[threshold][y][x]` with y pointing up.
    pub async fn read_counts(&mut self) -> Result<Vec<u32>, GpuError> {
        let counts: Vec<u32> = self.pipeline.read(names::COUNT).await?;
        check_histogram_len(&counts, &self.layout)?;
        Ok(counts)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            width: self.settings.width,
            height: self.settings.height,
            pixels: self.pixels.clone(),
            view: *self.history.current(),
            variant: self.variant,
            show_diff: self.show_diff,
            frame: self.stats.frame,
        }
    }

    /// Logs per-kernel dispatch totals.
    pub fn log_dispatch_counts(&self) {
        for (name, count) in self.pipeline.dispatch_counts() {
            if count > 0 {
                log::debug!("  {name}: {count} dispatches");
            }
        }
    }
}

fn check_histogram_len(counts: &[u32], layout: &ChunkLayout) -> Result<(), ConsistencyError> {
    if counts.len() != layout.total_cells() {
        return Err(ConsistencyError::HistogramSize {
            expected: layout.total_cells(),
            actual: counts.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_length_must_cover_every_threshold() {
        let layout = ChunkLayout::new(3, 8, 4, 8).unwrap();
        assert!(check_histogram_len(&[0; 96], &layout).is_ok());
        assert_eq!(
            check_histogram_len(&[0; 64], &layout),
            Err(ConsistencyError::HistogramSize {
                expected: 96,
                actual: 64,
            })
        );
    }
}
