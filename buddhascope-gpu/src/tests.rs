//! GPU renderer tests. Each test skips when no adapter is available.

use crate::{kernels, names, BuddhabrotRenderer, Command, GpuAvailability, GpuContext};
use buddhascope_core::{
    diff, fractal_to_pixel, Particle, PathPolicy, Point, ScorePolicy, Settings, StepVariant,
    ThresholdSet, ViewState, WindowSettings, COUNT_CEILING,
};

/// Small raster and particle count so a frame finishes quickly on any
/// adapter, including the software fallback.
fn small_settings() -> Settings {
    Settings {
        particle_count: 256,
        thresholds: ThresholdSet::new(vec![8, 16, 32]).unwrap(),
        width: 64,
        height: 48,
        maximum_size: 32,
        frame_steps: 64,
        seed: Some(7),
        ..Settings::default()
    }
}

async fn renderer() -> Option<BuddhabrotRenderer> {
    renderer_with(small_settings()).await
}

async fn renderer_with(settings: Settings) -> Option<BuddhabrotRenderer> {
    let GpuAvailability::Available(ctx) = GpuContext::try_init().await else {
        println!("Skipping test: no GPU available");
        return None;
    };
    Some(BuddhabrotRenderer::new(ctx, settings).await.unwrap())
}

/// One particle with short thresholds, viewed wide enough that every
/// bounded orbit lands inside the raster.
async fn single_particle_renderer() -> Option<BuddhabrotRenderer> {
    let settings = Settings {
        particle_count: 1,
        thresholds: ThresholdSet::new(vec![4, 8, 16]).unwrap(),
        escape_bound: 16.0,
        ..small_settings()
    };
    let mut renderer = renderer_with(settings).await?;
    renderer.set_view(2.5, Point::new(0.0, 0.0), 0.0).unwrap();
    Some(renderer)
}

fn start_at(renderer: &mut BuddhabrotRenderer, c: [f32; 2]) {
    let particle = Particle {
        position: c,
        ..Default::default()
    };
    renderer
        .pipeline_mut()
        .write(names::PARTICLES, &[particle])
        .unwrap();
}

/// Histogram one particle starting at `c` leaves after running to the
/// largest threshold or escaping, computed on the host.
fn expected_counts(
    c: [f32; 2],
    variant: StepVariant,
    settings: &Settings,
    view: &ViewState,
) -> Vec<u32> {
    let thresholds = &settings.thresholds;
    let (width, height) = (settings.width as usize, settings.height as usize);
    let cells = width * height;
    let mut counts = vec![0u32; thresholds.count() * cells];
    let mut path: Vec<[f32; 2]> = Vec::new();
    let mut z = [0.0f32; 2];

    while path.len() < thresholds.max() as usize {
        z = [z[0] * z[0] - z[1] * z[1] + c[0], 2.0 * z[0] * z[1] + c[1]];
        path.push(z);
        let iteration = path.len() as u32;
        let score = z[0] * z[0] + z[1] * z[1];
        if let Some(bucket) = thresholds.bucket_of(iteration) {
            let start = thresholds.previous(bucket);
            let len = iteration - start;
            for (k, p) in path[start as usize..].iter().enumerate() {
                let pixel = fractal_to_pixel(Point::new(p[0] as f64, p[1] as f64), view);
                let (x, y) = (pixel.x.floor(), pixel.y.floor());
                if x < 0.0 || y < 0.0 || x >= width as f64 || y >= height as f64 {
                    continue;
                }
                let cell = bucket * cells + y as usize * width + x as usize;
                counts[cell] += variant.sample_amount(k as u32, len, score, settings.escape_bound);
            }
        }
        if !(score <= settings.escape_bound) {
            break;
        }
    }
    counts
}

fn threshold_tint(t: usize, count: usize) -> [f32; 3] {
    if count <= 1 {
        return [1.0; 3];
    }
    let f = t as f32 / (count - 1) as f32;
    [f, 1.0 - (2.0 * f - 1.0).abs(), 1.0 - f]
}

#[test]
fn gpu_init_does_not_panic() {
    pollster::block_on(async {
        match GpuContext::try_init().await {
            GpuAvailability::Available(_) => println!("GPU available"),
            GpuAvailability::Unavailable(reason) => println!("GPU unavailable: {reason}"),
        }
    });
}

#[test]
fn frames_accumulate_into_first_threshold() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        for _ in 0..4 {
            renderer.render_frame().await.unwrap();
        }

        assert_eq!(renderer.pixels().len(), 3 * 64 * 48);
        assert_eq!(renderer.maximum().as_slice().len(), 3);
        assert!(renderer.maximum().get(0) > 0);
        assert!(renderer.pixels().iter().any(|&v| v > 0));
        assert!(renderer.pixels().iter().all(|&v| v <= 255));
        assert_eq!(renderer.stats().frame, 4);
        assert_eq!(renderer.stats().accumulated_particle_steps, 4 * 64 * 256);
    });
}

#[test]
fn gpu_reduction_matches_cpu() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        for _ in 0..3 {
            renderer.render_frame().await.unwrap();
        }

        let counts = renderer.read_counts().await.unwrap();
        let expected = renderer.layout().find_max(&counts);
        assert_eq!(renderer.maximum(), &expected);
    });
}

#[test]
fn diff_reduction_reads_diff_buffer() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        assert!(renderer.toggle_diff_mode());
        for _ in 0..3 {
            renderer.render_frame().await.unwrap();
        }

        let diff: Vec<u32> = renderer
            .pipeline_mut()
            .read(names::COUNT_DIFF)
            .await
            .unwrap();
        let expected = renderer.layout().find_max(&diff);
        assert_eq!(renderer.maximum(), &expected);
        assert!(!expected.is_blank());
    });
}

#[test]
fn reset_twice_clears_histograms_and_keeps_view() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        renderer.render_frame().await.unwrap();
        let view = *renderer.view();
        let depth = renderer.history().depth();

        renderer.reset_accumulation().unwrap();
        renderer.execute(Command::ResetAccumulation).unwrap();

        let counts = renderer.read_counts().await.unwrap();
        assert!(counts.iter().all(|&c| c == 0));
        let previous: Vec<u32> = renderer
            .pipeline_mut()
            .read(names::PREV_COUNT)
            .await
            .unwrap();
        assert!(previous.iter().all(|&c| c == 0));
        assert!(renderer.maximum().is_blank());
        assert_eq!(renderer.view(), &view);
        assert_eq!(renderer.history().depth(), depth);
    });
}

#[test]
fn view_change_resets_accumulation() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        renderer.render_frame().await.unwrap();
        assert!(renderer.read_counts().await.unwrap().iter().any(|&c| c > 0));

        renderer.zoom(2.0).unwrap();

        assert!(renderer.read_counts().await.unwrap().iter().all(|&c| c == 0));
        let particles = renderer.read_particles().await.unwrap();
        assert!(particles.iter().all(|p| p.iteration_count == 0));
        assert_eq!(renderer.stats().accumulated_particle_steps, 0);
    });
}

#[test]
fn far_view_records_nothing() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        renderer
            .set_view(0.01, Point::new(50.0, 50.0), 0.0)
            .unwrap();
        for _ in 0..3 {
            renderer.render_frame().await.unwrap();
        }

        assert!(renderer.maximum().is_blank());
        assert!(renderer.pixels().iter().all(|&v| v == 0));
    });
}

#[test]
fn held_view_keeps_last_image() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        assert!(!renderer.toggle_update_view());
        for _ in 0..2 {
            renderer.render_frame().await.unwrap();
        }

        assert!(renderer.pixels().iter().all(|&v| v == 0));
        assert!(renderer.maximum().get(0) > 0);

        renderer.execute(Command::ToggleUpdateView).unwrap();
        renderer.render_frame().await.unwrap();
        assert!(renderer.pixels().iter().any(|&v| v > 0));
    });
}

#[test]
fn particles_stay_within_lifecycle_bounds() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        let fresh = renderer.read_particles().await.unwrap();
        assert_eq!(fresh.len(), 256);
        for p in &fresh {
            assert!(p.position[0].abs() <= 2.0 && p.position[1].abs() <= 2.0);
            assert_eq!(p.offset, [0.0, 0.0]);
            assert_eq!(p.iteration_count, 0);
        }

        renderer.render_frame().await.unwrap();
        let stepped = renderer.read_particles().await.unwrap();
        assert!(stepped.iter().all(|p| p.iteration_count < 32));
        assert!(stepped.iter().all(|p| p.best_iteration_count <= 32));
        assert!(stepped.iter().any(|p| p.best_iteration_count > 0));
    });
}

#[test]
fn undo_restores_previous_view() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        assert!(!renderer.undo_view().unwrap());

        let initial = *renderer.view();
        renderer.rotate(0.5).unwrap();
        renderer.pan(Point::new(4.0, -2.0)).unwrap();
        assert_eq!(renderer.history().depth(), 2);

        assert!(renderer.undo_view().unwrap());
        assert!(renderer.undo_view().unwrap());
        assert_eq!(renderer.view(), &initial);
        renderer.render_frame().await.unwrap();
    });
}

#[test]
fn screen_selection_goes_through_window_mapping() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        let mut window = WindowSettings::new(64, 48);
        window.resize(128, 96);

        // Screen (0, 96) is the bottom-left raster corner.
        let selected = renderer
            .select_screen_region(&window, Point::new(0.0, 96.0), Point::new(64.0, 96.0))
            .unwrap();
        assert!(selected);
        assert!(renderer.view().theta().abs() < 1e-9);

        let degenerate = renderer
            .select_screen_region(&window, Point::new(10.0, 10.0), Point::new(10.0, 10.0))
            .unwrap();
        assert!(!degenerate);
        assert_eq!(renderer.history().depth(), 1);
    });
}

#[test]
fn policy_switch_selects_other_variant() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        renderer
            .execute(Command::SetPathType(buddhascope_core::PathPolicy::Linear))
            .unwrap();
        renderer
            .execute(Command::SetScoreType(buddhascope_core::ScorePolicy::SqNorm))
            .unwrap();
        renderer.render_frame().await.unwrap();

        let counts = renderer.pipeline().dispatch_counts();
        let steps = |name: &str| counts.iter().find(|(n, _)| *n == name).unwrap().1;
        assert_eq!(steps("mandel_step_linear_sqnorm"), 64);
        assert_eq!(steps("mandel_step_constant_none"), 0);

        let snapshot = renderer.snapshot();
        assert!(snapshot.file_name("png").ends_with("_linear_sqnorm.png"));
    });
}

#[test]
fn view_change_clears_displayed_image() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        for _ in 0..2 {
            renderer.render_frame().await.unwrap();
        }
        assert!(renderer.snapshot().pixels.iter().any(|&v| v > 0));

        renderer
            .set_view(0.8, Point::new(-0.2, 0.1), 0.3)
            .unwrap();

        assert!(renderer.snapshot().pixels.iter().all(|&v| v == 0));
        let image: Vec<u32> = renderer.pipeline_mut().read(names::IMAGE).await.unwrap();
        assert_eq!(image.len(), 3 * 64 * 48);
        assert!(image.iter().all(|&v| v == 0));
    });
}

#[test]
fn diff_average_tracks_growth_and_decays() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        let alpha = renderer.settings().alpha;
        let total = renderer.layout().total_cells();
        let read_average = |bits: Vec<u32>| -> Vec<f32> {
            bits.into_iter().map(diff::average_from_bits).collect()
        };
        let close = |actual: f32, expected: f32| {
            (actual - expected).abs() <= expected.abs() * 1e-4 + 1e-7
        };

        renderer
            .pipeline_mut()
            .write(names::COUNT, &vec![5u32; total])
            .unwrap();
        renderer.pipeline_mut().dispatch(kernels::UPDATE_DIFF, 1).unwrap();
        let mut expected = diff::moving_average(0.0, 5.0, alpha);
        let first = read_average(renderer.pipeline_mut().read(names::COUNT_DIFF).await.unwrap());
        assert!(first.iter().all(|&v| close(v, expected)), "{:?}", &first[..4]);

        // No growth: the average decays instead of holding its value.
        renderer.pipeline_mut().dispatch(kernels::UPDATE_DIFF, 30).unwrap();
        for _ in 0..30 {
            expected = diff::moving_average(expected, 0.0, alpha);
        }
        let decayed = read_average(renderer.pipeline_mut().read(names::COUNT_DIFF).await.unwrap());
        assert!(decayed.iter().all(|&v| close(v, expected)), "{:?}", &decayed[..4]);
        assert!(decayed[0] < first[0] * 0.5);
        let previous: Vec<u32> = renderer
            .pipeline_mut()
            .read(names::PREV_COUNT)
            .await
            .unwrap();
        assert!(previous.iter().all(|&c| c == 5));

        renderer
            .pipeline_mut()
            .write(names::COUNT, &vec![8u32; total])
            .unwrap();
        renderer.pipeline_mut().dispatch(kernels::UPDATE_DIFF, 1).unwrap();
        expected = diff::moving_average(expected, 3.0, alpha);
        let grown = read_average(renderer.pipeline_mut().read(names::COUNT_DIFF).await.unwrap());
        assert!(grown.iter().all(|&v| close(v, expected)), "{:?}", &grown[..4]);

        // Uniform averages normalize to 1 in every threshold.
        for kernel in [
            kernels::FIND_MAX_DIFF,
            kernels::FIND_MAX2,
            kernels::RENDER_IMAGE_DIFF,
        ] {
            renderer.pipeline_mut().dispatch(kernel, 1).unwrap();
        }
        let maximum: Vec<u32> = renderer.pipeline_mut().read(names::MAXIMUM).await.unwrap();
        assert!(maximum
            .iter()
            .all(|&bits| close(diff::average_from_bits(bits), expected)));
        let image: Vec<u32> = renderer.pipeline_mut().read(names::IMAGE).await.unwrap();
        assert!(image.iter().all(|&v| v == 255));
    });
}

#[test]
fn bounded_particle_records_each_segment_with_variant_weights() {
    pollster::block_on(async {
        let Some(mut renderer) = single_particle_renderer().await else {
            return;
        };
        // c = -2 cycles -2, 2, 2, ... with |z|^2 = 4 exactly.
        let c = [-2.0, 0.0];
        let variants = [
            StepVariant::new(PathPolicy::Constant, ScorePolicy::None),
            StepVariant::new(PathPolicy::Linear, ScorePolicy::Sqrt),
            StepVariant::new(PathPolicy::Square, ScorePolicy::Square),
        ];
        for variant in variants {
            renderer.reset_accumulation().unwrap();
            start_at(&mut renderer, c);
            renderer
                .pipeline_mut()
                .dispatch(&variant.kernel_name(), 16)
                .unwrap();

            let counts = renderer.read_counts().await.unwrap();
            let expected = expected_counts(c, variant, renderer.settings(), renderer.view());
            assert_eq!(counts, expected, "{}", variant.kernel_name());
            assert!(expected.iter().any(|&v| v > 0));

            let particle = renderer.read_particles().await.unwrap()[0];
            assert_eq!(particle.best_iteration_count, 16);
            assert_eq!(particle.iteration_count, 0);
            assert_eq!(particle.offset, [0.0, 0.0]);
        }

        // Render the last histogram and compare against host normalization.
        let counts = renderer.read_counts().await.unwrap();
        for kernel in [kernels::FIND_MAX1, kernels::FIND_MAX2, kernels::RENDER_IMAGE] {
            renderer.pipeline_mut().dispatch(kernel, 1).unwrap();
        }
        let maximum = renderer.layout().find_max(&counts);
        let image: Vec<u32> = renderer.pipeline_mut().read(names::IMAGE).await.unwrap();
        let (width, height) = (64usize, 48usize);
        let cells = width * height;
        for y in 0..height {
            for x in 0..width {
                let mut color = [0.0f32; 3];
                for t in 0..3 {
                    let value = maximum.normalize(t, counts[t * cells + y * width + x]).sqrt();
                    let tint = threshold_tint(t, 3);
                    for (channel, weight) in color.iter_mut().zip(tint) {
                        *channel += value * weight;
                    }
                }
                let base = 3 * ((height - 1 - y) * width + x);
                for (offset, &channel) in color.iter().enumerate() {
                    let expected = (channel.clamp(0.0, 1.0) * 255.0).round() as i64;
                    let actual = image[base + offset] as i64;
                    assert!((actual - expected).abs() <= 1, "({x}, {y}): {actual} vs {expected}");
                }
            }
        }
    });
}

#[test]
fn escaping_particle_reseeds_without_recording() {
    pollster::block_on(async {
        let Some(mut renderer) = single_particle_renderer().await else {
            return;
        };
        // |z2|^2 = 38.25 passes the bound before the first threshold.
        let c = [1.5, 1.5];
        let variant = renderer.variant();
        start_at(&mut renderer, c);
        renderer
            .pipeline_mut()
            .dispatch(&variant.kernel_name(), 2)
            .unwrap();

        let particle = renderer.read_particles().await.unwrap()[0];
        assert_eq!(particle.iteration_count, 0);
        assert_eq!(particle.best_iteration_count, 2);
        assert_eq!(particle.offset, [0.0, 0.0]);
        let counts = renderer.read_counts().await.unwrap();
        assert!(counts.iter().all(|&v| v == 0));
        assert_eq!(
            counts,
            expected_counts(c, variant, renderer.settings(), renderer.view())
        );
    });
}

#[test]
fn saturated_cells_stop_at_count_ceiling() {
    pollster::block_on(async {
        let Some(mut renderer) = single_particle_renderer().await else {
            return;
        };
        let total = renderer.layout().total_cells();
        let near_full = u32::MAX - 3;
        renderer
            .pipeline_mut()
            .write(names::COUNT, &vec![near_full; total])
            .unwrap();
        start_at(&mut renderer, [-2.0, 0.0]);
        let variant = renderer.variant();
        renderer
            .pipeline_mut()
            .dispatch(&variant.kernel_name(), 4)
            .unwrap();

        let counts = renderer.read_counts().await.unwrap();
        let hit = counts.iter().filter(|&&v| v == COUNT_CEILING).count();
        assert_eq!(hit, 2);
        assert!(counts
            .iter()
            .all(|&v| v == near_full || v == COUNT_CEILING));
    });
}

#[test]
fn rejected_view_keeps_bound_view_and_counts() {
    pollster::block_on(async {
        let Some(mut renderer) = renderer().await else {
            return;
        };
        renderer.render_frame().await.unwrap();
        let view = *renderer.view();
        let generation = renderer.history().generation();

        assert!(renderer.zoom(f64::NAN).is_err());
        assert!(renderer.zoom(0.0).is_err());
        assert!(renderer
            .set_view(-1.0, Point::new(0.0, 0.0), 0.0)
            .is_err());
        assert!(renderer.execute(Command::Rotate(f64::INFINITY)).is_err());

        assert_eq!(renderer.view(), &view);
        assert_eq!(renderer.history().generation(), generation);
        assert!(renderer.read_counts().await.unwrap().iter().any(|&c| c > 0));
        renderer.render_frame().await.unwrap();
    });
}
