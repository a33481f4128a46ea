//! Headless Buddhabrot renderer: loads settings, applies scripted view
//! commands, runs a number of frames and writes a PNG snapshot.

use anyhow::{anyhow, bail, Context, Result};
use buddhascope_core::{PathPolicy, Point, ScorePolicy, Settings, Snapshot};
use buddhascope_gpu::{BuddhabrotRenderer, Command, GpuAvailability, GpuContext};
use clap::Parser;
use image::{ImageBuffer, Rgb};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "GPU Buddhabrot accumulator")]
struct Cli {
    /// JSON settings file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Frames to accumulate before writing the snapshot.
    #[arg(long, default_value_t = 60)]
    frames: u32,
    #[arg(long)]
    particles: Option<u32>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    frame_steps: Option<u32>,
    #[arg(long)]
    path: Option<PathPolicy>,
    #[arg(long)]
    score: Option<ScorePolicy>,
    #[arg(long)]
    seed: Option<u64>,
    /// Region drags in raster pixels, `x1,y1,x2,y2`. Applied in order.
    #[arg(long = "select", value_parser = parse_drag)]
    selections: Vec<(Point, Point)>,
    /// Zoom factor applied after any selections.
    #[arg(long)]
    zoom: Option<f64>,
    /// Rotation in radians applied after any selections.
    #[arg(long)]
    rotate: Option<f64>,
    /// Render the smoothed per-frame growth instead of the totals.
    #[arg(long, default_value_t = false)]
    diff: bool,
    /// Use the software fallback adapter.
    #[arg(long, default_value_t = false)]
    fallback: bool,
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
    /// Output PNG. Defaults to a name built from the final view.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Also write the snapshot's view and policies as JSON next to the PNG.
    #[arg(long, default_value_t = false)]
    metadata: bool,
}

fn parse_drag(s: &str) -> Result<(Point, Point), String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid coordinate in '{s}': {e}"))?;
    match values.as_slice() {
        &[x1, y1, x2, y2] => Ok((Point::new(x1, y1), Point::new(x2, y2))),
        _ => Err(format!("expected x1,y1,x2,y2, got '{s}'")),
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(v) = cli.particles {
        settings.particle_count = v;
    }
    if let Some(v) = cli.width {
        settings.width = v;
    }
    if let Some(v) = cli.height {
        settings.height = v;
    }
    if let Some(v) = cli.frame_steps {
        settings.frame_steps = v;
    }
    if let Some(v) = cli.path {
        settings.path_type = v;
    }
    if let Some(v) = cli.score {
        settings.score_type = v;
    }
    if cli.seed.is_some() {
        settings.seed = cli.seed;
    }
    settings.use_gpu &= !cli.fallback;
    settings.verbose |= cli.verbose;
    Ok(settings)
}

fn commands(cli: &Cli) -> Vec<Command> {
    let mut commands: Vec<Command> = cli
        .selections
        .iter()
        .map(|&(start, end)| Command::SelectRegion { start, end })
        .collect();
    if let Some(factor) = cli.zoom {
        commands.push(Command::Zoom(factor));
    }
    if let Some(delta) = cli.rotate {
        commands.push(Command::Rotate(delta));
    }
    if cli.diff {
        commands.push(Command::ToggleDiffMode);
    }
    commands
}

fn write_snapshot(snapshot: &Snapshot, path: &Path, metadata: bool) -> Result<()> {
    let (width, height) = (snapshot.width, snapshot.height);
    let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(width, height, snapshot.to_rgb8())
        .ok_or_else(|| anyhow!("snapshot buffer does not match {width}x{height}"))?;
    img.save(path)
        .with_context(|| format!("failed to save {}", path.display()))?;
    log::info!("Saved {} ({}x{})", path.display(), snapshot.width, snapshot.height);

    if metadata {
        let json_path = path.with_extension("json");
        let json = snapshot.metadata_json()?;
        std::fs::write(&json_path, json)
            .with_context(|| format!("failed to write {}", json_path.display()))?;
    }
    Ok(())
}

fn run(cli: Cli, settings: Settings) -> Result<()> {
    settings.validate().context("invalid settings")?;

    let context = match pollster::block_on(GpuContext::try_init_with(!settings.use_gpu)) {
        GpuAvailability::Available(context) => context,
        GpuAvailability::Unavailable(reason) => bail!("no usable GPU adapter: {reason}"),
    };
    let mut renderer = pollster::block_on(BuddhabrotRenderer::new(context, settings))
        .context("failed to set up renderer")?;

    for command in commands(&cli) {
        renderer
            .execute(command)
            .with_context(|| format!("command {command:?} failed"))?;
    }

    let started = Instant::now();
    let progress_every = (cli.frames / 10).max(1);
    for frame in 1..=cli.frames {
        pollster::block_on(renderer.render_frame())
            .with_context(|| format!("frame {frame} failed"))?;
        if frame % progress_every == 0 {
            log::info!(
                "Frame {frame}/{}: maxima {:?}",
                cli.frames,
                renderer.maximum().as_slice()
            );
        }
    }
    let stats = renderer.stats();
    log::info!(
        "{} frames, {} particle steps in {:.2}s",
        stats.frame,
        stats.total_particle_steps,
        started.elapsed().as_secs_f64()
    );
    renderer.log_dispatch_counts();

    let snapshot = renderer.snapshot();
    let path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(snapshot.file_name("png")));
    write_snapshot(&snapshot, &path, cli.metadata)
}

fn main() {
    let cli = Cli::parse();
    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(2);
        }
    };

    let default_filter = if settings.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli, settings) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
