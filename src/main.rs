use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use occupancy_grid::occupancy::{rethreshold, ShapeModel};
use occupancy_grid::request::truncate_prompt;
use occupancy_grid::{OccupancyRequest, OccupancyResult, OccupancyService, ServiceSettings};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(about = "Generate voxel occupancy fields from text prompts", long_about = None)]
struct Cli {
    /// Settings file (defaults to ~/.occupancy-grid/settings.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate an occupancy field and write it to a file
    Generate {
        /// Text prompt describing the object
        prompt: String,

        /// Output file; `.bin` writes the binary encoding, anything else JSON
        #[arg(short, long)]
        output: PathBuf,

        /// Cells per axis (power of 2, 8-256)
        #[arg(short, long)]
        resolution: Option<u32>,

        #[arg(short, long)]
        seed: Option<i64>,

        /// Occupancy threshold on the logits
        #[arg(short, long, default_value_t = 0.0)]
        threshold: f32,

        #[arg(short, long, default_value_t = 3.0)]
        guidance: f32,

        /// One of solid, height, radial, density
        #[arg(long)]
        color_mode: Option<String>,

        /// Base color as R,G,B with channels 0-255
        #[arg(long, value_parser = parse_rgb_color_float)]
        base_color: Option<[f32; 3]>,

        /// Include raw logits in the output
        #[arg(long)]
        include_logits: bool,
    },
    /// Print occupancy and logit statistics for a prompt
    Info {
        prompt: String,

        #[arg(short, long)]
        resolution: Option<u32>,

        #[arg(short, long)]
        seed: Option<i64>,
    },
    /// Write the default settings file
    InitConfig {
        /// Path where the file should be written
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite any existing file at the given path
        #[arg(short, long)]
        force: bool,
    },
}

/// Parses "R,G,B" (0-255 per channel) into a color with channels in [0, 1].
fn parse_rgb_color_float(s: &str) -> Result<[f32; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected R,G,B but got '{}'", s));
    }

    let mut color = [0.0; 3];
    for (channel, part) in color.iter_mut().zip(parts) {
        let value: u8 = part
            .parse()
            .map_err(|_| format!("'{}' is not a channel value in 0-255", part))?;
        *channel = value as f32 / 255.0;
    }

    Ok(color)
}

fn load_settings(path: Option<&Path>) -> Result<ServiceSettings> {
    let mut settings = ServiceSettings::load(path).context("Failed to load settings")?;
    settings
        .apply_env_overrides()
        .context("Invalid settings override in environment")?;
    Ok(settings)
}

fn run_request(settings: ServiceSettings, request: OccupancyRequest) -> Result<OccupancyResult> {
    let model = ShapeModel::procedural(settings.model_version.clone(), &settings.procedural);
    let service = OccupancyService::with_model(settings, model);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start runtime")?;

    let result = runtime.block_on(service.generate(request))?;
    Ok(result)
}

fn write_result(result: &OccupancyResult, output: &Path) -> Result<()> {
    let bytes = match output.extension().and_then(|ext| ext.to_str()) {
        Some("bin") => result.to_bytes(),
        _ => serde_json::to_vec_pretty(result)?,
    };

    fs::write(output, bytes).with_context(|| format!("Failed to write {}", output.display()))
}

fn print_info(prompt: &str, result: &OccupancyResult) -> Result<()> {
    println!("Prompt:     {}", truncate_prompt(prompt, 60));
    println!("Model:      {}", result.metadata.model_version);
    println!(
        "Grid:       {0}x{0}x{0} cells over [{1:?}, {2:?}]",
        result.resolution, result.bbox_min, result.bbox_max
    );
    println!(
        "Occupied:   {} / {} ({:.2}%)",
        result.occupied_count(),
        result.total_cells(),
        result.occupancy_ratio() * 100.0
    );
    println!("Time:       {:.2}s", result.metadata.generation_time_secs);

    let Some(stats) = result.logit_statistics() else {
        bail!("Result carries no logits");
    };

    println!();
    println!("Logits:");
    println!("  min {:.3}  max {:.3}  mean {:.3}", stats.min, stats.max, stats.mean);
    println!(
        "  p25 {:.3}  median {:.3}  p75 {:.3}  p90 {:.3}  p95 {:.3}",
        stats.p25, stats.median, stats.p75, stats.p90, stats.p95
    );

    println!();
    println!("Suggested thresholds:");
    for target in [0.10, 0.25, 0.50] {
        let threshold = stats.suggest_threshold(target);
        let occupied = rethreshold(result, threshold)?.len();
        println!(
            "  {:>3.0}% of volume: {:.3} ({} voxels)",
            target * 100.0,
            threshold,
            occupied
        );
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Generate {
            prompt,
            output,
            resolution,
            seed,
            threshold,
            guidance,
            color_mode,
            base_color,
            include_logits,
        } => {
            let settings = load_settings(cli.config.as_deref())?;

            let mut request = OccupancyRequest::new(prompt)
                .with_threshold(threshold)
                .with_logits(include_logits);
            request.grid_resolution = resolution.unwrap_or(settings.default_resolution);
            request.guidance_scale = guidance;
            request.seed = seed;
            request.color_mode = color_mode;
            request.base_color = base_color;

            let result = run_request(settings, request)?;
            write_result(&result, &output)?;

            println!(
                "Wrote {} voxels ({}^3 grid) to {}",
                result.occupied_count(),
                result.resolution,
                output.display()
            );
            Ok(())
        }
        Command::Info {
            prompt,
            resolution,
            seed,
        } => {
            let settings = load_settings(cli.config.as_deref())?;

            let mut request = OccupancyRequest::new(prompt.clone()).with_logits(true);
            request.grid_resolution = resolution.unwrap_or(settings.default_resolution);
            request.seed = seed;

            let result = run_request(settings, request)?;
            print_info(&prompt, &result)
        }
        Command::InitConfig { output, force } => {
            if !force && output.exists() {
                bail!("File {} already exists", output.display());
            }
            ServiceSettings::default().save(&output)?;
            println!("Wrote default settings to {}", output.display());
            Ok(())
        }
    }
}
