use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use terrain_grabber::acquire::{Acquirer, FixedDelayPacer};
use terrain_grabber::config::{ApiKeys, AppPaths, ProjectPaths};
use terrain_grabber::coords::{self, GeoBoundingBox, SamplePoint};
use terrain_grabber::dataset;
use terrain_grabber::provider::{GoogleElevationProvider, ProviderConfig};
use terrain_grabber::raster::{self, ProductStatus, SynthesisConfig};
use terrain_grabber::sampler;
use terrain_grabber::usage::UsageLedger;

#[derive(Parser, Debug)]
#[command(name = "terrain-grabber")]
#[command(about = "Acquire elevation data for a region and bake raster products from it")]
struct Args {
    /// Project directory (holds Coordinates.csv, Elevation.csv, rasters)
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Application data directory (usage ledger and its archives)
    #[arg(long, default_value = "AppAssets")]
    app_dir: PathBuf,

    /// Dotenv-style file holding API keys
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample the project's bounding box and report the grid (no network)
    Grid {
        /// Spacing between sample points in meters
        #[arg(short, long, default_value = "5.0")]
        spacing: f64,

        /// Optional polygon file (lat,lon per line) to clip sampling to
        #[arg(long)]
        polygon: Option<PathBuf>,
    },

    /// Fetch elevation for the sampled grid and merge it into the dataset
    Acquire {
        /// Spacing between sample points in meters
        #[arg(short, long, default_value = "5.0")]
        spacing: f64,

        /// Optional polygon file (lat,lon per line) to clip sampling to
        #[arg(long)]
        polygon: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Regenerate all raster products from the project dataset
    Synthesize {
        /// Interpolation grid resolution before resampling
        #[arg(long, default_value = "500")]
        grid_resolution: usize,

        /// Number of contour levels
        #[arg(long, default_value = "50")]
        levels: usize,

        /// Contour line thickness in pixels
        #[arg(long, default_value = "1.5")]
        thickness: f64,
    },

    /// Print current-month API usage counts
    Usage,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let paths = ProjectPaths::new(&args.project);
    let app_paths = AppPaths::new(&args.app_dir);

    match args.command {
        Command::Grid { spacing, polygon } => {
            let bbox = load_bbox(&paths)?;
            let points = sample_grid(&bbox, spacing, polygon.as_deref())?;
            let columns = points.iter().filter(|p| p.y_offset_m == 0.0).count();
            println!(
                "{} sample points at {spacing} m spacing ({} columns)",
                points.len(),
                columns
            );
        }

        Command::Acquire { spacing, polygon, yes } => {
            let bbox = load_bbox(&paths)?;
            let points = sample_grid(&bbox, spacing, polygon.as_deref())?;

            let keys = ApiKeys::load(&args.env_file)?;
            let provider =
                GoogleElevationProvider::new(ProviderConfig::default(), keys.google_maps()?)?;
            let mut acquirer = Acquirer::new(provider, FixedDelayPacer::default());

            let plan = acquirer.plan(&points);
            println!(
                "{} requests for {} points will be used.",
                plan.request_count(),
                plan.point_count()
            );
            if !yes && !confirm("Type 'y' to confirm: ")? {
                bail!("request denied");
            }

            let ledger = UsageLedger::new(&app_paths);
            let report = acquirer.execute(&plan, &paths.elevation_csv, &ledger)?;
            println!(
                "Acquired {} points in {} requests ({} batches failed, {} duplicate rows)",
                report.points_received,
                report.requests_issued,
                report.failed_batches,
                report.duplicate_rows
            );

            // Refresh the raster products right away; a missing satellite
            // image just skips them.
            synthesize(&paths, &bbox, &SynthesisConfig::default())?;
        }

        Command::Synthesize {
            grid_resolution,
            levels,
            thickness,
        } => {
            let bbox = load_bbox(&paths)?;
            let config = SynthesisConfig {
                grid_resolution,
                contour_levels: levels,
                contour_thickness: thickness,
            };
            synthesize(&paths, &bbox, &config)?;
        }

        Command::Usage => {
            let ledger = UsageLedger::new(&app_paths);
            let counts = ledger.all()?;
            if counts.is_empty() {
                println!("No API usage recorded this month");
            }
            for (service, count) in &counts {
                println!("{service}: {count}");
            }
        }
    }

    Ok(())
}

fn load_bbox(paths: &ProjectPaths) -> anyhow::Result<GeoBoundingBox> {
    GeoBoundingBox::load(&paths.coordinates).with_context(|| {
        format!(
            "failed to load project coordinates from {}",
            paths.coordinates.display()
        )
    })
}

fn sample_grid(
    bbox: &GeoBoundingBox,
    spacing: f64,
    polygon: Option<&std::path::Path>,
) -> anyhow::Result<Vec<SamplePoint>> {
    let polygon = polygon.map(coords::load_polygon).transpose()?;
    Ok(sampler::generate_grid(bbox, spacing, polygon.as_deref()))
}

fn synthesize(
    paths: &ProjectPaths,
    bbox: &GeoBoundingBox,
    config: &SynthesisConfig,
) -> anyhow::Result<()> {
    if !paths.elevation_csv.exists() {
        bail!(
            "no elevation dataset at {}; run acquire first",
            paths.elevation_csv.display()
        );
    }
    let samples = dataset::read_dataset(&paths.elevation_csv)?;
    let report = raster::synthesize(&samples, bbox, paths, config)?;
    for (name, status) in report.products() {
        match status {
            ProductStatus::Written(path) => println!("{name}: {}", path.display()),
            ProductStatus::Skipped(reason) => println!("{name}: skipped ({reason})"),
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim() == "y")
}
