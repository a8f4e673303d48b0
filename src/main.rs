use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use noisegrid::{
    assign_points, clean_points, generate_grid, loader, output, plot, simulate, Config, Crs,
    NoiseFilter, Reproject,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Noise-sensing grid and incentive simulation toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a square grid clipped to a city boundary.
    MakeGrid {
        /// Boundary GeoJSON (WGS84)
        #[arg(long, short = 'b')]
        boundary: PathBuf,
        /// Output path for the grid GeoJSON
        #[arg(long, short = 'o')]
        output: PathBuf,
        /// Cell side length in metres
        #[arg(long, short = 's', default_value_t = 100.0)]
        cell_size: f64,
        /// EPSG code of the metric CRS the grid is built in
        #[arg(long, default_value_t = 25832)]
        metric_epsg: u32,
        /// EPSG code the grid is written in
        #[arg(long, default_value_t = 4326)]
        output_epsg: u32,
    },
    /// Clean raw noise points by dB range and GPS accuracy.
    CleanPoints {
        /// Raw points GeoJSON
        #[arg(long, short = 'i')]
        input: PathBuf,
        /// Output path for cleaned points
        #[arg(long, short = 'o')]
        output: PathBuf,
        /// Minimum noise level (dB)
        #[arg(long, default_value_t = 30.0)]
        min_db: f64,
        /// Maximum noise level (dB)
        #[arg(long, default_value_t = 120.0)]
        max_db: f64,
        /// Maximum GPS accuracy (m); omit to disable the accuracy filter
        #[arg(long)]
        max_accuracy: Option<f64>,
    },
    /// Count cleaned points per grid cell.
    Assign {
        /// Cleaned points GeoJSON
        #[arg(long, short = 'p')]
        points: PathBuf,
        /// Grid GeoJSON
        #[arg(long, short = 'g')]
        grid: PathBuf,
        /// Updated grid GeoJSON with measure_count
        #[arg(long, short = 'o')]
        output: PathBuf,
        /// CSV summary of counts per cell
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Run the static incentive simulation against an enriched grid.
    Simulate {
        /// Grid GeoJSON carrying measure_count (from `assign`)
        #[arg(long, short = 'g')]
        grid: PathBuf,
        /// Number of synthetic participants
        #[arg(long, default_value_t = 500)]
        num_users: u32,
        /// Flat reward per submission
        #[arg(long, default_value_t = 1.0)]
        reward: f64,
        /// Seed for reproducible draws
        #[arg(long)]
        seed: Option<u64>,
        /// Output CSV with per-cell series
        #[arg(long, short = 'o')]
        output: PathBuf,
        /// Optional bar-chart PNG of new submissions
        #[arg(long)]
        chart: Option<PathBuf>,
    },
    /// Run the full pipeline from a YAML config.
    Run {
        #[arg(long, short = 'c', default_value = "noisegrid.yaml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match Cli::parse().command {
        Command::MakeGrid {
            boundary,
            output,
            cell_size,
            metric_epsg,
            output_epsg,
        } => {
            let boundary = loader::load_boundary(&boundary)
                .with_context(|| format!("failed to load boundary {}", boundary.display()))?;
            let grid = generate_grid(
                &boundary,
                cell_size,
                &Crs::from_epsg(metric_epsg),
                &Crs::from_epsg(output_epsg),
            )?;
            output::write_grid_geojson(&grid, None, &output)?;
        }
        Command::CleanPoints {
            input,
            output,
            min_db,
            max_db,
            max_accuracy,
        } => {
            let raw = loader::load_points(&input)
                .with_context(|| format!("failed to load points {}", input.display()))?;
            let filter = NoiseFilter {
                min_db,
                max_db,
                max_accuracy,
            };
            let cleaned = clean_points(&raw, &filter);
            output::write_points_geojson(&cleaned, &output)?;
        }
        Command::Assign {
            points,
            grid,
            output: output_path,
            summary,
        } => {
            let points = loader::load_points(&points)?;
            let (grid, _) = loader::load_grid(&grid)?;
            let assignment = assign_points(&points, &grid)?;
            output::write_grid_geojson(&grid, Some(&assignment), &output_path)?;
            if let Some(summary) = summary {
                output::write_grid_summary_csv(&assignment, &summary)?;
            }
        }
        Command::Simulate {
            grid,
            num_users,
            reward,
            seed,
            output: output_path,
            chart,
        } => {
            let (grid, counts) = loader::load_grid(&grid)?;
            let baseline = counts.unwrap_or_else(|| {
                warn!("grid file carries no measure_count; simulating from a zero baseline");
                noisegrid::CellAssignment::zeros(grid.len())
            });
            let result = simulate(&baseline, num_users, reward, seed)?;
            info!(total_payout = result.total_payout, "simulation finished");
            output::write_simulation_csv(&result, &output_path)?;
            if let Some(chart) = chart {
                plot::plot_new_submissions(&result, &chart)?;
            }
        }
        Command::Run { config } => run_pipeline(&config)?,
    }
    Ok(())
}

/// Full pipeline: load, clean, grid, assign, simulate, persist, plot.
fn run_pipeline(config_path: &PathBuf) -> Result<()> {
    let config = Config::from_yaml(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    std::fs::create_dir_all(&config.paths.output_dir)?;

    let boundary = loader::load_boundary(&config.paths.boundary)?;
    let raw_points = loader::load_points(&config.paths.points)?;
    let cleaned = clean_points(&raw_points, &NoiseFilter::from(&config.filter));

    let grid = generate_grid(
        &boundary,
        config.grid.cell_size,
        &config.grid.metric_crs(),
        &config.grid.output_crs(),
    )?;
    let points = cleaned.reproject(grid.crs())?;
    let assignment = assign_points(&points, &grid)?;

    let out = &config.paths.output_dir;
    output::write_points_geojson(&cleaned, out.join("cleaned_points.geojson"))?;
    output::write_grid_geojson(&grid, Some(&assignment), out.join("grid.geojson"))?;
    output::write_grid_summary_csv(&assignment, out.join("grid_summary.csv"))?;
    plot::plot_coverage(&grid, &assignment, out.join("coverage.png"))?;

    let result = simulate(
        &assignment,
        config.simulation.num_users,
        config.simulation.reward_per_submission,
        config.simulation.random_seed,
    )?;
    info!(
        total_payout = result.total_payout,
        "static incentive simulation finished"
    );
    output::write_simulation_csv(&result, out.join("simulation.csv"))?;
    plot::plot_new_submissions(&result, out.join("new_submissions.png"))?;
    Ok(())
}
