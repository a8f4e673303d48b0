pub mod assign;
pub mod config;
pub mod crs;
pub mod error;
pub mod grid;
pub mod loader;
pub mod output;
pub mod plot;
pub mod preprocess;
pub mod simulation;

pub use assign::{assign_points, CellAssignment, ObservationPoint, ObservationSet};
pub use config::Config;
pub use crs::{Crs, Reproject};
pub use error::SimError;
pub use grid::{generate_grid, BoundaryPolygon, Grid, GridCell};
pub use preprocess::{clean_points, NoiseFilter};
pub use simulation::{simulate, simulate_with_rng, SimulationResult};
