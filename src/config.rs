//! Toolkit configuration loaded from YAML.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::error::SimError;
use crate::preprocess::NoiseFilter;

/// Full pipeline configuration. Every section has defaults, so a partial
/// (or empty) YAML file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_boundary_path")]
    pub boundary: PathBuf,
    #[serde(default = "default_points_path")]
    pub points: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Cell side length in metres of `metric_epsg`.
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,
    /// Projected CRS the grid is constructed in. UTM zone 32N suits
    /// Bavarian study areas.
    #[serde(default = "default_metric_epsg")]
    pub metric_epsg: u32,
    /// CRS the generated cells are emitted in.
    #[serde(default = "default_output_epsg")]
    pub output_epsg: u32,
}

impl GridConfig {
    pub fn metric_crs(&self) -> Crs {
        Crs::from_epsg(self.metric_epsg)
    }

    pub fn output_crs(&self) -> Crs {
        Crs::from_epsg(self.output_epsg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_min_db")]
    pub min_db: f64,
    #[serde(default = "default_max_db")]
    pub max_db: f64,
    #[serde(default = "default_max_accuracy")]
    pub max_accuracy: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_num_users")]
    pub num_users: u32,
    #[serde(default = "default_reward")]
    pub reward_per_submission: f64,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

fn default_boundary_path() -> PathBuf {
    PathBuf::from("data/raw/boundary.geojson")
}

fn default_points_path() -> PathBuf {
    PathBuf::from("data/raw/points.geojson")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_cell_size() -> f64 {
    100.0
}

fn default_metric_epsg() -> u32 {
    25832
}

fn default_output_epsg() -> u32 {
    4326
}

fn default_min_db() -> f64 {
    30.0
}

fn default_max_db() -> f64 {
    120.0
}

fn default_max_accuracy() -> Option<f64> {
    Some(15.0)
}

fn default_num_users() -> u32 {
    500
}

fn default_reward() -> f64 {
    1.0
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            boundary: default_boundary_path(),
            points: default_points_path(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            metric_epsg: default_metric_epsg(),
            output_epsg: default_output_epsg(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_db: default_min_db(),
            max_db: default_max_db(),
            max_accuracy: default_max_accuracy(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_users: default_num_users(),
            reward_per_submission: default_reward(),
            random_seed: None,
        }
    }
}

impl From<&FilterConfig> for NoiseFilter {
    fn from(config: &FilterConfig) -> Self {
        Self {
            min_db: config.min_db,
            max_db: config.max_db,
            max_accuracy: config.max_accuracy,
        }
    }
}

impl Config {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_study_settings() {
        let config = Config::default();
        assert_eq!(config.grid.cell_size, 100.0);
        assert_eq!(config.grid.metric_epsg, 25832);
        assert_eq!(config.grid.output_epsg, 4326);
        assert_eq!(config.simulation.num_users, 500);
        assert_eq!(config.simulation.reward_per_submission, 1.0);
        assert_eq!(config.simulation.random_seed, None);
        assert_eq!(config.filter.max_accuracy, Some(15.0));
        assert!(config.grid.metric_crs().is_projected());
        assert!(config.grid.output_crs().is_geographic());
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let config: Config =
            serde_yaml::from_str("grid:\n  cell_size: 250.0\nsimulation:\n  random_seed: 42\n")
                .unwrap();
        assert_eq!(config.grid.cell_size, 250.0);
        assert_eq!(config.grid.metric_epsg, 25832);
        assert_eq!(config.simulation.random_seed, Some(42));
        assert_eq!(config.simulation.num_users, 500);
    }

    #[test]
    fn yaml_round_trip() {
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let temp_file = dir.path().join("config.yaml");
        config.to_yaml(&temp_file).unwrap();

        let loaded = Config::from_yaml(&temp_file).unwrap();
        assert_eq!(loaded.grid.cell_size, config.grid.cell_size);
        assert_eq!(loaded.simulation.num_users, config.simulation.num_users);
    }
}
