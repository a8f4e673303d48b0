use thiserror::Error;

use crate::crs::Crs;

/// Crate-wide error taxonomy.
///
/// Core failures (`InvalidGeometry`, `InvalidParameter`, `CrsMismatch`,
/// `EmptyGrid`) are raised synchronously at the point of violation and are
/// never retried internally. The remaining variants wrap collaborator
/// failures from file I/O, GeoJSON parsing, YAML config, and plotting.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("CRS mismatch: inputs are tagged {left} and {right}")]
    CrsMismatch { left: Crs, right: Crs },

    #[error("simulation requested against an empty grid")]
    EmptyGrid,

    #[error("plot rendering failed: {0}")]
    Render(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    GeoJson(#[from] geojson::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
