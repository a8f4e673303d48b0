//! Persistence of enriched grids and tabular summaries.

use std::fs;
use std::path::Path;

use geojson::{Feature, FeatureCollection, GeoJson};
use tracing::info;

use crate::assign::{CellAssignment, ObservationSet};
use crate::error::SimError;
use crate::grid::Grid;
use crate::simulation::SimulationResult;

/// Builds the GeoJSON representation of a grid, with `cell_index` and
/// (when counts are supplied) `measure_count` properties per cell.
pub fn grid_feature_collection(grid: &Grid, counts: Option<&CellAssignment>) -> GeoJson {
    let features = grid
        .cells()
        .iter()
        .map(|cell| {
            let mut properties = geojson::JsonObject::new();
            properties.insert("cell_index".into(), serde_json::Value::from(cell.index as u64));
            if let Some(counts) = counts {
                properties.insert(
                    "measure_count".into(),
                    serde_json::Value::from(counts.count(cell.index)),
                );
            }
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&cell.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    GeoJson::from(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

pub fn write_grid_geojson(
    grid: &Grid,
    counts: Option<&CellAssignment>,
    path: impl AsRef<Path>,
) -> Result<(), SimError> {
    fs::write(&path, grid_feature_collection(grid, counts).to_string())?;
    info!(path = %path.as_ref().display(), cells = grid.len(), "wrote grid GeoJSON");
    Ok(())
}

pub fn write_points_geojson(
    points: &ObservationSet,
    path: impl AsRef<Path>,
) -> Result<(), SimError> {
    let features = points
        .points()
        .iter()
        .map(|point| {
            let mut properties = geojson::JsonObject::new();
            properties.insert(
                "noise_level".into(),
                serde_json::Value::from(point.noise_level),
            );
            if let Some(accuracy) = point.accuracy {
                properties.insert("accuracy".into(), serde_json::Value::from(accuracy));
            }
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&point.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    let collection = GeoJson::from(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });
    fs::write(&path, collection.to_string())?;
    info!(path = %path.as_ref().display(), points = points.len(), "wrote points GeoJSON");
    Ok(())
}

/// `cell_index,measure_count` rows, one per grid cell.
pub fn write_grid_summary_csv(
    counts: &CellAssignment,
    path: impl AsRef<Path>,
) -> Result<(), SimError> {
    let mut out = String::from("cell_index,measure_count\n");
    for (index, count) in counts.counts().iter().enumerate() {
        out.push_str(&format!("{index},{count}\n"));
    }
    fs::write(&path, out)?;
    info!(path = %path.as_ref().display(), "wrote grid summary CSV");
    Ok(())
}

/// Per-cell simulation series, one row per grid cell.
pub fn write_simulation_csv(
    result: &SimulationResult,
    path: impl AsRef<Path>,
) -> Result<(), SimError> {
    let mut out = String::from("cell_index,initial_count,new_submissions,final_count\n");
    for index in 0..result.initial_counts.len() {
        out.push_str(&format!(
            "{},{},{},{}\n",
            index,
            result.initial_counts[index],
            result.new_submissions[index],
            result.final_counts[index]
        ));
    }
    fs::write(&path, out)?;
    info!(
        path = %path.as_ref().display(),
        total_payout = result.total_payout,
        "wrote simulation CSV"
    );
    Ok(())
}
