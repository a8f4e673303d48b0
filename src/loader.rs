//! GeoJSON loading into the crate's spatial types.
//!
//! GeoJSON files are geographic WGS84 per RFC 7946, so everything loaded
//! here is tagged EPSG:4326; callers reproject explicitly.

use std::fs;
use std::path::Path;

use geo::{MultiPolygon, Point, Polygon};
use geojson::{Feature, GeoJson};
use tracing::{debug, info};

use crate::assign::{CellAssignment, ObservationPoint, ObservationSet};
use crate::crs::Crs;
use crate::error::SimError;
use crate::grid::{Grid, GridCell};

/// Reads a boundary GeoJSON file. All polygonal features are merged into one
/// multi-part boundary; a file without any polygonal feature is an error.
pub fn load_boundary(path: impl AsRef<Path>) -> Result<crate::grid::BoundaryPolygon, SimError> {
    let raw = fs::read_to_string(path)?;
    parse_boundary(&raw)
}

pub fn parse_boundary(raw: &str) -> Result<crate::grid::BoundaryPolygon, SimError> {
    let mut parts: Vec<Polygon<f64>> = Vec::new();
    for feature in features(raw.parse::<GeoJson>()?) {
        let Some(geometry) = feature.geometry else {
            continue;
        };
        match geo::Geometry::<f64>::try_from(geometry.value) {
            Ok(geo::Geometry::Polygon(polygon)) => parts.push(polygon),
            Ok(geo::Geometry::MultiPolygon(multi)) => parts.extend(multi.0),
            Ok(other) => {
                return Err(SimError::InvalidGeometry(format!(
                    "boundary feature must be polygonal, found {other:?}"
                )))
            }
            Err(err) => return Err(SimError::InvalidGeometry(err.to_string())),
        }
    }
    if parts.is_empty() {
        return Err(SimError::InvalidGeometry(
            "boundary file contains no polygonal features".into(),
        ));
    }
    info!(parts = parts.len(), "loaded boundary");
    Ok(crate::grid::BoundaryPolygon::new(
        MultiPolygon::new(parts),
        Crs::wgs84(),
    ))
}

/// Reads observation points. Features without a point geometry or without a
/// numeric `noise_level` property are skipped; `accuracy` is optional.
pub fn load_points(path: impl AsRef<Path>) -> Result<ObservationSet, SimError> {
    let raw = fs::read_to_string(path)?;
    parse_points(&raw)
}

pub fn parse_points(raw: &str) -> Result<ObservationSet, SimError> {
    let mut points = Vec::new();
    let mut skipped = 0usize;
    for feature in features(raw.parse::<GeoJson>()?) {
        let geometry = feature
            .geometry
            .as_ref()
            .and_then(|g| Point::<f64>::try_from(g.value.clone()).ok());
        let noise_level = number_property(&feature, "noise_level");
        match (geometry, noise_level) {
            (Some(geometry), Some(noise_level)) => points.push(ObservationPoint {
                geometry,
                noise_level,
                accuracy: number_property(&feature, "accuracy"),
            }),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "skipped features without point geometry or noise_level");
    }
    info!(points = points.len(), "loaded observation points");
    Ok(ObservationSet::new(points, Crs::wgs84()))
}

/// Re-reads a grid written by [`crate::output::write_grid_geojson`],
/// recovering per-cell `measure_count` values when every feature carries
/// one.
pub fn load_grid(path: impl AsRef<Path>) -> Result<(Grid, Option<CellAssignment>), SimError> {
    let raw = fs::read_to_string(path)?;
    parse_grid(&raw)
}

pub fn parse_grid(raw: &str) -> Result<(Grid, Option<CellAssignment>), SimError> {
    let mut cells = Vec::new();
    let mut counts = Vec::new();
    for feature in features(raw.parse::<GeoJson>()?) {
        let Some(geometry) = feature.geometry.as_ref() else {
            continue;
        };
        let geometry = match geo::Geometry::<f64>::try_from(geometry.value.clone()) {
            Ok(geo::Geometry::Polygon(polygon)) => MultiPolygon::new(vec![polygon]),
            Ok(geo::Geometry::MultiPolygon(multi)) => multi,
            Ok(other) => {
                return Err(SimError::InvalidGeometry(format!(
                    "grid feature must be polygonal, found {other:?}"
                )))
            }
            Err(err) => return Err(SimError::InvalidGeometry(err.to_string())),
        };
        if let Some(count) = number_property(&feature, "measure_count") {
            counts.push(count as u64);
        }
        cells.push(GridCell {
            index: cells.len(),
            geometry,
        });
    }
    let assignment = (counts.len() == cells.len() && !cells.is_empty())
        .then(|| CellAssignment::from_counts(counts));
    info!(
        cells = cells.len(),
        with_counts = assignment.is_some(),
        "loaded grid"
    );
    Ok((Grid::from_cells(cells, Crs::wgs84()), assignment))
}

fn features(geojson: GeoJson) -> Vec<Feature> {
    match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    }
}

fn number_property(feature: &Feature, key: &str) -> Option<f64> {
    feature
        .properties
        .as_ref()
        .and_then(|properties| properties.get(key))
        .and_then(|value| value.as_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[10.87, 49.88], [10.92, 49.88], [10.92, 49.91], [10.87, 49.91], [10.87, 49.88]]]
            }
        }]
    }"#;

    const POINTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"noise_level": 62.5, "accuracy": 8.0},
                "geometry": {"type": "Point", "coordinates": [10.89, 49.89]}
            },
            {
                "type": "Feature",
                "properties": {"noise_level": 71.0},
                "geometry": {"type": "Point", "coordinates": [10.90, 49.90]}
            },
            {
                "type": "Feature",
                "properties": {"temperature": 20.0},
                "geometry": {"type": "Point", "coordinates": [10.91, 49.90]}
            }
        ]
    }"#;

    #[test]
    fn parses_polygonal_boundary() {
        let boundary = parse_boundary(BOUNDARY).unwrap();
        assert_eq!(boundary.geometry().0.len(), 1);
        assert_eq!(boundary.crs(), &Crs::wgs84());
    }

    #[test]
    fn rejects_non_polygonal_boundary() {
        let raw = r#"{
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "Point", "coordinates": [10.0, 49.0]}
        }"#;
        let err = parse_boundary(raw).unwrap_err();
        assert!(matches!(err, SimError::InvalidGeometry(_)));
    }

    #[test]
    fn rejects_malformed_geojson() {
        assert!(matches!(
            parse_boundary("{not geojson").unwrap_err(),
            SimError::GeoJson(_)
        ));
    }

    #[test]
    fn parses_points_and_skips_unusable_features() {
        let points = parse_points(POINTS).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points.points()[0].noise_level, 62.5);
        assert_eq!(points.points()[0].accuracy, Some(8.0));
        assert_eq!(points.points()[1].accuracy, None);
    }

    #[test]
    fn grid_round_trips_measure_counts() {
        use crate::grid::{generate_grid, BoundaryPolygon};
        use geo::polygon;

        let crs = Crs::utm(32, true);
        let boundary = BoundaryPolygon::new(
            MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 100.0, y: 0.0),
                (x: 100.0, y: 100.0),
                (x: 0.0, y: 100.0),
                (x: 0.0, y: 0.0),
            ]]),
            crs,
        );
        let grid = generate_grid(&boundary, 50.0, &crs, &crs).unwrap();
        let counts = CellAssignment::from_counts(vec![5, 0, 2, 1]);
        let raw = crate::output::grid_feature_collection(&grid, Some(&counts)).to_string();

        let (reloaded, reloaded_counts) = parse_grid(&raw).unwrap();
        assert_eq!(reloaded.len(), 4);
        assert_eq!(reloaded_counts, Some(counts));
    }
}
