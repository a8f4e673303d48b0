//! Uniform square analysis grid, clipped to a city boundary.

use geo::{coord, Area, BooleanOps, BoundingRect, MultiPolygon, Rect};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::crs::{transform, Crs, Reproject};
use crate::error::SimError;

/// Immutable study-area boundary (single or multi-part polygon) with its
/// CRS tag.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    geometry: MultiPolygon<f64>,
    crs: Crs,
}

impl BoundaryPolygon {
    pub fn new(geometry: MultiPolygon<f64>, crs: Crs) -> Self {
        Self { geometry, crs }
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }
}

impl Reproject for BoundaryPolygon {
    fn reproject(&self, target: &Crs) -> Result<Self, SimError> {
        Ok(Self {
            geometry: transform(&self.geometry, &self.crs, target)?,
            crs: *target,
        })
    }
}

/// One grid cell. Starts life as a `cell_size` square; clipping to the
/// boundary may leave a smaller, possibly multi-part shape.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub index: usize,
    pub geometry: MultiPolygon<f64>,
}

/// Ordered cell collection sharing one CRS. Indices are stable positions in
/// generation order.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    cells: Vec<GridCell>,
    crs: Crs,
}

impl Grid {
    pub fn from_cells(cells: Vec<GridCell>, crs: Crs) -> Self {
        Self { cells, crs }
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Total area of all (clipped) cells, in squared CRS units.
    pub fn total_area(&self) -> f64 {
        self.cells
            .iter()
            .map(|cell| cell.geometry.unsigned_area())
            .sum()
    }
}

impl Reproject for Grid {
    fn reproject(&self, target: &Crs) -> Result<Self, SimError> {
        let cells = self
            .cells
            .iter()
            .map(|cell| {
                Ok(GridCell {
                    index: cell.index,
                    geometry: transform(&cell.geometry, &self.crs, target)?,
                })
            })
            .collect::<Result<Vec<_>, SimError>>()?;
        Ok(Self {
            cells,
            crs: *target,
        })
    }
}

/// Builds a uniform square grid over `boundary` and clips it to the
/// boundary's true shape.
///
/// The boundary is reprojected into `metric_crs` so `cell_size` is metres,
/// candidate squares are laid out over the bounding extent (x-outer,
/// y-inner), each candidate is intersected with the boundary, empty results
/// are dropped, and the surviving cells are reprojected to `output_crs`.
/// Cell indices are assigned in generation order after the empty candidates
/// have been discarded.
///
/// A zero-area boundary yields an empty grid, not an error.
pub fn generate_grid(
    boundary: &BoundaryPolygon,
    cell_size: f64,
    metric_crs: &Crs,
    output_crs: &Crs,
) -> Result<Grid, SimError> {
    if !(cell_size > 0.0) {
        return Err(SimError::InvalidParameter(format!(
            "cell_size must be positive, got {cell_size}"
        )));
    }
    if !metric_crs.is_projected() {
        return Err(SimError::InvalidParameter(format!(
            "metric CRS must be a projected system, got {metric_crs}"
        )));
    }

    let metric = boundary.reproject(metric_crs)?;
    if metric.geometry.unsigned_area() == 0.0 {
        debug!("boundary has zero area, returning empty grid");
        return Ok(Grid::from_cells(Vec::new(), *output_crs));
    }
    let extent = match metric.geometry.bounding_rect() {
        Some(rect) => rect,
        None => return Ok(Grid::from_cells(Vec::new(), *output_crs)),
    };

    let xs = lattice(extent.min().x, extent.max().x, cell_size);
    let ys = lattice(extent.min().y, extent.max().y, cell_size);
    let mut origins = Vec::with_capacity(xs.len() * ys.len());
    for &x in &xs {
        for &y in &ys {
            origins.push((x, y));
        }
    }
    debug!(
        candidates = origins.len(),
        cols = xs.len(),
        rows = ys.len(),
        "clipping candidate cells"
    );

    // Candidate clipping is embarrassingly parallel; order is preserved by
    // the indexed collect, so the resulting indices stay deterministic.
    let clipped: Vec<MultiPolygon<f64>> = origins
        .par_iter()
        .map(|&(x, y)| {
            let tile = MultiPolygon::new(vec![Rect::new(
                coord! { x: x, y: y },
                coord! { x: x + cell_size, y: y + cell_size },
            )
            .to_polygon()]);
            metric.geometry.intersection(&tile)
        })
        .collect();

    let mut cells = Vec::new();
    for geometry in clipped {
        if geometry.0.is_empty() || geometry.unsigned_area() == 0.0 {
            continue;
        }
        cells.push(GridCell {
            index: cells.len(),
            geometry,
        });
    }
    info!(
        cells = cells.len(),
        cell_size, "generated grid over boundary"
    );

    Grid::from_cells(cells, *metric_crs).reproject(output_crs)
}

/// Cell origin positions from `min` up to the last origin whose square still
/// covers `max` (the final lattice line lands at or beyond `max`).
fn lattice(min: f64, max: f64, step: f64) -> Vec<f64> {
    let mut positions = Vec::new();
    let mut value = min;
    while value < max {
        positions.push(value);
        value += step;
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square_boundary(size: f64, crs: Crs) -> BoundaryPolygon {
        BoundaryPolygon::new(
            MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: size, y: 0.0),
                (x: size, y: size),
                (x: 0.0, y: size),
                (x: 0.0, y: 0.0),
            ]]),
            crs,
        )
    }

    #[test]
    fn unit_square_splits_into_four_cells() {
        let crs = Crs::utm(32, true);
        let boundary = square_boundary(100.0, crs);
        let grid = generate_grid(&boundary, 50.0, &crs, &crs).unwrap();

        assert_eq!(grid.len(), 4);
        for cell in grid.cells() {
            assert!((cell.geometry.unsigned_area() - 2500.0).abs() < 1e-6);
        }
    }

    #[test]
    fn clipping_only_shrinks_and_union_covers_boundary() {
        let crs = Crs::utm(32, true);
        let boundary = BoundaryPolygon::new(
            MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 75.0, y: 0.0),
                (x: 75.0, y: 100.0),
                (x: 0.0, y: 100.0),
                (x: 0.0, y: 0.0),
            ]]),
            crs,
        );
        let grid = generate_grid(&boundary, 50.0, &crs, &crs).unwrap();

        assert!(!grid.is_empty());
        for cell in grid.cells() {
            assert!(cell.geometry.unsigned_area() <= 2500.0 + 1e-6);
        }
        assert!((grid.total_area() - 7500.0).abs() < 1e-6);
    }

    #[test]
    fn boundary_hole_is_respected() {
        let crs = Crs::utm(32, true);
        let with_hole = polygon![
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 100.0, y: 0.0),
                (x: 100.0, y: 100.0),
                (x: 0.0, y: 100.0),
                (x: 0.0, y: 0.0),
            ],
            interiors: [[
                (x: 25.0, y: 25.0),
                (x: 75.0, y: 25.0),
                (x: 75.0, y: 75.0),
                (x: 25.0, y: 75.0),
                (x: 25.0, y: 25.0),
            ]],
        ];
        let boundary = BoundaryPolygon::new(MultiPolygon::new(vec![with_hole]), crs);
        let grid = generate_grid(&boundary, 50.0, &crs, &crs).unwrap();

        // 100x100 outer minus 50x50 hole.
        assert!((grid.total_area() - 7500.0).abs() < 1e-6);
        for cell in grid.cells() {
            assert!(cell.geometry.unsigned_area() < 2500.0);
        }
    }

    #[test]
    fn degenerate_boundary_yields_empty_grid() {
        let crs = Crs::utm(32, true);
        let flat = BoundaryPolygon::new(
            MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 100.0, y: 0.0),
                (x: 0.0, y: 0.0),
            ]]),
            crs,
        );
        let grid = generate_grid(&flat, 50.0, &crs, &crs).unwrap();
        assert!(grid.is_empty());
    }

    #[test]
    fn rejects_non_positive_cell_size() {
        let crs = Crs::utm(32, true);
        let boundary = square_boundary(100.0, crs);
        for bad in [0.0, -10.0, f64::NAN] {
            let err = generate_grid(&boundary, bad, &crs, &crs).unwrap_err();
            assert!(matches!(err, SimError::InvalidParameter(_)));
        }
    }

    #[test]
    fn rejects_geographic_metric_crs() {
        let boundary = square_boundary(100.0, Crs::wgs84());
        let err = generate_grid(&boundary, 50.0, &Crs::wgs84(), &Crs::wgs84()).unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter(_)));
    }

    #[test]
    fn generation_is_idempotent() {
        let crs = Crs::utm(32, true);
        let boundary = square_boundary(130.0, crs);
        let first = generate_grid(&boundary, 50.0, &crs, &crs).unwrap();
        let second = generate_grid(&boundary, 50.0, &crs, &crs).unwrap();

        assert_eq!(first.len(), second.len());
        assert!((first.total_area() - second.total_area()).abs() < 1e-9);
        for (a, b) in first.cells().iter().zip(second.cells()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn lattice_covers_extent() {
        let xs = lattice(0.0, 130.0, 50.0);
        assert_eq!(xs, vec![0.0, 50.0, 100.0]);
        // Last origin plus one step reaches past the extent.
        assert!(xs.last().unwrap() + 50.0 >= 130.0);
    }
}
