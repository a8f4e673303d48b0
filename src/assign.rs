//! Spatial assignment of observation points to grid cells.

use geo::{BoundingRect, Intersects, Point};
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, info};

use crate::crs::{transform, Crs, Reproject};
use crate::error::SimError;
use crate::grid::Grid;

/// One noise measurement: location, level in dB, and optional GPS accuracy
/// in metres.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationPoint {
    pub geometry: Point<f64>,
    pub noise_level: f64,
    pub accuracy: Option<f64>,
}

/// Point collection sharing one CRS tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSet {
    points: Vec<ObservationPoint>,
    crs: Crs,
}

impl ObservationSet {
    pub fn new(points: Vec<ObservationPoint>, crs: Crs) -> Self {
        Self { points, crs }
    }

    pub fn points(&self) -> &[ObservationPoint] {
        &self.points
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Reproject for ObservationSet {
    fn reproject(&self, target: &Crs) -> Result<Self, SimError> {
        let points = self
            .points
            .iter()
            .map(|p| {
                Ok(ObservationPoint {
                    geometry: transform(&p.geometry, &self.crs, target)?,
                    ..p.clone()
                })
            })
            .collect::<Result<Vec<_>, SimError>>()?;
        Ok(Self {
            points,
            crs: *target,
        })
    }
}

/// Per-cell measurement counts, index-aligned with the grid that produced
/// it. Every cell has an entry, zero when nothing matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellAssignment {
    counts: Vec<u64>,
}

impl CellAssignment {
    pub fn from_counts(counts: Vec<u64>) -> Self {
        Self { counts }
    }

    pub fn zeros(cells: usize) -> Self {
        Self {
            counts: vec![0; cells],
        }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Count for a cell index; indices beyond the stored counts read as 0,
    /// so a shorter counts vector never panics the writers or plotters.
    pub fn count(&self, index: usize) -> u64 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum over all cells. May exceed the number of input points because a
    /// point on a shared edge counts in every touching cell.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Cell bounding box stored in the R-tree; exact geometry tests run against
/// the grid afterwards.
struct CellEnvelope {
    index: usize,
    lower: [f64; 2],
    upper: [f64; 2],
}

impl RTreeObject for CellEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.lower, self.upper)
    }
}

/// Counts, for every grid cell, the observation points whose geometry
/// intersects it.
///
/// Uses `intersects` semantics with closed cell boundaries: a point lying
/// exactly on an edge shared by two cells is counted in both. Points outside
/// every cell are dropped silently. Lookup goes through an R-tree over cell
/// envelopes, so per-point cost is sub-linear in the cell count.
pub fn assign_points(points: &ObservationSet, grid: &Grid) -> Result<CellAssignment, SimError> {
    if points.crs() != grid.crs() {
        return Err(SimError::CrsMismatch {
            left: *points.crs(),
            right: *grid.crs(),
        });
    }

    let mut counts = vec![0u64; grid.len()];
    let envelopes: Vec<CellEnvelope> = grid
        .cells()
        .iter()
        .filter_map(|cell| {
            cell.geometry.bounding_rect().map(|rect| CellEnvelope {
                index: cell.index,
                lower: [rect.min().x, rect.min().y],
                upper: [rect.max().x, rect.max().y],
            })
        })
        .collect();
    let tree = RTree::bulk_load(envelopes);

    let mut matched = 0u64;
    for point in points.points() {
        let probe = AABB::from_point([point.geometry.x(), point.geometry.y()]);
        let mut hit_any = false;
        for candidate in tree.locate_in_envelope_intersecting(&probe) {
            if grid.cells()[candidate.index]
                .geometry
                .intersects(&point.geometry)
            {
                counts[candidate.index] += 1;
                hit_any = true;
            }
        }
        if hit_any {
            matched += 1;
        }
    }
    if points.len() as u64 > matched {
        debug!(
            dropped = points.len() as u64 - matched,
            "points outside every grid cell"
        );
    }
    info!(
        points = points.len(),
        cells = grid.len(),
        assigned = counts.iter().sum::<u64>(),
        "assigned points to grid cells"
    );

    Ok(CellAssignment::from_counts(counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{generate_grid, BoundaryPolygon};
    use geo::{polygon, MultiPolygon};

    fn test_grid() -> Grid {
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
        generate_grid(&boundary, 50.0, &crs, &crs).unwrap()
    }

    fn observations(coords: &[(f64, f64)]) -> ObservationSet {
        let points = coords
            .iter()
            .map(|&(x, y)| ObservationPoint {
                geometry: Point::new(x, y),
                noise_level: 55.0,
                accuracy: None,
            })
            .collect();
        ObservationSet::new(points, Crs::utm(32, true))
    }

    #[test]
    fn interior_points_land_in_their_cells() {
        let grid = test_grid();
        // Third point falls outside the grid and is dropped.
        let points = observations(&[(10.0, 10.0), (60.0, 10.0), (200.0, 200.0)]);
        let assignment = assign_points(&points, &grid).unwrap();

        assert_eq!(assignment.len(), 4);
        assert_eq!(assignment.total(), 2);
        let mut sorted = assignment.counts().to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 0, 1, 1]);
        // The two matched cells are distinct.
        assert_eq!(assignment.counts().iter().filter(|&&c| c == 1).count(), 2);
    }

    #[test]
    fn edge_point_counts_in_every_touching_cell() {
        let grid = test_grid();
        // Dead centre of the 2x2 grid, on the corner shared by all four cells.
        let points = observations(&[(50.0, 50.0)]);
        let assignment = assign_points(&points, &grid).unwrap();

        assert_eq!(assignment.counts(), &[1, 1, 1, 1]);
        assert_eq!(assignment.total(), 4);
    }

    #[test]
    fn empty_point_set_yields_all_zeros() {
        let grid = test_grid();
        let assignment = assign_points(&observations(&[]), &grid).unwrap();
        assert_eq!(assignment.counts(), &[0, 0, 0, 0]);
    }

    #[test]
    fn crs_mismatch_is_rejected() {
        let grid = test_grid();
        let points = ObservationSet::new(Vec::new(), Crs::wgs84());
        let err = assign_points(&points, &grid).unwrap_err();
        assert!(matches!(err, SimError::CrsMismatch { .. }));
    }

    #[test]
    fn out_of_range_count_reads_zero() {
        let counts = CellAssignment::from_counts(vec![2, 1]);
        assert_eq!(counts.count(1), 1);
        assert_eq!(counts.count(5), 0);
    }

    #[test]
    fn counts_are_never_dropped_below_point_total() {
        let grid = test_grid();
        let points = observations(&[(10.0, 10.0), (50.0, 10.0), (60.0, 60.0), (99.0, 99.0)]);
        let assignment = assign_points(&points, &grid).unwrap();
        // (50,10) sits on a shared edge, so the sum exceeds the point count.
        assert!(assignment.total() >= points.len() as u64);
    }
}
