//! Point cleaning ahead of spatial assignment.

use tracing::info;

use crate::assign::ObservationSet;

/// Plausibility bounds for raw noise measurements. Defaults follow the
/// NoisePlanet data: 30-120 dB and a GPS accuracy of at most 15 m.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseFilter {
    pub min_db: f64,
    pub max_db: f64,
    pub max_accuracy: Option<f64>,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self {
            min_db: 30.0,
            max_db: 120.0,
            max_accuracy: Some(15.0),
        }
    }
}

impl NoiseFilter {
    fn keeps(&self, noise_level: f64, accuracy: Option<f64>) -> bool {
        if noise_level < self.min_db || noise_level > self.max_db {
            return false;
        }
        // Accuracy is only filtered when both the bound and the metadata
        // are present, mirroring the optional column in the raw data.
        match (self.max_accuracy, accuracy) {
            (Some(max), Some(value)) => value <= max,
            _ => true,
        }
    }
}

/// Drops points with implausible noise levels or poor GPS accuracy.
pub fn clean_points(points: &ObservationSet, filter: &NoiseFilter) -> ObservationSet {
    let kept: Vec<_> = points
        .points()
        .iter()
        .filter(|p| filter.keeps(p.noise_level, p.accuracy))
        .cloned()
        .collect();
    info!(
        raw = points.len(),
        kept = kept.len(),
        "cleaned noise points"
    );
    ObservationSet::new(kept, *points.crs())
}
