//! PNG rendering of coverage and simulation output.

use std::path::Path;

use geo::BoundingRect;
use plotters::prelude::*;
use tracing::info;

use crate::assign::CellAssignment;
use crate::error::SimError;
use crate::grid::Grid;
use crate::simulation::SimulationResult;

const PLOT_SIZE: (u32, u32) = (1024, 768);

/// Sequential white-orange-red ramp for a normalized value in [0, 1].
fn coverage_color(value: f64) -> RGBColor {
    let stops: [(f64, (u8, u8, u8)); 4] = [
        (0.0, (255, 247, 236)),
        (0.35, (253, 187, 132)),
        (0.7, (215, 48, 31)),
        (1.0, (127, 0, 0)),
    ];
    let v = value.clamp(0.0, 1.0);
    for window in stops.windows(2) {
        let (start, from) = window[0];
        let (end, to) = window[1];
        if v <= end {
            let t = if end > start { (v - start) / (end - start) } else { 0.0 };
            let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t) as u8;
            return RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2));
        }
    }
    let (_, last) = stops[stops.len() - 1];
    RGBColor(last.0, last.1, last.2)
}

/// Renders a choropleth of per-cell measurement counts.
pub fn plot_coverage(
    grid: &Grid,
    counts: &CellAssignment,
    path: impl AsRef<Path>,
) -> Result<(), SimError> {
    let extent = grid
        .cells()
        .iter()
        .filter_map(|cell| cell.geometry.bounding_rect())
        .reduce(|a, b| {
            geo::Rect::new(
                geo::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                geo::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        });
    let Some(extent) = extent else {
        return Err(SimError::Render("cannot plot an empty grid".into()));
    };
    let max_count = counts.counts().iter().copied().max().unwrap_or(0).max(1);

    let root = BitMapBackend::new(path.as_ref(), PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Noise measurement count per cell", ("sans-serif", 24))
        .margin(16)
        .build_cartesian_2d(
            extent.min().x..extent.max().x,
            extent.min().y..extent.max().y,
        )
        .map_err(render_err)?;

    for cell in grid.cells() {
        let shade = counts.count(cell.index) as f64 / max_count as f64;
        let fill = coverage_color(shade);
        for polygon in &cell.geometry.0 {
            let ring: Vec<(f64, f64)> = polygon.exterior().coords().map(|c| (c.x, c.y)).collect();
            chart
                .draw_series(std::iter::once(Polygon::new(ring.clone(), fill.filled())))
                .map_err(render_err)?;
            chart
                .draw_series(std::iter::once(PathElement::new(ring, BLACK.stroke_width(1))))
                .map_err(render_err)?;
        }
    }
    root.present().map_err(render_err)?;
    info!(path = %path.as_ref().display(), "wrote coverage choropleth");
    Ok(())
}

/// Renders simulated new submissions per cell as a bar chart.
pub fn plot_new_submissions(
    result: &SimulationResult,
    path: impl AsRef<Path>,
) -> Result<(), SimError> {
    if result.new_submissions.is_empty() {
        return Err(SimError::Render("cannot plot an empty simulation".into()));
    }
    let cells = result.new_submissions.len() as f64;
    let max = result.new_submissions.iter().copied().max().unwrap_or(0).max(1) as f64;

    let root = BitMapBackend::new(path.as_ref(), PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Static scheme: new submissions per grid cell", ("sans-serif", 24))
        .margin(16)
        .x_label_area_size(36)
        .y_label_area_size(48)
        .build_cartesian_2d(0.0..cells, 0.0..max * 1.1)
        .map_err(render_err)?;
    chart
        .configure_mesh()
        .x_desc("grid cell index")
        .y_desc("new submissions")
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(
            result
                .new_submissions
                .iter()
                .enumerate()
                .map(|(index, &count)| {
                    Rectangle::new(
                        [(index as f64, 0.0), (index as f64 + 0.9, count as f64)],
                        BLUE.mix(0.6).filled(),
                    )
                }),
        )
        .map_err(render_err)?;
    root.present().map_err(render_err)?;
    info!(path = %path.as_ref().display(), "wrote submissions bar chart");
    Ok(())
}

fn render_err(err: impl std::fmt::Display) -> SimError {
    SimError::Render(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_endpoints() {
        assert_eq!(coverage_color(0.0), RGBColor(255, 247, 236));
        assert_eq!(coverage_color(1.0), RGBColor(127, 0, 0));
    }

    #[test]
    fn ramp_is_monotone_darker() {
        let low = coverage_color(0.1);
        let high = coverage_color(0.9);
        assert!(u32::from(low.0) + u32::from(low.1) + u32::from(low.2)
            > u32::from(high.0) + u32::from(high.1) + u32::from(high.2));
    }

    #[test]
    fn empty_grid_cannot_be_plotted() {
        let grid = Grid::from_cells(Vec::new(), crate::crs::Crs::wgs84());
        let counts = CellAssignment::zeros(0);
        let err = plot_coverage(&grid, &counts, std::env::temp_dir().join("noisegrid_empty.png"))
            .unwrap_err();
        assert!(matches!(err, SimError::Render(_)));
    }
}
