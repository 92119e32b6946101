//! Small synthetic worlds for unit tests: 1 km projected cells, origin at
//! the north-west corner (0, rows km).

use geo::{MultiPolygon, Rect};

use crate::coords::GridGeometry;
use crate::grid::Grid;
use crate::habitat::SpeciesRecord;
use crate::landcover::LandCover;
use crate::pipeline::{BaselineInputs, Scenario};
use crate::vector::{City, Country};

pub const CELL: f64 = 1000.0;
pub const CELL_AREA: f64 = CELL * CELL;

pub fn geometry(rows: usize) -> GridGeometry {
    GridGeometry::projected(0.0, rows as f64 * CELL, CELL)
}

/// Axis-aligned single-part outline.
pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Rect::new((min_x, min_y), (max_x, max_y)).to_polygon()])
}

pub fn grid<T: Clone>(rows: usize, cols: usize, data: Vec<T>) -> Grid<T> {
    Grid::from_vec(cols, rows, geometry(rows), data).expect("fixture shape")
}

/// One-row land-cover strip.
pub fn codes(values: &[u16]) -> LandCover {
    grid(1, values.len(), values.to_vec())
}

/// One-row probability (or elevation) strip.
pub fn probs(values: &[f32]) -> Grid<f32> {
    grid(1, values.len(), values.to_vec())
}

pub fn species(prefs: &[u8], range: &[f32], elevation_min: f64, elevation_max: f64) -> SpeciesRecord {
    species_on(prefs, probs(range), elevation_min, elevation_max)
}

pub fn species_on(prefs: &[u8], range: Grid<f32>, elevation_min: f64, elevation_max: f64) -> SpeciesRecord {
    SpeciesRecord {
        name: format!("Fixture {prefs:?}"),
        taxon: "birds".into(),
        elevation_min,
        elevation_max,
        habitat_preferences: prefs.to_vec(),
        range,
        range_bounds: None,
    }
}

pub const WORLD: usize = 24;

/// 24 × 24 km world: forest in the west, cropland in the east, a 20 × 20 km
/// city block growing in the middle, two countries split down column 12.
pub fn world() -> (BaselineInputs, Scenario) {
    let n = WORLD;
    let mut lc_b = Vec::with_capacity(n * n);
    let mut lc_h = Vec::with_capacity(n * n);
    let mut urban_b = Vec::with_capacity(n * n);
    let mut urban_h = Vec::with_capacity(n * n);
    for r in 0..n {
        for c in 0..n {
            let west = c < n / 2;
            let in_city = (2..22).contains(&r) && (2..22).contains(&c);
            // Row 0 of the east turns from cropland into low-intensity pasture.
            lc_b.push(if west { 70 } else { 2 });
            lc_h.push(match (west, r) {
                (true, 23) => 2,
                (false, 0) => 4,
                (true, _) => 70,
                (false, _) => 2,
            });
            // An already built-up core in the east city blocks.
            let core = in_city && !west && (10..14).contains(&r) && c < 18;
            urban_b.push(if core { 1.0 } else { 0.0 });
            urban_h.push(if core { 1.0 } else if in_city { 0.8 } else { 0.0 });
        }
    }
    let reference = vec![2u16; n * n];
    let elevation = vec![150.0f32; n * n];
    let half = n as f64 * CELL / 2.0;
    let top = n as f64 * CELL;

    let baseline = BaselineInputs {
        land_cover: grid(n, n, lc_b),
        reference_land_cover: grid(n, n, reference),
        urban: grid(n, n, urban_b),
        elevation: grid(n, n, elevation),
        countries: vec![
            Country { name: "Westmark".into(), parts: rectangle(0.0, 0.0, half, top) },
            Country { name: "Eastmark".into(), parts: rectangle(half, 0.0, top, top) },
        ],
        cities: vec![
            City { id: 2, name: "Riverton".into(), population: 8.0e5, country: "Westmark".into(), x: 8500.0, y: 12500.0 },
            City { id: 5, name: "Hillcrest".into(), population: 2.5e6, country: "Eastmark".into(), x: 15500.0, y: 12500.0 },
        ],
    };
    let scenario = Scenario {
        name: "SSP1".into(),
        land_cover: grid(n, n, lc_h),
        urban: grid(n, n, urban_h),
    };
    (baseline, scenario)
}
