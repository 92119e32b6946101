//! Vector inputs (countries, cities) and their rasterized zones.
//!
//! Zonal reductions run on the land-cover lattice, so every polygon is
//! converted once into a [`Zone`]: the sorted indices of the cells whose
//! centres fall inside it.
use geo::{BoundingRect, Contains, MultiPolygon, Point, Rect};
use serde::{Deserialize, Serialize};

use crate::coords::GridGeometry;
use crate::grid::CellWindow;

/// An administrative region, possibly made of several parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
    pub name: String,
    /// Outline in grid CRS units.
    pub parts: MultiPolygon<f64>,
}

/// A populated place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub population: f64,
    pub country: String,
    pub x: f64,
    pub y: f64,
}

/// Cells of one region on the analysis lattice, sorted ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub cells: Vec<usize>,
    /// Bounding block of `cells`.
    pub window: CellWindow,
}

impl Zone {
    /// Build a zone from cell indices on a grid `width` cells wide.
    pub fn from_cells(mut cells: Vec<usize>, width: usize) -> Self {
        cells.sort_unstable();
        cells.dedup();
        let mut window = CellWindow { row0: 0, col0: 0, rows: 0, cols: 0 };
        for &i in &cells {
            window.include(i / width, i % width);
        }
        Self { cells, window }
    }

    /// Rasterize polygon parts by cell-centre inclusion. Centres on an
    /// outline belong to neither side.
    pub fn rasterize(parts: &MultiPolygon<f64>, geometry: &GridGeometry, width: usize, height: usize) -> Self {
        let mut cells = Vec::new();
        for part in &parts.0 {
            let Some(window) = part.bounding_rect().and_then(|b| window_of(&b, geometry, width, height)) else {
                continue;
            };
            for (r, c) in window.cells() {
                let (x, y) = geometry.cell_center(r, c);
                if part.contains(&Point::new(x, y)) {
                    cells.push(r * width + c);
                }
            }
        }
        Self::from_cells(cells, width)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell_count(&self) -> u64 {
        self.cells.len() as u64
    }

    pub fn contains_cell(&self, idx: usize) -> bool {
        self.cells.binary_search(&idx).is_ok()
    }

    /// Total area in square metres.
    pub fn area_m2(&self, geometry: &GridGeometry, width: usize) -> f64 {
        self.cells.iter().map(|&i| geometry.cell_area_m2(i / width)).sum()
    }
}

/// Cell window covering `bounds`, clipped to the grid.
fn window_of(bounds: &Rect<f64>, g: &GridGeometry, width: usize, height: usize) -> Option<CellWindow> {
    if width == 0 || height == 0 || bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return None;
    }
    let (min, max) = (bounds.min(), bounds.max());
    let col0 = ((min.x - g.origin_x) / g.cell_width).floor().max(0.0);
    let col1 = ((max.x - g.origin_x) / g.cell_width).ceil().min(width as f64);
    let row0 = ((g.origin_y - max.y) / g.cell_height).floor().max(0.0);
    let row1 = ((g.origin_y - min.y) / g.cell_height).ceil().min(height as f64);
    if !(col1 > col0 && row1 > row0) {
        return None;
    }
    Some(CellWindow {
        row0: row0 as usize,
        col0: col0 as usize,
        rows: (row1 - row0) as usize,
        cols: (col1 - col0) as usize,
    })
}

/// A country rasterized onto the analysis lattice.
#[derive(Debug, Clone)]
pub struct CountryZone {
    pub name: String,
    pub zone: Zone,
}

/// Rasterize every country, dropping those that cover no cell.
pub fn rasterize_countries(countries: &[Country], geometry: &GridGeometry, width: usize, height: usize) -> Vec<CountryZone> {
    countries
        .iter()
        .map(|c| CountryZone { name: c.name.clone(), zone: Zone::rasterize(&c.parts, geometry, width, height) })
        .filter(|c| !c.zone.is_empty())
        .collect()
}
