use geo::Rect;
use serde::{Deserialize, Serialize};

use crate::coords::GridGeometry;
use crate::error::{HsrError, Result};

/// A 2D raster stored row-major, row 0 at the northern edge.
///
/// Masked rasters are `Grid<Option<T>>`: `None` is a masked cell and never
/// takes part in arithmetic or reductions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid<T>", bound(deserialize = "T: Deserialize<'de> + Clone"))]
pub struct Grid<T> {
    pub data: Vec<T>,
    pub width: usize,
    pub height: usize,
    pub geometry: GridGeometry,
}

/// Wire form of a [`Grid`], checked for shape before use.
#[derive(Deserialize)]
struct RawGrid<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
    geometry: GridGeometry,
}

impl<T: Clone> TryFrom<RawGrid<T>> for Grid<T> {
    type Error = HsrError;

    fn try_from(raw: RawGrid<T>) -> Result<Self> {
        Grid::from_vec(raw.width, raw.height, raw.geometry, raw.data)
    }
}

/// Boolean raster; `true` keeps a cell.
pub type Mask = Grid<bool>;

/// Raster with per-cell masking.
pub type Masked<T> = Grid<Option<T>>;

impl<T: Clone> Grid<T> {
    /// Create a grid filled with `fill`.
    pub fn new(width: usize, height: usize, geometry: GridGeometry, fill: T) -> Self {
        Self { data: vec![fill; width * height], width, height, geometry }
    }

    pub fn from_vec(width: usize, height: usize, geometry: GridGeometry, data: Vec<T>) -> Result<Self> {
        if data.len() != width * height {
            return Err(HsrError::GridShape { len: data.len(), width, height });
        }
        Ok(Self { data, width, height, geometry })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> &T {
        &self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        self.data[row * self.width + col] = val;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Per-cell transform into a new grid on the same lattice.
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> Grid<U> {
        Grid {
            data: self.data.iter().map(f).collect(),
            width: self.width,
            height: self.height,
            geometry: self.geometry,
        }
    }

    /// Per-cell binary operation. Both grids must share one lattice.
    pub fn zip_map<U, V>(&self, other: &Grid<U>, f: impl Fn(&T, &U) -> V) -> Result<Grid<V>> {
        self.ensure_aligned("left", other, "right")?;
        Ok(Grid {
            data: self.data.iter().zip(other.data.iter()).map(|(a, b)| f(a, b)).collect(),
            width: self.width,
            height: self.height,
            geometry: self.geometry,
        })
    }

    /// Fail unless `data` holds exactly `width × height` cells.
    pub fn ensure_shape(&self) -> Result<()> {
        if self.data.len() != self.width * self.height {
            return Err(HsrError::GridShape { len: self.data.len(), width: self.width, height: self.height });
        }
        Ok(())
    }

    /// Fail unless `other` covers exactly the same cells.
    pub fn ensure_aligned<U>(&self, name: &'static str, other: &Grid<U>, other_name: &'static str) -> Result<()> {
        self.ensure_shape()?;
        if other.data.len() != other.width * other.height {
            return Err(HsrError::GridShape { len: other.data.len(), width: other.width, height: other.height });
        }
        if self.width != other.width || self.height != other.height || !self.geometry.aligned_with(&other.geometry) {
            return Err(HsrError::GridMismatch {
                left: name,
                right: other_name,
                lw: self.width,
                lh: self.height,
                rw: other.width,
                rh: other.height,
            });
        }
        Ok(())
    }

    /// Window covering the whole grid.
    pub fn full_window(&self) -> CellWindow {
        CellWindow { row0: 0, col0: 0, rows: self.height, cols: self.width }
    }

    /// Smallest window holding every cell whose centre lies in `bounds`.
    /// `None` when no cell centre falls inside.
    pub fn window_for(&self, bounds: &Rect<f64>) -> Option<CellWindow> {
        let g = &self.geometry;
        let (min, max) = (bounds.min(), bounds.max());
        let col_lo = ((min.x - g.origin_x) / g.cell_width - 0.5).ceil().max(0.0);
        let col_hi = ((max.x - g.origin_x) / g.cell_width - 0.5).floor();
        let row_lo = ((g.origin_y - max.y) / g.cell_height - 0.5).ceil().max(0.0);
        let row_hi = ((g.origin_y - min.y) / g.cell_height - 0.5).floor();
        if !(col_hi >= col_lo && row_hi >= row_lo) {
            return None;
        }
        let col0 = col_lo as usize;
        let row0 = row_lo as usize;
        if col0 >= self.width || row0 >= self.height {
            return None;
        }
        let col1 = (col_hi as usize).min(self.width - 1);
        let row1 = (row_hi as usize).min(self.height - 1);
        Some(CellWindow { row0, col0, rows: row1 - row0 + 1, cols: col1 - col0 + 1 })
    }
}

impl<T: Clone> Grid<Option<T>> {
    /// Replace masked cells with `fill`.
    pub fn unmask(&self, fill: T) -> Grid<T> {
        self.map(|v| v.clone().unwrap_or_else(|| fill.clone()))
    }

    /// Mask every cell where `keep` is false.
    pub fn update_mask(&self, keep: &Mask) -> Result<Self> {
        self.zip_map(keep, |v, &k| if k { v.clone() } else { None })
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_some()).count()
    }
}

impl Grid<f32> {
    /// Fail unless every cell is a finite probability in [0, 1].
    pub fn ensure_probability(&self, name: &str) -> Result<()> {
        match self.data.iter().position(|p| !(0.0..=1.0).contains(p)) {
            Some(i) => Err(HsrError::Config(format!(
                "{name} holds {} at cell {i}; expected a probability in [0, 1]",
                self.data[i]
            ))),
            None => Ok(()),
        }
    }

    /// Bounding window of the cells with a positive value, if any.
    pub fn positive_window(&self) -> Option<CellWindow> {
        let mut window = CellWindow { row0: 0, col0: 0, rows: 0, cols: 0 };
        for (i, _) in self.data.iter().enumerate().filter(|(_, v)| **v > 0.0) {
            window.include(i / self.width, i % self.width);
        }
        (window.cell_count() > 0).then_some(window)
    }
}

/// Rectangular block of cells, used to bound reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellWindow {
    pub row0: usize,
    pub col0: usize,
    pub rows: usize,
    pub cols: usize,
}

impl CellWindow {
    pub fn cell_count(&self) -> u64 {
        self.rows as u64 * self.cols as u64
    }

    /// Grow to include `(row, col)`.
    pub fn include(&mut self, row: usize, col: usize) {
        if self.rows == 0 || self.cols == 0 {
            *self = CellWindow { row0: row, col0: col, rows: 1, cols: 1 };
            return;
        }
        let row1 = (self.row0 + self.rows - 1).max(row);
        let col1 = (self.col0 + self.cols - 1).max(col);
        self.row0 = self.row0.min(row);
        self.col0 = self.col0.min(col);
        self.rows = row1 - self.row0 + 1;
        self.cols = col1 - self.col0 + 1;
    }

    /// Row-major `(row, col)` pairs in the window.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.row0..self.row0 + self.rows)
            .flat_map(move |r| (self.col0..self.col0 + self.cols).map(move |c| (r, c)))
    }
}
