/// Grid georeferencing and per-cell area.
/// Coordinate math uses f64 throughout.
use serde::{Deserialize, Serialize};

/// Authalic Earth radius in metres, used for geographic cell areas.
pub const EARTH_RADIUS_M: f64 = 6_371_007.181;

/// Coordinate reference of a grid: geographic degrees or a projected
/// metric system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// x = longitude, y = latitude, both in degrees.
    Geographic,
    /// x / y in metres on an equal-area projection.
    Projected,
}

/// Affine placement of a north-up grid. Row 0 is the northern edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    /// x of the western edge of column 0.
    pub origin_x: f64,
    /// y of the northern edge of row 0.
    pub origin_y: f64,
    /// Cell extent along x (positive).
    pub cell_width: f64,
    /// Cell extent along y (positive; rows advance southward).
    pub cell_height: f64,
    pub crs: Crs,
}

impl GridGeometry {
    pub fn projected(origin_x: f64, origin_y: f64, cell_size: f64) -> Self {
        Self { origin_x, origin_y, cell_width: cell_size, cell_height: cell_size, crs: Crs::Projected }
    }

    pub fn geographic(origin_lon: f64, origin_lat: f64, cell_deg: f64) -> Self {
        Self { origin_x: origin_lon, origin_y: origin_lat, cell_width: cell_deg, cell_height: cell_deg, crs: Crs::Geographic }
    }

    /// Centre of cell `(row, col)` in CRS units.
    #[inline]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.cell_width,
            self.origin_y - (row as f64 + 0.5) * self.cell_height,
        )
    }

    /// Cell containing `(x, y)`, or `None` when the point lies outside a
    /// `width` × `height` grid.
    pub fn locate(&self, x: f64, y: f64, width: usize, height: usize) -> Option<(usize, usize)> {
        let fx = (x - self.origin_x) / self.cell_width;
        let fy = (self.origin_y - y) / self.cell_height;
        if fx < 0.0 || fy < 0.0 || !fx.is_finite() || !fy.is_finite() {
            return None;
        }
        let (col, row) = (fx.floor() as usize, fy.floor() as usize);
        (row < height && col < width).then_some((row, col))
    }

    /// Area of a cell in row `row`, in square metres.
    ///
    /// Geographic grids use the spherical band formula
    ///   A = R² · Δλ · |sin φ_north − sin φ_south|
    /// so cells shrink toward the poles; projected grids are |dx · dy|.
    pub fn cell_area_m2(&self, row: usize) -> f64 {
        match self.crs {
            Crs::Projected => (self.cell_width * self.cell_height).abs(),
            Crs::Geographic => {
                let north = (self.origin_y - row as f64 * self.cell_height).clamp(-90.0, 90.0);
                let south = (north - self.cell_height).clamp(-90.0, 90.0);
                let dlon = self.cell_width.to_radians();
                EARTH_RADIUS_M * EARTH_RADIUS_M * dlon * (north.to_radians().sin() - south.to_radians().sin()).abs()
            }
        }
    }

    /// Whether two geometries describe the same lattice.
    pub fn aligned_with(&self, other: &GridGeometry) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0);
        self.crs == other.crs
            && close(self.origin_x, other.origin_x)
            && close(self.origin_y, other.origin_y)
            && close(self.cell_width, other.cell_width)
            && close(self.cell_height, other.cell_height)
    }
}
