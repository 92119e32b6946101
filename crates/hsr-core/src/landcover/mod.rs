//! Categorical land-cover layers (Phase 1 of the per-scenario pipeline).
//!
//! Land cover follows the GLOBIO categorical scheme: a handful of human
//! land-use codes below 50 and natural land-cover codes in `[50, 230)`
//! inherited from the ESA CCI product the forecasts are built on.
//!
//! Pipeline:
//!   reclassify (pasture / secondary vegetation) → reconcile (urban extent).

pub mod reclassify;
pub mod reconcile;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::Grid;

pub use reclassify::reclassify;
pub use reconcile::reconcile_urban;

/// A categorical land-cover raster.
pub type LandCover = Grid<u16>;

pub const URBAN: u16 = 1;
pub const CROPLAND: u16 = 2;
pub const PASTURE_HIGH_INTENSITY: u16 = 3;
pub const PASTURE_LOW_INTENSITY: u16 = 4;
pub const FORESTRY: u16 = 5;
pub const SECONDARY_VEGETATION: u16 = 6;

/// Natural land-cover codes occupy `[NATURAL_MIN, NATURAL_END)`.
pub const NATURAL_MIN: u16 = 50;
pub const NATURAL_END: u16 = 230;

#[inline]
pub fn is_natural(code: u16) -> bool {
    (NATURAL_MIN..NATURAL_END).contains(&code)
}

/// A pair of co-registered layers keyed by year: the baseline (e.g. 2015)
/// and the horizon (e.g. 2050).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epochs<T> {
    pub baseline: T,
    pub horizon: T,
}

impl<T> Epochs<T> {
    pub fn new(baseline: T, horizon: T) -> Self {
        Self { baseline, horizon }
    }

    /// Apply `f` to both epochs independently.
    pub fn try_map<U>(&self, f: impl Fn(&T) -> Result<U>) -> Result<Epochs<U>> {
        Ok(Epochs { baseline: f(&self.baseline)?, horizon: f(&self.horizon)? })
    }
}

impl<T: Clone> Epochs<Grid<T>> {
    pub fn ensure_aligned(&self) -> Result<()> {
        self.baseline.ensure_aligned("baseline", &self.horizon, "horizon")
    }
}
