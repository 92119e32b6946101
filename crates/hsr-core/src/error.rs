//! Error taxonomy for the HSR change pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HsrError {
    /// Two rasters that must be co-registered are not.
    #[error("grid mismatch: {left} is {lw}x{lh}, {right} is {rw}x{rh} (or geometries differ)")]
    GridMismatch {
        left: &'static str,
        right: &'static str,
        lw: usize,
        lh: usize,
        rw: usize,
        rh: usize,
    },

    #[error("grid data length {len} does not match {width}x{height}")]
    GridShape { len: usize, width: usize, height: usize },

    /// A categorical layer carries a code that makes the reclassification
    /// ill-defined.
    #[error("invalid land cover in {layer}: code {code} at cell {cell}")]
    InvalidLandCover { layer: &'static str, code: u16, cell: usize },

    #[error("species {species}: unknown habitat preference {code} (expected 1-16)")]
    UnknownPreference { species: String, code: u8 },

    #[error("species {species}: habitat preferences match no land-cover codes")]
    EmptyHabitatMatch { species: String },

    #[error("species {species}: elevation band [{min}, {max}] is invalid")]
    InvalidElevationBand { species: String, min: f64, max: f64 },

    /// A zonal reduction would touch more cells than the configured ceiling.
    #[error("reduction over {region} touches {cells} cells, ceiling is {max_cells}")]
    ReductionCeiling { region: String, cells: u64, max_cells: u64 },

    #[error("reduction over {region} was cancelled")]
    Cancelled { region: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HsrError {
    /// Failures of a unit of work that may succeed when re-run, possibly
    /// with a larger ceiling or best-effort enabled.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HsrError::ReductionCeiling { .. } | HsrError::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, HsrError>;
