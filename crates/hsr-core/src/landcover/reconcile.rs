//! Urban reconciliation of the land-use forecast with the dedicated
//! urban-growth forecast.
//!
//! The land-use model is only trusted for non-urban change; urban change is
//! taken from the urban-growth forecast. The reconciled pair therefore holds
//! urban extent constant between epochs:
//!
//!   baseline: urban where the land-use model OR the urban layer says so
//!   horizon:  urban exactly where the baseline is urban; cells the land-use
//!             model newly urbanises revert to their baseline code
use tracing::debug;

use super::{Epochs, LandCover, URBAN};
use crate::error::Result;
use crate::grid::{Grid, Mask};

/// Urban-layer value counted as built-up at baseline.
const URBAN_PRESENT: f32 = 1.0;

/// Merge baseline urban extent and freeze it across epochs.
///
/// `baseline_urban` is the urban-growth product for the baseline year with
/// absent cells as 0; a cell counts as urban where it equals 1.
pub fn reconcile_urban(land_cover: &Epochs<LandCover>, baseline_urban: &Grid<f32>) -> Result<Epochs<LandCover>> {
    land_cover.ensure_aligned()?;
    let urban = baseline_urban_mask(&land_cover.baseline, baseline_urban)?;

    let baseline = land_cover
        .baseline
        .zip_map(&urban, |&code, &is_urban| if is_urban { URBAN } else { code })?;

    let mut horizon = land_cover.horizon.clone();
    for (i, h) in horizon.data.iter_mut().enumerate() {
        if urban.data[i] {
            *h = URBAN;
        } else if *h == URBAN {
            *h = land_cover.baseline.data[i];
        }
    }

    debug!(
        baseline_urban_cells = urban.data.iter().filter(|&&u| u).count(),
        reverted_cells = land_cover
            .horizon
            .data
            .iter()
            .zip(urban.data.iter())
            .filter(|&(&h, &u)| h == URBAN && !u)
            .count(),
        "reconciled urban extent"
    );

    Ok(Epochs::new(baseline, horizon))
}

/// Union of land-use-model urban cells and urban-layer urban cells.
pub(crate) fn baseline_urban_mask(baseline: &LandCover, baseline_urban: &Grid<f32>) -> Result<Mask> {
    baseline.ensure_aligned("baseline land cover", baseline_urban, "baseline urban")?;
    baseline.zip_map(baseline_urban, |&code, &p| code == URBAN || p >= URBAN_PRESENT)
}
