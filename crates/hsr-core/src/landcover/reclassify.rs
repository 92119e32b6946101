//! Pasture and secondary-vegetation reclassification.
//!
//! Species habitat preferences are expressed against natural land-cover and
//! cropland classes only, so the two GLOBIO classes whose meaning depends on
//! history are resolved using the baseline state of each cell:
//!
//!   baseline: low-intensity pasture → reference (CCI) natural code
//!   horizon:  secondary vegetation  → raw baseline code
//!             low-intensity pasture → baseline natural code, if natural
//!                                   → reference natural code, if pasture
//!                                   → kept, otherwise (crop / urban /
//!                                     high-intensity pasture history)
use tracing::debug;

use super::{is_natural, Epochs, LandCover, PASTURE_LOW_INTENSITY, SECONDARY_VEGETATION};
use crate::error::{HsrError, Result};

/// Resolve pasture and secondary vegetation in a baseline/horizon pair.
///
/// `reference` is the natural land-cover layer for the baseline year; it is
/// used for both the baseline and the horizon pasture rules so the two
/// epochs stay consistent.
///
/// Fails with [`HsrError::InvalidLandCover`] when the baseline carries
/// secondary vegetation or the reference carries either ambiguous code,
/// since neither can be resolved from history.
pub fn reclassify(baseline: &LandCover, horizon: &LandCover, reference: &LandCover) -> Result<Epochs<LandCover>> {
    baseline.ensure_aligned("baseline land cover", horizon, "horizon land cover")?;
    baseline.ensure_aligned("baseline land cover", reference, "reference land cover")?;

    if let Some(cell) = baseline.data.iter().position(|&c| c == SECONDARY_VEGETATION) {
        return Err(HsrError::InvalidLandCover { layer: "baseline", code: SECONDARY_VEGETATION, cell });
    }
    if let Some(cell) = reference
        .data
        .iter()
        .position(|&c| c == PASTURE_LOW_INTENSITY || c == SECONDARY_VEGETATION)
    {
        return Err(HsrError::InvalidLandCover { layer: "reference", code: reference.data[cell], cell });
    }

    let resolved_baseline = baseline.zip_map(reference, |&b, &r| resolve_baseline(b, r))?;

    let mut resolved_horizon = horizon.clone();
    for (i, h) in resolved_horizon.data.iter_mut().enumerate() {
        *h = resolve_horizon(baseline.data[i], *h, reference.data[i]);
    }

    debug!(
        cells = baseline.len(),
        baseline_pasture = baseline.data.iter().filter(|&&c| c == PASTURE_LOW_INTENSITY).count(),
        horizon_secondary = horizon.data.iter().filter(|&&c| c == SECONDARY_VEGETATION).count(),
        "reclassified land cover"
    );

    Ok(Epochs::new(resolved_baseline, resolved_horizon))
}

#[inline]
fn resolve_baseline(baseline: u16, reference: u16) -> u16 {
    if baseline == PASTURE_LOW_INTENSITY { reference } else { baseline }
}

/// Horizon rule; `baseline` is the raw (not yet reclassified) baseline code.
#[inline]
fn resolve_horizon(baseline: u16, horizon: u16, reference: u16) -> u16 {
    let regrowth_reverted = if horizon == SECONDARY_VEGETATION { baseline } else { horizon };
    if regrowth_reverted != PASTURE_LOW_INTENSITY {
        return regrowth_reverted;
    }
    if is_natural(baseline) {
        baseline
    } else if baseline == PASTURE_LOW_INTENSITY {
        reference
    } else {
        PASTURE_LOW_INTENSITY
    }
}
