//! Per-species habitat suitability.
//!
//! Land cover is matched against the species' habitat codes inside its
//! range (the binary habitat raster), then converted into the fraction of
//! each cell that is suitable, accounting for partial urban conversion:
//!
//!   intolerant: baseline = binary; horizon = binary − P(urban)
//!   tolerant:   baseline = binary; horizon = binary, or P(urban) where
//!               the cell is in range but not otherwise habitat
//!
//! Both epochs are clipped to the species' elevation band.

pub mod preferences;
pub mod species;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::grid::{CellWindow, Grid, Mask, Masked};
use crate::landcover::{Epochs, LandCover};
use crate::zonal::{Reducer, Region};
pub use preferences::{expand_preferences, land_cover_codes, URBAN_PREFERENCE};
pub use species::{HabitatProfile, SpeciesRecord, UrbanAffinity};

/// Cells over which a species' totals are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "window")]
pub enum AnalysisExtent {
    /// Window covering the range's bounding geometry, or the cells of the
    /// range itself when it comes without one.
    RangeBounds(CellWindow),
    /// The range bounds were degenerate or the range covers no cell; the
    /// whole grid is used.
    GlobalFallback(CellWindow),
}

impl AnalysisExtent {
    pub fn window(&self) -> CellWindow {
        match *self {
            AnalysisExtent::RangeBounds(w) | AnalysisExtent::GlobalFallback(w) => w,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, AnalysisExtent::GlobalFallback(_))
    }
}

/// Suitability rasters and totals for one species in one scenario.
#[derive(Debug, Clone)]
pub struct HabitatMap {
    pub profile: HabitatProfile,
    /// Land-cover match inside the range, before elevation clipping.
    pub binary: Epochs<Mask>,
    /// Suitable fraction of each cell in [0, 1]; `None` is not habitat.
    pub suitability: Epochs<Masked<f64>>,
    pub extent: AnalysisExtent,
    pub baseline_area_m2: f64,
    pub horizon_area_m2: f64,
    /// Set when a total came from a best-effort reduction.
    pub approximate: bool,
}

/// Build the two-epoch suitability raster for `species`.
///
/// `land_cover` is the reclassified, urban-reconciled pair; `horizon_urban`
/// the horizon urban-growth probability (absent cells as 0).
pub fn map_habitat(
    species: &SpeciesRecord,
    land_cover: &Epochs<LandCover>,
    elevation: &Grid<f32>,
    horizon_urban: &Grid<f32>,
    reducer: &Reducer<'_>,
) -> Result<HabitatMap> {
    let profile = species.profile()?;
    land_cover.ensure_aligned()?;
    land_cover.baseline.ensure_aligned("land cover", &species.range, "species range")?;
    land_cover.baseline.ensure_aligned("land cover", elevation, "elevation")?;
    land_cover.baseline.ensure_aligned("land cover", horizon_urban, "horizon urban")?;
    species.range.ensure_probability("species range")?;

    let binary = land_cover.try_map(|lc| {
        let mut m = lc.map(|&code| profile.matches(code));
        for (i, v) in m.data.iter_mut().enumerate() {
            *v = *v && species.in_range(i);
        }
        Ok(m)
    })?;

    let (lo, hi) = (species.elevation_min, species.elevation_max);
    let in_band = elevation.map(|&z| (lo..=hi).contains(&(z as f64)));

    let suitability = match profile.affinity {
        UrbanAffinity::Intolerant => intolerant_suitability(&binary, &in_band, horizon_urban)?,
        UrbanAffinity::Tolerant => tolerant_suitability(&binary, &in_band, horizon_urban, species)?,
    };

    let extent = resolve_extent(species);
    let geometry = land_cover.baseline.geometry;
    let width = land_cover.baseline.width;
    let area_of = |band: &Masked<f64>, i: usize| band.data[i].map(|v| v * geometry.cell_area_m2(i / width));

    let region = Region::Window(extent.window());
    let baseline = reducer.sum(&format!("{} baseline habitat", species.name), region, |i| {
        area_of(&suitability.baseline, i)
    })?;
    let horizon = reducer.sum(&format!("{} horizon habitat", species.name), region, |i| {
        area_of(&suitability.horizon, i)
    })?;

    debug!(
        species = %species.name,
        affinity = ?profile.affinity,
        codes = ?profile.land_cover_codes,
        baseline_cells = suitability.baseline.valid_count(),
        horizon_cells = suitability.horizon.valid_count(),
        baseline_m2 = baseline.value,
        horizon_m2 = horizon.value,
        "mapped habitat"
    );

    Ok(HabitatMap {
        profile,
        binary,
        suitability,
        extent,
        baseline_area_m2: baseline.value,
        horizon_area_m2: horizon.value,
        approximate: baseline.approximate || horizon.approximate,
    })
}

/// Horizon habitat loses the fraction of each cell expected to urbanise.
fn intolerant_suitability(binary: &Epochs<Mask>, in_band: &Mask, horizon_urban: &Grid<f32>) -> Result<Epochs<Masked<f64>>> {
    let baseline = binary.baseline.map(|&b| b.then_some(1.0));
    let mut horizon = baseline.clone();
    for (i, v) in horizon.data.iter_mut().enumerate() {
        *v = binary.horizon.data[i].then(|| 1.0 - horizon_urban.data[i] as f64);
    }
    Ok(Epochs::new(baseline.update_mask(in_band)?, horizon.update_mask(in_band)?))
}

/// Urban growth inside the range contributes its probability as habitat.
fn tolerant_suitability(
    binary: &Epochs<Mask>,
    in_band: &Mask,
    horizon_urban: &Grid<f32>,
    species: &SpeciesRecord,
) -> Result<Epochs<Masked<f64>>> {
    let baseline = binary.baseline.map(|&b| b.then_some(1.0));
    let mut horizon = baseline.clone();
    for (i, v) in horizon.data.iter_mut().enumerate() {
        let value = if binary.horizon.data[i] {
            Some(1.0)
        } else if species.in_range(i) {
            Some(horizon_urban.data[i] as f64)
        } else {
            None
        };
        *v = value.filter(|&x| x != 0.0);
    }
    Ok(Epochs::new(baseline.update_mask(in_band)?, horizon.update_mask(in_band)?))
}

fn resolve_extent(species: &SpeciesRecord) -> AnalysisExtent {
    let full = species.range.full_window();
    let window = match species.range_bounds {
        Some(b) if b.width() > 0.0 && b.height() > 0.0 => species.range.window_for(&b),
        Some(_) => None,
        None => species.range.positive_window(),
    };
    match window {
        Some(w) => AnalysisExtent::RangeBounds(w),
        None => {
            warn!(species = %species.name, "range has no usable bounding geometry; using full extent");
            AnalysisExtent::GlobalFallback(full)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReductionParams;
    use crate::error::HsrError;
    use crate::testing::{codes, grid, probs, species, species_on, CELL, CELL_AREA};
    use crate::zonal::CancelFlag;
    use approx::assert_relative_eq;
    use geo::Rect;

    fn map_with(
        params: &ReductionParams,
        sp: &SpeciesRecord,
        lc: &Epochs<LandCover>,
        elev: &Grid<f32>,
        urban: &Grid<f32>,
    ) -> Result<HabitatMap> {
        let cancel = CancelFlag::new();
        let reducer = Reducer::new(params, &cancel, lc.baseline.width);
        map_habitat(sp, lc, elev, urban, &reducer)
    }

    fn run(sp: &SpeciesRecord, lc: &Epochs<LandCover>, elev: &Grid<f32>, urban: &Grid<f32>) -> HabitatMap {
        map_with(&ReductionParams::default(), sp, lc, elev, urban).unwrap()
    }

    #[test]
    fn intolerant_horizon_loses_urban_probability() {
        // Forest (70) persists; 30 % of the cell is forecast to urbanise.
        let lc = Epochs::new(codes(&[70]), codes(&[70]));
        let sp = species(&[1], &[1.0], 0.0, 1000.0);
        let map = run(&sp, &lc, &probs(&[500.0]), &probs(&[0.3]));
        assert_eq!(map.suitability.baseline.data, vec![Some(1.0)]);
        assert_relative_eq!(map.suitability.horizon.data[0].unwrap(), 0.7, epsilon = 1e-7);
        assert_relative_eq!(map.horizon_area_m2, 0.7 * CELL_AREA, max_relative = 1e-6);
    }

    #[test]
    fn tolerant_species_gains_urban_probability_inside_range() {
        // Cropland is not habitat for a forest + urban species, but 60 % of
        // the cell becomes urban.
        let lc = Epochs::new(codes(&[2, 70]), codes(&[2, 70]));
        let sp = species(&[1, 13], &[1.0, 1.0], 0.0, 1000.0);
        let map = run(&sp, &lc, &probs(&[10.0, 10.0]), &probs(&[0.6, 0.6]));
        assert_eq!(map.suitability.baseline.data[0], None);
        assert_relative_eq!(map.suitability.horizon.data[0].unwrap(), 0.6, epsilon = 1e-7);
        // Habitat cells stay whole regardless of urban probability.
        assert_eq!(map.suitability.horizon.data[1], Some(1.0));
    }

    #[test]
    fn tolerant_zero_probability_and_out_of_range_cells_dropped() {
        let lc = Epochs::new(codes(&[2, 2]), codes(&[2, 2]));
        let sp = species(&[1, 13], &[1.0, 0.0], 0.0, 1000.0);
        let map = run(&sp, &lc, &probs(&[10.0, 10.0]), &probs(&[0.0, 0.9]));
        assert_eq!(map.suitability.horizon.data, vec![None, None]);
    }

    #[test]
    fn elevation_band_is_inclusive_and_clips_both_epochs() {
        let lc = Epochs::new(codes(&[70, 70, 70, 70]), codes(&[70, 70, 70, 70]));
        let sp = species(&[1], &[1.0; 4], 1100.0, 3400.0);
        let map = run(&sp, &lc, &probs(&[1099.0, 1100.0, 3400.0, 3401.0]), &probs(&[0.0; 4]));
        let expected = vec![None, Some(1.0), Some(1.0), None];
        assert_eq!(map.suitability.baseline.data, expected);
        assert_eq!(map.suitability.horizon.data, expected);
        // Binary habitat ignores elevation.
        assert!(map.binary.baseline.data.iter().all(|&b| b));
        assert_relative_eq!(map.baseline_area_m2, 2.0 * CELL_AREA);
    }

    #[test]
    fn range_limits_binary_habitat() {
        let lc = Epochs::new(codes(&[70, 70]), codes(&[70, 2]));
        let sp = species(&[1], &[0.0, 0.4], 0.0, 1000.0);
        let map = run(&sp, &lc, &probs(&[1.0, 1.0]), &probs(&[0.0, 0.0]));
        assert_eq!(map.binary.baseline.data, vec![false, true]);
        assert_eq!(map.binary.horizon.data, vec![false, false]);
        assert_eq!(map.suitability.horizon.data, vec![None, None]);
    }

    #[test]
    fn range_bounds_restrict_the_totals() {
        let lc = Epochs::new(codes(&[70, 70]), codes(&[70, 70]));
        let mut sp = species(&[1], &[1.0, 1.0], 0.0, 1000.0);
        sp.range_bounds = Some(Rect::new((0.0, 0.0), (CELL, CELL)));
        let map = run(&sp, &lc, &probs(&[1.0, 1.0]), &probs(&[0.0, 0.0]));
        assert_eq!(map.extent.window(), CellWindow { row0: 0, col0: 0, rows: 1, cols: 1 });
        assert!(!map.extent.is_fallback());
        assert_relative_eq!(map.baseline_area_m2, CELL_AREA);

        // A zero-width box is degenerate.
        sp.range_bounds = Some(Rect::new((0.0, 0.0), (0.0, CELL)));
        let map = run(&sp, &lc, &probs(&[1.0, 1.0]), &probs(&[0.0, 0.0]));
        assert!(map.extent.is_fallback());
        assert_relative_eq!(map.baseline_area_m2, 2.0 * CELL_AREA);
    }

    #[test]
    fn range_without_bounds_is_bounded_by_its_cells() {
        // One range cell in a 24 x 24 grid; the ceiling only fits that window.
        let n = 24;
        let mut range = vec![0.0f32; n * n];
        range[5 * n + 7] = 1.0;
        let lc = Epochs::new(grid(n, n, vec![70u16; n * n]), grid(n, n, vec![70u16; n * n]));
        let sp = species_on(&[1], grid(n, n, range), 0.0, 1000.0);
        let params = ReductionParams { max_cells: 300, ..ReductionParams::default() };
        let zeros = grid(n, n, vec![0.0f32; n * n]);
        let map = map_with(&params, &sp, &lc, &zeros, &zeros).unwrap();
        assert_eq!(map.extent, AnalysisExtent::RangeBounds(CellWindow { row0: 5, col0: 7, rows: 1, cols: 1 }));
        assert_relative_eq!(map.baseline_area_m2, CELL_AREA);
    }

    #[test]
    fn empty_range_falls_back_to_full_extent() {
        let lc = Epochs::new(codes(&[70, 70]), codes(&[70, 70]));
        let sp = species(&[1], &[0.0, 0.0], 0.0, 1000.0);
        let map = run(&sp, &lc, &probs(&[1.0, 1.0]), &probs(&[0.0, 0.0]));
        assert_eq!(map.extent, AnalysisExtent::GlobalFallback(lc.baseline.full_window()));
        assert_eq!(map.baseline_area_m2, 0.0);
    }

    #[test]
    fn nan_range_probability_is_rejected() {
        let lc = Epochs::new(codes(&[70]), codes(&[70]));
        let sp = species(&[1], &[f32::NAN], 0.0, 1000.0);
        let err = map_with(&ReductionParams::default(), &sp, &lc, &probs(&[1.0]), &probs(&[0.0])).unwrap_err();
        assert!(matches!(err, HsrError::Config(_)), "{err}");
    }

    #[test]
    fn empty_preferences_are_a_configuration_error() {
        let lc = Epochs::new(codes(&[70]), codes(&[70]));
        let sp = species(&[], &[1.0], 0.0, 1000.0);
        let params = ReductionParams::default();
        let cancel = CancelFlag::new();
        let reducer = Reducer::new(&params, &cancel, 1);
        let err = map_habitat(&sp, &lc, &probs(&[1.0]), &probs(&[0.0]), &reducer).unwrap_err();
        assert!(matches!(err, HsrError::EmptyHabitatMatch { .. }));
    }
}
