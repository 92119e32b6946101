//! Habitat change and its attribution to urban and non-urban land use.
//!
//! Per cell, the suitability change between epochs is split into an urban
//! share (explained by new urban land) and a non-urban remainder. The urban
//! share is summed over the species extent, per country and per urban
//! cluster; the remainder is grouped by the horizon land-cover code that
//! replaced (or became) habitat.
//!
//! Cells that gain habitat through non-urban change while losing part of it
//! to urban growth are counted once, entirely as non-urban gain.

use std::collections::BTreeMap;

use tracing::debug;

use crate::clusters::UrbanCluster;
use crate::error::Result;
use crate::grid::{Grid, Masked};
use crate::habitat::HabitatMap;
use crate::landcover::{Epochs, LandCover};
use crate::result::{ClusterChange, CountryChange};
use crate::vector::{CountryZone, Zone};
use crate::zonal::{Reducer, Reduction, Region};

/// Per-cell change rasters; every layer is masked where nothing changed.
#[derive(Debug, Clone)]
pub struct ChangeLayers {
    /// Horizon − baseline suitable fraction.
    pub change: Masked<f64>,
    /// Change attributed to urban growth, m². Also masked on excluded cells.
    pub urban_area_m2: Masked<f64>,
    /// Change attributed to everything else, m².
    pub non_urban_area_m2: Masked<f64>,
}

/// Reduced attribution totals for one species.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub urban_change_m2: f64,
    pub by_country: Vec<CountryChange>,
    pub by_cluster: Vec<ClusterChange>,
    pub drivers_m2: BTreeMap<u16, f64>,
    pub approximate: bool,
}

/// Split each cell's habitat change into urban and non-urban parts.
///
/// `urban` holds the baseline and horizon urban probabilities.
pub fn change_layers(habitat: &HabitatMap, urban: &Epochs<Grid<f32>>) -> Result<ChangeLayers> {
    let suit = &habitat.suitability;
    urban.ensure_aligned()?;
    suit.baseline.ensure_aligned("suitability", &urban.baseline, "baseline urban")?;

    let (w, h, geometry) = (suit.baseline.width, suit.baseline.height, suit.baseline.geometry);
    let mut change = Grid::new(w, h, geometry, None);
    let mut urban_area = change.clone();
    let mut non_urban_area = change.clone();
    let (before, after) = (suit.baseline.unmask(0.0), suit.horizon.unmask(0.0));

    for i in 0..suit.baseline.len() {
        let delta = after.data[i] - before.data[i];
        if delta == 0.0 {
            continue;
        }
        let area = geometry.cell_area_m2(i / w);
        let new_urban = urban.horizon.data[i] as f64 - urban.baseline.data[i] as f64;
        let urban_prop = (!gains_despite_urban(habitat, i)).then(|| 1.0 - (delta.abs() - new_urban));

        change.data[i] = Some(delta);
        urban_area.data[i] = urban_prop.map(|p| area * delta * p);
        non_urban_area.data[i] = Some(area * delta * (1.0 - urban_prop.unwrap_or(0.0)));
    }

    Ok(ChangeLayers { change, urban_area_m2: urban_area, non_urban_area_m2: non_urban_area })
}

/// Newly matched habitat at the horizon that is only partly suitable
/// because of urban growth.
fn gains_despite_urban(habitat: &HabitatMap, i: usize) -> bool {
    !habitat.binary.baseline.data[i]
        && habitat.binary.horizon.data[i]
        && habitat.suitability.horizon.data[i].is_some_and(|p| p > 0.0 && p < 1.0)
}

/// Reduce the change layers over the species extent, countries and clusters.
///
/// Countries and clusters are reported only where the species has baseline
/// habitat; `driver_land_cover` is the unreclassified reconciled horizon.
pub fn attribute(
    species: &str,
    habitat: &HabitatMap,
    layers: &ChangeLayers,
    driver_land_cover: &LandCover,
    countries: &[CountryZone],
    clusters: &[UrbanCluster],
    reducer: &Reducer<'_>,
) -> Result<Attribution> {
    layers.change.ensure_aligned("change", driver_land_cover, "driver land cover")?;
    let extent = Region::Window(habitat.extent.window());

    let urban = reducer.sum(&format!("{species} urban change"), extent, |i| {
        layers.urban_area_m2.data[i].filter(|&v| v != 0.0)
    })?;
    let drivers = reducer.grouped_sum(&format!("{species} non-urban drivers"), extent, |i| {
        layers.non_urban_area_m2.data[i]
            .filter(|&v| v != 0.0)
            .map(|v| (driver_land_cover.data[i], v))
    })?;

    let zone_change = |label: &str, zone: &Zone| -> Result<Option<Reduction<f64>>> {
        let presence = reducer.any_nonzero(&format!("{species} presence in {label}"), Region::Zone(zone), |i| {
            habitat.suitability.baseline.data[i]
        })?;
        if !presence.value {
            return Ok(None);
        }
        let sum = reducer.sum(&format!("{species} urban change in {label}"), Region::Zone(zone), |i| {
            layers.urban_area_m2.data[i]
        })?;
        Ok(Some(Reduction { value: sum.value, approximate: sum.approximate || presence.approximate }))
    };

    let (by_country, countries_approx) = per_region(countries, |c| {
        Ok(zone_change(&c.name, &c.zone)?.map(|r| Reduction {
            value: CountryChange { name: c.name.clone(), urban_change_m2: r.value },
            approximate: r.approximate,
        }))
    })?;
    let (by_cluster, clusters_approx) = per_region(clusters, |k| {
        Ok(zone_change(&k.cities, &k.zone)?.map(|r| Reduction {
            value: ClusterChange {
                cities: k.cities.clone(),
                city_ids: k.city_ids.clone(),
                country_of_largest_city: k.country_of_largest_city.clone(),
                urban_change_m2: r.value,
            },
            approximate: r.approximate,
        }))
    })?;

    debug!(
        species,
        urban_m2 = urban.value,
        drivers = drivers.value.len(),
        countries = by_country.len(),
        clusters = by_cluster.len(),
        "attributed habitat change"
    );

    Ok(Attribution {
        urban_change_m2: urban.value,
        by_country,
        by_cluster,
        drivers_m2: drivers.value,
        approximate: urban.approximate || drivers.approximate || countries_approx || clusters_approx,
    })
}

/// Reduce each region independently, keeping input order and dropping
/// regions that report nothing.
fn per_region<T, R>(
    regions: &[T],
    f: impl Fn(&T) -> Result<Option<Reduction<R>>> + Sync + Send,
) -> Result<(Vec<R>, bool)>
where
    T: Sync,
    R: Send,
{
    #[cfg(feature = "threading")]
    let reduced: Vec<Option<Reduction<R>>> = {
        use rayon::prelude::*;
        regions.par_iter().map(&f).collect::<Result<_>>()?
    };
    #[cfg(not(feature = "threading"))]
    let reduced: Vec<Option<Reduction<R>>> = regions.iter().map(&f).collect::<Result<_>>()?;

    let mut approximate = false;
    let values = reduced
        .into_iter()
        .flatten()
        .map(|r| {
            approximate |= r.approximate;
            r.value
        })
        .collect();
    Ok((values, approximate))
}
