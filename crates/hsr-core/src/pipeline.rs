//! Scenario orchestrator: runs every stage for each scenario and species.
//!
//! Per scenario (once):
//!   1. Reclassify pasture / secondary vegetation
//!   2. Reconcile urban extent (reclassified and unreclassified variants)
//!   3. Extract urban clusters from the horizon forecast
//!
//! Per species (independent, parallel under `threading`):
//!   4. Habitat suitability
//!   5. Change attribution
//!   6. Result record

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::attribution::{attribute, change_layers, ChangeLayers};
use crate::clusters::{extract_clusters, UrbanCluster};
use crate::config::AnalysisConfig;
use crate::error::{HsrError, Result};
use crate::grid::Grid;
use crate::habitat::{map_habitat, HabitatMap, SpeciesRecord};
use crate::landcover::{reclassify, reconcile_urban, Epochs, LandCover};
use crate::result::{Proportion, ResultRecord};
use crate::vector::{rasterize_countries, City, Country, CountryZone};
use crate::zonal::{CancelFlag, Reducer};

// ── Inputs ────────────────────────────────────────────────────────────────────

/// Layers shared by every scenario, all on the land-cover lattice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineInputs {
    /// Baseline-year land cover, before reclassification.
    pub land_cover: LandCover,
    /// Earlier land cover used to resolve pasture at the baseline.
    pub reference_land_cover: LandCover,
    /// Baseline urban probability (absent as 0).
    pub urban: Grid<f32>,
    pub elevation: Grid<f32>,
    pub countries: Vec<Country>,
    pub cities: Vec<City>,
}

/// One land-use forecast for the horizon year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub land_cover: LandCover,
    /// Horizon urban-growth probability (absent as 0).
    pub urban: Grid<f32>,
}

/// Scenario-level layers shared by every species.
#[derive(Debug, Clone)]
pub struct ScenarioLayers {
    pub name: String,
    /// Reclassified and urban-reconciled; used for habitat matching.
    pub habitat_land_cover: Epochs<LandCover>,
    /// Urban-reconciled only; its horizon names the non-urban drivers.
    pub driver_land_cover: Epochs<LandCover>,
    pub urban: Epochs<Grid<f32>>,
    pub clusters: Vec<UrbanCluster>,
}

/// Everything produced for one species in one scenario.
#[derive(Debug, Clone)]
pub struct SpeciesAssessment {
    pub habitat: HabitatMap,
    pub changes: ChangeLayers,
    pub record: ResultRecord,
}

/// A species that could not be assessed. The rest of the batch continues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesFailure {
    pub scenario: String,
    pub species: String,
    pub error: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub records: Vec<ResultRecord>,
    pub failures: Vec<SpeciesFailure>,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct Analysis {
    config: AnalysisConfig,
    cancel: CancelFlag,
    baseline: BaselineInputs,
    countries: Vec<CountryZone>,
}

impl Analysis {
    /// Validate the config and baseline layers and rasterize the countries.
    pub fn new(config: AnalysisConfig, baseline: BaselineInputs) -> Result<Self> {
        config.validate()?;
        let lc = &baseline.land_cover;
        lc.ensure_aligned("baseline land cover", &baseline.reference_land_cover, "reference land cover")?;
        lc.ensure_aligned("baseline land cover", &baseline.urban, "baseline urban")?;
        lc.ensure_aligned("baseline land cover", &baseline.elevation, "elevation")?;
        baseline.urban.ensure_probability("baseline urban")?;
        let countries = rasterize_countries(&baseline.countries, &lc.geometry, lc.width, lc.height);
        if countries.len() < baseline.countries.len() {
            warn!(
                dropped = baseline.countries.len() - countries.len(),
                "countries without cells on the grid ignored"
            );
        }
        Ok(Self { config, cancel: CancelFlag::new(), baseline, countries })
    }

    /// Handle that aborts in-flight reductions when raised.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn countries(&self) -> &[CountryZone] {
        &self.countries
    }

    /// Stages 1–3 for one scenario.
    pub fn prepare_scenario(&self, scenario: &Scenario) -> Result<ScenarioLayers> {
        let start = Instant::now();
        let b = &self.baseline;
        b.land_cover.ensure_aligned("baseline land cover", &scenario.land_cover, "horizon land cover")?;
        b.land_cover.ensure_aligned("baseline land cover", &scenario.urban, "horizon urban")?;
        scenario.urban.ensure_probability("horizon urban")?;

        // ── 1. Reclassification ─────────────────────────────────────────────
        let reclassified = reclassify(&b.land_cover, &scenario.land_cover, &b.reference_land_cover)?;

        // ── 2. Urban reconciliation ─────────────────────────────────────────
        let habitat_land_cover = reconcile_urban(&reclassified, &b.urban)?;
        let raw = Epochs::new(b.land_cover.clone(), scenario.land_cover.clone());
        let driver_land_cover = reconcile_urban(&raw, &b.urban)?;

        // ── 3. Urban clusters ───────────────────────────────────────────────
        let clusters = extract_clusters(&scenario.urban, &b.cities, &self.config.cluster);

        info!(
            scenario = %scenario.name,
            clusters = clusters.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "prepared scenario layers"
        );
        Ok(ScenarioLayers {
            name: scenario.name.clone(),
            habitat_land_cover,
            driver_land_cover,
            urban: Epochs::new(b.urban.clone(), scenario.urban.clone()),
            clusters,
        })
    }

    /// Stages 4–6 for one species.
    pub fn assess_species(&self, layers: &ScenarioLayers, species: &SpeciesRecord) -> Result<SpeciesAssessment> {
        let lc = &layers.habitat_land_cover;
        let reducer = Reducer::new(&self.config.reduction, &self.cancel, lc.baseline.width);

        // ── 4. Habitat suitability ──────────────────────────────────────────
        let habitat = map_habitat(species, lc, &self.baseline.elevation, &layers.urban.horizon, &reducer)?;

        // ── 5. Change attribution ───────────────────────────────────────────
        let changes = change_layers(&habitat, &layers.urban)?;
        let attribution = attribute(
            &species.name,
            &habitat,
            &changes,
            &layers.driver_land_cover.horizon,
            &self.countries,
            &layers.clusters,
            &reducer,
        )?;

        // ── 6. Result record ────────────────────────────────────────────────
        let (base, horizon) = (habitat.baseline_area_m2, habitat.horizon_area_m2);
        let record = ResultRecord {
            scenario: layers.name.clone(),
            species: species.name.clone(),
            taxon: species.taxon.clone(),
            habitat_preferences: species.habitat_preferences.clone(),
            land_cover_codes: habitat.profile.land_cover_codes.clone(),
            affinity: habitat.profile.affinity,
            baseline_area_m2: base,
            horizon_area_m2: horizon,
            prop_urban_change: Proportion::of(attribution.urban_change_m2, base),
            prop_all_change: Proportion::of(horizon - base, base),
            urban_change_m2: attribution.urban_change_m2,
            urban_change_by_country: attribution.by_country,
            urban_change_by_cluster: attribution.by_cluster,
            non_urban_change_by_driver_m2: attribution.drivers_m2,
            extent: habitat.extent,
            approximate: habitat.approximate || attribution.approximate,
        };
        Ok(SpeciesAssessment { habitat, changes, record })
    }

    /// Assess every species against one scenario. Output order follows
    /// `species`; failures are collected rather than aborting the batch.
    pub fn assess_batch(&self, layers: &ScenarioLayers, species: &[SpeciesRecord]) -> BatchReport {
        let assess = |sp: &SpeciesRecord| {
            self.assess_species(layers, sp)
                .map(|a| a.record)
                .map_err(|e| self.failure(layers, sp, e))
        };

        #[cfg(feature = "threading")]
        let outcomes: Vec<std::result::Result<ResultRecord, SpeciesFailure>> = {
            use rayon::prelude::*;
            species.par_iter().map(assess).collect()
        };
        #[cfg(not(feature = "threading"))]
        let outcomes: Vec<std::result::Result<ResultRecord, SpeciesFailure>> = species.iter().map(assess).collect();

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(record) => report.records.push(record),
                Err(failure) => report.failures.push(failure),
            }
        }
        info!(
            scenario = %layers.name,
            assessed = report.records.len(),
            failed = report.failures.len(),
            "species batch complete"
        );
        report
    }

    /// Run every scenario in order. A scenario whose shared layers cannot
    /// be built is an error; species failures are reported in the batch.
    pub fn run(&self, scenarios: &[Scenario], species: &[SpeciesRecord]) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for scenario in scenarios {
            if self.cancel.is_cancelled() {
                return Err(HsrError::Cancelled { region: scenario.name.clone() });
            }
            let layers = self.prepare_scenario(scenario)?;
            let batch = self.assess_batch(&layers, species);
            report.records.extend(batch.records);
            report.failures.extend(batch.failures);
        }
        Ok(report)
    }

    fn failure(&self, layers: &ScenarioLayers, species: &SpeciesRecord, error: HsrError) -> SpeciesFailure {
        warn!(scenario = %layers.name, species = %species.name, %error, "species assessment failed");
        SpeciesFailure {
            scenario: layers.name.clone(),
            species: species.name.clone(),
            retryable: error.is_retryable(),
            error: error.to_string(),
        }
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
