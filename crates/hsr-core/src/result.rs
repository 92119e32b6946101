//! Per-species, per-scenario output records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::habitat::{AnalysisExtent, UrbanAffinity};

/// A ratio against the baseline habitat area, which may be zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "value")]
pub enum Proportion {
    Defined(f64),
    /// The denominator was zero.
    Undefined,
}

impl Proportion {
    pub fn of(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            Proportion::Undefined
        } else {
            Proportion::Defined(numerator / denominator)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match *self {
            Proportion::Defined(v) => Some(v),
            Proportion::Undefined => None,
        }
    }
}

/// Urban habitat change inside one country, in m². Positive is a gain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryChange {
    pub name: String,
    pub urban_change_m2: f64,
}

/// Urban habitat change inside one urban cluster, in m².
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterChange {
    pub cities: String,
    pub city_ids: String,
    pub country_of_largest_city: String,
    pub urban_change_m2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub scenario: String,
    pub species: String,
    pub taxon: String,
    pub habitat_preferences: Vec<u8>,
    pub land_cover_codes: Vec<u16>,
    pub affinity: UrbanAffinity,

    pub baseline_area_m2: f64,
    pub horizon_area_m2: f64,
    /// Urban change ÷ baseline area.
    pub prop_urban_change: Proportion,
    /// (horizon − baseline) ÷ baseline area.
    pub prop_all_change: Proportion,

    pub urban_change_m2: f64,
    pub urban_change_by_country: Vec<CountryChange>,
    pub urban_change_by_cluster: Vec<ClusterChange>,
    /// Non-urban change keyed by horizon land-cover code, ascending.
    pub non_urban_change_by_driver_m2: BTreeMap<u16, f64>,

    pub extent: AnalysisExtent,
    /// Some total was sampled on a coarsened lattice.
    pub approximate: bool,
}

impl ResultRecord {
    /// Sum of all attributed change (urban plus every driver).
    pub fn attributed_change_m2(&self) -> f64 {
        self.urban_change_m2 + self.non_urban_change_by_driver_m2.values().sum::<f64>()
    }
}
