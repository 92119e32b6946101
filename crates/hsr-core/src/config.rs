//! Analysis parameters shared by every scenario and species.
//! Defaults reproduce the published 2015 → 2050 analysis.

use serde::{Deserialize, Serialize};

use crate::clusters::Connectivity;
use crate::error::{HsrError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub cluster: ClusterParams,
    pub reduction: ReductionParams,
}

/// Urban cluster extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    /// Horizon urban probability a cell must exceed to join a cluster.
    pub probability_threshold: f32,
    /// Smallest retained cluster, in square metres (400 km²).
    pub min_area_m2: f64,
    pub connectivity: Connectivity,
    /// Cities listed per cluster, most populous first.
    pub max_cities: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            probability_threshold: 0.25,
            min_area_m2: 400_000_000.0,
            connectivity: Connectivity::Eight,
            max_cities: 10,
        }
    }
}

/// Zonal reduction limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionParams {
    /// Ceiling on cells a single reduction may touch.
    pub max_cells: u64,
    /// Allow coarsened sampling for presence tests over regions above the
    /// ceiling. Results are marked approximate.
    pub best_effort_presence: bool,
    /// Allow coarsened sampling for area sums above the ceiling.
    pub best_effort_sums: bool,
}

impl Default for ReductionParams {
    fn default() -> Self {
        Self { max_cells: 1_000_000_000_000, best_effort_presence: true, best_effort_sums: false }
    }
}

impl AnalysisConfig {
    /// Parse a (possibly partial) JSON config; missing fields keep defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: AnalysisConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.cluster;
        if !(0.0..1.0).contains(&c.probability_threshold) {
            return Err(HsrError::Config(format!(
                "cluster.probability_threshold {} outside [0, 1)",
                c.probability_threshold
            )));
        }
        if !(c.min_area_m2.is_finite() && c.min_area_m2 >= 0.0) {
            return Err(HsrError::Config(format!("cluster.min_area_m2 {} must be >= 0", c.min_area_m2)));
        }
        if c.max_cities == 0 {
            return Err(HsrError::Config("cluster.max_cities must be at least 1".into()));
        }
        if self.reduction.max_cells == 0 {
            return Err(HsrError::Config("reduction.max_cells must be at least 1".into()));
        }
        Ok(())
    }
}
