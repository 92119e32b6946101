use geo::Rect;
use serde::{Deserialize, Serialize};

use super::preferences::{expand_preferences, URBAN_PREFERENCE};
use crate::error::{HsrError, Result};
use crate::grid::Grid;

/// One species to assess. Immutable input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesRecord {
    pub name: String,
    pub taxon: String,
    /// Inclusive elevation band in metres.
    pub elevation_min: f64,
    pub elevation_max: f64,
    /// IGBP preference codes, 1–16.
    pub habitat_preferences: Vec<u8>,
    /// Range probability; cells > 0 are inside the range.
    pub range: Grid<f32>,
    /// Bounding geometry of the range map, in grid CRS units. `None` bounds
    /// the range by the cells it covers.
    #[serde(default)]
    pub range_bounds: Option<Rect<f64>>,
}

/// How urban growth affects a species' horizon habitat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrbanAffinity {
    /// Urban growth removes habitat in proportion to its probability.
    Intolerant,
    /// Urban land is habitat; urban growth inside the range adds habitat.
    Tolerant,
}

/// Validated per-species habitat definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitatProfile {
    pub land_cover_codes: Vec<u16>,
    pub affinity: UrbanAffinity,
}

impl HabitatProfile {
    #[inline]
    pub fn matches(&self, code: u16) -> bool {
        self.land_cover_codes.binary_search(&code).is_ok()
    }
}

impl SpeciesRecord {
    /// Validate the record and resolve its habitat profile.
    pub fn profile(&self) -> Result<HabitatProfile> {
        let (min, max) = (self.elevation_min, self.elevation_max);
        if !(min.is_finite() && max.is_finite() && min <= max) {
            return Err(HsrError::InvalidElevationBand { species: self.name.clone(), min, max });
        }
        let land_cover_codes = expand_preferences(&self.name, &self.habitat_preferences)?;
        let affinity = if self.habitat_preferences.contains(&URBAN_PREFERENCE) {
            UrbanAffinity::Tolerant
        } else {
            UrbanAffinity::Intolerant
        };
        Ok(HabitatProfile { land_cover_codes, affinity })
    }

    #[inline]
    pub fn in_range(&self, i: usize) -> bool {
        self.range.data[i] > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::GridGeometry;

    fn species(prefs: Vec<u8>, min: f64, max: f64) -> SpeciesRecord {
        SpeciesRecord {
            name: "Testus exemplaris".into(),
            taxon: "birds".into(),
            elevation_min: min,
            elevation_max: max,
            habitat_preferences: prefs,
            range: Grid::new(2, 2, GridGeometry::projected(0.0, 2.0, 1.0), 1.0),
            range_bounds: None,
        }
    }

    #[test]
    fn urban_preference_selects_tolerant_strategy() {
        assert_eq!(species(vec![1, 13], 0.0, 100.0).profile().unwrap().affinity, UrbanAffinity::Tolerant);
        assert_eq!(species(vec![1, 12], 0.0, 100.0).profile().unwrap().affinity, UrbanAffinity::Intolerant);
    }

    #[test]
    fn inverted_or_nan_elevation_band_rejected() {
        assert!(matches!(species(vec![1], 100.0, 0.0).profile(), Err(HsrError::InvalidElevationBand { .. })));
        assert!(species(vec![1], f64::NAN, 0.0).profile().is_err());
        assert!(species(vec![1], 50.0, 50.0).profile().is_ok());
    }

    #[test]
    fn profile_matches_expanded_codes() {
        let p = species(vec![12], 0.0, 1.0).profile().unwrap();
        assert!(p.matches(4));
        assert!(p.matches(231));
        assert!(!p.matches(1));
    }
}
