//! Habitat preference → land-cover lookup.
//!
//! Species preferences use the 16 non-water IGBP land-cover classes. Each is
//! matched to the GLOBIO / CCI codes it corresponds to. The table is static
//! and shared by every species.

use crate::error::{HsrError, Result};

/// IGBP "Urban and Built-up Lands".
pub const URBAN_PREFERENCE: u8 = 13;

/// IGBP class names, indexed by preference code − 1.
pub const PREFERENCE_NAMES: [&str; 16] = [
    "Evergreen Needleleaf Forests",
    "Evergreen Broadleaf Forests",
    "Deciduous Needleleaf Forests",
    "Deciduous Broadleaf Forests",
    "Mixed Forests",
    "Closed Shrublands",
    "Open Shrublands",
    "Woody Savannas",
    "Savannas",
    "Grasslands",
    "Permanent Wetlands",
    "Croplands",
    "Urban and Built-up Lands",
    "Cropland/Natural Vegetation Mosaics",
    "Snow and Ice",
    "Barren",
];

/// Land-cover codes matched by each preference, indexed by code − 1.
/// Croplands (12) include low-intensity pasture (4) that the reclassifier
/// could not resolve to a natural code.
static HABITAT_LOOKUP: [&[u16]; 16] = [
    &[70, 71],
    &[50],
    &[80, 81, 82],
    &[60, 61],
    &[90],
    &[120],
    &[100, 110, 120, 121, 122, 130, 150],
    &[70, 80, 71, 60, 100, 72, 121],
    &[80, 62, 120, 70, 60, 100, 110],
    &[110, 120, 130, 140],
    &[160, 170, 180],
    &[2, 230, 231, 3, 4],
    &[1, 190],
    &[2, 230, 231],
    &[220],
    &[151, 152, 153, 200, 201, 202],
];

/// Codes matched by one preference, or `None` outside 1–16.
pub fn land_cover_codes(preference: u8) -> Option<&'static [u16]> {
    preference
        .checked_sub(1)
        .and_then(|i| HABITAT_LOOKUP.get(i as usize))
        .copied()
}

/// Expand a species' preferences into a sorted, deduplicated code set.
pub fn expand_preferences(species: &str, preferences: &[u8]) -> Result<Vec<u16>> {
    let mut codes = Vec::new();
    for &p in preferences {
        let matched = land_cover_codes(p).ok_or_else(|| HsrError::UnknownPreference {
            species: species.to_string(),
            code: p,
        })?;
        codes.extend_from_slice(matched);
    }
    codes.sort_unstable();
    codes.dedup();
    if codes.is_empty() {
        return Err(HsrError::EmptyHabitatMatch { species: species.to_string() });
    }
    Ok(codes)
}
