//! Urban cluster extraction from the horizon urban-growth forecast.
//!
//! A cluster is a connected group of cells whose urban probability exceeds
//! the threshold, named after the cities it contains. Clusters without a
//! city or below the minimum area are discarded.

pub mod components;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ClusterParams;
use crate::grid::Grid;
use crate::vector::{City, Zone};
pub use components::{label_components, Connectivity};

/// A named urban cluster on the analysis lattice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrbanCluster {
    pub zone: Zone,
    /// Names of the most populous intersecting cities, comma-joined.
    pub cities: String,
    /// Ids of the same cities, comma-joined in the same order.
    pub city_ids: String,
    pub country_of_largest_city: String,
    pub area_m2: f64,
}

/// Extract and name the clusters of a horizon urban-probability grid.
pub fn extract_clusters(horizon_urban: &Grid<f32>, cities: &[City], params: &ClusterParams) -> Vec<UrbanCluster> {
    let (w, h) = (horizon_urban.width, horizon_urban.height);
    let geometry = &horizon_urban.geometry;
    let above = horizon_urban.map(|&p| p > params.probability_threshold);
    let components = label_components(&above, params.connectivity);

    let mut cities_by_cell: HashMap<usize, Vec<&City>> = HashMap::new();
    for city in cities {
        if let Some((r, c)) = geometry.locate(city.x, city.y, w, h) {
            cities_by_cell.entry(r * w + c).or_default().push(city);
        }
    }

    let n_components = components.len();
    let mut clusters = Vec::new();
    for cells in components {
        let mut members: Vec<&City> = cells
            .iter()
            .filter_map(|i| cities_by_cell.get(i))
            .flatten()
            .copied()
            .collect();
        if members.is_empty() {
            continue;
        }
        let zone = Zone::from_cells(cells, w);
        let area_m2 = zone.area_m2(geometry, w);
        if area_m2 < params.min_area_m2 {
            debug!(area_m2, cells = zone.cell_count(), "cluster below minimum area");
            continue;
        }

        members.sort_by(|a, b| b.population.total_cmp(&a.population).then(a.id.cmp(&b.id)));
        // At least the largest city names the cluster.
        members.truncate(params.max_cities.max(1));
        clusters.push(UrbanCluster {
            cities: members.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(","),
            city_ids: members.iter().map(|c| c.id.to_string()).collect::<Vec<_>>().join(","),
            country_of_largest_city: members[0].country.clone(),
            area_m2,
            zone,
        });
    }

    info!(components = n_components, retained = clusters.len(), "extracted urban clusters");
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::GridGeometry;

    const KM: f64 = 1000.0;

    /// 30 km × 30 km grid of 1 km cells, origin at (0, 30 km).
    fn grid_with_block(rows: std::ops::Range<usize>, cols: std::ops::Range<usize>, p: f32) -> Grid<f32> {
        let mut g = Grid::new(30, 30, GridGeometry::projected(0.0, 30.0 * KM, KM), 0.0f32);
        for r in rows {
            for c in cols.clone() {
                g.set(r, c, p);
            }
        }
        g
    }

    fn city(id: i64, name: &str, pop: f64, country: &str, x_km: f64, y_km: f64) -> City {
        City { id, name: name.into(), population: pop, country: country.into(), x: x_km * KM, y: y_km * KM }
    }

    #[test]
    fn block_of_exactly_400_km2_with_a_city_is_retained() {
        let g = grid_with_block(5..25, 5..25, 0.8);
        let cities = vec![city(7, "Centre", 1.0e6, "Freedonia", 15.5, 15.5)];
        let clusters = extract_clusters(&g, &cities, &ClusterParams::default());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].area_m2, 400_000_000.0);
        assert_eq!(clusters[0].cities, "Centre");
        assert_eq!(clusters[0].city_ids, "7");
        assert_eq!(clusters[0].country_of_largest_city, "Freedonia");
    }

    #[test]
    fn block_one_cell_short_is_dropped() {
        let mut g = grid_with_block(5..25, 5..25, 0.8);
        g.set(24, 24, 0.0);
        let cities = vec![city(7, "Centre", 1.0e6, "Freedonia", 15.5, 15.5)];
        assert!(extract_clusters(&g, &cities, &ClusterParams::default()).is_empty());
    }

    #[test]
    fn cluster_without_city_is_dropped() {
        let g = grid_with_block(0..30, 0..30, 0.9);
        let cities = vec![city(1, "Elsewhere", 5.0e5, "Sylvania", 45.0, 45.0)];
        assert!(extract_clusters(&g, &cities, &ClusterParams::default()).is_empty());
    }

    #[test]
    fn threshold_is_strict() {
        let g = grid_with_block(0..30, 0..30, 0.25);
        let cities = vec![city(1, "Edge", 5.0e5, "Sylvania", 15.0, 15.0)];
        assert!(extract_clusters(&g, &cities, &ClusterParams::default()).is_empty());
    }

    #[test]
    fn cities_ranked_by_population_and_capped() {
        let g = grid_with_block(0..30, 0..30, 0.5);
        let mut cities: Vec<City> = (0..12)
            .map(|i| city(100 + i, &format!("C{i}"), (i as f64 + 1.0) * 1000.0, "Sylvania", 1.5 + i as f64, 2.5))
            .collect();
        cities.push(city(1, "Capital", 9.9e6, "Freedonia", 20.5, 20.5));
        let clusters = extract_clusters(&g, &cities, &ClusterParams::default());
        assert_eq!(clusters.len(), 1);
        let names: Vec<&str> = clusters[0].cities.split(',').collect();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "Capital");
        assert_eq!(names[1], "C11");
        assert_eq!(names[9], "C3");
        assert!(clusters[0].city_ids.starts_with("1,111,110"));
        assert_eq!(clusters[0].country_of_largest_city, "Freedonia");
    }

    #[test]
    fn zero_city_cap_still_names_the_largest_city() {
        let g = grid_with_block(0..30, 0..30, 0.5);
        let cities = vec![
            city(4, "Minor", 2.0e4, "Sylvania", 3.5, 3.5),
            city(9, "Major", 3.0e6, "Freedonia", 20.5, 20.5),
        ];
        let params = ClusterParams { max_cities: 0, ..ClusterParams::default() };
        let clusters = extract_clusters(&g, &cities, &params);
        assert_eq!(clusters.len(), 1);
        assert_eq!((clusters[0].cities.as_str(), clusters[0].city_ids.as_str()), ("Major", "9"));
        assert_eq!(clusters[0].country_of_largest_city, "Freedonia");
    }
}
