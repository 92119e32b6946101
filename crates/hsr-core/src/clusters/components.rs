//! Connected-component labelling of a boolean mask.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::grid::Mask;

/// Neighbourhood used when growing components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Four,
    Eight,
}

/// N, S, W, E.
const OFFSETS_4: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// N, S, W, E, NW, NE, SW, SE.
const OFFSETS_8: [(isize, isize); 8] = [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, -1), (-1, 1), (1, -1), (1, 1)];

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &OFFSETS_4,
            Connectivity::Eight => &OFFSETS_8,
        }
    }
}

/// Maximal connected groups of `true` cells.
///
/// Components are returned in row-major order of their first cell, each as
/// sorted cell indices, so labelling is deterministic.
pub fn label_components(mask: &Mask, connectivity: Connectivity) -> Vec<Vec<usize>> {
    let (w, h) = (mask.width, mask.height);
    let mut seen = vec![false; w * h];
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..w * h {
        if !mask.data[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        queue.clear();
        queue.push_back(start);
        let mut cells = Vec::new();

        while let Some(i) = queue.pop_front() {
            cells.push(i);
            let (r, c) = ((i / w) as isize, (i % w) as isize);
            for &(dr, dc) in connectivity.offsets() {
                let (nr, nc) = (r + dr, c + dc);
                if nr < 0 || nc < 0 || nr >= h as isize || nc >= w as isize {
                    continue;
                }
                let j = nr as usize * w + nc as usize;
                if mask.data[j] && !seen[j] {
                    seen[j] = true;
                    queue.push_back(j);
                }
            }
        }

        cells.sort_unstable();
        components.push(cells);
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::GridGeometry;
    use crate::grid::Grid;

    fn mask(rows: &[&str]) -> Mask {
        let w = rows[0].len();
        let data = rows.iter().flat_map(|r| r.chars().map(|ch| ch == '#')).collect();
        Grid::from_vec(w, rows.len(), GridGeometry::projected(0.0, 0.0, 1.0), data).unwrap()
    }

    #[test]
    fn diagonal_cells_join_only_with_eight_connectivity() {
        let m = mask(&["#..", ".#.", "..#"]);
        assert_eq!(label_components(&m, Connectivity::Eight), vec![vec![0, 4, 8]]);
        assert_eq!(label_components(&m, Connectivity::Four), vec![vec![0], vec![4], vec![8]]);
    }

    #[test]
    fn components_cover_all_true_cells_once() {
        let m = mask(&["##..#", "#...#", "..#..", "####."]);
        let comps = label_components(&m, Connectivity::Four);
        let total: usize = comps.iter().map(Vec::len).sum();
        assert_eq!(total, m.data.iter().filter(|&&b| b).count());
        assert_eq!(comps.len(), 3);
        assert_eq!(comps[0], vec![0, 1, 5]);
    }

    #[test]
    fn empty_mask_has_no_components() {
        let m = mask(&["...", "..."]);
        assert!(label_components(&m, Connectivity::Eight).is_empty());
    }
}
