//! Zonal reductions over windows and rasterized zones.
//!
//! Every reduction is a bounded, cancelable unit of work:
//! - regions touching more cells than `ReductionParams::max_cells` fail with
//!   [`HsrError::ReductionCeiling`], unless best-effort is enabled for that
//!   reduction kind, in which case the region is sampled on a coarsened
//!   lattice and the result is flagged approximate;
//! - a raised [`CancelFlag`] aborts the reduction with [`HsrError::Cancelled`].
//!
//! Cells are visited in ascending index order so sums are reproducible.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::config::ReductionParams;
use crate::error::{HsrError, Result};
use crate::grid::CellWindow;
use crate::vector::Zone;

/// Cells visited between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 1 << 16;

/// Shared flag that aborts in-flight reductions.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The cells a reduction runs over.
#[derive(Debug, Clone, Copy)]
pub enum Region<'a> {
    Window(CellWindow),
    Zone(&'a Zone),
}

impl Region<'_> {
    pub fn cell_count(&self) -> u64 {
        match self {
            Region::Window(w) => w.cell_count(),
            Region::Zone(z) => z.cell_count(),
        }
    }
}

/// A reduced value and whether it came from a sampled lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reduction<T> {
    pub value: T,
    pub approximate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Presence,
    Sum,
}

/// Runs reductions on a grid `width` cells wide.
#[derive(Debug, Clone, Copy)]
pub struct Reducer<'a> {
    params: &'a ReductionParams,
    cancel: &'a CancelFlag,
    width: usize,
}

impl<'a> Reducer<'a> {
    pub fn new(params: &'a ReductionParams, cancel: &'a CancelFlag, width: usize) -> Self {
        Self { params, cancel, width }
    }

    /// Σ `value(i)` over unmasked cells.
    pub fn sum(&self, label: &str, region: Region<'_>, value: impl Fn(usize) -> Option<f64>) -> Result<Reduction<f64>> {
        let mut total = 0.0;
        let plan = self.plan(label, region, Kind::Sum)?;
        self.visit(label, region, plan.stride, |i| {
            if let Some(v) = value(i) {
                total += v;
            }
            true
        })?;
        Ok(Reduction { value: total * plan.weight, approximate: plan.approximate })
    }

    /// Whether any unmasked cell is non-zero.
    pub fn any_nonzero(&self, label: &str, region: Region<'_>, value: impl Fn(usize) -> Option<f64>) -> Result<Reduction<bool>> {
        let mut found = false;
        let plan = self.plan(label, region, Kind::Presence)?;
        self.visit(label, region, plan.stride, |i| {
            found = value(i).is_some_and(|v| v != 0.0);
            !found
        })?;
        Ok(Reduction { value: found, approximate: plan.approximate })
    }

    /// Σ of values grouped by an integer key, keys in ascending order.
    pub fn grouped_sum(
        &self,
        label: &str,
        region: Region<'_>,
        value: impl Fn(usize) -> Option<(u16, f64)>,
    ) -> Result<Reduction<BTreeMap<u16, f64>>> {
        let mut groups: BTreeMap<u16, f64> = BTreeMap::new();
        let plan = self.plan(label, region, Kind::Sum)?;
        self.visit(label, region, plan.stride, |i| {
            if let Some((key, v)) = value(i) {
                *groups.entry(key).or_insert(0.0) += v;
            }
            true
        })?;
        if plan.weight != 1.0 {
            for v in groups.values_mut() {
                *v *= plan.weight;
            }
        }
        Ok(Reduction { value: groups, approximate: plan.approximate })
    }

    fn plan(&self, label: &str, region: Region<'_>, kind: Kind) -> Result<Plan> {
        let cells = region.cell_count();
        let max_cells = self.params.max_cells;
        if cells <= max_cells {
            return Ok(Plan { stride: 1, weight: 1.0, approximate: false });
        }
        let best_effort = match kind {
            Kind::Presence => self.params.best_effort_presence,
            Kind::Sum => self.params.best_effort_sums,
        };
        if !best_effort {
            return Err(HsrError::ReductionCeiling { region: label.to_string(), cells, max_cells });
        }
        let stride = ((cells as f64 / max_cells as f64).sqrt().ceil() as usize).max(2);
        warn!(region = label, cells, max_cells, stride, "best-effort reduction on coarsened lattice");
        Ok(Plan { stride, weight: (stride * stride) as f64, approximate: true })
    }

    /// Visit cells of `region` on a lattice of step `stride`; `f` returns
    /// false to stop early.
    fn visit(&self, label: &str, region: Region<'_>, stride: usize, mut f: impl FnMut(usize) -> bool) -> Result<()> {
        let w = self.width;
        let on_lattice = |i: usize| stride == 1 || ((i / w) % stride == 0 && (i % w) % stride == 0);
        let mut visited = 0usize;
        let mut step = |i: usize| -> Result<bool> {
            visited += 1;
            if visited % CANCEL_CHECK_INTERVAL == 0 && self.cancel.is_cancelled() {
                return Err(HsrError::Cancelled { region: label.to_string() });
            }
            Ok(f(i))
        };
        if self.cancel.is_cancelled() {
            return Err(HsrError::Cancelled { region: label.to_string() });
        }
        match region {
            Region::Window(win) => {
                for (r, c) in win.cells() {
                    let i = r * w + c;
                    if on_lattice(i) && !step(i)? {
                        break;
                    }
                }
            }
            Region::Zone(zone) => {
                for &i in &zone.cells {
                    if on_lattice(i) && !step(i)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

struct Plan {
    stride: usize,
    /// Cells represented by each sampled cell.
    weight: f64,
    approximate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_cells: u64, presence: bool, sums: bool) -> ReductionParams {
        ReductionParams { max_cells, best_effort_presence: presence, best_effort_sums: sums }
    }

    fn window(rows: usize, cols: usize) -> Region<'static> {
        Region::Window(CellWindow { row0: 0, col0: 0, rows, cols })
    }

    #[test]
    fn sum_skips_masked_cells() {
        let p = params(1000, false, false);
        let cancel = CancelFlag::new();
        let r = Reducer::new(&p, &cancel, 4);
        let out = r.sum("w", window(4, 4), |i| (i % 2 == 0).then_some(1.5)).unwrap();
        assert_eq!(out, Reduction { value: 12.0, approximate: false });
    }

    #[test]
    fn ceiling_is_fatal_without_best_effort() {
        let p = params(10, false, false);
        let cancel = CancelFlag::new();
        let r = Reducer::new(&p, &cancel, 4);
        let err = r.sum("species range", window(4, 4), |_| Some(1.0)).unwrap_err();
        assert!(matches!(err, HsrError::ReductionCeiling { cells: 16, max_cells: 10, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn best_effort_sum_is_scaled_and_flagged() {
        let p = params(10, false, true);
        let cancel = CancelFlag::new();
        let r = Reducer::new(&p, &cancel, 4);
        // stride 2 samples (0,0) (0,2) (2,0) (2,2), each weighted 4.
        let out = r.sum("w", window(4, 4), |_| Some(1.0)).unwrap();
        assert_eq!(out, Reduction { value: 16.0, approximate: true });
    }

    #[test]
    fn presence_best_effort_is_separate_from_sums() {
        let p = params(10, true, false);
        let cancel = CancelFlag::new();
        let r = Reducer::new(&p, &cancel, 4);
        let hit = r.any_nonzero("w", window(4, 4), |i| Some(if i == 10 { 1.0 } else { 0.0 })).unwrap();
        assert_eq!(hit, Reduction { value: true, approximate: true });
        assert!(r.sum("w", window(4, 4), |_| Some(1.0)).is_err());
    }

    #[test]
    fn zone_grouped_sum_orders_keys() {
        let p = params(100, false, false);
        let cancel = CancelFlag::new();
        let r = Reducer::new(&p, &cancel, 4);
        let zone = Zone::from_cells(vec![1, 2, 5, 6], 4);
        let keys = [0u16, 190, 2, 190, 50, 50, 2, 0];
        let out = r.grouped_sum("z", Region::Zone(&zone), |i| Some((keys[i], 1.0))).unwrap();
        assert_eq!(out.value.into_iter().collect::<Vec<_>>(), vec![(2, 2.0), (50, 1.0), (190, 1.0)]);
    }

    #[test]
    fn cancelled_flag_aborts() {
        let p = params(100, false, false);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let r = Reducer::new(&p, &cancel, 4);
        assert!(matches!(r.sum("w", window(2, 2), |_| Some(1.0)), Err(HsrError::Cancelled { .. })));
    }
}
