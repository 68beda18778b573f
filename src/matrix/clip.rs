//! Clip view: percentile window on expression values
//!
//! Values of each numeric X column that fall outside the column's
//! `[q(min_pct), q(max_pct)]` quantiles become NaN. Quantiles are computed
//! over the finite values visible at the clip view, so clipping follows the
//! rows of the chain below it. Row count never changes.

use super::view_cache::ViewCache;
use super::{AnnoMatrix, MatrixNode};
use crate::dataframe::{ColumnData, Dataframe};
use crate::error::Result;
use std::sync::Arc;

/// Percentile window, both ends in `[0, 100]`, `min_pct < max_pct`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipBounds {
    min_pct: f64,
    max_pct: f64,
}

impl ClipBounds {
    /// None for a degenerate or out-of-range window
    pub fn new(min_pct: f64, max_pct: f64) -> Option<Self> {
        let in_range = |p: f64| p.is_finite() && (0.0..=100.0).contains(&p);
        (in_range(min_pct) && in_range(max_pct) && min_pct < max_pct)
            .then_some(ClipBounds { min_pct, max_pct })
    }

    pub fn min_pct(&self) -> f64 {
        self.min_pct
    }

    pub fn max_pct(&self) -> f64 {
        self.max_pct
    }
}

#[derive(Clone)]
pub struct ClipView {
    pub(super) parent: AnnoMatrix,
    pub(super) bounds: ClipBounds,
    pub(super) cache: ViewCache,
}

impl ClipView {
    pub fn bounds(&self) -> ClipBounds {
        self.bounds
    }

    pub fn parent(&self) -> &AnnoMatrix {
        &self.parent
    }
}

/// Wrap `parent` in a clip view (no unwrapping, see `stack::clip` for that)
pub(super) fn clip_view(parent: &AnnoMatrix, bounds: ClipBounds) -> AnnoMatrix {
    log::debug!(
        "Clip view [{}, {}] over {} rows",
        bounds.min_pct,
        bounds.max_pct,
        parent.n_rows()
    );
    AnnoMatrix::from_node(MatrixNode::Clip(ClipView {
        parent: parent.clone(),
        bounds,
        cache: ViewCache::default(),
    }))
}

/// Clip every numeric column of `df` to the bounds' quantile window
pub fn clip_dataframe(df: &Dataframe, bounds: ClipBounds) -> Result<Dataframe> {
    df.map_columns(|column| {
        let values = column.data().to_f64_vec()?;
        let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        finite.sort_by(f64::total_cmp);

        let lo = quantile_sorted(&finite, bounds.min_pct / 100.0)?;
        let hi = quantile_sorted(&finite, bounds.max_pct / 100.0)?;

        let clipped: Arc<[f32]> = values
            .iter()
            .map(|&v| {
                if v < lo || v > hi {
                    f32::NAN
                } else {
                    v as f32
                }
            })
            .collect();
        Some(ColumnData::Float32(clipped))
    })
}

/// Linearly interpolated quantile `p ∈ [0, 1]` of ascending `sorted`; None when empty
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let (&first, _) = sorted.split_first()?;
    let &last = sorted.last()?;
    let n = sorted.len();
    if n == 1 || p <= 0.0 {
        return Some(first);
    }
    if p >= 1.0 {
        return Some(last);
    }
    let pos = (n - 1) as f64 * p;
    let lower = pos.floor() as usize;
    let frac = pos - lower as f64;
    let upper = (lower + 1).min(n - 1);
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}
