//! Column summaries and histograms

use super::column::ColumnData;
use crate::error::{MatrixError, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Summary statistics for one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSummary {
    /// Numeric column; `min`/`max` cover finite values only and are NaN when there are none
    Continuous {
        min: f64,
        max: f64,
        n_finite: usize,
        n_non_finite: usize,
    },
    /// Per-category counts, in category order
    Categorical {
        categories: Arc<[String]>,
        counts: Vec<usize>,
    },
}

impl ColumnSummary {
    pub fn compute(data: &ColumnData) -> Self {
        match data {
            ColumnData::Float32(_) | ColumnData::Int32(_) => {
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                let mut n_finite = 0;
                for row in 0..data.len() {
                    let v = data.value_f64(row).unwrap_or(f64::NAN);
                    if v.is_finite() {
                        min = min.min(v);
                        max = max.max(v);
                        n_finite += 1;
                    }
                }
                if n_finite == 0 {
                    min = f64::NAN;
                    max = f64::NAN;
                }
                ColumnSummary::Continuous {
                    min,
                    max,
                    n_finite,
                    n_non_finite: data.len() - n_finite,
                }
            }
            ColumnData::Categorical { codes, categories } => {
                let mut counts = vec![0; categories.len()];
                for &code in codes.iter() {
                    if let Some(count) = counts.get_mut(code as usize) {
                        *count += 1;
                    }
                }
                ColumnSummary::Categorical {
                    categories: categories.clone(),
                    counts,
                }
            }
            ColumnData::Boolean(values) => {
                let n_true = values.iter().filter(|&&b| b).count();
                ColumnSummary::Categorical {
                    categories: vec!["false".to_string(), "true".to_string()].into(),
                    counts: vec![values.len() - n_true, n_true],
                }
            }
            ColumnData::String(values) => {
                let categories: Vec<String> = values
                    .iter()
                    .cloned()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                let mut counts = vec![0; categories.len()];
                for value in values.iter() {
                    if let Ok(pos) = categories.binary_search(value) {
                        counts[pos] += 1;
                    }
                }
                ColumnSummary::Categorical {
                    categories: categories.into(),
                    counts,
                }
            }
        }
    }

    /// Finite `(min, max)` range of a continuous column
    pub fn range(&self) -> Option<(f64, f64)> {
        match self {
            ColumnSummary::Continuous { min, max, .. } if min.is_finite() && max.is_finite() => {
                Some((*min, *max))
            }
            _ => None,
        }
    }
}

/// Bucketed counts of the finite values of a numeric column
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub domain: (f64, f64),
    pub counts: Vec<u32>,
}

impl Histogram {
    /// Values outside `domain` and non-finite values are not counted.
    /// The upper edge of the domain falls into the last bin.
    pub fn compute(name: &str, data: &ColumnData, bins: usize, domain: (f64, f64)) -> Result<Self> {
        if bins == 0 {
            return Err(MatrixError::Other("Histogram needs at least one bin".to_string()));
        }
        if !matches!(data, ColumnData::Float32(_) | ColumnData::Int32(_)) {
            return Err(MatrixError::Other(format!(
                "Histogram requires a numeric column, '{}' is {:?}",
                name,
                data.column_type()
            )));
        }

        let (lo, hi) = domain;
        let width = hi - lo;
        let mut counts = vec![0u32; bins];
        for row in 0..data.len() {
            let v = data.value_f64(row).unwrap_or(f64::NAN);
            if !v.is_finite() || v < lo || v > hi {
                continue;
            }
            let bin = if width > 0.0 {
                (((v - lo) / width) * bins as f64).floor() as usize
            } else {
                0
            };
            counts[bin.min(bins - 1)] += 1;
        }

        Ok(Histogram { domain, counts })
    }
}
