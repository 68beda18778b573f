//! Typed column buffers
//!
//! Each column holds one homogeneously-typed, reference-counted buffer. Derived
//! summaries are memoized on the column the first time they are asked for, so
//! a column shared between dataframes computes them once.

use super::summary::{ColumnSummary, Histogram};
use crate::error::{MatrixError, Result};
use once_cell::sync::OnceCell;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Column element type, shared by dataframes and the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Float32,
    Int32,
    Boolean,
    String,
    Categorical,
}

impl ColumnType {
    /// Numeric types take part in ranges, clipping and continuous coloring
    pub fn is_continuous(self) -> bool {
        matches!(self, ColumnType::Float32 | ColumnType::Int32)
    }
}

#[derive(Debug, Clone)]
pub enum ColumnData {
    Float32(Arc<[f32]>),
    Int32(Arc<[i32]>),
    Boolean(Arc<[bool]>),
    String(Arc<[String]>),
    /// Codes index into `categories`, which keeps the declared order
    Categorical {
        codes: Arc<[u32]>,
        categories: Arc<[String]>,
    },
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float32(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::String(v) => v.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Float32(_) => ColumnType::Float32,
            ColumnData::Int32(_) => ColumnType::Int32,
            ColumnData::Boolean(_) => ColumnType::Boolean,
            ColumnData::String(_) => ColumnType::String,
            ColumnData::Categorical { .. } => ColumnType::Categorical,
        }
    }

    /// Numeric value at `row` widened to f64; None for non-numeric columns
    #[inline]
    pub fn value_f64(&self, row: usize) -> Option<f64> {
        match self {
            ColumnData::Float32(v) => v.get(row).map(|&x| x as f64),
            ColumnData::Int32(v) => v.get(row).map(|&x| x as f64),
            _ => None,
        }
    }

    /// All numeric values widened to f64
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            ColumnData::Float32(v) => Some(v.iter().map(|&x| x as f64).collect()),
            ColumnData::Int32(v) => Some(v.iter().map(|&x| x as f64).collect()),
            _ => None,
        }
    }

    /// Rows at `offsets`, in the order given
    pub fn gather(&self, offsets: &[usize]) -> ColumnData {
        fn pick<T: Clone>(values: &[T], offsets: &[usize]) -> Arc<[T]> {
            offsets.iter().map(|&i| values[i].clone()).collect()
        }

        match self {
            ColumnData::Float32(v) => ColumnData::Float32(pick(v, offsets)),
            ColumnData::Int32(v) => ColumnData::Int32(pick(v, offsets)),
            ColumnData::Boolean(v) => ColumnData::Boolean(pick(v, offsets)),
            ColumnData::String(v) => ColumnData::String(pick(v, offsets)),
            ColumnData::Categorical { codes, categories } => ColumnData::Categorical {
                codes: pick(codes, offsets),
                categories: categories.clone(),
            },
        }
    }
}

/// Key for memoized histograms: bin count plus the domain ends
type HistogramKey = (usize, OrderedFloat<f64>, OrderedFloat<f64>);

/// A named column with memoized summaries
#[derive(Debug)]
pub struct Column {
    name: String,
    data: ColumnData,
    summary: OnceCell<ColumnSummary>,
    histograms: Mutex<HashMap<HistogramKey, Arc<Histogram>>>,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Column {
            name: name.into(),
            data,
            summary: OnceCell::new(),
            histograms: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn column_type(&self) -> ColumnType {
        self.data.column_type()
    }

    /// Summary of the column, computed on first use
    pub fn summary(&self) -> &ColumnSummary {
        self.summary
            .get_or_init(|| ColumnSummary::compute(&self.data))
    }

    /// Histogram over `domain` with `bins` buckets, computed once per (bins, domain)
    pub fn histogram(&self, bins: usize, domain: (f64, f64)) -> Result<Arc<Histogram>> {
        let key = (bins, OrderedFloat(domain.0), OrderedFloat(domain.1));

        let mut cache = self
            .histograms
            .lock()
            .map_err(|_| MatrixError::Other("Histogram cache poisoned".to_string()))?;
        if let Some(hist) = cache.get(&key) {
            return Ok(hist.clone());
        }

        let hist = Arc::new(Histogram::compute(&self.name, &self.data, bins, domain)?);
        cache.insert(key, hist.clone());
        Ok(hist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_keeps_categories() {
        let data = ColumnData::Categorical {
            codes: vec![0, 1, 2, 1].into(),
            categories: vec!["a".to_string(), "b".to_string(), "c".to_string()].into(),
        };
        match data.gather(&[3, 0]) {
            ColumnData::Categorical { codes, categories } => {
                assert_eq!(&*codes, &[1, 0]);
                assert_eq!(categories.len(), 3);
            }
            other => panic!("unexpected column {:?}", other),
        }
    }

    #[test]
    fn test_value_f64() {
        let data = ColumnData::Int32(vec![4, -2].into());
        assert_eq!(data.value_f64(1), Some(-2.0));
        assert_eq!(data.value_f64(2), None);
        let strings = ColumnData::String(vec!["x".to_string()].into());
        assert_eq!(strings.value_f64(0), None);
    }

    #[test]
    fn test_histogram_is_memoized() {
        let column = Column::new("x", ColumnData::Float32(vec![0.0, 0.5, 1.0].into()));
        let first = column.histogram(2, (0.0, 1.0)).unwrap();
        let second = column.histogram(2, (0.0, 1.0)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other_domain = column.histogram(2, (0.0, 2.0)).unwrap();
        assert!(!Arc::ptr_eq(&first, &other_domain));

        // -0.0 and 0.0 are the same domain
        let signed_zero = column.histogram(2, (-0.0, 1.0)).unwrap();
        assert!(Arc::ptr_eq(&first, &signed_zero));
    }
}
