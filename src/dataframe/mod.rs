//! Immutable columnar dataframe
//!
//! A dataframe is a set of equally long typed columns plus one row label
//! index. Columns are shared by reference between a dataframe and the frames
//! derived from it, so projecting or relabelling never copies a buffer.

mod column;
mod label_index;
pub mod polars_convert;
mod summary;

pub use column::{Column, ColumnData, ColumnType};
pub use label_index::{mask_to_offsets, LabelIndex, RowLabel};
pub use summary::{ColumnSummary, Histogram};

use crate::error::{MatrixError, Result};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Dataframe {
    row_index: LabelIndex,
    columns: Vec<Arc<Column>>,
    by_name: Arc<HashMap<String, usize>>,
}

impl Dataframe {
    /// Build a dataframe, checking column lengths and name uniqueness
    pub fn new(row_index: LabelIndex, columns: Vec<(String, ColumnData)>) -> Result<Self> {
        let columns = columns
            .into_iter()
            .map(|(name, data)| Arc::new(Column::new(name, data)))
            .collect();
        Self::from_columns(row_index, columns)
    }

    /// Build from already-wrapped columns (shares their memoized summaries)
    pub fn from_columns(row_index: LabelIndex, columns: Vec<Arc<Column>>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(columns.len());
        for (pos, column) in columns.iter().enumerate() {
            if column.len() != row_index.len() {
                return Err(MatrixError::Conversion(format!(
                    "Column '{}' has {} rows, index has {}",
                    column.name(),
                    column.len(),
                    row_index.len()
                )));
            }
            if by_name.insert(column.name().to_string(), pos).is_some() {
                return Err(MatrixError::Conversion(format!(
                    "Duplicate column name '{}'",
                    column.name()
                )));
            }
        }

        Ok(Dataframe {
            row_index,
            columns,
            by_name: Arc::new(by_name),
        })
    }

    /// Dataframe with rows but no columns
    pub fn empty(row_index: LabelIndex) -> Self {
        Dataframe {
            row_index,
            columns: Vec::new(),
            by_name: Arc::new(HashMap::new()),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.row_index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn row_index(&self) -> &LabelIndex {
        &self.row_index
    }

    pub fn column(&self, name: &str) -> Option<&Arc<Column>> {
        self.by_name.get(name).map(|&pos| &self.columns[pos])
    }

    pub fn column_at(&self, pos: usize) -> Option<&Arc<Column>> {
        self.columns.get(pos)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn columns(&self) -> &[Arc<Column>] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name())
    }

    /// Column by name, as an error when missing
    pub fn require_column(&self, name: &str) -> Result<&Arc<Column>> {
        self.column(name).ok_or_else(|| {
            MatrixError::Schema(format!("Column '{}' not present in dataframe", name))
        })
    }

    /// Memoized summary of a named column
    pub fn column_summary(&self, name: &str) -> Result<&ColumnSummary> {
        Ok(self.require_column(name)?.summary())
    }

    /// Memoized histogram of a named numeric column
    pub fn histogram(&self, name: &str, bins: usize, domain: (f64, f64)) -> Result<Arc<Histogram>> {
        self.require_column(name)?.histogram(bins, domain)
    }

    /// Rows at `offsets`, re-indexed densely in the order given
    pub fn subset(&self, offsets: &[usize]) -> Result<Dataframe> {
        let row_index = self.row_index.subset(offsets)?;
        let columns = self
            .columns
            .iter()
            .map(|c| Arc::new(Column::new(c.name(), c.data().gather(offsets))))
            .collect();
        Self::from_columns(row_index, columns)
    }

    /// Replace the columns for which `f` returns new data; others are shared as-is
    pub fn map_columns<F>(&self, mut f: F) -> Result<Dataframe>
    where
        F: FnMut(&Column) -> Option<ColumnData>,
    {
        let columns = self
            .columns
            .iter()
            .map(|c| match f(c) {
                Some(data) => Arc::new(Column::new(c.name(), data)),
                None => c.clone(),
            })
            .collect();
        Self::from_columns(self.row_index.clone(), columns)
    }
}
