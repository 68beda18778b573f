//! Multi-dimension row selection
//!
//! A `Crossfilter` keeps one selection predicate and its per-row mask per
//! dimension, over the rows of the matrix node it was created on. It is an
//! immutable value: `select` returns a new crossfilter in which only the
//! named dimension changed, and every other dimension's mask is shared with
//! the old one.
//!
//! Structure:
//! - `selection.rs`: predicates and their evaluation
//! - `geometry.rs`: rectangle and polygon hit tests
//! - `flags.rs`: packed per-point render flags

mod flags;
mod geometry;
mod selection;

pub use flags::{add_flag, RenderFlags};
pub use geometry::{polygon_area, Point, Polygon, Rect};
pub use selection::{SelectValue, Selection};

use crate::config::MatrixConfig;
use crate::dataframe::RowLabel;
use crate::error::{MatrixError, Result};
use crate::matrix::{AnnoMatrix, Field, Query};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A selectable axis of the matrix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DimensionKey {
    /// Obs annotation column
    Obs(String),
    /// Expression of one gene
    Expression(String),
    /// 2D embedding
    Embedding(String),
}

impl DimensionKey {
    pub fn field(&self) -> Field {
        match self {
            DimensionKey::Obs(_) => Field::Obs,
            DimensionKey::Expression(_) => Field::X,
            DimensionKey::Embedding(_) => Field::Emb,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DimensionKey::Obs(name)
            | DimensionKey::Expression(name)
            | DimensionKey::Embedding(name) => name,
        }
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.field(), self.name())
    }
}

/// Current predicate of a dimension and the rows it selects
#[derive(Debug)]
pub struct Dimension {
    selection: Selection,
    mask: Arc<[bool]>,
}

impl Dimension {
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn mask(&self) -> &Arc<[bool]> {
        &self.mask
    }
}

#[derive(Clone)]
pub struct Crossfilter {
    matrix: AnnoMatrix,
    config: Arc<MatrixConfig>,
    dimensions: HashMap<DimensionKey, Arc<Dimension>>,
    /// AND of all dimension masks, computed on first use
    combined: Arc<OnceCell<Arc<[bool]>>>,
}

impl Crossfilter {
    /// Crossfilter with no dimensions: every row is selected
    pub fn new(matrix: AnnoMatrix, config: Arc<MatrixConfig>) -> Self {
        Self::with_dimensions(matrix, config, HashMap::new())
    }

    fn with_dimensions(
        matrix: AnnoMatrix,
        config: Arc<MatrixConfig>,
        dimensions: HashMap<DimensionKey, Arc<Dimension>>,
    ) -> Self {
        Crossfilter {
            matrix,
            config,
            dimensions,
            combined: Arc::new(OnceCell::new()),
        }
    }

    pub fn matrix(&self) -> &AnnoMatrix {
        &self.matrix
    }

    pub fn n_rows(&self) -> usize {
        self.matrix.n_rows()
    }

    pub fn dimension(&self, key: &DimensionKey) -> Option<&Arc<Dimension>> {
        self.dimensions.get(key)
    }

    pub fn has_dimension(&self, key: &DimensionKey) -> bool {
        self.dimensions.contains_key(key)
    }

    /// Replace the predicate of `key`, fetching its data when needed
    pub async fn select(&self, key: DimensionKey, selection: Selection) -> Result<Crossfilter> {
        let dimension = evaluate(&self.matrix, &self.config, &key, selection).await?;
        log::debug!(
            "Selected {} of {} rows on {}",
            dimension.mask.iter().filter(|&&s| s).count(),
            self.n_rows(),
            key
        );

        let mut dimensions = self.dimensions.clone();
        dimensions.insert(key, Arc::new(dimension));
        Ok(Self::with_dimensions(
            self.matrix.clone(),
            self.config.clone(),
            dimensions,
        ))
    }

    /// Forget a dimension; its predicate no longer restricts the selection
    pub fn drop_dimension(&self, key: &DimensionKey) -> Crossfilter {
        if !self.dimensions.contains_key(key) {
            return self.clone();
        }
        let mut dimensions = self.dimensions.clone();
        dimensions.remove(key);
        Self::with_dimensions(self.matrix.clone(), self.config.clone(), dimensions)
    }

    /// Re-evaluate every predicate against another matrix node
    pub async fn rebase(&self, matrix: AnnoMatrix) -> Result<Crossfilter> {
        let evaluated = futures::future::try_join_all(self.dimensions.iter().map(|(key, dim)| {
            let matrix = &matrix;
            async move {
                let dimension = evaluate(matrix, &self.config, key, dim.selection.clone()).await?;
                Ok::<_, MatrixError>((key.clone(), Arc::new(dimension)))
            }
        }))
        .await?;

        log::debug!(
            "Rebased {} dimension(s) onto {} rows",
            evaluated.len(),
            matrix.n_rows()
        );
        Ok(Self::with_dimensions(
            matrix,
            self.config.clone(),
            evaluated.into_iter().collect(),
        ))
    }

    /// Per-row AND of every dimension
    pub fn combined(&self) -> &Arc<[bool]> {
        self.combined.get_or_init(|| {
            let mut combined = vec![true; self.n_rows()];
            for dimension in self.dimensions.values() {
                for (out, &selected) in combined.iter_mut().zip(dimension.mask.iter()) {
                    *out &= selected;
                }
            }
            combined.into()
        })
    }

    pub fn count_selected(&self) -> usize {
        self.combined().iter().filter(|&&s| s).count()
    }

    pub fn is_selected(&self, offset: usize) -> bool {
        self.combined().get(offset).copied().unwrap_or(false)
    }

    /// Offsets of selected rows, ascending
    pub fn selected_offsets(&self) -> Vec<usize> {
        self.combined()
            .iter()
            .enumerate()
            .filter_map(|(offset, &s)| s.then_some(offset))
            .collect()
    }

    /// Labels of selected rows, in ascending offset order
    pub fn all_selected_labels(&self) -> Vec<RowLabel> {
        let index = self.matrix.row_index();
        self.selected_offsets()
            .into_iter()
            .filter_map(|offset| index.label_at(offset))
            .collect()
    }

    /// Write `selected` or `unselected` into `buffer` for each row
    pub fn fill_by_is_selected<T: Copy>(&self, buffer: &mut [T], selected: T, unselected: T) -> Result<()> {
        let combined = self.combined();
        if buffer.len() != combined.len() {
            return Err(MatrixError::InvalidSelection(format!(
                "Buffer has {} rows, selection has {}",
                buffer.len(),
                combined.len()
            )));
        }
        for (out, &s) in buffer.iter_mut().zip(combined.iter()) {
            *out = if s { selected } else { unselected };
        }
        Ok(())
    }

    /// Fill `buffer` with packed render flags carrying only the selected bit
    pub fn fill_render_flags(&self, buffer: &mut [u8]) -> Result<()> {
        self.fill_by_is_selected(buffer, RenderFlags::SELECTED.bits(), 0)
    }
}

impl fmt::Debug for Crossfilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crossfilter")
            .field("n_rows", &self.n_rows())
            .field("dimensions", &self.dimensions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Evaluate `selection` on the rows of `matrix`
async fn evaluate(
    matrix: &AnnoMatrix,
    config: &MatrixConfig,
    key: &DimensionKey,
    selection: Selection,
) -> Result<Dimension> {
    let n_rows = matrix.n_rows();
    let mask = match selection.constant_mask(n_rows) {
        Some(mask) => mask,
        None => {
            let df = matrix
                .fetch(key.field(), Query::column(key.name()))
                .await?;
            match key {
                DimensionKey::Embedding(name) => match (df.column_at(0), df.column_at(1)) {
                    (Some(x), Some(y)) => {
                        selection.evaluate_points(x, y, config.polygon_area_epsilon)?
                    }
                    _ => {
                        return Err(MatrixError::Schema(format!(
                            "Embedding '{}' lacks coordinate columns",
                            name
                        )))
                    }
                },
                _ => selection.evaluate_column(df.require_column(key.name())?)?,
            }
        }
    };

    Ok(Dimension {
        selection,
        mask: mask.into(),
    })
}
