//! Selection predicates and their per-row evaluation

use super::geometry::{Point, Polygon, Rect};
use crate::dataframe::{Column, ColumnData};
use crate::error::{MatrixError, Result};
use ordered_float::OrderedFloat;
use std::collections::HashSet;

/// A value to match exactly
#[derive(Debug, Clone, PartialEq)]
pub enum SelectValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl From<&str> for SelectValue {
    fn from(value: &str) -> Self {
        SelectValue::Str(value.to_string())
    }
}

impl From<String> for SelectValue {
    fn from(value: String) -> Self {
        SelectValue::Str(value)
    }
}

impl From<f64> for SelectValue {
    fn from(value: f64) -> Self {
        SelectValue::Num(value)
    }
}

impl From<i32> for SelectValue {
    fn from(value: i32) -> Self {
        SelectValue::Num(value as f64)
    }
}

impl From<bool> for SelectValue {
    fn from(value: bool) -> Self {
        SelectValue::Bool(value)
    }
}

/// Predicate of one crossfilter dimension
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    All,
    None,
    /// Rows whose value is one of these
    Exact(Vec<SelectValue>),
    /// Rows with a finite value in `[lo, hi]` (inclusive) or `(lo, hi)`
    Range { lo: f64, hi: f64, inclusive: bool },
    /// Embedding rows inside the box
    WithinRect {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
    /// Embedding rows inside the polygon; degenerate polygons select nothing
    WithinPolygon(Vec<Point>),
}

impl Selection {
    pub fn exact<V: Into<SelectValue>>(values: impl IntoIterator<Item = V>) -> Self {
        Selection::Exact(values.into_iter().map(Into::into).collect())
    }

    pub fn range(lo: f64, hi: f64, inclusive: bool) -> Self {
        Selection::Range { lo, hi, inclusive }
    }

    /// Mask of predicates that need no data to evaluate
    pub(super) fn constant_mask(&self, n_rows: usize) -> Option<Vec<bool>> {
        match self {
            Selection::All => Some(vec![true; n_rows]),
            Selection::None => Some(vec![false; n_rows]),
            _ => None,
        }
    }

    /// Evaluate against a scalar (obs or expression) column
    pub(super) fn evaluate_column(&self, column: &Column) -> Result<Vec<bool>> {
        if let Some(mask) = self.constant_mask(column.len()) {
            return Ok(mask);
        }
        match self {
            Selection::Exact(values) => Ok(exact_mask(column.data(), values)),
            Selection::Range { lo, hi, inclusive } => range_mask(column, *lo, *hi, *inclusive),
            _ => Err(MatrixError::InvalidSelection(format!(
                "Spatial selection on scalar column '{}'",
                column.name()
            ))),
        }
    }

    /// Evaluate against the two coordinate columns of an embedding
    pub(super) fn evaluate_points(&self, x: &Column, y: &Column, epsilon: f64) -> Result<Vec<bool>> {
        if let Some(mask) = self.constant_mask(x.len()) {
            return Ok(mask);
        }
        let points = || -> Result<Vec<Point>> {
            Ok(numeric(x)?.into_iter().zip(numeric(y)?).collect())
        };

        match self {
            Selection::WithinRect {
                min_x,
                min_y,
                max_x,
                max_y,
            } => {
                let rect = Rect::from_corners((*min_x, *min_y), (*max_x, *max_y));
                Ok(points()?.into_iter().map(|p| rect.contains(p)).collect())
            }
            Selection::WithinPolygon(vertices) => match Polygon::new(vertices.clone(), epsilon) {
                Some(polygon) => Ok(points()?.into_iter().map(|p| polygon.contains(p)).collect()),
                None => {
                    log::warn!(
                        "Degenerate polygon with {} vertices, selecting nothing",
                        vertices.len()
                    );
                    Ok(vec![false; x.len()])
                }
            },
            _ => Err(MatrixError::InvalidSelection(format!(
                "{:?} does not apply to embedding coordinates",
                self
            ))),
        }
    }
}

fn numeric(column: &Column) -> Result<Vec<f64>> {
    column.data().to_f64_vec().ok_or_else(|| {
        MatrixError::InvalidSelection(format!(
            "Embedding coordinate '{}' is not numeric",
            column.name()
        ))
    })
}

/// Membership test on the column's own representation
///
/// Categorical columns are matched by code, so each row costs one lookup.
/// Values of a kind the column cannot hold never match.
fn exact_mask(data: &ColumnData, values: &[SelectValue]) -> Vec<bool> {
    match data {
        ColumnData::Categorical { codes, categories } => {
            let wanted: HashSet<&str> = values
                .iter()
                .filter_map(|v| match v {
                    SelectValue::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            let by_code: Vec<bool> = categories
                .iter()
                .map(|c| wanted.contains(c.as_str()))
                .collect();
            codes
                .iter()
                .map(|&code| by_code.get(code as usize).copied().unwrap_or(false))
                .collect()
        }
        ColumnData::String(rows) => {
            let wanted: HashSet<&str> = values
                .iter()
                .filter_map(|v| match v {
                    SelectValue::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            rows.iter().map(|s| wanted.contains(s.as_str())).collect()
        }
        ColumnData::Boolean(rows) => {
            let want = |b: bool| values.contains(&SelectValue::Bool(b));
            let (want_true, want_false) = (want(true), want(false));
            rows.iter()
                .map(|&b| if b { want_true } else { want_false })
                .collect()
        }
        ColumnData::Float32(rows) => {
            // Compared as f32, the type the column stores
            let wanted: HashSet<OrderedFloat<f32>> = numbers(values)
                .map(|n| n as f32)
                .filter(|n| n.is_finite())
                .map(OrderedFloat)
                .collect();
            rows.iter()
                .map(|&v| v.is_finite() && wanted.contains(&OrderedFloat(v)))
                .collect()
        }
        ColumnData::Int32(rows) => {
            let wanted: HashSet<i32> = numbers(values)
                .filter(|n| n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64)
                .map(|n| n as i32)
                .collect();
            rows.iter().map(|v| wanted.contains(v)).collect()
        }
    }
}

fn numbers(values: &[SelectValue]) -> impl Iterator<Item = f64> + '_ {
    values.iter().filter_map(|v| match v {
        SelectValue::Num(n) if n.is_finite() => Some(*n),
        _ => None,
    })
}

/// Range test in the column's own numeric type; non-finite rows never match
fn range_mask(column: &Column, lo: f64, hi: f64, inclusive: bool) -> Result<Vec<bool>> {
    fn within<T: PartialOrd + Copy>(v: T, lo: T, hi: T, inclusive: bool) -> bool {
        if inclusive {
            v >= lo && v <= hi
        } else {
            v > lo && v < hi
        }
    }

    match column.data() {
        ColumnData::Float32(rows) => {
            let (lo, hi) = (lo as f32, hi as f32);
            Ok(rows
                .iter()
                .map(|&v| v.is_finite() && within(v, lo, hi, inclusive))
                .collect())
        }
        ColumnData::Int32(rows) => Ok(rows
            .iter()
            .map(|&v| within(v as f64, lo, hi, inclusive))
            .collect()),
        _ => Err(MatrixError::InvalidSelection(format!(
            "Range selection on non-numeric column '{}'",
            column.name()
        ))),
    }
}
