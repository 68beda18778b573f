//! Polars payload to Dataframe conversion
//!
//! The transport collaborator hands columns over as a Polars DataFrame. This
//! module turns that payload into a crate `Dataframe`, using the schema to
//! decide between plain strings and categorical codes and between int and
//! float storage.
//!
//! Type mapping:
//! - declared categorical → codes against the declared category list
//! - declared int32 → Int32 (nulls rejected)
//! - any other numeric → Float32 (nulls become NaN)
//! - Boolean → Boolean (nulls rejected)
//! - String → String (nulls become empty strings)

use super::{ColumnData, ColumnType, Dataframe, LabelIndex};
use crate::error::{MatrixError, Result};
use crate::matrix::ColumnSchema;
use polars::prelude::*;
use std::collections::HashMap;

/// Convert a Polars payload into a dataframe over `row_index`
///
/// `declared` carries the schema of columns that have one; columns without a
/// declaration are typed from their Polars dtype alone.
pub fn payload_to_dataframe(
    payload: &DataFrame,
    row_index: LabelIndex,
    declared: &[ColumnSchema],
) -> Result<Dataframe> {
    if payload.height() != row_index.len() {
        return Err(MatrixError::Conversion(format!(
            "Payload has {} rows, expected {}",
            payload.height(),
            row_index.len()
        )));
    }

    let mut columns = Vec::with_capacity(payload.width());
    for col in payload.get_columns() {
        let series = col.as_materialized_series();
        let name = series.name().to_string();
        let schema = declared.iter().find(|c| c.name == name);
        let data = series_to_column_data(series, schema)?;
        columns.push((name, data));
    }

    log::debug!(
        "Converted payload with {} columns, {} rows",
        columns.len(),
        row_index.len()
    );

    Dataframe::new(row_index, columns)
}

fn series_to_column_data(series: &Series, schema: Option<&ColumnSchema>) -> Result<ColumnData> {
    let name = series.name().to_string();
    let declared_type = schema.map(|s| s.column_type);

    if let Some(schema) = schema.filter(|s| s.column_type == ColumnType::Categorical) {
        return categorical_codes(series, schema);
    }

    let dtype = series.dtype();
    if dtype.is_integer() && declared_type == Some(ColumnType::Int32) {
        let cast = series.cast(&DataType::Int32)?;
        let values = cast
            .i32()?
            .into_iter()
            .map(|opt| {
                opt.ok_or_else(|| {
                    MatrixError::Conversion(format!("Null in int32 column '{}'", name))
                })
            })
            .collect::<Result<Vec<i32>>>()?;
        return Ok(ColumnData::Int32(values.into()));
    }

    if dtype.is_float() || dtype.is_integer() {
        let cast = series.cast(&DataType::Float32)?;
        let values: Vec<f32> = cast
            .f32()?
            .into_iter()
            .map(|opt| opt.unwrap_or(f32::NAN))
            .collect();
        return Ok(ColumnData::Float32(values.into()));
    }

    match dtype {
        DataType::Boolean => {
            let values = series
                .bool()?
                .into_iter()
                .map(|opt| {
                    opt.ok_or_else(|| {
                        MatrixError::Conversion(format!("Null in boolean column '{}'", name))
                    })
                })
                .collect::<Result<Vec<bool>>>()?;
            Ok(ColumnData::Boolean(values.into()))
        }
        DataType::String => {
            let values: Vec<String> = series
                .str()?
                .into_iter()
                .map(|opt| opt.unwrap_or_default().to_string())
                .collect();
            Ok(ColumnData::String(values.into()))
        }
        other => Err(MatrixError::Conversion(format!(
            "Unsupported dtype {:?} for column '{}'",
            other, name
        ))),
    }
}

/// Encode a column as codes into the schema's declared category order
fn categorical_codes(series: &Series, schema: &ColumnSchema) -> Result<ColumnData> {
    let categories = schema.categories.clone().unwrap_or_default();
    let lookup: HashMap<&str, u32> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i as u32))
        .collect();

    let as_strings = series.cast(&DataType::String)?;
    let codes = as_strings
        .str()?
        .into_iter()
        .map(|opt| {
            let value = opt.ok_or_else(|| {
                MatrixError::Schema(format!("Null in categorical column '{}'", schema.name))
            })?;
            lookup.get(value).copied().ok_or_else(|| {
                MatrixError::Schema(format!(
                    "Value '{}' in column '{}' is not a declared category",
                    value, schema.name
                ))
            })
        })
        .collect::<Result<Vec<u32>>>()?;

    Ok(ColumnData::Categorical {
        codes: codes.into(),
        categories: categories.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_and_string_columns() {
        let payload = df! {
            "x" => [1.5f64, f64::NAN, 3.0],
            "n" => [1i64, 2, 3],
            "name" => ["a", "b", "c"],
            "flag" => [true, false, true]
        }
        .unwrap();
        let declared = vec![ColumnSchema::new("n", ColumnType::Int32)];

        let df = payload_to_dataframe(&payload, LabelIndex::identity(3), &declared).unwrap();

        assert_eq!(df.column("x").unwrap().column_type(), ColumnType::Float32);
        assert!(df.column("x").unwrap().data().value_f64(1).unwrap().is_nan());
        assert_eq!(df.column("n").unwrap().column_type(), ColumnType::Int32);
        assert_eq!(df.column("name").unwrap().column_type(), ColumnType::String);
        assert_eq!(df.column("flag").unwrap().column_type(), ColumnType::Boolean);
    }

    #[test]
    fn test_undeclared_integers_become_float() {
        let payload = df! { "n" => [7i32, 8] }.unwrap();
        let df = payload_to_dataframe(&payload, LabelIndex::identity(2), &[]).unwrap();
        assert_eq!(df.column("n").unwrap().column_type(), ColumnType::Float32);
        assert_eq!(df.column("n").unwrap().data().value_f64(1), Some(8.0));
    }

    #[test]
    fn test_categorical_uses_declared_order() {
        let payload = df! { "louvain" => ["2", "0", "2", "1"] }.unwrap();
        let declared = vec![ColumnSchema::categorical("louvain", vec!["2", "1", "0"])];

        let df = payload_to_dataframe(&payload, LabelIndex::identity(4), &declared).unwrap();

        match df.column("louvain").unwrap().data() {
            ColumnData::Categorical { codes, categories } => {
                assert_eq!(&**codes, &[0, 2, 0, 1]);
                assert_eq!(&**categories, &["2", "1", "0"]);
            }
            other => panic!("unexpected column {:?}", other),
        }
    }

    #[test]
    fn test_numeric_payload_for_categorical_column() {
        let payload = df! { "cluster" => [1i32, 0, 1] }.unwrap();
        let declared = vec![ColumnSchema::categorical("cluster", vec!["0", "1"])];

        let df = payload_to_dataframe(&payload, LabelIndex::identity(3), &declared).unwrap();
        match df.column("cluster").unwrap().data() {
            ColumnData::Categorical { codes, .. } => assert_eq!(&**codes, &[1, 0, 1]),
            other => panic!("unexpected column {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_category_is_schema_error() {
        let payload = df! { "louvain" => ["0", "9"] }.unwrap();
        let declared = vec![ColumnSchema::categorical("louvain", vec!["0", "1"])];

        let result = payload_to_dataframe(&payload, LabelIndex::identity(2), &declared);
        assert!(matches!(result, Err(MatrixError::Schema(_))));
    }

    #[test]
    fn test_row_count_mismatch() {
        let payload = df! { "x" => [1.0f32, 2.0] }.unwrap();
        let result = payload_to_dataframe(&payload, LabelIndex::identity(3), &[]);
        assert!(matches!(result, Err(MatrixError::Conversion(_))));
    }
}
