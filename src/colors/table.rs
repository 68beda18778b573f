//! Per-row color tables
//!
//! `ColorTableBuilder::build` turns a color mode, an accessor, the color-by
//! data, the schema and optional user colors into one RGB triple per row plus
//! the scale that produced them.
//!
//! Categorical colors are keyed by each category's position in the schema's
//! declared list, never by the order values happen to appear in the data.
//! Reordering the declared categories therefore recolors rows, while the same
//! schema always colors the same row the same way.

use super::scales::{interpolate_cool, interpolate_rainbow, Rgb};
use crate::config::MatrixConfig;
use crate::dataframe::{Column, ColumnData, ColumnType, Dataframe};
use crate::error::{MatrixError, Result};
use crate::matrix::Schema;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What the rows are colored by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorMode {
    /// Default color for every row
    None,
    /// Declared categories of an obs column
    Categorical,
    /// Numeric obs column
    Continuous,
    /// Expression of one gene
    ///
    /// Genes are not declared in the schema, so the accessor is only checked
    /// against the fetched X frame: it must name one of its numeric columns.
    Expression,
    /// Mean expression of a named geneset
    GenesetMeanExpression,
}

/// User-chosen colors, per accessor then per category label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserColors {
    by_accessor: HashMap<String, HashMap<String, Rgb>>,
}

impl UserColors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color(
        mut self,
        accessor: impl Into<String>,
        label: impl Into<String>,
        color: Rgb,
    ) -> Self {
        self.by_accessor
            .entry(accessor.into())
            .or_default()
            .insert(label.into(), color);
        self
    }

    pub fn get(&self, accessor: &str, label: &str) -> Option<Rgb> {
        self.by_accessor.get(accessor)?.get(label).copied()
    }
}

/// Index to color function of a color table
#[derive(Debug, Clone, PartialEq)]
pub enum ColorScale {
    /// Every index maps to the one color
    Constant(Rgb),
    /// One color per declared category position
    Categorical { colors: Arc<[Rgb]> },
    /// One color per bin over `domain`
    Binned {
        domain: (f64, f64),
        bins: Arc<[Rgb]>,
        non_finite: Rgb,
    },
}

impl ColorScale {
    /// Color of category position / bin index `index`
    pub fn color(&self, index: usize) -> Option<Rgb> {
        match self {
            ColorScale::Constant(color) => Some(*color),
            ColorScale::Categorical { colors } => colors.get(index).copied(),
            ColorScale::Binned { bins, .. } => bins.get(index).copied(),
        }
    }

    /// Bin of a value on a binned scale
    pub fn bin_of(&self, value: f64) -> Option<usize> {
        let ColorScale::Binned { domain, bins, .. } = self else {
            return None;
        };
        if !value.is_finite() {
            return None;
        }
        let (min, max) = *domain;
        let n = bins.len();
        if max <= min {
            return Some(0);
        }
        let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
        Some(((t * n as f64) as usize).min(n - 1))
    }

    /// Color of a value on a binned scale
    pub fn color_for_value(&self, value: f64) -> Option<Rgb> {
        match self {
            ColorScale::Binned { non_finite, .. } => match self.bin_of(value) {
                Some(bin) => self.color(bin),
                None => Some(*non_finite),
            },
            ColorScale::Constant(color) => Some(*color),
            ColorScale::Categorical { .. } => None,
        }
    }
}

/// Colors per row, indexed by row offset, plus their scale
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    pub rgb: Arc<[Rgb]>,
    pub scale: ColorScale,
}

impl ColorTable {
    pub fn len(&self) -> usize {
        self.rgb.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rgb.is_empty()
    }
}

/// Pure color table construction
#[derive(Debug, Clone, Default)]
pub struct ColorTableBuilder {
    config: MatrixConfig,
}

impl ColorTableBuilder {
    pub fn new(config: MatrixConfig) -> Self {
        ColorTableBuilder { config }
    }

    /// Build the color table
    ///
    /// `data` must hold a column named `accessor` for every mode but `None`.
    /// For `None` without data, one row per cell of the schema is colored.
    pub fn build(
        &self,
        mode: ColorMode,
        accessor: Option<&str>,
        data: Option<&Dataframe>,
        schema: &Schema,
        user_colors: Option<&UserColors>,
    ) -> Result<ColorTable> {
        if mode == ColorMode::None {
            let n_rows = data.map_or(schema.n_obs, Dataframe::n_rows);
            return Ok(self.constant(n_rows));
        }

        let accessor = accessor
            .ok_or_else(|| MatrixError::Schema(format!("Color mode {:?} needs an accessor", mode)))?;
        let data = data.ok_or_else(|| {
            MatrixError::Schema(format!("Color mode {:?} for '{}' needs data", mode, accessor))
        })?;
        let column = data.require_column(accessor)?;

        log::debug!(
            "Building {:?} color table for '{}' over {} rows",
            mode,
            accessor,
            data.n_rows()
        );

        match mode {
            ColorMode::None => Ok(self.constant(data.n_rows())),
            ColorMode::Categorical => {
                let categories = declared_categories(schema, accessor)?;
                categorical(column, accessor, &categories, user_colors)
            }
            ColorMode::Continuous => {
                let declared = schema.obs_column(accessor).ok_or_else(|| {
                    MatrixError::Schema(format!("Unknown obs column '{}'", accessor))
                })?;
                if !declared.column_type.is_continuous() {
                    return Err(MatrixError::Schema(format!(
                        "Column '{}' is {:?}, not continuous",
                        accessor, declared.column_type
                    )));
                }
                self.binned(column)
            }
            // Gene names live in the var data, not the schema
            ColorMode::Expression => self.binned(column),
            ColorMode::GenesetMeanExpression => {
                if schema.geneset(accessor).is_none() {
                    return Err(MatrixError::Schema(format!("Unknown geneset '{}'", accessor)));
                }
                self.binned(column)
            }
        }
    }

    fn constant(&self, n_rows: usize) -> ColorTable {
        ColorTable {
            rgb: vec![self.config.default_color; n_rows].into(),
            scale: ColorScale::Constant(self.config.default_color),
        }
    }

    /// Equal-width bins over the finite `[min, max]` of the column
    fn binned(&self, column: &Column) -> Result<ColorTable> {
        let values = column.data().to_f64_vec().ok_or_else(|| {
            MatrixError::Schema(format!("Column '{}' is not numeric", column.name()))
        })?;

        let domain = column.summary().range().unwrap_or((0.0, 0.0));
        let n_bins = self.config.color_bins.max(1);
        let bins: Arc<[Rgb]> = (0..n_bins)
            .map(|bin| {
                let t = if n_bins == 1 {
                    0.0
                } else {
                    bin as f64 / (n_bins - 1) as f64
                };
                interpolate_cool(t)
            })
            .collect();

        let scale = ColorScale::Binned {
            domain,
            bins,
            non_finite: self.config.non_finite_color,
        };
        let rgb = values
            .iter()
            .map(|&v| scale.color_for_value(v).unwrap_or(self.config.non_finite_color))
            .collect();

        Ok(ColorTable { rgb, scale })
    }
}

/// Declared category list of a categorical (or boolean) obs column
fn declared_categories(schema: &Schema, accessor: &str) -> Result<Vec<String>> {
    let declared = schema
        .obs_column(accessor)
        .ok_or_else(|| MatrixError::Schema(format!("Unknown obs column '{}'", accessor)))?;

    match declared.column_type {
        ColumnType::Categorical => declared.categories.clone().ok_or_else(|| {
            MatrixError::Schema(format!("Column '{}' declares no categories", accessor))
        }),
        ColumnType::Boolean => Ok(vec!["false".to_string(), "true".to_string()]),
        other => Err(MatrixError::Schema(format!(
            "Column '{}' is {:?}, not categorical",
            accessor, other
        ))),
    }
}

fn categorical(
    column: &Column,
    accessor: &str,
    categories: &[String],
    user_colors: Option<&UserColors>,
) -> Result<ColorTable> {
    let n = categories.len();
    let colors: Arc<[Rgb]> = categories
        .iter()
        .enumerate()
        .map(|(i, label)| {
            user_colors
                .and_then(|user| user.get(accessor, label))
                .unwrap_or_else(|| interpolate_rainbow(i as f64 / n as f64))
        })
        .collect();

    let position: HashMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, label)| (label.as_str(), i))
        .collect();
    let lookup = |label: &str| {
        position.get(label).copied().ok_or_else(|| {
            MatrixError::Schema(format!(
                "Value '{}' of '{}' is not a declared category",
                label, accessor
            ))
        })
    };

    let positions: Vec<usize> = match column.data() {
        ColumnData::Categorical {
            codes,
            categories: observed,
        } => {
            // Resolve each distinct code once
            let by_code = observed
                .iter()
                .map(|label| lookup(label))
                .collect::<Result<Vec<usize>>>()?;
            codes
                .iter()
                .map(|&code| {
                    by_code.get(code as usize).copied().ok_or_else(|| {
                        MatrixError::Conversion(format!(
                            "Code {} of '{}' out of range",
                            code, accessor
                        ))
                    })
                })
                .collect::<Result<_>>()?
        }
        ColumnData::String(values) => values
            .iter()
            .map(|label| lookup(label))
            .collect::<Result<_>>()?,
        ColumnData::Boolean(values) => values
            .iter()
            .map(|&b| lookup(if b { "true" } else { "false" }))
            .collect::<Result<_>>()?,
        other => {
            return Err(MatrixError::Schema(format!(
                "Column '{}' holds {:?} data, not categories",
                accessor,
                other.column_type()
            )))
        }
    };

    let rgb = positions.iter().map(|&p| colors[p]).collect();
    Ok(ColorTable {
        rgb,
        scale: ColorScale::Categorical { colors },
    })
}

/// Inputs of the last build, compared by value or `Arc` identity
struct CacheKey {
    mode: ColorMode,
    accessor: Option<String>,
    data: Option<Arc<Dataframe>>,
    schema: Arc<Schema>,
    user_colors: Option<Arc<UserColors>>,
}

impl CacheKey {
    fn matches(&self, other: &CacheKey) -> bool {
        fn same<T>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        self.mode == other.mode
            && self.accessor == other.accessor
            && same(&self.data, &other.data)
            && Arc::ptr_eq(&self.schema, &other.schema)
            && same(&self.user_colors, &other.user_colors)
    }
}

/// Last-input memoization of `ColorTableBuilder::build`
pub struct ColorTableCache {
    builder: ColorTableBuilder,
    last: Mutex<Option<(CacheKey, Arc<ColorTable>)>>,
}

impl ColorTableCache {
    pub fn new(builder: ColorTableBuilder) -> Self {
        ColorTableCache {
            builder,
            last: Mutex::new(None),
        }
    }

    /// Build, or return the previous table when every input is identical
    pub fn get(
        &self,
        mode: ColorMode,
        accessor: Option<&str>,
        data: Option<&Arc<Dataframe>>,
        schema: &Arc<Schema>,
        user_colors: Option<&Arc<UserColors>>,
    ) -> Result<Arc<ColorTable>> {
        let key = CacheKey {
            mode,
            accessor: accessor.map(str::to_string),
            data: data.cloned(),
            schema: schema.clone(),
            user_colors: user_colors.cloned(),
        };

        let mut last = self
            .last
            .lock()
            .map_err(|_| MatrixError::Other("Color table cache poisoned".to_string()))?;

        if let Some((prev, table)) = last.as_ref() {
            if prev.matches(&key) {
                log::debug!("Color table cache HIT for {:?}", accessor);
                return Ok(table.clone());
            }
        }

        log::debug!("Color table cache MISS for {:?}", accessor);
        let table = Arc::new(self.builder.build(
            mode,
            accessor,
            data.map(|d| d.as_ref()),
            schema,
            user_colors.map(|u| u.as_ref()),
        )?);
        *last = Some((key, table.clone()));
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataframe::LabelIndex;
    use crate::matrix::ColumnSchema;
    use crate::test_support::sample_schema;

    const LABELS: [&str; 8] = ["a", "b", "c", "d", "e", "f", "g", "h"];

    /// Deterministic pseudo-random sequence
    fn lcg(seed: u64, n: usize) -> Vec<u64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                state >> 33
            })
            .collect()
    }

    fn shuffled(labels: &[&str], seed: u64) -> Vec<String> {
        let mut out: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        for (i, r) in lcg(seed, out.len()).into_iter().enumerate().rev() {
            let j = (r as usize) % (i + 1);
            out.swap(i, j);
        }
        out
    }

    fn schema_with(categories: Vec<String>) -> Schema {
        let mut schema = sample_schema();
        schema.obs.push(ColumnSchema::categorical("cluster", categories));
        schema
    }

    /// 200 rows with random categories, stored as strings
    fn random_rows() -> Dataframe {
        let values: Vec<String> = lcg(7, 200)
            .into_iter()
            .map(|r| LABELS[(r % 8) as usize].to_string())
            .collect();
        Dataframe::new(
            LabelIndex::identity(values.len()),
            vec![("cluster".to_string(), ColumnData::String(values.into()))],
        )
        .unwrap()
    }

    fn category_of(data: &Dataframe, row: usize) -> String {
        match data.column("cluster").unwrap().data() {
            ColumnData::String(v) => v[row].clone(),
            _ => unreachable!(),
        }
    }

    fn assert_rows_follow_scale(schema: &Schema, data: &Dataframe, user: Option<&UserColors>) -> ColorTable {
        let table = ColorTableBuilder::default()
            .build(ColorMode::Categorical, Some("cluster"), Some(data), schema, user)
            .unwrap();
        let declared = schema.obs_column("cluster").unwrap();
        for row in 0..data.n_rows() {
            let index = declared.category_index(&category_of(data, row)).unwrap();
            assert_eq!(table.rgb[row], table.scale.color(index).unwrap());
        }
        table
    }

    #[test]
    fn test_category_colors_follow_declared_order() {
        let data = random_rows();
        let declared = schema_with(LABELS.iter().map(|s| s.to_string()).collect());
        let reordered = schema_with(shuffled(&LABELS, 42));

        let a = assert_rows_follow_scale(&declared, &data, None);
        let b = assert_rows_follow_scale(&reordered, &data, None);

        // Same ramp, keyed by position: reordering recolors rows
        assert_eq!(a.scale, b.scale);
        assert_ne!(a.rgb, b.rgb);
        assert_eq!(a.scale.color(0), Some(interpolate_rainbow(0.0)));
        assert_eq!(a.scale.color(4), Some(interpolate_rainbow(0.5)));
    }

    #[test]
    fn test_categorical_codes_use_schema_positions() {
        // Codes refer to the data's own category list, not the schema's
        let data = Dataframe::new(
            LabelIndex::identity(3),
            vec![(
                "cluster".to_string(),
                ColumnData::Categorical {
                    codes: vec![0, 1, 0].into(),
                    categories: vec!["b".to_string(), "a".to_string()].into(),
                },
            )],
        )
        .unwrap();
        let schema = schema_with(vec!["a".to_string(), "b".to_string()]);
        let table = ColorTableBuilder::default()
            .build(ColorMode::Categorical, Some("cluster"), Some(&data), &schema, None)
            .unwrap();
        assert_eq!(table.rgb[0], table.scale.color(1).unwrap());
        assert_eq!(table.rgb[1], table.scale.color(0).unwrap());
    }

    #[test]
    fn test_user_colors_take_precedence() {
        let data = random_rows();
        let schema = schema_with(shuffled(&LABELS, 3));

        let overridden = shuffled(&LABELS, 11);
        let mut user = UserColors::new();
        let mut expected = HashMap::new();
        for (i, label) in overridden.iter().take(5).enumerate() {
            let color = [i as u8 * 40, 255 - i as u8 * 40, 17];
            user = user.with_color("cluster", label.clone(), color);
            expected.insert(label.clone(), color);
        }

        let table = assert_rows_follow_scale(&schema, &data, Some(&user));
        let declared = schema.obs_column("cluster").unwrap();
        for row in 0..data.n_rows() {
            let label = category_of(&data, row);
            match expected.get(&label) {
                Some(color) => assert_eq!(table.rgb[row], *color),
                None => {
                    let index = declared.category_index(&label).unwrap();
                    assert_eq!(
                        table.rgb[row],
                        interpolate_rainbow(index as f64 / LABELS.len() as f64)
                    );
                }
            }
        }
    }

    #[test]
    fn test_undeclared_category_is_error() {
        let data = random_rows();
        let schema = schema_with(vec!["a".to_string(), "b".to_string()]);
        let result = ColorTableBuilder::default().build(
            ColorMode::Categorical,
            Some("cluster"),
            Some(&data),
            &schema,
            None,
        );
        assert!(matches!(result, Err(MatrixError::Schema(_))));
    }

    #[test]
    fn test_unknown_accessor_is_error() {
        let data = random_rows();
        let schema = sample_schema();
        let builder = ColorTableBuilder::default();
        assert!(builder
            .build(ColorMode::Categorical, Some("cluster"), Some(&data), &schema, None)
            .is_err());
        assert!(builder
            .build(ColorMode::Continuous, Some("missing"), Some(&data), &schema, None)
            .is_err());
        assert!(builder
            .build(ColorMode::Categorical, None, Some(&data), &schema, None)
            .is_err());
    }

    #[test]
    fn test_none_mode_is_default_gray() {
        let schema = sample_schema();
        let table = ColorTableBuilder::default()
            .build(ColorMode::None, None, None, &schema, None)
            .unwrap();
        assert_eq!(table.len(), schema.n_obs);
        assert!(table.rgb.iter().all(|&c| c == [128, 128, 128]));
    }

    #[test]
    fn test_continuous_bins_and_non_finite() {
        let schema = sample_schema();
        let data = Dataframe::new(
            LabelIndex::identity(4),
            vec![(
                "percent_mito".to_string(),
                ColumnData::Float32(vec![0.0, 50.0, f32::NAN, 100.0].into()),
            )],
        )
        .unwrap();

        let config = MatrixConfig::default();
        let table = ColorTableBuilder::new(config.clone())
            .build(ColorMode::Continuous, Some("percent_mito"), Some(&data), &schema, None)
            .unwrap();

        assert_eq!(table.rgb[0], interpolate_cool(0.0));
        assert_eq!(table.rgb[3], interpolate_cool(1.0));
        assert_eq!(table.rgb[2], config.non_finite_color);
        assert_eq!(table.scale.bin_of(50.0), Some(50));
        assert_eq!(table.scale.bin_of(100.0), Some(99));
        match &table.scale {
            ColorScale::Binned { domain, bins, .. } => {
                assert_eq!(*domain, (0.0, 100.0));
                assert_eq!(bins.len(), 100);
            }
            other => panic!("unexpected scale {:?}", other),
        }
    }

    #[test]
    fn test_continuous_requires_numeric_declaration() {
        let schema = sample_schema();
        let data = Dataframe::new(
            LabelIndex::identity(1),
            vec![("louvain".to_string(), ColumnData::Float32(vec![1.0].into()))],
        )
        .unwrap();
        assert!(ColorTableBuilder::default()
            .build(ColorMode::Continuous, Some("louvain"), Some(&data), &schema, None)
            .is_err());
    }

    #[test]
    fn test_geneset_mode_checks_schema() {
        let schema = sample_schema();
        let data = Dataframe::new(
            LabelIndex::identity(2),
            vec![("nope".to_string(), ColumnData::Float32(vec![1.0, 2.0].into()))],
        )
        .unwrap();
        assert!(ColorTableBuilder::default()
            .build(ColorMode::GenesetMeanExpression, Some("nope"), Some(&data), &schema, None)
            .is_err());
    }

    #[test]
    fn test_expression_accessor_must_be_a_numeric_x_column() {
        let schema = sample_schema();
        let data = Dataframe::new(
            LabelIndex::identity(2),
            vec![
                ("GENE_A".to_string(), ColumnData::Float32(vec![0.0, 2.0].into())),
                (
                    "GENE_S".to_string(),
                    ColumnData::String(vec!["lo".to_string(), "hi".to_string()].into()),
                ),
            ],
        )
        .unwrap();
        let builder = ColorTableBuilder::default();

        let table = builder
            .build(ColorMode::Expression, Some("GENE_A"), Some(&data), &schema, None)
            .unwrap();
        assert_eq!(table.rgb.len(), 2);
        assert!(builder
            .build(ColorMode::Expression, Some("GENE_Z"), Some(&data), &schema, None)
            .is_err());
        assert!(matches!(
            builder.build(ColorMode::Expression, Some("GENE_S"), Some(&data), &schema, None),
            Err(MatrixError::Schema(_))
        ));
    }

    #[test]
    fn test_constant_column_lands_in_first_bin() {
        let schema = sample_schema();
        let data = Dataframe::new(
            LabelIndex::identity(3),
            vec![("GENE_B".to_string(), ColumnData::Float32(vec![1.0; 3].into()))],
        )
        .unwrap();
        let table = ColorTableBuilder::default()
            .build(ColorMode::Expression, Some("GENE_B"), Some(&data), &schema, None)
            .unwrap();
        assert!(table.rgb.iter().all(|&c| c == interpolate_cool(0.0)));
    }

    #[test]
    fn test_cache_reuses_identical_inputs() {
        let cache = ColorTableCache::new(ColorTableBuilder::default());
        let data = Arc::new(random_rows());
        let schema = Arc::new(schema_with(LABELS.iter().map(|s| s.to_string()).collect()));

        let a = cache
            .get(ColorMode::Categorical, Some("cluster"), Some(&data), &schema, None)
            .unwrap();
        let b = cache
            .get(ColorMode::Categorical, Some("cluster"), Some(&data), &schema, None)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        // A structurally equal but distinct schema is a new input
        let other_schema = Arc::new((*schema).clone());
        let c = cache
            .get(ColorMode::Categorical, Some("cluster"), Some(&data), &other_schema, None)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(*a, *c);

        let user = Arc::new(UserColors::new().with_color("cluster", "a", [1, 2, 3]));
        let d = cache
            .get(ColorMode::Categorical, Some("cluster"), Some(&data), &other_schema, Some(&user))
            .unwrap();
        assert!(!Arc::ptr_eq(&c, &d));
    }
}
