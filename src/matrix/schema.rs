//! Dataset schema
//!
//! Fixed at loader construction. Declares the obs/var annotation columns with
//! their types and, for categorical columns, the category list whose order
//! drives color assignment.

use crate::dataframe::ColumnType;
use crate::error::{MatrixError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Declared category order (categorical columns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnSchema {
            name: name.into(),
            column_type,
            categories: None,
        }
    }

    pub fn categorical<S: Into<String>>(name: impl Into<String>, categories: Vec<S>) -> Self {
        ColumnSchema {
            name: name.into(),
            column_type: ColumnType::Categorical,
            categories: Some(categories.into_iter().map(Into::into).collect()),
        }
    }

    /// Position of `value` in the declared category list
    pub fn category_index(&self, value: &str) -> Option<usize> {
        self.categories
            .as_ref()
            .and_then(|cats| cats.iter().position(|c| c == value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geneset {
    pub name: String,
    pub genes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub n_obs: usize,
    pub n_var: usize,
    /// Name of the obs column holding cell names
    pub obs_index: String,
    /// Name of the var column holding gene names
    pub var_index: String,
    #[serde(default)]
    pub obs: Vec<ColumnSchema>,
    #[serde(default)]
    pub var: Vec<ColumnSchema>,
    #[serde(default)]
    pub embeddings: Vec<String>,
    #[serde(default)]
    pub genesets: Vec<Geneset>,
}

impl Schema {
    /// Parse and validate a schema from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: Schema = serde_json::from_str(json)
            .map_err(|e| MatrixError::Schema(format!("Failed to parse schema JSON: {}", e)))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Check name uniqueness and that categorical columns declare categories
    pub fn validate(&self) -> Result<()> {
        for (what, columns) in [("obs", &self.obs), ("var", &self.var)] {
            let mut seen = HashSet::new();
            for column in columns {
                if !seen.insert(column.name.as_str()) {
                    return Err(MatrixError::Schema(format!(
                        "Duplicate {} column '{}'",
                        what, column.name
                    )));
                }
                if column.column_type == ColumnType::Categorical {
                    let categories = column.categories.as_ref().ok_or_else(|| {
                        MatrixError::Schema(format!(
                            "Categorical {} column '{}' declares no categories",
                            what, column.name
                        ))
                    })?;
                    let unique: HashSet<&String> = categories.iter().collect();
                    if unique.len() != categories.len() {
                        return Err(MatrixError::Schema(format!(
                            "Categorical {} column '{}' declares a category twice",
                            what, column.name
                        )));
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        for name in &self.embeddings {
            if !seen.insert(name.as_str()) {
                return Err(MatrixError::Schema(format!("Duplicate embedding '{}'", name)));
            }
        }

        Ok(())
    }

    pub fn obs_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.obs.iter().find(|c| c.name == name)
    }

    pub fn var_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.var.iter().find(|c| c.name == name)
    }

    pub fn has_embedding(&self, name: &str) -> bool {
        self.embeddings.iter().any(|e| e == name)
    }

    pub fn geneset(&self, name: &str) -> Option<&Geneset> {
        self.genesets.iter().find(|g| g.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA_JSON: &str = r#"{
        "n_obs": 3,
        "n_var": 2,
        "obs_index": "cell",
        "var_index": "gene",
        "obs": [
            {"name": "cell", "type": "string"},
            {"name": "n_genes", "type": "int32"},
            {"name": "louvain", "type": "categorical", "categories": ["1", "0", "2"]}
        ],
        "var": [{"name": "gene", "type": "string"}],
        "embeddings": ["umap"]
    }"#;

    #[test]
    fn test_parse_schema() {
        let schema = Schema::from_json(SCHEMA_JSON).unwrap();
        assert_eq!(schema.n_obs, 3);
        assert_eq!(
            schema.obs_column("n_genes").unwrap().column_type,
            ColumnType::Int32
        );
        assert_eq!(
            schema.obs_column("louvain").unwrap().category_index("0"),
            Some(1)
        );
        assert!(schema.has_embedding("umap"));
        assert!(!schema.has_embedding("tsne"));
        assert!(schema.genesets.is_empty());
    }

    #[test]
    fn test_categorical_without_categories_rejected() {
        let json = r#"{
            "n_obs": 1, "n_var": 1, "obs_index": "cell", "var_index": "gene",
            "obs": [{"name": "louvain", "type": "categorical"}]
        }"#;
        assert!(matches!(Schema::from_json(json), Err(MatrixError::Schema(_))));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let mut schema = Schema::from_json(SCHEMA_JSON).unwrap();
        schema.obs.push(ColumnSchema::new("cell", ColumnType::String));
        assert!(schema.validate().is_err());
    }
}
