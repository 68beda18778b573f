//! Fetch addressing: which field, which column, at which resolution

use std::fmt;

/// Top-level data field of the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Per-cell annotations
    Obs,
    /// Per-gene annotations
    Var,
    /// Expression values, one column per gene
    X,
    /// 2D embeddings, two coordinate columns per embedding
    Emb,
}

impl Field {
    /// Fields with one row per cell; these are restricted by row-subset views
    pub fn is_row_shaped(self) -> bool {
        !matches!(self, Field::Var)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Obs => "obs",
            Field::Var => "var",
            Field::X => "X",
            Field::Emb => "emb",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryMethod {
    Mean,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    /// A named column (obs/var annotation, gene for X, embedding name for emb)
    Column(String),
    /// Per-cell summary of several X columns, returned as one column named `name`
    Summarize {
        method: SummaryMethod,
        name: String,
        genes: Vec<String>,
    },
}

impl Query {
    pub fn column(name: impl Into<String>) -> Self {
        Query::Column(name.into())
    }

    /// Name of the column the fetched dataframe carries for this query
    pub fn name(&self) -> &str {
        match self {
            Query::Column(name) => name,
            Query::Summarize { name, .. } => name,
        }
    }
}

/// Cache key of the loader
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub field: Field,
    pub query: Query,
    pub resolution: Option<u32>,
}

impl FetchKey {
    pub fn new(field: Field, query: Query, resolution: Option<u32>) -> Self {
        FetchKey {
            field,
            query,
            resolution,
        }
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.field, self.query.name())?;
        if let Some(resolution) = self.resolution {
            write!(f, "@{}", resolution)?;
        }
        Ok(())
    }
}
