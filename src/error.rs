use thiserror::Error;

/// Errors raised by the annotated-matrix engine
///
/// Every variant carries owned strings so a single failed fetch can be cloned
/// out to all callers waiting on the same coalesced request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MatrixError {
    /// The transport collaborator failed to deliver a column
    #[error("Fetch error for {key}: {reason}")]
    Fetch { key: String, reason: String },

    /// Payload could not be turned into a dataframe (bad dtype, wrong length)
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Caller state disagrees with the schema (unknown accessor, undeclared category)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Predicate does not apply to the dimension it was given
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Configuration error (invalid values, unparsable JSON)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<polars::error::PolarsError> for MatrixError {
    fn from(err: polars::error::PolarsError) -> Self {
        MatrixError::Conversion(err.to_string())
    }
}

impl From<serde_json::Error> for MatrixError {
    fn from(err: serde_json::Error) -> Self {
        MatrixError::Config(err.to_string())
    }
}

/// Type alias for Results using MatrixError
pub type Result<T> = std::result::Result<T, MatrixError>;
