//! Annotated matrix engine
//!
//! Lazily-fetched, column-oriented annotated matrix (cells × genes plus per-cell
//! and per-gene annotations and 2D embeddings), with:
//! - a loader that caches and coalesces column fetches (`matrix::Loader`)
//! - composable clip and row-subset views kept in canonical order (`matrix::stack`)
//! - multi-dimension selection (`crossfilter`)
//! - per-row color tables (`colors`)
//!
//! The crate never talks to the network itself; a `matrix::Transport`
//! implementation supplies column payloads.

pub mod colors;
pub mod config;
pub mod crossfilter;
pub mod dataframe;
pub mod error;
pub mod matrix;
pub mod properties;

pub use config::MatrixConfig;
pub use error::{MatrixError, Result};
pub use matrix::AnnoMatrix;

#[cfg(test)]
pub(crate) mod test_support;
