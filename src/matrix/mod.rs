//! Annotated matrix view chain
//!
//! A matrix is a singly-linked chain of immutable nodes ending in the loader:
//!
//! ```text
//! [Clip]? -> [RowSubset]* -> [RowSubset(embedding)]? -> Loader
//! ```
//!
//! Nodes are never mutated. Every stack operation in `stack` builds new nodes
//! and returns a new top; holders of an older top keep a consistent chain.
//!
//! Structure:
//! - `loader.rs`: base matrix, fetch cache and request coalescing
//! - `clip.rs` / `subset.rs`: the two view kinds
//! - `view_cache.rs`: per-view memo of transformed frames
//! - `stack.rs`: canonical-order stack operations
//! - `schema.rs`, `query.rs`, `transport.rs`: schema, fetch keys, transport trait

mod clip;
mod loader;
mod query;
mod schema;
pub mod stack;
mod subset;
mod transport;
mod view_cache;

pub use clip::{clip_dataframe, quantile_sorted, ClipBounds, ClipView};
pub use loader::Loader;
pub use query::{FetchKey, Field, Query, SummaryMethod};
pub use schema::{ColumnSchema, Geneset, Schema};
pub use subset::{RowSubsetView, SubsetFlags};
pub use transport::{InMemoryTransport, Transport};

use crate::dataframe::{Dataframe, LabelIndex};
use crate::error::Result;
use std::fmt;
use view_cache::ViewCache;
use std::sync::Arc;

pub enum MatrixNode {
    Loader(Arc<Loader>),
    Clip(ClipView),
    RowSubset(RowSubsetView),
}

impl MatrixNode {
    /// Cache of the view when it transforms frames of `field`; None for
    /// the loader and for views that pass `field` through unchanged
    fn transform_cache(&self, field: Field) -> Option<&ViewCache> {
        match self {
            MatrixNode::Clip(clip) if field == Field::X => Some(&clip.cache),
            MatrixNode::RowSubset(subset) if field.is_row_shaped() => Some(&subset.cache),
            _ => None,
        }
    }
}

/// Kind of a chain node, as seen by the stack discipline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewKind {
    Loader,
    Clip(ClipBounds),
    UserSubset,
    EmbeddingSubset,
    /// Row subset with neither flag set
    Subset,
}

/// Handle to the top node of a view chain; cheap to clone
#[derive(Clone)]
pub struct AnnoMatrix {
    node: Arc<MatrixNode>,
}

impl AnnoMatrix {
    /// New chain consisting of the loader alone
    pub fn new(loader: Loader) -> Self {
        Self::from_loader(Arc::new(loader))
    }

    pub fn from_loader(loader: Arc<Loader>) -> Self {
        Self::from_node(MatrixNode::Loader(loader))
    }

    pub(crate) fn from_node(node: MatrixNode) -> Self {
        AnnoMatrix {
            node: Arc::new(node),
        }
    }

    pub fn node(&self) -> &MatrixNode {
        &self.node
    }

    pub fn kind(&self) -> ViewKind {
        match self.node() {
            MatrixNode::Loader(_) => ViewKind::Loader,
            MatrixNode::Clip(clip) => ViewKind::Clip(clip.bounds),
            MatrixNode::RowSubset(subset) if subset.flags.is_embedding_subset => {
                ViewKind::EmbeddingSubset
            }
            MatrixNode::RowSubset(subset) if subset.flags.is_user_subset => ViewKind::UserSubset,
            MatrixNode::RowSubset(_) => ViewKind::Subset,
        }
    }

    /// Node below this one; None for the loader
    pub fn parent(&self) -> Option<&AnnoMatrix> {
        match self.node() {
            MatrixNode::Loader(_) => None,
            MatrixNode::Clip(clip) => Some(&clip.parent),
            MatrixNode::RowSubset(subset) => Some(&subset.parent),
        }
    }

    /// This node followed by every node below it, ending with the loader
    pub fn chain(&self) -> impl Iterator<Item = &AnnoMatrix> {
        std::iter::successors(Some(self), |m| m.parent())
    }

    /// The loader node at the bottom of the chain
    pub fn base(&self) -> &AnnoMatrix {
        self.chain().last().unwrap_or(self)
    }

    pub fn loader(&self) -> &Arc<Loader> {
        let mut current = self;
        loop {
            match current.node() {
                MatrixNode::Loader(loader) => return loader,
                MatrixNode::Clip(clip) => current = &clip.parent,
                MatrixNode::RowSubset(subset) => current = &subset.parent,
            }
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.loader().schema()
    }

    /// Row labels visible at this node
    pub fn row_index(&self) -> &LabelIndex {
        let mut current = self;
        loop {
            match current.node() {
                MatrixNode::Loader(loader) => return loader.obs_index(),
                MatrixNode::Clip(clip) => current = &clip.parent,
                MatrixNode::RowSubset(subset) => return &subset.row_index,
            }
        }
    }

    pub fn n_rows(&self) -> usize {
        self.row_index().len()
    }

    /// True when both handles point at the same node
    pub fn same_node(&self, other: &AnnoMatrix) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Fetch a column through every view of the chain
    pub async fn fetch(&self, field: Field, query: Query) -> Result<Arc<Dataframe>> {
        self.fetch_key(FetchKey::new(field, query, None)).await
    }

    /// Fetch with an explicit resolution
    ///
    /// Walks down the chain to the nearest view holding a transformed frame
    /// for `key` (or the loader), then applies the remaining views bottom-up,
    /// caching each result on its view.
    pub async fn fetch_key(&self, key: FetchKey) -> Result<Arc<Dataframe>> {
        let field = key.field;
        let mut todo: Vec<&MatrixNode> = Vec::new();
        let mut cached = None;
        for view in self.chain() {
            let Some(cache) = view.node().transform_cache(field) else {
                continue;
            };
            if let Some(df) = cache.get(&key)? {
                cached = Some(df);
                break;
            }
            todo.push(view.node());
        }

        let mut df = match cached {
            Some(df) => df,
            None => self.loader().fetch(key.clone()).await?,
        };

        for node in todo.into_iter().rev() {
            let transformed = match node {
                MatrixNode::Clip(clip) => clip_dataframe(&df, clip.bounds)?,
                MatrixNode::RowSubset(subset) => subset.narrow(&df)?,
                MatrixNode::Loader(_) => continue,
            };
            if let Some(cache) = node.transform_cache(field) {
                df = cache.insert(key.clone(), Arc::new(transformed))?;
            }
        }

        Ok(df)
    }

    /// Warm the loader cache for a later `fetch`; does not wait
    pub fn prefetch(&self, field: Field, query: Query, resolution: Option<u32>) {
        self.loader()
            .prefetch(FetchKey::new(field, query, resolution));
    }
}

impl fmt::Debug for AnnoMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.chain().map(|m| (m.kind(), m.n_rows())))
            .finish()
    }
}
