//! Row-subset view
//!
//! Restricts the rows of its parent and re-indexes them densely. Keeps the
//! mapping from its own offsets to parent offsets, so a fetched parent frame
//! is narrowed with one gather per column. Labels stay in the base matrix's
//! label space, which lets a subset be re-applied over a different parent.

use super::view_cache::ViewCache;
use super::{AnnoMatrix, MatrixNode};
use crate::dataframe::{Dataframe, LabelIndex, RowLabel};
use crate::error::Result;
use std::sync::Arc;

/// Why a subset view exists; the two flags are independent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubsetFlags {
    pub is_user_subset: bool,
    pub is_embedding_subset: bool,
}

impl SubsetFlags {
    pub const USER: SubsetFlags = SubsetFlags {
        is_user_subset: true,
        is_embedding_subset: false,
    };

    pub const EMBEDDING: SubsetFlags = SubsetFlags {
        is_user_subset: false,
        is_embedding_subset: true,
    };
}

#[derive(Clone)]
pub struct RowSubsetView {
    pub(super) parent: AnnoMatrix,
    pub(super) row_index: LabelIndex,
    /// `parent_offsets[i]` is the parent row shown at offset `i`
    pub(super) parent_offsets: Arc<[usize]>,
    pub(super) flags: SubsetFlags,
    pub(super) cache: ViewCache,
}

impl RowSubsetView {
    pub fn parent(&self) -> &AnnoMatrix {
        &self.parent
    }

    pub fn row_index(&self) -> &LabelIndex {
        &self.row_index
    }

    pub fn flags(&self) -> SubsetFlags {
        self.flags
    }

    /// Narrow a parent-shaped frame to this view's rows
    pub(super) fn narrow(&self, df: &Dataframe) -> Result<Dataframe> {
        df.subset(&self.parent_offsets)
    }
}

/// Subset `parent` to the rows at `offsets` (parent offsets, order kept)
pub(super) fn subset_view(
    parent: &AnnoMatrix,
    offsets: Vec<usize>,
    flags: SubsetFlags,
) -> Result<AnnoMatrix> {
    let row_index = parent.row_index().subset(&offsets)?;
    log::debug!(
        "Row subset {:?}: {} of {} rows",
        flags,
        offsets.len(),
        parent.n_rows()
    );
    Ok(AnnoMatrix::from_node(MatrixNode::RowSubset(RowSubsetView {
        parent: parent.clone(),
        row_index,
        parent_offsets: offsets.into(),
        flags,
        cache: ViewCache::default(),
    })))
}

/// Subset `parent` to the rows carrying `labels`; labels the parent lacks are dropped
pub(super) fn subset_by_labels(
    parent: &AnnoMatrix,
    labels: impl IntoIterator<Item = RowLabel>,
    flags: SubsetFlags,
) -> Result<AnnoMatrix> {
    let parent_index = parent.row_index();
    let offsets = labels
        .into_iter()
        .filter_map(|label| parent_index.offset_of(label))
        .collect();
    subset_view(parent, offsets, flags)
}
