//! View-stack operations
//!
//! Every operation takes the current top of a chain and returns a new top;
//! nothing below is mutated. Given a canonical chain
//!
//! ```text
//! Clip? -> UserSubset* -> EmbeddingSubset? -> Loader
//! ```
//!
//! each operation returns a canonical chain again, whatever order the
//! operations are called in. Operations that would violate the order are
//! no-ops and return the input.

use super::clip::{clip_view, ClipBounds};
use super::subset::{subset_by_labels, subset_view, SubsetFlags};
use super::{AnnoMatrix, MatrixNode, ViewKind};
use crate::dataframe::{mask_to_offsets, Dataframe, RowLabel};
use crate::error::{MatrixError, Result};

/// Clip bounds of the top node (if it is a clip) and the node below it
fn split_clip(matrix: &AnnoMatrix) -> (Option<ClipBounds>, &AnnoMatrix) {
    match matrix.node() {
        MatrixNode::Clip(clip) => (Some(clip.bounds), &clip.parent),
        _ => (None, matrix),
    }
}

fn rewrap(matrix: AnnoMatrix, bounds: Option<ClipBounds>) -> AnnoMatrix {
    match bounds {
        Some(bounds) => clip_view(&matrix, bounds),
        None => matrix,
    }
}

/// Replace the clip of `matrix` (or add one) with the `[min_pct, max_pct]` window
///
/// A degenerate window leaves the matrix as it is.
pub fn clip(matrix: &AnnoMatrix, min_pct: f64, max_pct: f64) -> AnnoMatrix {
    let Some(bounds) = ClipBounds::new(min_pct, max_pct) else {
        log::debug!(
            "Ignoring degenerate clip window [{}, {}]",
            min_pct,
            max_pct
        );
        return matrix.clone();
    };
    let (_, below) = split_clip(matrix);
    clip_view(below, bounds)
}

/// Remove the clip, if any
pub fn unclip(matrix: &AnnoMatrix) -> AnnoMatrix {
    split_clip(matrix).1.clone()
}

/// Current clip bounds
pub fn clip_bounds(matrix: &AnnoMatrix) -> Option<ClipBounds> {
    split_clip(matrix).0
}

/// Push a user subset selecting the rows where `mask` is true
///
/// The subset goes directly below the clip, above every earlier subset.
pub fn user_subset(matrix: &AnnoMatrix, mask: &[bool]) -> Result<AnnoMatrix> {
    let offsets = mask_to_offsets(mask, matrix.n_rows())?;
    user_subset_by_offsets(matrix, offsets)
}

/// Push a user subset of the rows at `offsets` (offsets into `matrix`)
pub fn user_subset_by_offsets(matrix: &AnnoMatrix, offsets: Vec<usize>) -> Result<AnnoMatrix> {
    let (bounds, below) = split_clip(matrix);
    let subset = subset_view(below, offsets, SubsetFlags::USER)?;
    Ok(rewrap(subset, bounds))
}

/// Pop every user subset; clip and embedding subset stay as they were
pub fn reset_user_subsets(matrix: &AnnoMatrix) -> AnnoMatrix {
    let (bounds, mut below) = split_clip(matrix);

    let mut popped = 0;
    while let MatrixNode::RowSubset(subset) = below.node() {
        if !subset.flags.is_user_subset {
            break;
        }
        below = &subset.parent;
        popped += 1;
    }

    if popped == 0 {
        return matrix.clone();
    }
    log::debug!("Reset {} user subset(s)", popped);
    rewrap(below.clone(), bounds)
}

/// The embedding subset node of the chain, if there is one
pub fn get_embedding_subset(matrix: &AnnoMatrix) -> Option<&AnnoMatrix> {
    matrix
        .chain()
        .find(|node| node.kind() == ViewKind::EmbeddingSubset)
}

/// Offsets of the rows whose first two columns are both finite
///
/// None when every row is finite. Row order is preserved.
pub fn embedding_row_offsets(embedding: &Dataframe) -> Result<Option<Vec<usize>>> {
    let (x, y) = match (embedding.column_at(0), embedding.column_at(1)) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(MatrixError::Schema(format!(
                "Embedding needs two coordinate columns, got {}",
                embedding.n_cols()
            )))
        }
    };
    if !x.column_type().is_continuous() || !y.column_type().is_continuous() {
        return Err(MatrixError::Schema(format!(
            "Embedding coordinates '{}', '{}' must be numeric",
            x.name(),
            y.name()
        )));
    }

    let n_rows = embedding.n_rows();
    let offsets: Vec<usize> = (0..n_rows)
        .filter(|&row| {
            let finite = |v: Option<f64>| v.is_some_and(f64::is_finite);
            finite(x.data().value_f64(row)) && finite(y.data().value_f64(row))
        })
        .collect();

    Ok((offsets.len() < n_rows).then_some(offsets))
}

/// Restrict the chain to the rows where `embedding` has finite coordinates
///
/// `embedding` is the embedding as the loader serves it, one row per cell.
/// When the restriction changes, the chain is rebuilt from the loader:
/// the new embedding subset (if any) first, then the ordinary subsets in
/// their previous order, re-applied by row label, then the clip.
pub fn set_embedding_subset(matrix: &AnnoMatrix, embedding: &Dataframe) -> Result<AnnoMatrix> {
    let n_obs = matrix.schema().n_obs;
    if embedding.n_rows() != n_obs {
        return Err(MatrixError::Schema(format!(
            "Embedding has {} rows, matrix has {} cells",
            embedding.n_rows(),
            n_obs
        )));
    }

    let offsets = embedding_row_offsets(embedding)?;
    if offsets.is_none() && get_embedding_subset(matrix).is_none() {
        return Ok(matrix.clone());
    }

    let (bounds, below) = split_clip(matrix);

    // Top-down list of the ordinary subsets to re-push
    let stashed: Vec<(Vec<RowLabel>, SubsetFlags)> = below
        .chain()
        .filter_map(|node| match node.node() {
            MatrixNode::RowSubset(subset) if !subset.flags.is_embedding_subset => {
                Some((subset.row_index.labels().collect(), subset.flags))
            }
            _ => None,
        })
        .collect();

    let mut rebuilt = matrix.base().clone();
    if let Some(offsets) = offsets {
        log::debug!(
            "Embedding subset keeps {} of {} cells",
            offsets.len(),
            n_obs
        );
        rebuilt = subset_view(&rebuilt, offsets, SubsetFlags::EMBEDDING)?;
    }
    for (labels, flags) in stashed.into_iter().rev() {
        rebuilt = subset_by_labels(&rebuilt, labels, flags)?;
    }

    Ok(rewrap(rebuilt, bounds))
}

/// Node kinds from top to bottom
pub fn chain_kinds(matrix: &AnnoMatrix) -> Vec<ViewKind> {
    matrix.chain().map(AnnoMatrix::kind).collect()
}

/// True when the chain matches `Clip? Subset* EmbeddingSubset? Loader`
pub fn is_canonical(matrix: &AnnoMatrix) -> bool {
    let kinds = chain_kinds(matrix);
    let mut rest = kinds.as_slice();

    if let [ViewKind::Clip(_), tail @ ..] = rest {
        rest = tail;
    }
    while let [ViewKind::UserSubset | ViewKind::Subset, tail @ ..] = rest {
        rest = tail;
    }
    if let [ViewKind::EmbeddingSubset, tail @ ..] = rest {
        rest = tail;
    }
    matches!(rest, [ViewKind::Loader])
}
