//! Row label index
//!
//! Maps opaque row labels to dense offsets `[0, n)` and back. Labels are the
//! row offsets of the base matrix, so every view in a chain speaks the same
//! label space and a subset can be re-applied on a different parent by label.
//!
//! Three representations, picked by density when an index is built:
//! - `Identity`: label == offset (the base matrix)
//! - `Dense`: labels span a compact range, reverse lookup through a flat table
//! - `Keyed`: sparse labels, reverse lookup through a hash map

use crate::error::{MatrixError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Opaque row label
pub type RowLabel = u32;

/// Marks an unused slot in a dense reverse table
const NO_OFFSET: u32 = u32::MAX;

/// Dense tables are used while the label span is at most this multiple of the row count
const DENSE_SPAN_FACTOR: usize = 4;

#[derive(Debug, Clone)]
pub enum LabelIndex {
    Identity {
        len: usize,
    },
    Dense {
        labels: Arc<[RowLabel]>,
        min_label: RowLabel,
        offsets: Arc<[u32]>,
    },
    Keyed {
        labels: Arc<[RowLabel]>,
        offsets: Arc<HashMap<RowLabel, u32>>,
    },
}

impl LabelIndex {
    /// Index where every label equals its offset
    pub fn identity(len: usize) -> Self {
        LabelIndex::Identity { len }
    }

    /// Build an index from labels in offset order
    ///
    /// Fails if a label appears twice.
    pub fn from_labels(labels: Vec<RowLabel>) -> Result<Self> {
        if labels.is_empty() {
            return Ok(LabelIndex::Identity { len: 0 });
        }

        if labels.iter().enumerate().all(|(i, &l)| l as usize == i) {
            return Ok(LabelIndex::Identity { len: labels.len() });
        }

        let min_label = labels.iter().copied().min().unwrap_or(0);
        let max_label = labels.iter().copied().max().unwrap_or(0);
        let span = (max_label - min_label) as usize + 1;

        if span <= labels.len().saturating_mul(DENSE_SPAN_FACTOR) {
            let mut offsets = vec![NO_OFFSET; span];
            for (offset, &label) in labels.iter().enumerate() {
                let slot = &mut offsets[(label - min_label) as usize];
                if *slot != NO_OFFSET {
                    return Err(duplicate_label(label));
                }
                *slot = offset as u32;
            }
            Ok(LabelIndex::Dense {
                labels: labels.into(),
                min_label,
                offsets: offsets.into(),
            })
        } else {
            let mut offsets = HashMap::with_capacity(labels.len());
            for (offset, &label) in labels.iter().enumerate() {
                if offsets.insert(label, offset as u32).is_some() {
                    return Err(duplicate_label(label));
                }
            }
            Ok(LabelIndex::Keyed {
                labels: labels.into(),
                offsets: Arc::new(offsets),
            })
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LabelIndex::Identity { len } => *len,
            LabelIndex::Dense { labels, .. } | LabelIndex::Keyed { labels, .. } => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Label stored at `offset`
    pub fn label_at(&self, offset: usize) -> Option<RowLabel> {
        match self {
            LabelIndex::Identity { len } => (offset < *len).then_some(offset as RowLabel),
            LabelIndex::Dense { labels, .. } | LabelIndex::Keyed { labels, .. } => {
                labels.get(offset).copied()
            }
        }
    }

    /// Offset of `label`, if the label is part of this index
    pub fn offset_of(&self, label: RowLabel) -> Option<usize> {
        match self {
            LabelIndex::Identity { len } => ((label as usize) < *len).then_some(label as usize),
            LabelIndex::Dense {
                min_label, offsets, ..
            } => {
                let slot = label.checked_sub(*min_label)? as usize;
                offsets
                    .get(slot)
                    .copied()
                    .filter(|&o| o != NO_OFFSET)
                    .map(|o| o as usize)
            }
            LabelIndex::Keyed { offsets, .. } => offsets.get(&label).map(|&o| o as usize),
        }
    }

    pub fn contains(&self, label: RowLabel) -> bool {
        self.offset_of(label).is_some()
    }

    /// Labels in offset order
    pub fn labels(&self) -> impl Iterator<Item = RowLabel> + '_ {
        (0..self.len()).filter_map(move |offset| self.label_at(offset))
    }

    /// New dense index over `offsets`, in the order given
    pub fn subset(&self, offsets: &[usize]) -> Result<Self> {
        let len = self.len();
        let labels = offsets
            .iter()
            .map(|&offset| {
                self.label_at(offset).ok_or_else(|| {
                    MatrixError::Other(format!(
                        "Offset {} out of range for index of length {}",
                        offset, len
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_labels(labels)
    }

    /// New dense index over the offsets where `mask` is true
    pub fn subset_mask(&self, mask: &[bool]) -> Result<Self> {
        let offsets = mask_to_offsets(mask, self.len())?;
        self.subset(&offsets)
    }
}

impl PartialEq for LabelIndex {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.labels().eq(other.labels())
    }
}

/// Offsets where `mask` is true, checking the mask covers exactly `len` rows
pub fn mask_to_offsets(mask: &[bool], len: usize) -> Result<Vec<usize>> {
    if mask.len() != len {
        return Err(MatrixError::Other(format!(
            "Mask length {} does not match row count {}",
            mask.len(),
            len
        )));
    }
    Ok(mask
        .iter()
        .enumerate()
        .filter_map(|(i, &keep)| keep.then_some(i))
        .collect())
}

fn duplicate_label(label: RowLabel) -> MatrixError {
    MatrixError::Other(format!("Duplicate row label {}", label))
}
