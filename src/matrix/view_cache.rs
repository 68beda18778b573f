//! Per-view memo of transformed frames
//!
//! A view transforms a given parent frame the same way every time, so each
//! view keeps its result per fetch key. Repeated fetches through one node then
//! return the same `Arc`, and identity-keyed memos downstream (column
//! summaries, color tables) keep hitting.

use super::query::FetchKey;
use crate::dataframe::Dataframe;
use crate::error::{MatrixError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub(super) struct ViewCache {
    frames: Arc<Mutex<HashMap<FetchKey, Arc<Dataframe>>>>,
}

impl ViewCache {
    pub(super) fn get(&self, key: &FetchKey) -> Result<Option<Arc<Dataframe>>> {
        let frames = self.lock()?;
        let hit = frames.get(key).cloned();
        if hit.is_some() {
            log::debug!("View cache HIT for {}", key);
        }
        Ok(hit)
    }

    /// Store `df` unless a concurrent fetch stored one first; returns the kept frame
    pub(super) fn insert(&self, key: FetchKey, df: Arc<Dataframe>) -> Result<Arc<Dataframe>> {
        let mut frames = self.lock()?;
        log::debug!("View cache MISS for {} - stored transformed frame", key);
        Ok(frames.entry(key).or_insert(df).clone())
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.frames.lock().map(|frames| frames.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<FetchKey, Arc<Dataframe>>>> {
        self.frames
            .lock()
            .map_err(|_| MatrixError::Other("View cache poisoned".to_string()))
    }
}
