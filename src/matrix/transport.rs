//! Transport collaborator interface
//!
//! The loader never talks to the network itself. A `Transport` receives a
//! fetch key and returns the requested columns as a Polars DataFrame, or an
//! error. Retries and backoff, if any, live behind this trait.

use super::query::{FetchKey, Field, Query, SummaryMethod};
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use polars::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the columns addressed by `key`
    ///
    /// Row-shaped fields return one row per cell, `Field::Var` one row per
    /// gene. Embeddings return exactly two coordinate columns.
    async fn fetch(&self, key: &FetchKey) -> anyhow::Result<DataFrame>;
}

/// Transport serving frames held in memory
///
/// Used by tests and by applications that already hold the full dataset.
/// Counts every request it serves so coalescing can be observed, and can be
/// told to delay responses or fail a number of times per column.
#[derive(Default)]
pub struct InMemoryTransport {
    obs: Option<DataFrame>,
    var: Option<DataFrame>,
    x: Option<DataFrame>,
    emb: HashMap<String, DataFrame>,
    delay: Option<Duration>,
    failures: Mutex<HashMap<String, usize>>,
    requests: AtomicUsize,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_obs(mut self, obs: DataFrame) -> Self {
        self.obs = Some(obs);
        self
    }

    pub fn with_var(mut self, var: DataFrame) -> Self {
        self.var = Some(var);
        self
    }

    /// Expression matrix, one column per gene
    pub fn with_x(mut self, x: DataFrame) -> Self {
        self.x = Some(x);
        self
    }

    pub fn with_embedding(mut self, name: impl Into<String>, coords: DataFrame) -> Self {
        self.emb.insert(name.into(), coords);
        self
    }

    /// Sleep before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `times` requests for column `name`
    pub fn fail_column(&self, name: impl Into<String>, times: usize) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(name.into(), times);
        }
    }

    /// Number of requests served so far, failed ones included
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn take_failure(&self, name: &str) -> bool {
        let Ok(mut failures) = self.failures.lock() else {
            return false;
        };
        match failures.get_mut(name) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn frame(&self, field: Field) -> anyhow::Result<&DataFrame> {
        match field {
            Field::Obs => self.obs.as_ref(),
            Field::Var => self.var.as_ref(),
            Field::X => self.x.as_ref(),
            Field::Emb => None,
        }
        .ok_or_else(|| anyhow!("No {} data loaded", field))
    }

    fn select_column(&self, field: Field, name: &str) -> anyhow::Result<DataFrame> {
        if field == Field::Emb {
            return self
                .emb
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("Unknown embedding '{}'", name));
        }
        let frame = self.frame(field)?;
        let column = frame
            .column(name)
            .with_context(|| format!("Unknown {} column '{}'", field, name))?
            .clone();
        Ok(DataFrame::new(vec![column])?)
    }

    fn summarize(&self, method: SummaryMethod, name: &str, genes: &[String]) -> anyhow::Result<DataFrame> {
        let x = self.frame(Field::X)?;
        if genes.is_empty() {
            bail!("Summary '{}' names no genes", name);
        }

        let mut sums = vec![0.0f64; x.height()];
        for gene in genes {
            let values = x
                .column(gene)
                .with_context(|| format!("Unknown gene '{}'", gene))?
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            for (sum, v) in sums.iter_mut().zip(values.f64()?.into_iter()) {
                *sum += v.unwrap_or(f64::NAN);
            }
        }

        let values: Vec<f32> = match method {
            SummaryMethod::Mean => sums
                .into_iter()
                .map(|s| (s / genes.len() as f64) as f32)
                .collect(),
        };
        Ok(DataFrame::new(vec![Column::new(name.into(), values)])?)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn fetch(&self, key: &FetchKey) -> anyhow::Result<DataFrame> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.take_failure(key.query.name()) {
            bail!("Injected failure for {}", key);
        }

        match &key.query {
            Query::Column(name) => self.select_column(key.field, name),
            Query::Summarize {
                method,
                name,
                genes,
            } => self.summarize(*method, name, genes),
        }
    }
}
