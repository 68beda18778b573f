//! Base matrix loader
//!
//! Root of every view chain. Owns the schema and a fetch cache keyed by
//! `(field, query, resolution)`. Concurrent fetches of the same key share one
//! in-flight transport request; the first completion populates the cache and
//! every waiter resolves from that single result.
//!
//! The cache is append-only. A failed fetch is handed to every waiter and
//! leaves no cache entry, so the key can be fetched again later.

use super::query::{FetchKey, Field};
use super::schema::Schema;
use super::transport::Transport;
use crate::dataframe::{polars_convert::payload_to_dataframe, Dataframe, LabelIndex};
use crate::error::{MatrixError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Dataframe>>>>;

#[derive(Default)]
struct CacheState {
    /// Completed fetches
    ready: HashMap<FetchKey, Arc<Dataframe>>,
    /// Fetches issued but not yet resolved
    pending: HashMap<FetchKey, SharedFetch>,
}

/// What a fetch request resolved to at issue time
enum FetchSlot {
    Ready(Arc<Dataframe>),
    Pending(SharedFetch),
}

pub struct Loader {
    schema: Arc<Schema>,
    transport: Arc<dyn Transport>,
    obs_index: LabelIndex,
    var_index: LabelIndex,
    state: Arc<Mutex<CacheState>>,
}

impl Loader {
    /// Create a loader; the schema is validated and fixed from here on
    pub fn new(schema: Schema, transport: Arc<dyn Transport>) -> Result<Self> {
        schema.validate()?;
        Ok(Loader {
            obs_index: LabelIndex::identity(schema.n_obs),
            var_index: LabelIndex::identity(schema.n_var),
            schema: Arc::new(schema),
            transport,
            state: Arc::new(Mutex::new(CacheState::default())),
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Row index of the cells (identity over `n_obs`)
    pub fn obs_index(&self) -> &LabelIndex {
        &self.obs_index
    }

    pub fn var_index(&self) -> &LabelIndex {
        &self.var_index
    }

    /// Fetch `key`, from cache when possible
    pub async fn fetch(&self, key: FetchKey) -> Result<Arc<Dataframe>> {
        match self.issue(key)? {
            FetchSlot::Ready(df) => Ok(df),
            FetchSlot::Pending(fetch) => fetch.await,
        }
    }

    /// Start fetching `key` without waiting for the result
    ///
    /// The request runs on the current tokio runtime. Outside a runtime this
    /// only logs, since nothing would drive the request.
    pub fn prefetch(&self, key: FetchKey) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::warn!("prefetch of {} skipped: no async runtime", key);
                return;
            }
        };

        match self.issue(key) {
            Ok(FetchSlot::Pending(fetch)) => {
                handle.spawn(async move {
                    // A failure is logged when the request settles and leaves
                    // no cache entry, so the next fetch retries
                    if fetch.await.is_err() {
                        log::debug!("prefetch did not populate the cache");
                    }
                });
            }
            Ok(FetchSlot::Ready(_)) => {}
            Err(e) => log::warn!("prefetch failed to start: {}", e),
        }
    }

    pub fn is_cached(&self, key: &FetchKey) -> bool {
        self.state
            .lock()
            .map(|state| state.ready.contains_key(key))
            .unwrap_or(false)
    }

    /// Number of completed cache entries
    pub fn cache_len(&self) -> usize {
        self.state.lock().map(|state| state.ready.len()).unwrap_or(0)
    }

    /// Number of requests currently in flight
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().map(|state| state.pending.len()).unwrap_or(0)
    }

    /// Look the key up and register a new shared request on a miss.
    /// Check and insert happen under one lock.
    fn issue(&self, key: FetchKey) -> Result<FetchSlot> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| MatrixError::Other("Loader cache poisoned".to_string()))?;

        if let Some(df) = state.ready.get(&key) {
            log::debug!("Cache HIT for {}", key);
            return Ok(FetchSlot::Ready(df.clone()));
        }

        if let Some(fetch) = state.pending.get(&key) {
            log::debug!("Joining in-flight fetch for {}", key);
            return Ok(FetchSlot::Pending(fetch.clone()));
        }

        log::debug!("Cache MISS for {} - fetching from transport", key);
        let fetch = self.request(key.clone()).boxed().shared();
        state.pending.insert(key, fetch.clone());
        Ok(FetchSlot::Pending(fetch))
    }

    /// Transport round trip plus conversion; settles the cache entry when done
    fn request(&self, key: FetchKey) -> impl std::future::Future<Output = Result<Arc<Dataframe>>> + Send + 'static {
        let transport = self.transport.clone();
        let state = self.state.clone();
        let schema = self.schema.clone();
        let row_index = match key.field {
            Field::Var => self.var_index.clone(),
            _ => self.obs_index.clone(),
        };

        async move {
            let result = match transport.fetch(&key).await {
                Ok(payload) => convert_payload(&key, &payload, row_index, &schema).map(Arc::new),
                Err(e) => Err(MatrixError::Fetch {
                    key: key.to_string(),
                    reason: format!("{:#}", e),
                }),
            };

            if let Ok(mut state) = state.lock() {
                state.pending.remove(&key);
                match &result {
                    Ok(df) => {
                        state.ready.insert(key, df.clone());
                    }
                    Err(e) => log::warn!("Fetch failed: {}", e),
                }
            }

            result
        }
    }
}

fn convert_payload(
    key: &FetchKey,
    payload: &polars::frame::DataFrame,
    row_index: LabelIndex,
    schema: &Schema,
) -> Result<Dataframe> {
    let declared = match key.field {
        Field::Obs => schema.obs.as_slice(),
        Field::Var => schema.var.as_slice(),
        Field::X | Field::Emb => &[],
    };
    let df = payload_to_dataframe(payload, row_index, declared)?;

    if key.field == Field::Emb {
        let numeric = df.columns().iter().all(|c| c.column_type().is_continuous());
        if df.n_cols() != 2 || !numeric {
            return Err(MatrixError::Conversion(format!(
                "Embedding {} must have two numeric columns, got {}",
                key,
                df.n_cols()
            )));
        }
    }

    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::query::Query;
    use crate::matrix::transport::InMemoryTransport;
    use crate::test_support::{sample_schema, sample_transport};
    use std::time::Duration;

    fn loader_with(transport: InMemoryTransport) -> (Loader, Arc<InMemoryTransport>) {
        let transport = Arc::new(transport);
        let loader = Loader::new(sample_schema(), transport.clone()).unwrap();
        (loader, transport)
    }

    fn obs_key(name: &str) -> FetchKey {
        FetchKey::new(Field::Obs, Query::column(name), None)
    }

    #[tokio::test]
    async fn test_fetch_is_memoized() {
        let (loader, transport) = loader_with(sample_transport());

        let first = loader.fetch(obs_key("n_genes")).await.unwrap();
        let second = loader.fetch(obs_key("n_genes")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.request_count(), 1);
        assert!(loader.is_cached(&obs_key("n_genes")));
        assert_eq!(loader.cache_len(), 1);
    }

    #[tokio::test]
    async fn test_resolution_is_part_of_the_key() {
        let (loader, transport) = loader_with(sample_transport());

        let coarse = FetchKey::new(Field::Emb, Query::column("umap"), Some(256));
        let fine = FetchKey::new(Field::Emb, Query::column("umap"), Some(4096));
        loader.fetch(coarse).await.unwrap();
        loader.fetch(fine).await.unwrap();

        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_coalesced() {
        let (loader, transport) =
            loader_with(sample_transport().with_delay(Duration::from_millis(20)));

        let (a, b, c) = futures::join!(
            loader.fetch(obs_key("louvain")),
            loader.fetch(obs_key("louvain")),
            loader.fetch(obs_key("louvain")),
        );

        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
        assert_eq!(transport.request_count(), 1);
        assert_eq!(loader.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let (loader, transport) = loader_with(sample_transport());
        transport.fail_column("n_genes", 1);

        let err = loader.fetch(obs_key("n_genes")).await.unwrap_err();
        assert!(matches!(err, MatrixError::Fetch { .. }));
        assert!(!loader.is_cached(&obs_key("n_genes")));
        assert_eq!(loader.in_flight_len(), 0);

        // The same key is fetchable again
        let df = loader.fetch(obs_key("n_genes")).await.unwrap();
        assert_eq!(df.n_rows(), 6);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_coalesced_failure_reaches_every_waiter() {
        let (loader, transport) =
            loader_with(sample_transport().with_delay(Duration::from_millis(10)));
        transport.fail_column("louvain", 1);

        let (a, b) = futures::join!(
            loader.fetch(obs_key("louvain")),
            loader.fetch(obs_key("louvain")),
        );
        assert!(a.is_err());
        assert_eq!(a.unwrap_err(), b.unwrap_err());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_prefetch_warms_cache() {
        let (loader, transport) = loader_with(sample_transport());

        loader.prefetch(obs_key("louvain"));
        for _ in 0..50 {
            if loader.is_cached(&obs_key("louvain")) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(loader.is_cached(&obs_key("louvain")));

        loader.fetch(obs_key("louvain")).await.unwrap();
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_prefetch_leaves_key_fetchable() {
        let (loader, transport) = loader_with(sample_transport());
        transport.fail_column("n_genes", 1);

        loader.prefetch(obs_key("n_genes"));
        for _ in 0..50 {
            if transport.request_count() == 1 && loader.in_flight_len() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(transport.request_count(), 1);
        assert!(!loader.is_cached(&obs_key("n_genes")));

        let df = loader.fetch(obs_key("n_genes")).await.unwrap();
        assert_eq!(df.n_rows(), 6);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_var_rows_follow_var_index() {
        let (loader, _) = loader_with(sample_transport());
        let df = loader
            .fetch(FetchKey::new(Field::Var, Query::column("gene"), None))
            .await
            .unwrap();
        assert_eq!(df.n_rows(), 3);
    }

    #[tokio::test]
    async fn test_geneset_summary() {
        let (loader, _) = loader_with(sample_transport());
        let key = FetchKey::new(
            Field::X,
            Query::Summarize {
                method: crate::matrix::query::SummaryMethod::Mean,
                name: "mean_ab".to_string(),
                genes: vec!["GENE_A".to_string(), "GENE_B".to_string()],
            },
            None,
        );
        let df = loader.fetch(key).await.unwrap();
        let col = df.column("mean_ab").unwrap();
        // GENE_A row 0 = 0.0, GENE_B row 0 = 1.0
        assert_eq!(col.data().value_f64(0), Some(0.5));
    }

    #[tokio::test]
    async fn test_unknown_column_is_fetch_error() {
        let (loader, _) = loader_with(sample_transport());
        let err = loader.fetch(obs_key("nope")).await.unwrap_err();
        assert!(matches!(err, MatrixError::Fetch { .. }));
    }
}
