//! Batch dispatch over the provider chain.
//!
//! A batch takes N queries and returns exactly N outcomes in the input
//! order, whatever happens to the individual items. Each item is
//! resolved independently: cache lookup first, then the provider chain;
//! a failure is recorded on its own entry and never aborts the rest of
//! the batch. Items run on the blocking pool under a semaphore, so a
//! batch never holds more than `concurrency` provider calls in flight.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::aggregator::{AggregatorError, ProviderAggregator};
use super::cache::Cache;
use super::types::{Address, GeocodeQuery};
use crate::coordinate::Coordinate;

/// Provider name recorded on entries answered from the cache.
pub const CACHE_PROVIDER_NAME: &str = "cache";

const DEFAULT_CONCURRENCY: usize = 4;

// ─── Cancellation ────────────────────────────────────────────────────

/// Cooperative cancellation flag shared between a batch and its owner.
/// Cancelling stops items that have not started yet; items already
/// running finish normally.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─── Outcomes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BatchError {
    /// The whole provider chain failed for this item.
    Geocoding(AggregatorError),
    /// The batch was cancelled before this item started.
    Cancelled,
    /// The worker task for this item died.
    Internal(String),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Geocoding(error) => write!(f, "{error}"),
            BatchError::Cancelled => write!(f, "batch cancelled"),
            BatchError::Internal(reason) => write!(f, "internal error: {reason}"),
        }
    }
}

impl std::error::Error for BatchError {}

/// One batch entry: the query it answers, and either an address plus
/// the provider that produced it, or the error that stopped it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchGeocoded {
    pub query: GeocodeQuery,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub provider_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchError>,
}

impl BatchGeocoded {
    pub fn resolved(query: GeocodeQuery, provider_name: String, address: Address) -> Self {
        Self {
            query,
            address: Some(address),
            provider_name,
            error: None,
        }
    }

    pub fn from_cache(query: GeocodeQuery, address: Address) -> Self {
        Self::resolved(query, CACHE_PROVIDER_NAME.to_string(), address)
    }

    pub fn failed(query: GeocodeQuery, error: BatchError) -> Self {
        Self {
            query,
            address: None,
            provider_name: String::new(),
            error: Some(error),
        }
    }

    pub fn cancelled(query: GeocodeQuery) -> Self {
        Self::failed(query, BatchError::Cancelled)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ─── Dispatcher ──────────────────────────────────────────────────────

/// Runs batches against a shared provider chain, with an optional
/// cache in front and an optional per-call provider selection.
#[derive(Clone)]
pub struct BatchDispatcher {
    aggregator: Arc<ProviderAggregator>,
    cache: Option<Arc<dyn Cache>>,
    active: Option<Vec<String>>,
    concurrency: usize,
    cancel: Option<CancelToken>,
}

impl BatchDispatcher {
    pub fn new(aggregator: ProviderAggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            cache: None,
            active: None,
            concurrency: DEFAULT_CONCURRENCY,
            cancel: None,
        }
    }

    /// Puts a cache in front of the provider chain. Hits skip the
    /// providers entirely and are recorded under
    /// [`CACHE_PROVIDER_NAME`]; cache failures count as misses.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Restricts batches to the named providers, in the order named.
    pub fn with_providers<S: Into<String>>(mut self, names: Vec<S>) -> Self {
        self.active = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Caps in-flight items. A cap of 1 processes the batch
    /// sequentially; zero is treated as 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Forward-geocodes every address. The output has one entry per
    /// input, in input order.
    pub async fn geocode<S: AsRef<str>>(&self, addresses: &[S]) -> Vec<BatchGeocoded> {
        let queries = addresses
            .iter()
            .map(|address| GeocodeQuery::forward(address.as_ref()))
            .collect();
        self.run(queries).await
    }

    /// Reverse-geocodes every coordinate, same contract as
    /// [`geocode`](Self::geocode).
    pub async fn reverse(&self, coordinates: &[Coordinate]) -> Vec<BatchGeocoded> {
        let queries = coordinates
            .iter()
            .cloned()
            .map(GeocodeQuery::reverse)
            .collect();
        self.run(queries).await
    }

    /// Runs a mixed batch. Entries come back in submission order; a
    /// worker that dies surfaces as an `Internal` error on its own
    /// entry.
    pub async fn run(&self, queries: Vec<GeocodeQuery>) -> Vec<BatchGeocoded> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles: Vec<(GeocodeQuery, JoinHandle<BatchGeocoded>)> =
            Vec::with_capacity(queries.len());

        for query in queries {
            let semaphore = Arc::clone(&semaphore);
            let aggregator = Arc::clone(&self.aggregator);
            let cache = self.cache.clone();
            let active = self.active.clone();
            let cancel = self.cancel.clone();
            let retained = query.clone();

            let handle = tokio::spawn(async move {
                // The semaphore is never closed, so acquisition only
                // fails if the runtime is tearing the batch down.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return BatchGeocoded::cancelled(query),
                };
                if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                    return BatchGeocoded::cancelled(query);
                }
                let fallback = query.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    resolve_one(aggregator, cache, active, query)
                })
                .await;
                match outcome {
                    Ok(entry) => entry,
                    Err(_) => BatchGeocoded::failed(
                        fallback,
                        BatchError::Internal("geocoding worker died".to_string()),
                    ),
                }
            });
            handles.push((retained, handle));
        }

        // Joining in submission order is what keeps N-in/N-out order.
        let mut entries = Vec::with_capacity(handles.len());
        for (query, handle) in handles {
            let entry = match handle.await {
                Ok(entry) => entry,
                Err(_) => BatchGeocoded::failed(
                    query,
                    BatchError::Internal("batch task died".to_string()),
                ),
            };
            entries.push(entry);
        }
        entries
    }
}

/// Resolves a single item: cache lookup, provider chain, cache
/// write-back. Runs on the blocking pool.
fn resolve_one(
    aggregator: Arc<ProviderAggregator>,
    cache: Option<Arc<dyn Cache>>,
    active: Option<Vec<String>>,
    query: GeocodeQuery,
) -> BatchGeocoded {
    let key = query.cache_key();

    if let Some(cache) = &cache {
        match cache.get(&key) {
            Ok(Some(address)) => return BatchGeocoded::from_cache(query, address),
            // A failed cache read is a miss, the item falls through to
            // the providers.
            Ok(None) | Err(_) => {}
        }
    }

    let selection;
    let chain: &ProviderAggregator = match &active {
        Some(names) => {
            selection = aggregator.using(names);
            &selection
        }
        None => aggregator.as_ref(),
    };

    match chain.resolve(&query) {
        Ok(resolution) => {
            let address = resolution
                .addresses
                .first()
                .cloned()
                .unwrap_or_else(Address::empty);
            if let Some(cache) = &cache {
                // Cache write failures do not fail the item.
                let _ = cache.set(&key, &address);
            }
            BatchGeocoded::resolved(query, resolution.provider, address)
        }
        Err(error) => BatchGeocoded::failed(query, BatchError::Geocoding(error)),
    }
}
