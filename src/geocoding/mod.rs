//! Geocoding subsystem for Meridian.
//!
//! Providers behind a common capability set, ordered fallback through
//! an aggregator, and a batch dispatcher that runs many lookups with a
//! cache in front, bounded concurrency, and per-item failure isolation.

pub mod aggregator;
pub mod batch;
pub mod cache;
pub mod providers;
pub mod types;

pub use aggregator::{AggregatorError, ProviderAggregator, ProviderFailure, Resolution};
pub use batch::{BatchDispatcher, BatchError, BatchGeocoded, CancelToken, CACHE_PROVIDER_NAME};
pub use cache::{Cache, CacheError, MemoryCache};
pub use providers::{GazetteerProvider, Provider};
pub use types::{Address, AddressCollection, GeocodeQuery, ProviderError};
