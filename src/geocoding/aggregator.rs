//! Ordered provider fallback.
//!
//! The aggregator holds providers in registration order and answers a
//! query by walking that order until one provider returns a result.
//! An empty collection counts as an answer, it means the provider was
//! reachable and found nothing. Only a provider error moves the query
//! on to the next provider; when every provider errors, the aggregate
//! failure carries each provider's reason.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::providers::Provider;
use super::types::{AddressCollection, GeocodeQuery, ProviderError};
use crate::coordinate::Coordinate;

// ─── Results ─────────────────────────────────────────────────────────

/// A successful resolution and the provider that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub provider: String,
    pub addresses: AddressCollection,
}

/// One provider's failure inside an exhausted fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AggregatorError {
    /// The active selection is empty, nothing could be queried.
    NoActiveProviders,
    /// Every active provider errored, in fallback order.
    AllProvidersFailed { failures: Vec<ProviderFailure> },
}

impl fmt::Display for AggregatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregatorError::NoActiveProviders => {
                write!(f, "no active providers to query")
            }
            AggregatorError::AllProvidersFailed { failures } => {
                write!(f, "all {} providers failed", failures.len())?;
                for failure in failures {
                    write!(f, "; {}: {}", failure.provider, failure.reason)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AggregatorError {}

// ─── Aggregator ──────────────────────────────────────────────────────

/// Providers in fallback order. Cloning is cheap, the providers are
/// shared behind `Arc`.
#[derive(Clone)]
pub struct ProviderAggregator {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderAggregator {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Appends a provider; registration order is fallback order.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// The registered providers, in fallback order.
    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// A restricted view: the named providers, in the order named.
    /// Unknown names are skipped. The receiver is left untouched, the
    /// view only shares the provider handles.
    pub fn using<S: AsRef<str>>(&self, names: &[S]) -> ProviderAggregator {
        let mut selected = Vec::new();
        for name in names {
            let found = self
                .providers
                .iter()
                .find(|p| p.name() == name.as_ref());
            if let Some(provider) = found {
                selected.push(Arc::clone(provider));
            }
        }
        ProviderAggregator {
            providers: selected,
        }
    }

    pub fn geocode(&self, address: &str) -> Result<Resolution, AggregatorError> {
        self.try_each(|p| p.geocode(address))
    }

    pub fn reverse(&self, coordinate: &Coordinate) -> Result<Resolution, AggregatorError> {
        self.try_each(|p| p.reverse(coordinate))
    }

    /// Routes a query to the matching lookup direction.
    pub fn resolve(&self, query: &GeocodeQuery) -> Result<Resolution, AggregatorError> {
        match query {
            GeocodeQuery::Forward(address) => self.geocode(address),
            GeocodeQuery::Reverse(coordinate) => self.reverse(coordinate),
        }
    }

    fn try_each<F>(&self, run: F) -> Result<Resolution, AggregatorError>
    where
        F: Fn(&dyn Provider) -> Result<AddressCollection, ProviderError>,
    {
        if self.providers.is_empty() {
            return Err(AggregatorError::NoActiveProviders);
        }
        let mut failures = Vec::new();
        for provider in &self.providers {
            match run(provider.as_ref()) {
                Ok(addresses) => {
                    return Ok(Resolution {
                        provider: provider.name().to_string(),
                        addresses,
                    });
                }
                Err(error) => {
                    failures.push(ProviderFailure {
                        provider: provider.name().to_string(),
                        reason: error.to_string(),
                    });
                }
            }
        }
        Err(AggregatorError::AllProvidersFailed { failures })
    }
}

impl Default for ProviderAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoding::types::Address;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Canned {
        Hit(&'static str),
        Empty,
        Fail(&'static str),
    }

    struct CannedProvider {
        name: &'static str,
        outcome: Canned,
        geocode_calls: AtomicUsize,
        reverse_calls: AtomicUsize,
    }

    impl CannedProvider {
        fn answer(&self) -> Result<AddressCollection, ProviderError> {
            match &self.outcome {
                Canned::Hit(locality) => Ok(AddressCollection::new(vec![Address {
                    locality: Some(locality.to_string()),
                    ..Address::empty()
                }])),
                Canned::Empty => Ok(AddressCollection::default()),
                Canned::Fail(reason) => {
                    Err(ProviderError::Network(reason.to_string()))
                }
            }
        }
    }

    impl Provider for CannedProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn geocode(&self, _address: &str) -> Result<AddressCollection, ProviderError> {
            self.geocode_calls.fetch_add(1, Ordering::SeqCst);
            self.answer()
        }

        fn reverse(
            &self,
            _coordinate: &Coordinate,
        ) -> Result<AddressCollection, ProviderError> {
            self.reverse_calls.fetch_add(1, Ordering::SeqCst);
            self.answer()
        }
    }

    fn canned(name: &'static str, outcome: Canned) -> Arc<CannedProvider> {
        Arc::new(CannedProvider {
            name,
            outcome,
            geocode_calls: AtomicUsize::new(0),
            reverse_calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_first_success_wins() {
        let failing = canned("p1", Canned::Fail("connection refused"));
        let working = canned("p2", Canned::Hit("Paris"));
        let aggregator = ProviderAggregator::new()
            .with_provider(failing.clone())
            .with_provider(working.clone());

        let resolution = aggregator.geocode("paris").unwrap();
        assert_eq!(resolution.provider, "p2");
        assert_eq!(
            resolution.addresses.first().unwrap().locality.as_deref(),
            Some("Paris")
        );
    }

    #[test]
    fn test_later_providers_are_not_queried_after_a_success() {
        let first = canned("p1", Canned::Hit("Paris"));
        let second = canned("p2", Canned::Hit("Paris"));
        let aggregator = ProviderAggregator::new()
            .with_provider(first.clone())
            .with_provider(second.clone());

        let resolution = aggregator.geocode("paris").unwrap();
        assert_eq!(resolution.provider, "p1");
        assert_eq!(second.geocode_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_collection_counts_as_an_answer() {
        let empty = canned("p1", Canned::Empty);
        let fallback = canned("p2", Canned::Hit("Paris"));
        let aggregator = ProviderAggregator::new()
            .with_provider(empty)
            .with_provider(fallback.clone());

        let resolution = aggregator.geocode("nowhere").unwrap();
        assert_eq!(resolution.provider, "p1");
        assert!(resolution.addresses.is_empty());
        assert_eq!(fallback.geocode_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_exhausted_chain_reports_every_failure_in_order() {
        let aggregator = ProviderAggregator::new()
            .with_provider(canned("p1", Canned::Fail("connection refused")))
            .with_provider(canned("p2", Canned::Fail("bad payload")));

        let error = aggregator.geocode("paris").unwrap_err();
        match &error {
            AggregatorError::AllProvidersFailed { failures } => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].provider, "p1");
                assert_eq!(failures[1].provider, "p2");
                assert!(failures[0].reason.contains("connection refused"));
            }
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
        let rendered = error.to_string();
        assert!(rendered.contains("all 2 providers failed"));
        assert!(rendered.contains("p2: "));
    }

    #[test]
    fn test_empty_aggregator_has_no_active_providers() {
        let aggregator = ProviderAggregator::new();
        assert_eq!(
            aggregator.geocode("paris").unwrap_err(),
            AggregatorError::NoActiveProviders
        );
    }

    #[test]
    fn test_providers_exposes_the_registry_in_order() {
        let aggregator = ProviderAggregator::new()
            .with_provider(canned("a", Canned::Empty))
            .with_provider(canned("b", Canned::Empty));

        let registered = aggregator.providers();
        assert_eq!(registered.len(), 2);
        assert_eq!(registered[0].name(), "a");
        assert_eq!(registered[1].name(), "b");
    }

    #[test]
    fn test_using_restricts_and_reorders() {
        let aggregator = ProviderAggregator::new()
            .with_provider(canned("a", Canned::Fail("down")))
            .with_provider(canned("b", Canned::Hit("B-ville")))
            .with_provider(canned("c", Canned::Hit("C-ville")));

        let view = aggregator.using(&["c", "a"]);
        assert_eq!(view.provider_names(), vec!["c", "a"]);
        let resolution = view.geocode("anything").unwrap();
        assert_eq!(resolution.provider, "c");

        // The original keeps its full registration order.
        assert_eq!(aggregator.provider_names(), vec!["a", "b", "c"]);
        assert_eq!(aggregator.geocode("anything").unwrap().provider, "b");
    }

    #[test]
    fn test_using_skips_unknown_names() {
        let aggregator =
            ProviderAggregator::new().with_provider(canned("b", Canned::Hit("B-ville")));

        let view = aggregator.using(&["ghost", "b"]);
        assert_eq!(view.provider_names(), vec!["b"]);

        let none = aggregator.using(&["ghost"]);
        assert_eq!(
            none.geocode("anything").unwrap_err(),
            AggregatorError::NoActiveProviders
        );
    }

    #[test]
    fn test_resolve_routes_reverse_queries_to_reverse() {
        let provider = canned("p1", Canned::Hit("Paris"));
        let aggregator = ProviderAggregator::new().with_provider(provider.clone());

        let query = GeocodeQuery::reverse(Coordinate::new(48.85, 2.35).unwrap());
        aggregator.resolve(&query).unwrap();
        assert_eq!(provider.reverse_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.geocode_calls.load(Ordering::SeqCst), 0);
    }
}
