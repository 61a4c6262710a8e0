//! Shared data model for the geocoding subsystem.

use crate::coordinate::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Address ─────────────────────────────────────────────────────────

/// One structured geocoding result.
///
/// Every field is optional. The all-unset value is the "empty address"
/// sentinel: a provider ran and matched nothing, which is a success, not
/// a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinate>,
}

impl Address {
    /// The empty-address sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no field is set (the sentinel value).
    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.locality.is_none()
            && self.region.is_none()
            && self.postal_code.is_none()
            && self.country.is_none()
            && self.coordinates.is_none()
    }
}

// ─── AddressCollection ───────────────────────────────────────────────

/// Ordered sequence of addresses from one provider call; the first
/// element is the provider's best match. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressCollection(Vec<Address>);

impl AddressCollection {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self(addresses)
    }

    /// The provider's best match, if any.
    pub fn first(&self) -> Option<&Address> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Address> {
        self.0.iter()
    }
}

impl From<Vec<Address>> for AddressCollection {
    fn from(addresses: Vec<Address>) -> Self {
        Self(addresses)
    }
}

impl IntoIterator for AddressCollection {
    type Item = Address;
    type IntoIter = std::vec::IntoIter<Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AddressCollection {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ─── GeocodeQuery ────────────────────────────────────────────────────

/// One batch item: a forward (address string) or reverse (coordinate)
/// lookup. Opaque to the dispatcher beyond routing and cache keying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeocodeQuery {
    Forward(String),
    Reverse(Coordinate),
}

impl GeocodeQuery {
    pub fn forward(address: impl Into<String>) -> Self {
        GeocodeQuery::Forward(address.into())
    }

    pub fn reverse(coordinate: Coordinate) -> Self {
        GeocodeQuery::Reverse(coordinate)
    }

    /// Deterministic cache key, stable across process restarts: the
    /// address string verbatim, or `"lat,lng"` for reverse lookups.
    pub fn cache_key(&self) -> String {
        match self {
            GeocodeQuery::Forward(address) => address.clone(),
            GeocodeQuery::Reverse(coordinate) => {
                format!("{},{}", coordinate.latitude(), coordinate.longitude())
            }
        }
    }
}

impl fmt::Display for GeocodeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeocodeQuery::Forward(address) => write!(f, "{}", address),
            GeocodeQuery::Reverse(coordinate) => {
                write!(f, "{},{}", coordinate.latitude(), coordinate.longitude())
            }
        }
    }
}

// ─── ProviderError ───────────────────────────────────────────────────

/// Failure of a single provider call. The aggregator reacts by falling
/// through to the next provider; the same provider is never retried
/// within one call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Transport-level failure (connection, timeout, HTTP status).
    Network(String),
    /// The provider answered with something unusable.
    InvalidResponse(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Network(detail) => write!(f, "network failure: {}", detail),
            ProviderError::InvalidResponse(detail) => {
                write!(f, "invalid provider response: {}", detail)
            }
        }
    }
}

impl std::error::Error for ProviderError {}
