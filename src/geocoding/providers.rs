//! The provider contract and the bundled offline gazetteer.
//!
//! A provider is one geocoding backend behind the common capability set
//! `{geocode, reverse, name}`. External service adapters live outside
//! the core; the crate ships a single offline implementation backed by a
//! built-in city table so the CLI, the server, and the tests have a
//! working provider without any network.

use super::types::{Address, AddressCollection, ProviderError};
use crate::coordinate::Coordinate;
use crate::geodesic;

/// A single geocoding backend. Shared across concurrently processed
/// batch items, hence `Send + Sync`.
pub trait Provider: Send + Sync {
    /// Short stable identifier, recorded on batch outcomes.
    fn name(&self) -> &str;

    /// Forward lookup. An empty collection is a valid "found nothing"
    /// success, not a failure.
    fn geocode(&self, address: &str) -> Result<AddressCollection, ProviderError>;

    /// Reverse lookup, same success/failure contract as `geocode`.
    fn reverse(&self, coordinate: &Coordinate) -> Result<AddressCollection, ProviderError>;
}

// ─── Built-in gazetteer ──────────────────────────────────────────────

struct GazetteerCity {
    name: &'static str,
    aliases: &'static [&'static str],
    lat: f64,
    lng: f64,
    region: &'static str,
    country: &'static str,
}

static GAZETTEER: &[GazetteerCity] = &[
    GazetteerCity { name: "London", aliases: &[], lat: 51.5074, lng: -0.1278, region: "England", country: "United Kingdom" },
    GazetteerCity { name: "Paris", aliases: &[], lat: 48.8566, lng: 2.3522, region: "Île-de-France", country: "France" },
    GazetteerCity { name: "Marseille", aliases: &["marseilles"], lat: 43.2965, lng: 5.3698, region: "Provence-Alpes-Côte d'Azur", country: "France" },
    GazetteerCity { name: "Berlin", aliases: &[], lat: 52.5200, lng: 13.4050, region: "Berlin", country: "Germany" },
    GazetteerCity { name: "Madrid", aliases: &[], lat: 40.4168, lng: -3.7038, region: "Community of Madrid", country: "Spain" },
    GazetteerCity { name: "Rome", aliases: &["roma"], lat: 41.9028, lng: 12.4964, region: "Lazio", country: "Italy" },
    GazetteerCity { name: "Stockholm", aliases: &[], lat: 59.3293, lng: 18.0686, region: "Stockholm County", country: "Sweden" },
    GazetteerCity { name: "Oslo", aliases: &[], lat: 59.9139, lng: 10.7522, region: "Oslo", country: "Norway" },
    GazetteerCity { name: "Copenhagen", aliases: &["københavn"], lat: 55.6761, lng: 12.5683, region: "Capital Region", country: "Denmark" },
    GazetteerCity { name: "Amsterdam", aliases: &[], lat: 52.3676, lng: 4.9041, region: "North Holland", country: "Netherlands" },
    GazetteerCity { name: "Lisbon", aliases: &["lisboa"], lat: 38.7223, lng: -9.1393, region: "Lisbon District", country: "Portugal" },
    GazetteerCity { name: "Dublin", aliases: &[], lat: 53.3498, lng: -6.2603, region: "Leinster", country: "Ireland" },
    GazetteerCity { name: "Istanbul", aliases: &[], lat: 41.0082, lng: 28.9784, region: "Istanbul", country: "Turkey" },
    GazetteerCity { name: "New York", aliases: &["nyc", "new york city"], lat: 40.7128, lng: -74.0060, region: "New York", country: "United States" },
    GazetteerCity { name: "San Francisco", aliases: &["sf"], lat: 37.7749, lng: -122.4194, region: "California", country: "United States" },
    GazetteerCity { name: "Chicago", aliases: &[], lat: 41.8781, lng: -87.6298, region: "Illinois", country: "United States" },
    GazetteerCity { name: "Toronto", aliases: &[], lat: 43.6532, lng: -79.3832, region: "Ontario", country: "Canada" },
    GazetteerCity { name: "Mexico City", aliases: &["cdmx", "ciudad de méxico"], lat: 19.4326, lng: -99.1332, region: "Mexico City", country: "Mexico" },
    GazetteerCity { name: "São Paulo", aliases: &["sao paulo"], lat: -23.5505, lng: -46.6333, region: "São Paulo", country: "Brazil" },
    GazetteerCity { name: "Buenos Aires", aliases: &[], lat: -34.6037, lng: -58.3816, region: "Buenos Aires", country: "Argentina" },
    GazetteerCity { name: "Cairo", aliases: &[], lat: 30.0444, lng: 31.2357, region: "Cairo Governorate", country: "Egypt" },
    GazetteerCity { name: "Nairobi", aliases: &[], lat: -1.2921, lng: 36.8219, region: "Nairobi County", country: "Kenya" },
    GazetteerCity { name: "Mumbai", aliases: &["bombay"], lat: 19.0760, lng: 72.8777, region: "Maharashtra", country: "India" },
    GazetteerCity { name: "Singapore", aliases: &[], lat: 1.3521, lng: 103.8198, region: "Singapore", country: "Singapore" },
    GazetteerCity { name: "Tokyo", aliases: &[], lat: 35.6762, lng: 139.6503, region: "Tokyo", country: "Japan" },
    GazetteerCity { name: "Sydney", aliases: &[], lat: -33.8688, lng: 151.2093, region: "New South Wales", country: "Australia" },
];

/// Reverse lookups match the nearest tabulated city within this radius.
const REVERSE_MATCH_RADIUS_M: f64 = 300_000.0;

/// Offline provider over the built-in city table. Forward lookups match
/// by exact name/alias first, then by substring, case-insensitively;
/// reverse lookups return the nearest city within
/// [`REVERSE_MATCH_RADIUS_M`].
pub struct GazetteerProvider;

impl GazetteerProvider {
    pub fn new() -> Self {
        Self
    }

    fn address_for(city: &GazetteerCity, coordinates: Option<Coordinate>) -> Address {
        Address {
            street: None,
            locality: Some(city.name.to_string()),
            region: Some(city.region.to_string()),
            postal_code: None,
            country: Some(city.country.to_string()),
            coordinates,
        }
    }
}

impl Default for GazetteerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for GazetteerProvider {
    fn name(&self) -> &str {
        "gazetteer"
    }

    fn geocode(&self, address: &str) -> Result<AddressCollection, ProviderError> {
        let needle = address.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(AddressCollection::default());
        }

        // Exact name or alias match wins outright.
        for city in GAZETTEER {
            let exact = city.name.to_lowercase() == needle
                || city.aliases.iter().any(|a| *a == needle);
            if exact {
                let coordinates = Coordinate::new(city.lat, city.lng).ok();
                return Ok(AddressCollection::new(vec![Self::address_for(
                    city,
                    coordinates,
                )]));
            }
        }

        // Substring matches, best-first in table order.
        let mut matches = Vec::new();
        for city in GAZETTEER {
            if city.name.to_lowercase().contains(&needle) {
                let coordinates = Coordinate::new(city.lat, city.lng).ok();
                matches.push(Self::address_for(city, coordinates));
            }
        }
        Ok(AddressCollection::new(matches))
    }

    fn reverse(&self, coordinate: &Coordinate) -> Result<AddressCollection, ProviderError> {
        let mut best: Option<(f64, &GazetteerCity, Coordinate)> = None;
        for city in GAZETTEER {
            // Rebuild the city point on the query's ellipsoid so the
            // spherical distance never sees a mismatch.
            let here = match Coordinate::with_ellipsoid(
                city.lat,
                city.lng,
                coordinate.ellipsoid().clone(),
            ) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let distance = match geodesic::haversine(coordinate, &here) {
                Ok(d) => d,
                Err(_) => continue,
            };
            let closer = match &best {
                Some((best_distance, _, _)) => distance < *best_distance,
                None => true,
            };
            if closer {
                best = Some((distance, city, here));
            }
        }

        match best {
            Some((distance, city, here)) if distance <= REVERSE_MATCH_RADIUS_M => Ok(
                AddressCollection::new(vec![Self::address_for(city, Some(here))]),
            ),
            _ => Ok(AddressCollection::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_name_match() {
        let provider = GazetteerProvider::new();
        let results = provider.geocode("Paris").unwrap();
        assert_eq!(results.len(), 1);
        let address = results.first().unwrap();
        assert_eq!(address.locality.as_deref(), Some("Paris"));
        assert_eq!(address.country.as_deref(), Some("France"));
        let c = address.coordinates.as_ref().unwrap();
        assert!((c.latitude() - 48.8566).abs() < 1e-9);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let provider = GazetteerProvider::new();
        assert_eq!(provider.geocode("PARIS").unwrap().len(), 1);
        assert_eq!(provider.geocode("  tokyo  ").unwrap().len(), 1);
    }

    #[test]
    fn test_alias_match() {
        let provider = GazetteerProvider::new();
        let results = provider.geocode("nyc").unwrap();
        assert_eq!(
            results.first().unwrap().locality.as_deref(),
            Some("New York")
        );

        let bombay = provider.geocode("Bombay").unwrap();
        assert_eq!(bombay.first().unwrap().locality.as_deref(), Some("Mumbai"));
    }

    #[test]
    fn test_substring_matches_in_table_order() {
        let provider = GazetteerProvider::new();
        let results = provider.geocode("stockh").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results.first().unwrap().locality.as_deref(),
            Some("Stockholm")
        );

        // "st" hits Stockholm, Amsterdam, and Istanbul; best-first is
        // table order.
        let broad = provider.geocode("st").unwrap();
        assert!(broad.len() >= 2);
        assert_eq!(
            broad.first().unwrap().locality.as_deref(),
            Some("Stockholm")
        );
    }

    #[test]
    fn test_unknown_place_is_an_empty_success() {
        let provider = GazetteerProvider::new();
        let results = provider.geocode("Atlantis-on-Sea").unwrap();
        assert!(results.is_empty());

        let blank = provider.geocode("   ").unwrap();
        assert!(blank.is_empty());
    }

    #[test]
    fn test_reverse_finds_the_nearest_city() {
        let provider = GazetteerProvider::new();
        // A point in central Paris, slightly off the tabulated one.
        let c = Coordinate::new(48.85, 2.35).unwrap();
        let results = provider.reverse(&c).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.first().unwrap().locality.as_deref(), Some("Paris"));
    }

    #[test]
    fn test_reverse_in_open_ocean_is_empty() {
        let provider = GazetteerProvider::new();
        let c = Coordinate::new(0.0, -140.0).unwrap();
        assert!(provider.reverse(&c).unwrap().is_empty());
    }

    #[test]
    fn test_reverse_keeps_the_query_ellipsoid() {
        use crate::ellipsoid::Ellipsoid;
        let provider = GazetteerProvider::new();
        let c = Coordinate::with_ellipsoid(48.85, 2.35, Ellipsoid::grs80()).unwrap();
        let results = provider.reverse(&c).unwrap();
        let address = results.first().unwrap();
        assert_eq!(
            address.coordinates.as_ref().unwrap().ellipsoid().name(),
            "GRS80"
        );
    }

    #[test]
    fn test_provider_name_is_stable() {
        assert_eq!(GazetteerProvider::new().name(), "gazetteer");
    }
}
