use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;

use meridian::coordinate::Coordinate;
use meridian::ellipsoid::Ellipsoid;
use meridian::geocoding::{
    Address, BatchDispatcher, BatchGeocoded, GazetteerProvider, MemoryCache, ProviderAggregator,
};
use meridian::geodesic::{self, GeodesicError};
use meridian::server::{self, AppState};

/// Meridian — batch geocoding dispatcher and ellipsoidal geodesy toolkit
///
/// Geocodes whole batches through a provider fallback chain with a
/// cache in front, and solves distance/destination problems on
/// reference ellipsoids.
///
/// Examples:
///   meridian geocode Paris "New York" Tokyo
///   meridian geocode --providers gazetteer --pretty Oslo
///   meridian reverse 48.8566,2.3522 43.2965,5.3698
///   meridian distance --from 48.8566,2.3522 --to 43.2965,5.3698
///   meridian distance --from 50.0663,-5.7148 --to 49.9591,-5.2151 --spherical
///   meridian destination --from 48.8566,2.3522 --bearing 45 --distance 100000
///   meridian serve --port 8080
#[derive(Parser)]
#[command(name = "meridian", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Indent the JSON output.
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Forward-geocode one or more addresses as a single batch.
    Geocode {
        /// Addresses to look up, one batch item each.
        #[arg(required = true)]
        addresses: Vec<String>,

        /// Comma-separated provider selection, in fallback order.
        #[arg(long)]
        providers: Option<String>,

        /// Max in-flight lookups.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Skip the in-memory result cache.
        #[arg(long)]
        no_cache: bool,
    },

    /// Reverse-geocode one or more "lat,lng" points as a single batch.
    Reverse {
        /// Coordinates to look up, one batch item each.
        #[arg(required = true, allow_hyphen_values = true)]
        coordinates: Vec<String>,

        /// Comma-separated provider selection, in fallback order.
        #[arg(long)]
        providers: Option<String>,

        /// Max in-flight lookups.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Skip the in-memory result cache.
        #[arg(long)]
        no_cache: bool,
    },

    /// Distance and bearings between two points (ellipsoidal inverse solution).
    Distance {
        /// Start point as "lat,lng".
        #[arg(long, allow_hyphen_values = true)]
        from: String,

        /// End point as "lat,lng".
        #[arg(long, allow_hyphen_values = true)]
        to: String,

        /// Reference ellipsoid (e.g. WGS84, GRS80, Airy).
        #[arg(long, default_value = "WGS84", value_parser = parse_ellipsoid)]
        ellipsoid: Ellipsoid,

        /// Great-circle distance on a sphere of the ellipsoid's
        /// equatorial radius, instead of the ellipsoidal solution.
        #[arg(long)]
        spherical: bool,
    },

    /// Destination point from start, bearing, and distance (ellipsoidal direct solution).
    Destination {
        /// Start point as "lat,lng".
        #[arg(long, allow_hyphen_values = true)]
        from: String,

        /// Initial bearing in degrees clockwise from north.
        #[arg(long, allow_hyphen_values = true)]
        bearing: f64,

        /// Distance to travel, in meters.
        #[arg(long)]
        distance: f64,

        /// Reference ellipsoid (e.g. WGS84, GRS80, Airy).
        #[arg(long, default_value = "WGS84", value_parser = parse_ellipsoid)]
        ellipsoid: Ellipsoid,
    },

    /// Run the HTTP API.
    Serve {
        /// Bind address.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Bind port.
        #[arg(long, short = 'p', default_value_t = 8080)]
        port: u16,
    },
}

fn parse_ellipsoid(s: &str) -> Result<Ellipsoid, String> {
    Ellipsoid::from_name(s).ok_or_else(|| {
        format!(
            "Unknown ellipsoid '{}'. Known: {}",
            s,
            Ellipsoid::known_names().join(", ")
        )
    })
}

// ─── Output shapes ──────────────────────────────────────────────

#[derive(Serialize)]
struct BatchReport {
    query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<Address>,
    #[serde(skip_serializing_if = "String::is_empty")]
    provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<BatchGeocoded> for BatchReport {
    fn from(entry: BatchGeocoded) -> Self {
        Self {
            query: entry.query.to_string(),
            address: entry.address,
            provider: entry.provider_name,
            error: entry.error.map(|e| e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct DistanceReport {
    ellipsoid: String,
    method: &'static str,
    distance_meters: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    initial_bearing_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_bearing_deg: Option<f64>,
}

#[derive(Serialize)]
struct DestinationReport {
    ellipsoid: String,
    latitude: f64,
    longitude: f64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Geocode {
            addresses,
            providers,
            concurrency,
            no_cache,
        } => {
            let (dispatcher, active) =
                build_dispatcher(providers.as_deref(), concurrency, no_cache);
            eprintln!(
                "  Geocoding {} addresses via {}",
                addresses.len(),
                active.join(", ")
            );
            let entries = dispatcher.geocode(&addresses).await;
            let reports: Vec<BatchReport> = entries.into_iter().map(BatchReport::from).collect();
            emit(&reports, cli.pretty);
        }

        Command::Reverse {
            coordinates,
            providers,
            concurrency,
            no_cache,
        } => {
            let points: Vec<Coordinate> = coordinates
                .iter()
                .map(|raw| {
                    raw.parse().unwrap_or_else(|e| {
                        eprintln!("Error: Invalid coordinate '{}': {}", raw, e);
                        std::process::exit(1);
                    })
                })
                .collect();
            let (dispatcher, active) =
                build_dispatcher(providers.as_deref(), concurrency, no_cache);
            eprintln!(
                "  Reverse-geocoding {} points via {}",
                points.len(),
                active.join(", ")
            );
            let entries = dispatcher.reverse(&points).await;
            let reports: Vec<BatchReport> = entries.into_iter().map(BatchReport::from).collect();
            emit(&reports, cli.pretty);
        }

        Command::Distance {
            from,
            to,
            ellipsoid,
            spherical,
        } => {
            let from = parse_point(&from, &ellipsoid);
            let to = parse_point(&to, &ellipsoid);
            let report = if spherical {
                let meters = geodesic::haversine(&from, &to).unwrap_or_else(|e| {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                });
                DistanceReport {
                    ellipsoid: ellipsoid.name().to_string(),
                    method: "haversine",
                    distance_meters: meters,
                    initial_bearing_deg: None,
                    final_bearing_deg: None,
                }
            } else {
                let solution = match geodesic::inverse(&from, &to) {
                    Ok(solution) => solution,
                    Err(error @ GeodesicError::DidNotConverge { .. }) => {
                        eprintln!("Error: {}. Retry with --spherical.", error);
                        std::process::exit(1);
                    }
                    Err(error) => {
                        eprintln!("Error: {}", error);
                        std::process::exit(1);
                    }
                };
                DistanceReport {
                    ellipsoid: ellipsoid.name().to_string(),
                    method: "vincenty",
                    distance_meters: solution.distance_meters,
                    initial_bearing_deg: Some(solution.initial_bearing_deg),
                    final_bearing_deg: Some(solution.final_bearing_deg),
                }
            };
            emit(&report, cli.pretty);
        }

        Command::Destination {
            from,
            bearing,
            distance,
            ellipsoid,
        } => {
            let origin = parse_point(&from, &ellipsoid);
            if !distance.is_finite() || distance < 0.0 {
                eprintln!("Error: Distance must be a non-negative number of meters");
                std::process::exit(1);
            }
            let point = geodesic::direct(&origin, bearing, distance).unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            });
            emit(
                &DestinationReport {
                    ellipsoid: ellipsoid.name().to_string(),
                    latitude: point.latitude(),
                    longitude: point.longitude(),
                },
                cli.pretty,
            );
        }

        Command::Serve { host, port } => {
            let aggregator = default_aggregator();
            let dispatcher = BatchDispatcher::new(aggregator.clone())
                .with_cache(Arc::new(MemoryCache::new()));
            let state = Arc::new(AppState::new(aggregator, dispatcher));
            server::start(&host, port, state).await;
        }
    }
}

// ─── Wiring ─────────────────────────────────────────────────────

fn default_aggregator() -> ProviderAggregator {
    ProviderAggregator::new().with_provider(Arc::new(GazetteerProvider::new()))
}

/// Builds the batch dispatcher for a CLI run and returns it together
/// with the provider names it will actually consult.
fn build_dispatcher(
    providers: Option<&str>,
    concurrency: usize,
    no_cache: bool,
) -> (BatchDispatcher, Vec<String>) {
    let aggregator = default_aggregator();
    let known = aggregator.provider_names();

    let mut dispatcher = BatchDispatcher::new(aggregator).with_concurrency(concurrency);
    if !no_cache {
        dispatcher = dispatcher.with_cache(Arc::new(MemoryCache::new()));
    }

    let active = match providers {
        Some(list) => {
            let names: Vec<String> = list
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
            let recognised: Vec<String> = names
                .iter()
                .filter(|name| known.contains(name))
                .cloned()
                .collect();
            if recognised.is_empty() {
                eprintln!(
                    "Error: None of the requested providers are registered. Known: {}",
                    known.join(", ")
                );
                std::process::exit(1);
            }
            dispatcher = dispatcher.with_providers(names);
            recognised
        }
        None => known,
    };

    (dispatcher, active)
}

fn parse_point(raw: &str, ellipsoid: &Ellipsoid) -> Coordinate {
    let parsed: Coordinate = raw.parse().unwrap_or_else(|e| {
        eprintln!("Error: Invalid coordinate '{}': {}", raw, e);
        std::process::exit(1);
    });
    Coordinate::with_ellipsoid(parsed.latitude(), parsed.longitude(), ellipsoid.clone())
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        })
}

fn emit<T: Serialize>(value: &T, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match rendered {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: Cannot serialize output: {}", e);
            std::process::exit(1);
        }
    }
}
