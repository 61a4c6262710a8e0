use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::coordinate::{Coordinate, CoordinateError};
use crate::ellipsoid::Ellipsoid;
use crate::geocoding::{Address, AggregatorError, BatchError, GeocodeQuery};
use crate::geodesic::{self, GeodesicError};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

// ─── GET /api/geocode ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct GeocodeParams {
    pub q: Option<String>,
    pub providers: Option<String>,
}

#[derive(Serialize)]
pub struct LookupResponse {
    pub query: String,
    pub provider: String,
    pub address: Address,
}

pub async fn geocode(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GeocodeParams>,
) -> Result<Json<LookupResponse>, Response> {
    let start = Instant::now();

    let q = params.q.as_deref().unwrap_or("").trim().to_string();
    if q.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing 'q' parameter").into_response());
    }

    let query = GeocodeQuery::forward(q.clone());
    let entry = dispatch_one(&state, query, params.providers.as_deref())
        .await
        .map_err(|e| e.into_response())?;

    let elapsed = start.elapsed();
    eprintln!(
        "[{}] GET /api/geocode?q={} -> {} ({:.1}ms)",
        Utc::now().format("%H:%M:%S"),
        q,
        entry.provider,
        elapsed.as_secs_f64() * 1000.0,
    );

    Ok(Json(entry))
}

// ─── GET /api/reverse ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ReverseParams {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub providers: Option<String>,
}

pub async fn reverse(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReverseParams>,
) -> Result<Json<LookupResponse>, Response> {
    let start = Instant::now();

    let (lat, lon) = match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "Provide 'lat' and 'lon' parameters",
            )
            .into_response());
        }
    };
    let coordinate = Coordinate::new(lat, lon)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()).into_response())?;

    let query = GeocodeQuery::reverse(coordinate);
    let entry = dispatch_one(&state, query, params.providers.as_deref())
        .await
        .map_err(|e| e.into_response())?;

    let elapsed = start.elapsed();
    eprintln!(
        "[{}] GET /api/reverse?lat={}&lon={} -> {} ({:.1}ms)",
        Utc::now().format("%H:%M:%S"),
        lat,
        lon,
        entry.provider,
        elapsed.as_secs_f64() * 1000.0,
    );

    Ok(Json(entry))
}

// ─── GET /api/distance ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct DistanceParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub ellipsoid: Option<String>,
    pub spherical: Option<bool>,
}

#[derive(Serialize)]
pub struct DistanceResponse {
    pub ellipsoid: String,
    pub method: String,
    pub distance_meters: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_bearing_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_bearing_deg: Option<f64>,
}

pub async fn distance(
    Query(params): Query<DistanceParams>,
) -> Result<Json<DistanceResponse>, Response> {
    let start = Instant::now();

    let ellipsoid = parse_ellipsoid(params.ellipsoid.as_deref()).map_err(|e| e.into_response())?;
    let from = parse_point(params.from.as_deref(), "from", &ellipsoid)
        .map_err(|e| e.into_response())?;
    let to = parse_point(params.to.as_deref(), "to", &ellipsoid).map_err(|e| e.into_response())?;

    let response = if params.spherical.unwrap_or(false) {
        let meters = geodesic::haversine(&from, &to)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()).into_response())?;
        DistanceResponse {
            ellipsoid: ellipsoid.name().to_string(),
            method: "haversine".to_string(),
            distance_meters: meters,
            initial_bearing_deg: None,
            final_bearing_deg: None,
        }
    } else {
        let solution = match geodesic::inverse(&from, &to) {
            Ok(solution) => solution,
            Err(error @ GeodesicError::DidNotConverge { .. }) => {
                return Err(api_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("{error}; retry with spherical=true"),
                )
                .into_response());
            }
            Err(error) => {
                return Err(api_error(StatusCode::BAD_REQUEST, error.to_string()).into_response());
            }
        };
        DistanceResponse {
            ellipsoid: ellipsoid.name().to_string(),
            method: "vincenty".to_string(),
            distance_meters: solution.distance_meters,
            initial_bearing_deg: Some(solution.initial_bearing_deg),
            final_bearing_deg: Some(solution.final_bearing_deg),
        }
    };

    let elapsed = start.elapsed();
    eprintln!(
        "[{}] GET /api/distance {} -> {:.3}m ({:.1}ms)",
        Utc::now().format("%H:%M:%S"),
        response.method,
        response.distance_meters,
        elapsed.as_secs_f64() * 1000.0,
    );

    Ok(Json(response))
}

// ─── GET /api/destination ────────────────────────────────────────

#[derive(Deserialize)]
pub struct DestinationParams {
    pub from: Option<String>,
    pub bearing: Option<f64>,
    pub distance: Option<f64>,
    pub ellipsoid: Option<String>,
}

#[derive(Serialize)]
pub struct DestinationResponse {
    pub ellipsoid: String,
    pub latitude: f64,
    pub longitude: f64,
}

pub async fn destination(
    Query(params): Query<DestinationParams>,
) -> Result<Json<DestinationResponse>, Response> {
    let start = Instant::now();

    let ellipsoid = parse_ellipsoid(params.ellipsoid.as_deref()).map_err(|e| e.into_response())?;
    let origin = parse_point(params.from.as_deref(), "from", &ellipsoid)
        .map_err(|e| e.into_response())?;

    let bearing = params.bearing.ok_or_else(|| {
        api_error(StatusCode::BAD_REQUEST, "Missing 'bearing' parameter").into_response()
    })?;
    let meters = params.distance.ok_or_else(|| {
        api_error(StatusCode::BAD_REQUEST, "Missing 'distance' parameter").into_response()
    })?;
    if !meters.is_finite() || meters < 0.0 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Distance must be a non-negative number of meters",
        )
        .into_response());
    }

    let point = geodesic::direct(&origin, bearing, meters)
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response())?;

    let elapsed = start.elapsed();
    eprintln!(
        "[{}] GET /api/destination bearing={} distance={} -> {},{} ({:.1}ms)",
        Utc::now().format("%H:%M:%S"),
        bearing,
        meters,
        point.latitude(),
        point.longitude(),
        elapsed.as_secs_f64() * 1000.0,
    );

    Ok(Json(DestinationResponse {
        ellipsoid: ellipsoid.name().to_string(),
        latitude: point.latitude(),
        longitude: point.longitude(),
    }))
}

// ─── GET /api/providers ──────────────────────────────────────────

pub async fn providers(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.aggregator.provider_names())
}

// ─── Helpers ─────────────────────────────────────────────────────

/// Runs one query through the dispatcher, optionally restricted to a
/// comma-separated provider selection, and flattens the entry into a
/// response or an HTTP error.
async fn dispatch_one(
    state: &AppState,
    query: GeocodeQuery,
    providers: Option<&str>,
) -> Result<LookupResponse, ApiError> {
    let dispatcher = match providers {
        Some(list) => {
            let names: Vec<String> = list
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
            state.dispatcher.clone().with_providers(names)
        }
        None => state.dispatcher.clone(),
    };

    let rendered = query.to_string();
    let mut entries = dispatcher.run(vec![query]).await;
    let entry = match entries.pop() {
        Some(entry) => entry,
        None => {
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "empty batch result",
            ));
        }
    };

    if let Some(error) = entry.error {
        let status = match &error {
            BatchError::Geocoding(AggregatorError::NoActiveProviders) => StatusCode::BAD_REQUEST,
            BatchError::Geocoding(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        return Err(api_error(status, error.to_string()));
    }

    Ok(LookupResponse {
        query: rendered,
        provider: entry.provider_name,
        address: entry.address.unwrap_or_else(Address::empty),
    })
}

fn parse_ellipsoid(raw: Option<&str>) -> Result<Ellipsoid, ApiError> {
    match raw {
        None => Ok(Ellipsoid::wgs84()),
        Some(name) => Ellipsoid::from_name(name).ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!(
                    "Unknown ellipsoid '{}'. Known: {}",
                    name,
                    Ellipsoid::known_names().join(", ")
                ),
            )
        }),
    }
}

/// Parses a `"lat, lng"` parameter onto the requested ellipsoid.
fn parse_point(raw: Option<&str>, name: &str, ellipsoid: &Ellipsoid) -> Result<Coordinate, ApiError> {
    let raw = raw.map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Missing '{}' parameter", name),
        ));
    }
    let parsed: Coordinate = raw.parse().map_err(|e: CoordinateError| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid '{}': {}", name, e),
        )
    })?;
    Coordinate::with_ellipsoid(parsed.latitude(), parsed.longitude(), ellipsoid.clone())
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))
}
