/// HTTP request handlers
use crate::domain::{
    CitySearchQuery, CitySearchResponse, Health, WeatherQuery, WeatherResult, DEFAULT_FORECAST_DAYS,
    DEFAULT_LANGUAGE, DEFAULT_MAX_RESULTS,
};
use crate::errors::{ApiError, ApiResult};
use crate::services::WeatherService;
use axum::{
    extract::{Query, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info_span, Instrument};
use uuid::Uuid;
use validator::Validate;

pub const CORRELATION_HEADER: &str = "x-correlation-id";
const MAX_CORRELATION_ID_LEN: usize = 128;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub weather_service: Arc<WeatherService>,
}

/// Per-request identifiers, stored in request extensions by [`request_context`]
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: String,
    pub trace_id: String,
    pub path: String,
}

/// Assign correlation and trace ids, run the request in their span and
/// echo the correlation id on the response
pub async fn request_context(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| is_acceptable_correlation_id(v))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let ctx = RequestContext {
        correlation_id: correlation_id.clone(),
        trace_id: Uuid::new_v4().simple().to_string(),
        path: request.uri().path().to_string(),
    };
    let span = info_span!(
        "request",
        correlation_id = %ctx.correlation_id,
        trace_id = %ctx.trace_id
    );
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(CORRELATION_HEADER), value);
    }
    response
}

fn is_acceptable_correlation_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_CORRELATION_ID_LEN
        && value.bytes().all(|b| b.is_ascii_graphic())
}

/// Health check handler
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        now: Utc::now(),
    })
}

/// Search cities by name
pub async fn search_cities(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<CitySearchResponse>> {
    let query = CitySearchQuery {
        text: params.get("q").map(|q| q.trim().to_string()).unwrap_or_default(),
        max_results: parse_param(&params, "count").unwrap_or(DEFAULT_MAX_RESULTS),
        language_code: params
            .get("language")
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
    };
    validate(&query, SEARCH_FIELDS).map_err(|e| e.in_context(&ctx))?;

    let cities = state
        .weather_service
        .search_cities(&query)
        .await
        .map_err(|e| ApiError::from(e).in_context(&ctx))?;

    if cities.is_empty() {
        return Err(ApiError::CityNotFound(query.text).in_context(&ctx));
    }
    Ok(Json(CitySearchResponse { cities }))
}

/// Weather for a coordinate pair
pub async fn get_weather(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<WeatherResult>> {
    let query = WeatherQuery {
        latitude: parse_param(&params, "lat").unwrap_or(f64::NAN),
        longitude: parse_param(&params, "lon").unwrap_or(f64::NAN),
        forecast_days: parse_param(&params, "days").unwrap_or(DEFAULT_FORECAST_DAYS),
        city_name_hint: text_param(&params, "cityName"),
        country_name_hint: text_param(&params, "countryName"),
    };
    validate(&query, WEATHER_FIELDS).map_err(|e| e.in_context(&ctx))?;

    let weather = state
        .weather_service
        .get_weather(&query)
        .await
        .map_err(|e| ApiError::from(e).in_context(&ctx))?;
    Ok(Json(weather))
}

/// Struct field to query parameter names, for validation messages
const SEARCH_FIELDS: &[(&str, &str)] = &[
    ("text", "q"),
    ("max_results", "count"),
    ("language_code", "language"),
];

const WEATHER_FIELDS: &[(&str, &str)] = &[
    ("latitude", "lat"),
    ("longitude", "lon"),
    ("forecast_days", "days"),
    ("city_name_hint", "cityName"),
    ("country_name_hint", "countryName"),
];

fn validate<T: Validate>(query: &T, names: &[(&str, &str)]) -> Result<(), ApiError> {
    let fields = match query.validate().map_err(ApiError::from) {
        Ok(()) => return Ok(()),
        Err(ApiError::Validation(fields)) => fields,
        Err(other) => return Err(other),
    };
    let renamed: BTreeMap<String, Vec<String>> = fields
        .into_iter()
        .map(|(field, messages)| {
            let name = names
                .iter()
                .find(|(f, _)| *f == field)
                .map(|(_, p)| p.to_string())
                .unwrap_or(field);
            (name, messages)
        })
        .collect();
    Err(ApiError::Validation(renamed))
}

/// Parse a numeric parameter; absent or malformed values yield `None`
fn parse_param<T: std::str::FromStr>(params: &HashMap<String, String>, key: &str) -> Option<T> {
    params.get(key).and_then(|v| v.trim().parse().ok())
}

fn text_param(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
