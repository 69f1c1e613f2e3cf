/// Weather gateway: city search and weather lookup over Open-Meteo, with
/// per-channel retries, timeouts and circuit breaking, and RFC 7807 errors.
use std::sync::Arc;

use axum::Router;

use crate::clients::OpenMeteoClient;
use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::routes::build_router;
use crate::services::WeatherService;

pub mod clients;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod mapping;
pub mod resilience;
pub mod routes;
pub mod services;
pub mod utils;

/// Wire clients, services and routes from configuration
pub fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let client = OpenMeteoClient::new(config.geocoding.clone(), config.forecast.clone())?;
    let weather_service = Arc::new(WeatherService::new(client, config.reverse_geocode_timeout));

    let state = AppState { weather_service };
    Ok(build_router(state, config))
}
