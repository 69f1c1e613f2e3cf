/// Application routes configuration
use crate::config::AppConfig;
use crate::handlers::{get_weather, health, request_context, search_cities, AppState, CORRELATION_HEADER};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

/// Build the application router with all routes
pub fn build_router(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Public API
        .route("/api/cities/search", get(search_cities))
        .route("/api/weather", get(get_weather))
        .with_state(state)
        .layer(middleware::from_fn(request_context))
        .layer(cors_layer(&config.cors_allowed_origin))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origin: &str) -> CorsLayer {
    let correlation = HeaderName::from_static(CORRELATION_HEADER);
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, correlation.clone()])
        .expose_headers([correlation]);

    match HeaderValue::from_str(origin) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!(%origin, "Ignoring invalid CORS origin, cross-origin requests will be refused");
            cors
        }
    }
}
