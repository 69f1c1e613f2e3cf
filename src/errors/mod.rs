/// Unified error handling module
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::handlers::RequestContext;

/// Failure of one outbound call, after the resilience policy has run
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct UpstreamError {
    pub message: String,
    pub status_code: Option<u16>,
    /// Raw upstream body, kept for diagnostics only
    pub response_body: Option<String>,
    pub attempts: u32,
    /// Transient failures are eligible for retry
    pub retryable: bool,
}

impl UpstreamError {
    pub fn new<S: Into<String>>(message: S, retryable: bool) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            response_body: None,
            attempts: 0,
            retryable,
        }
    }

    /// Error for a non-success HTTP status, with the message from the status table
    pub fn from_status(status: u16, body: String) -> Self {
        Self {
            message: status_message(status).to_string(),
            status_code: Some(status),
            response_body: Some(body),
            attempts: 0,
            retryable: is_transient_status(status),
        }
    }

    pub fn timed_out() -> Self {
        Self::new("Request to external service timed out", true)
    }

    pub fn circuit_open(channel: &str) -> Self {
        Self::new(
            format!("External service '{channel}' is temporarily unavailable (circuit open)"),
            false,
        )
    }

    pub fn invalid_response<E: std::fmt::Display>(err: E) -> Self {
        Self::new(
            format!("Invalid response format from external service: {err}"),
            false,
        )
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Whether the upstream body says the query matched nothing
    pub fn body_reports_no_results(&self) -> bool {
        self.response_body
            .as_deref()
            .map(|body| body.to_lowercase().contains("no results"))
            .unwrap_or(false)
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::timed_out();
        }
        // Anything that failed before a response arrived is transport-level
        Self::new(format!("Failed to reach external service: {err}"), true)
    }
}

/// Statuses worth retrying: 408, 429 and every 5xx
pub fn is_transient_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

pub fn status_message(status: u16) -> &'static str {
    match status {
        400 => "Invalid request parameters",
        404 => "Resource not found",
        422 => "Invalid coordinates or parameters",
        429 => "Rate limit exceeded",
        500 => "External service error",
        502 => "External service unavailable (bad gateway)",
        503 => "External service temporarily unavailable",
        504 => "External service timed out (gateway timeout)",
        _ => "Unknown error from external service",
    }
}

/// Errors raised by the outbound API client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Errors raised by the orchestration service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("External service request failed: {0}")]
    UpstreamTerminal(#[source] UpstreamError),

    #[error("External service still failing after retries: {0}")]
    UpstreamTransientExhausted(#[source] UpstreamError),

    #[error("External service reported no matching results")]
    NotFoundAsEmpty(#[source] UpstreamError),

    #[error("Unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl From<UpstreamError> for ServiceError {
    fn from(err: UpstreamError) -> Self {
        if err.status_code == Some(404) || err.body_reports_no_results() {
            ServiceError::NotFoundAsEmpty(err)
        } else if err.retryable {
            ServiceError::UpstreamTransientExhausted(err)
        } else {
            ServiceError::UpstreamTerminal(err)
        }
    }
}

impl From<ClientError> for ServiceError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::InvalidArgument(msg) => ServiceError::Validation(msg),
            ClientError::Upstream(e) => e.into(),
        }
    }
}

/// Type alias for service results
pub type ServiceResult<T> = Result<T, ServiceError>;

/// RFC 7807 problem payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    pub trace_id: Option<String>,
    pub correlation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

/// Errors surfaced at the HTTP boundary
#[derive(Debug)]
pub enum ApiError {
    Validation(BTreeMap<String, Vec<String>>),
    CityNotFound(String),
    UpstreamUnavailable(UpstreamError),
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => {
                ApiError::Validation(BTreeMap::from([("request".to_string(), vec![msg])]))
            }
            ServiceError::UpstreamTerminal(e)
            | ServiceError::UpstreamTransientExhausted(e)
            | ServiceError::NotFoundAsEmpty(e) => ApiError::UpstreamUnavailable(e),
            ServiceError::Unexpected(e) => ApiError::Internal(format!("{e:#}")),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let fields = errs
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid value ({})", e.code))
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        ApiError::Validation(fields)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::CityNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the problem payload for this error within a request
    pub fn to_problem(&self, ctx: &RequestContext) -> ProblemDetails {
        let status = self.status();
        let (title, detail, errors, context) = match self {
            ApiError::Validation(fields) => (
                "Validation Failed",
                "One or more validation errors occurred.".to_string(),
                Some(fields.clone()),
                None,
            ),
            ApiError::CityNotFound(query) => (
                "City Not Found",
                format!("No cities found matching '{query}'."),
                None,
                None,
            ),
            ApiError::UpstreamUnavailable(e) => {
                let mut context = Map::new();
                if let Some(code) = e.status_code {
                    context.insert("upstreamStatusCode".to_string(), Value::from(code));
                }
                context.insert("upstreamMessage".to_string(), Value::from(e.message.clone()));
                context.insert("attempts".to_string(), Value::from(e.attempts));
                (
                    "External Service Unavailable",
                    "The weather data provider is currently unavailable. Please try again later."
                        .to_string(),
                    None,
                    Some(context),
                )
            }
            ApiError::Internal(_) => (
                "Internal Server Error",
                "An unexpected error occurred while processing the request.".to_string(),
                None,
                None,
            ),
        };

        ProblemDetails {
            problem_type: problem_type_uri(status).to_string(),
            title: title.to_string(),
            status: status.as_u16(),
            detail,
            instance: ctx.path.clone(),
            trace_id: Some(ctx.trace_id.clone()),
            correlation_id: Some(ctx.correlation_id.clone()),
            timestamp: Utc::now(),
            errors,
            context,
        }
    }

    /// Attach the request context so the error can be rendered
    pub fn in_context(self, ctx: &RequestContext) -> ProblemResponse {
        ProblemResponse {
            status: self.status(),
            problem: self.to_problem(ctx),
            error: self,
        }
    }
}

fn problem_type_uri(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "https://tools.ietf.org/html/rfc7231#section-6.5.1",
        404 => "https://tools.ietf.org/html/rfc7231#section-6.5.4",
        502 => "https://tools.ietf.org/html/rfc7231#section-6.6.3",
        _ => "https://tools.ietf.org/html/rfc7231#section-6.6.1",
    }
}

/// Rendered problem ready to be sent
#[derive(Debug)]
pub struct ProblemResponse {
    status: StatusCode,
    problem: ProblemDetails,
    error: ApiError,
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                correlation_id = ?self.problem.correlation_id,
                "Request failed: {:?}",
                self.error
            );
        } else {
            tracing::warn!(
                correlation_id = ?self.problem.correlation_id,
                status = self.status.as_u16(),
                "Request rejected: {}",
                self.problem.title
            );
        }

        let mut response = (self.status, Json(self.problem)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

/// Type alias for handler results
pub type ApiResult<T> = Result<T, ProblemResponse>;

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext {
            correlation_id: "corr-1".to_string(),
            trace_id: "trace-1".to_string(),
            path: "/api/weather".to_string(),
        }
    }

    #[test]
    fn test_transient_statuses() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(is_transient_status(status), "{status} should retry");
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!is_transient_status(status), "{status} should not retry");
        }
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(status_message(400), "Invalid request parameters");
        assert_eq!(status_message(404), "Resource not found");
        assert_eq!(status_message(422), "Invalid coordinates or parameters");
        assert_eq!(status_message(429), "Rate limit exceeded");
        assert_eq!(status_message(500), "External service error");
        assert_eq!(status_message(418), "Unknown error from external service");
    }

    #[test]
    fn test_service_error_classification() {
        let not_found = UpstreamError::from_status(404, String::new());
        assert!(matches!(ServiceError::from(not_found), ServiceError::NotFoundAsEmpty(_)));

        let no_results = UpstreamError::from_status(400, "{\"reason\":\"No Results\"}".into());
        assert!(matches!(ServiceError::from(no_results), ServiceError::NotFoundAsEmpty(_)));

        let unavailable = UpstreamError::from_status(503, String::new()).with_attempts(3);
        assert!(matches!(
            ServiceError::from(unavailable),
            ServiceError::UpstreamTransientExhausted(_)
        ));

        let bad_request = UpstreamError::from_status(400, "bad".into());
        assert!(matches!(ServiceError::from(bad_request), ServiceError::UpstreamTerminal(_)));

        let invalid = ClientError::InvalidArgument("name must not be empty".into());
        assert!(matches!(ServiceError::from(invalid), ServiceError::Validation(_)));
    }

    #[test]
    fn test_upstream_problem_hides_body() {
        let err = UpstreamError::from_status(503, "secret upstream body".into()).with_attempts(3);
        let problem = ApiError::UpstreamUnavailable(err).to_problem(&ctx());
        assert_eq!(problem.status, 502);
        assert_eq!(problem.title, "External Service Unavailable");
        assert_eq!(problem.correlation_id.as_deref(), Some("corr-1"));

        let json = serde_json::to_string(&problem).unwrap();
        assert!(!json.contains("secret upstream body"));
        assert!(json.contains("\"upstreamStatusCode\":503"));
        assert!(json.contains("\"attempts\":3"));
    }

    #[test]
    fn test_problem_json_shape() {
        let problem = ApiError::CityNotFound("Atlantis".into()).to_problem(&ctx());
        let json = serde_json::to_value(&problem).unwrap();
        assert_eq!(json["type"], "https://tools.ietf.org/html/rfc7231#section-6.5.4");
        assert_eq!(json["title"], "City Not Found");
        assert_eq!(json["status"], 404);
        assert_eq!(json["instance"], "/api/weather");
        assert_eq!(json["traceId"], "trace-1");
        assert!(json.get("errors").is_none());
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_internal_error_keeps_detail_generic() {
        let err: ApiError = ServiceError::Unexpected(anyhow::anyhow!("db password leaked")).into();
        let problem = err.to_problem(&ctx());
        assert_eq!(problem.status, 500);
        assert!(!problem.detail.contains("password"));
    }
}
