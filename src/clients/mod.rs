/// Outbound client for the Open-Meteo geocoding and forecast APIs
pub mod payloads;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::config::ChannelConfig;
use crate::errors::{is_transient_status, ClientError, UpstreamError};
use crate::resilience::{Attempted, ResiliencePolicy, Transient};
use crate::utils::are_valid_coordinates;

pub use payloads::{
    CurrentBlock, DailyBlock, ForecastResponse, GeocodingResponse, GeocodingResult,
};

const CURRENT_VARIABLES: &str = "temperature_2m,wind_speed_10m,is_day,weather_code";
const DAILY_VARIABLES: &str = "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max,wind_speed_10m_max";

/// Status and body of one upstream HTTP response
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl Transient for RawResponse {
    fn is_transient(&self) -> bool {
        is_transient_status(self.status)
    }
}

/// A named outbound channel: its own HTTP client, base URL and resilience policy
pub struct HttpChannel {
    name: &'static str,
    client: Client,
    base_url: String,
    resilience: ResiliencePolicy,
}

impl HttpChannel {
    pub fn new(name: &'static str, config: ChannelConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.policy.overall_timeout)
            .user_agent("weather-gateway/1.0")
            .build()
            .map_err(UpstreamError::from)?;
        Ok(Self {
            name,
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            resilience: ResiliencePolicy::new(name, config.policy),
        })
    }

    /// GET `path` with `query`, under the channel's resilience policy
    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Attempted<RawResponse>, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(channel = self.name, %url, "Sending upstream request");

        self.resilience
            .execute(|| {
                let request = self.client.get(&url).query(query);
                async move {
                    let response = request.send().await?;
                    let status = response.status().as_u16();
                    let body = response.text().await?;
                    Ok::<_, UpstreamError>(RawResponse { status, body })
                }
            })
            .await
    }
}

/// Resilient client owning the geocoding and forecast channels
pub struct OpenMeteoClient {
    geocoding: HttpChannel,
    forecast: HttpChannel,
}

impl OpenMeteoClient {
    pub fn new(geocoding: ChannelConfig, forecast: ChannelConfig) -> Result<Self, ClientError> {
        Ok(Self {
            geocoding: HttpChannel::new("geocoding", geocoding)?,
            forecast: HttpChannel::new("forecast", forecast)?,
        })
    }

    /// Search places by name
    ///
    /// An empty body is read as "no matches", not as a failure.
    #[instrument(skip(self))]
    pub async fn fetch_geocoding(
        &self,
        name: &str,
        max_results: u32,
        language: &str,
    ) -> Result<GeocodingResponse, ClientError> {
        if name.trim().is_empty() {
            return Err(ClientError::InvalidArgument(
                "City name must not be empty".to_string(),
            ));
        }
        if max_results == 0 {
            return Err(ClientError::InvalidArgument(
                "Result count must be greater than zero".to_string(),
            ));
        }

        let query = [
            ("name", name.to_string()),
            ("count", max_results.to_string()),
            ("language", language.to_string()),
            ("format", "json".to_string()),
        ];
        let response = self.geocoding.get("/v1/search", &query).await?;

        if response.value.is_success() && response.value.body.trim().is_empty() {
            info!("Geocoding returned an empty body, treating as no matches");
            return Ok(GeocodingResponse::empty());
        }
        let parsed: GeocodingResponse = parse_body(response)?;
        info!(
            results = parsed.results.as_ref().map_or(0, Vec::len),
            "Geocoding search completed"
        );
        Ok(parsed)
    }

    /// Fetch current conditions and a daily forecast
    ///
    /// An empty body is an error here: valid coordinates always have a forecast.
    #[instrument(skip(self))]
    pub async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        forecast_days: u32,
    ) -> Result<ForecastResponse, ClientError> {
        if !are_valid_coordinates(latitude, longitude) {
            return Err(ClientError::InvalidArgument(format!(
                "Invalid coordinates: latitude={latitude}, longitude={longitude}"
            )));
        }
        if forecast_days == 0 {
            return Err(ClientError::InvalidArgument(
                "Forecast days must be greater than zero".to_string(),
            ));
        }

        let query = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", CURRENT_VARIABLES.to_string()),
            ("daily", DAILY_VARIABLES.to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", forecast_days.to_string()),
        ];
        let response = self.forecast.get("/v1/forecast", &query).await?;

        if response.value.is_success() && response.value.body.trim().is_empty() {
            return Err(UpstreamError::new("Empty response from forecast service", false)
                .with_attempts(response.attempts)
                .into());
        }
        let parsed: ForecastResponse = parse_body(response)?;
        info!(
            days = parsed.daily.as_ref().map_or(0, |d| d.time.len()),
            "Forecast fetched"
        );
        Ok(parsed)
    }
}

/// Map a final response to a typed payload or an upstream error
fn parse_body<T: DeserializeOwned>(response: Attempted<RawResponse>) -> Result<T, UpstreamError> {
    let Attempted {
        value: raw,
        attempts,
    } = response;

    if !raw.is_success() {
        return Err(UpstreamError::from_status(raw.status, raw.body).with_attempts(attempts));
    }
    serde_json::from_str(&raw.body)
        .map_err(|e| UpstreamError::invalid_response(e).with_attempts(attempts))
}
