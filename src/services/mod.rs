/// Business logic services layer
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, instrument};

use crate::clients::OpenMeteoClient;
use crate::domain::{CityRecord, CitySearchQuery, WeatherQuery, WeatherResult};
use crate::errors::{ServiceError, ServiceResult};
use crate::mapping::{map_city_result, map_city_results, map_weather_result};

/// Language and result count used for the best-effort place lookup
const REVERSE_LOOKUP_LANGUAGE: &str = "en";
const REVERSE_LOOKUP_COUNT: u32 = 1;

/// City search and weather lookup on top of Open-Meteo
pub struct WeatherService {
    client: OpenMeteoClient,
    reverse_geocode_timeout: Duration,
}

impl WeatherService {
    pub fn new(client: OpenMeteoClient, reverse_geocode_timeout: Duration) -> Self {
        Self {
            client,
            reverse_geocode_timeout,
        }
    }

    /// Search cities by name
    ///
    /// An upstream "not found" is not an error here: it yields an empty list.
    #[instrument(skip(self, query), fields(text = %query.text))]
    pub async fn search_cities(&self, query: &CitySearchQuery) -> ServiceResult<Vec<CityRecord>> {
        let text = query.text.trim();
        let response = match self
            .client
            .fetch_geocoding(text, query.max_results, &query.language_code)
            .await
        {
            Ok(response) => response,
            Err(e) => match ServiceError::from(e) {
                ServiceError::NotFoundAsEmpty(source) => {
                    info!(status = ?source.status_code, "No cities reported upstream");
                    return Ok(Vec::new());
                }
                other => return Err(other),
            },
        };

        let cities = map_city_results(&response);
        info!(count = cities.len(), "City search completed");
        Ok(cities)
    }

    /// Current conditions and daily forecast for a coordinate pair
    ///
    /// Location names come from the caller hints first, then from a
    /// best-effort reverse lookup, then from the "Unknown" defaults.
    #[instrument(skip(self, query), fields(lat = query.latitude, lon = query.longitude))]
    pub async fn get_weather(&self, query: &WeatherQuery) -> ServiceResult<WeatherResult> {
        let forecast = self
            .client
            .fetch_forecast(query.latitude, query.longitude, query.forecast_days)
            .await?;

        let city_hint = non_blank(query.city_name_hint.as_deref());
        let country_hint = non_blank(query.country_name_hint.as_deref());

        let (city_name, country_name) = match (city_hint, country_hint) {
            (Some(city), Some(country)) => (Some(city.to_string()), Some(country.to_string())),
            (city, country) => {
                let found = self.reverse_lookup(query.latitude, query.longitude).await;
                (
                    city.map(str::to_string)
                        .or_else(|| found.as_ref().map(|c| c.name.clone())),
                    country
                        .map(str::to_string)
                        .or_else(|| found.as_ref().map(|c| c.country.clone())),
                )
            }
        };

        let mut result = map_weather_result(&forecast, city_name.as_deref(), country_name.as_deref());
        result.daily.truncate(query.forecast_days as usize);
        info!(
            location = %result.location.name,
            days = result.daily.len(),
            "Weather assembled"
        );
        Ok(result)
    }

    /// Nearest named place for a coordinate pair; any failure yields `None`
    async fn reverse_lookup(&self, latitude: f64, longitude: f64) -> Option<CityRecord> {
        let lookup = format!("{latitude:.2},{longitude:.2}");
        let outcome = timeout(
            self.reverse_geocode_timeout,
            self.client
                .fetch_geocoding(&lookup, REVERSE_LOOKUP_COUNT, REVERSE_LOOKUP_LANGUAGE),
        )
        .await;

        match outcome {
            Ok(Ok(response)) => response
                .results
                .as_deref()
                .and_then(|results| results.iter().find(|r| !r.name.trim().is_empty()))
                .map(map_city_result),
            Ok(Err(e)) => {
                debug!(lookup = %lookup, error = %e, "Reverse geocoding failed");
                None
            }
            Err(_) => {
                debug!(lookup = %lookup, "Reverse geocoding timed out");
                None
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
