/// Domain models for the application
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use crate::utils::{is_valid_latitude, is_valid_longitude};

pub const DEFAULT_MAX_RESULTS: u32 = 5;
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_FORECAST_DAYS: u32 = 5;

/// City search request
#[derive(Debug, Clone, Validate)]
pub struct CitySearchQuery {
    #[validate(
        length(min = 2, max = 100, message = "Search text must be between 2 and 100 characters"),
        custom = "validate_search_text"
    )]
    pub text: String,

    #[validate(range(min = 1, max = 10, message = "Count must be between 1 and 10"))]
    pub max_results: u32,

    #[validate(custom = "validate_language_code")]
    pub language_code: String,
}

/// Weather request for a coordinate pair
#[derive(Debug, Clone, Validate)]
pub struct WeatherQuery {
    #[validate(custom = "validate_latitude")]
    pub latitude: f64,

    #[validate(custom = "validate_longitude")]
    pub longitude: f64,

    #[validate(range(min = 1, max = 7, message = "Days must be between 1 and 7"))]
    pub forecast_days: u32,

    #[validate(length(max = 100, message = "City name must be at most 100 characters"))]
    pub city_name_hint: Option<String>,

    #[validate(length(max = 100, message = "Country name must be at most 100 characters"))]
    pub country_name_hint: Option<String>,
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Letters, digits, spaces, hyphens, apostrophes and periods, in any script
fn validate_search_text(text: &str) -> Result<(), ValidationError> {
    let allowed = text
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '\'' | '.'));
    if allowed {
        Ok(())
    } else {
        Err(invalid(
            "search_text",
            "Search text may only contain letters, digits, spaces, hyphens, apostrophes and periods",
        ))
    }
}

fn validate_language_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_lowercase()) {
        Ok(())
    } else {
        Err(invalid(
            "language_code",
            "Language must be a two-letter lowercase code",
        ))
    }
}

fn validate_latitude(value: f64) -> Result<(), ValidationError> {
    if is_valid_latitude(value) {
        Ok(())
    } else {
        Err(invalid(
            "latitude",
            "Latitude must be a number between -90 and 90",
        ))
    }
}

fn validate_longitude(value: f64) -> Result<(), ValidationError> {
    if is_valid_longitude(value) {
        Ok(())
    } else {
        Err(invalid(
            "longitude",
            "Longitude must be a number between -180 and 180",
        ))
    }
}

/// City produced from one geocoding match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityRecord {
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitySearchResponse {
    pub cities: Vec<CityRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherResult {
    pub location: WeatherLocation,
    pub current: CurrentConditions,
    pub daily: Vec<DailyForecastEntry>,
    pub source: SourceInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherLocation {
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    /// Local wall-clock time at the location, without an offset. Taken from
    /// upstream; when upstream omits it, the current time at the location's
    /// UTC offset (plain UTC if the offset is unknown too).
    pub observed_at: NaiveDateTime,
    pub temperature_c: f64,
    pub wind_speed_kph: f64,
    pub weather_code: i32,
    pub is_daytime: bool,
    pub condition: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecastEntry {
    /// YYYY-MM-DD
    pub date: String,
    pub temperature_max_c: f64,
    pub temperature_min_c: f64,
    pub precipitation_probability_pct: i32,
    pub wind_speed_max_kph: f64,
    pub weather_code: i32,
    pub condition: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Health check response
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub now: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(text: &str, max_results: u32, language: &str) -> CitySearchQuery {
        CitySearchQuery {
            text: text.to_string(),
            max_results,
            language_code: language.to_string(),
        }
    }

    fn weather(latitude: f64, longitude: f64, days: u32) -> WeatherQuery {
        WeatherQuery {
            latitude,
            longitude,
            forecast_days: days,
            city_name_hint: None,
            country_name_hint: None,
        }
    }

    #[test]
    fn test_valid_search_queries() {
        assert!(search("London", 5, "en").validate().is_ok());
        assert!(search("St. John's", 1, "fr").validate().is_ok());
        assert!(search("Zürich", 10, "de").validate().is_ok());
        assert!(search("東京", 5, "ja").validate().is_ok());
        assert!(search("Winston-Salem 2", 5, "en").validate().is_ok());
    }

    #[test]
    fn test_invalid_search_queries() {
        let errors = search("L", 5, "en").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("text"));

        let errors = search("Paris<script>", 5, "en").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("text"));

        let errors = search("Paris", 11, "en").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("max_results"));

        let errors = search("Paris", 5, "EN").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("language_code"));

        let errors = search("Paris", 0, "eng").validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 2);
    }

    #[test]
    fn test_weather_query_validation() {
        assert!(weather(51.5074, -0.1278, 5).validate().is_ok());
        assert!(weather(-90.0, 180.0, 7).validate().is_ok());

        let errors = weather(f64::NAN, 0.0, 5).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("latitude"));

        let errors = weather(0.0, -180.5, 5).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("longitude"));

        let errors = weather(0.0, 0.0, 8).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("forecast_days"));

        let mut long_hint = weather(0.0, 0.0, 5);
        long_hint.city_name_hint = Some("x".repeat(101));
        assert!(long_hint.validate().is_err());
    }

    #[test]
    fn test_city_record_wire_names() {
        let city = CityRecord {
            name: "London".into(),
            country: "United Kingdom".into(),
            latitude: 51.50853,
            longitude: -0.12574,
            region: None,
            population: Some(8982000),
        };
        let json = serde_json::to_value(&city).unwrap();
        assert_eq!(json["country"], "United Kingdom");
        assert_eq!(json["population"], 8982000);
        assert!(json.get("region").is_none());
    }
}
