/// Wire shapes returned by the Open-Meteo geocoding and forecast APIs.
///
/// Every field is optional or defaulted: the normalizer decides what a
/// missing value means, the deserializer never rejects a partial payload.
use serde::{Deserialize, Deserializer};

/// Read an explicit JSON `null` as the type's default, like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeocodingResponse {
    #[serde(default)]
    pub results: Option<Vec<GeocodingResult>>,
}

impl GeocodingResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeocodingResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub latitude: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub feature_code: Option<String>,
    pub country_code: Option<String>,
    pub country: Option<String>,
    pub admin1: Option<String>,
    pub timezone: Option<String>,
    pub population: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub latitude: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub longitude: f64,
    pub timezone: Option<String>,
    pub timezone_abbreviation: Option<String>,
    /// Offset of the location's local time from UTC
    pub utc_offset_seconds: Option<i32>,
    pub elevation: Option<f64>,
    pub current: Option<CurrentBlock>,
    pub daily: Option<DailyBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentBlock {
    pub time: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temperature_2m: f64,
    /// m/s, as requested from upstream
    #[serde(default, deserialize_with = "null_as_default")]
    pub wind_speed_10m: f64,
    /// 1 by day, 0 by night
    pub is_day: Option<i32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weather_code: i32,
}

/// Parallel per-day arrays, zipped by index
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DailyBlock {
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weather_code: Vec<Option<i32>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temperature_2m_max: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temperature_2m_min: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wind_speed_10m_max: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geocoding_without_results_key() {
        let parsed: GeocodingResponse = serde_json::from_str(r#"{"generationtime_ms":0.5}"#).unwrap();
        assert!(parsed.results.is_none());
    }

    #[test]
    fn test_forecast_tolerates_nulls_in_daily_arrays() {
        let parsed: ForecastResponse = serde_json::from_str(
            r#"{
                "latitude": 51.5,
                "longitude": -0.12,
                "daily": {
                    "time": ["2024-01-15", "2024-01-16"],
                    "temperature_2m_max": [8.4, null]
                }
            }"#,
        )
        .unwrap();
        let daily = parsed.daily.unwrap();
        assert_eq!(daily.time.len(), 2);
        assert_eq!(daily.temperature_2m_max, vec![Some(8.4), None]);
        assert!(daily.weather_code.is_empty());
        assert!(parsed.current.is_none());
    }

    #[test]
    fn test_null_values_read_as_defaults() {
        let parsed: ForecastResponse = serde_json::from_str(
            r#"{
                "latitude": 51.5,
                "longitude": null,
                "current": {
                    "time": "2024-01-15T14:00",
                    "temperature_2m": null,
                    "wind_speed_10m": 3.5,
                    "is_day": null,
                    "weather_code": null
                },
                "daily": {"time": ["2024-01-15"], "weather_code": null}
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.longitude, 0.0);
        let current = parsed.current.unwrap();
        assert_eq!(current.temperature_2m, 0.0);
        assert_eq!(current.wind_speed_10m, 3.5);
        assert_eq!(current.is_day, None);
        assert_eq!(current.weather_code, 0);
        assert!(parsed.daily.unwrap().weather_code.is_empty());
    }

    #[test]
    fn test_null_name_keeps_other_results() {
        let parsed: GeocodingResponse = serde_json::from_str(
            r#"{"results":[
                {"id":1,"name":null,"latitude":null,"longitude":2.0},
                {"id":2,"name":"London","latitude":51.50853,"longitude":-0.12574}
            ]}"#,
        )
        .unwrap();
        let results = parsed.results.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].name.is_empty());
        assert_eq!(results[1].name, "London");
    }
}
