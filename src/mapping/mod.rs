/// Normalization of Open-Meteo payloads into the public response models.
///
/// Missing upstream data degrades to documented defaults instead of failing:
/// an absent current block becomes a zeroed "Unknown" reading, and daily
/// arrays shorter than the day list yield zeros for the missing indices.
use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};

use crate::clients::{CurrentBlock, DailyBlock, ForecastResponse, GeocodingResponse, GeocodingResult};
use crate::domain::{
    CityRecord, CurrentConditions, DailyForecastEntry, SourceInfo, WeatherLocation, WeatherResult,
};
use crate::utils::{classify_weather_code, meters_per_second_to_kph, round_to};

pub mod countries;

pub const PROVIDER: &str = "open-meteo";
pub const MODEL: &str = "best_match";
pub const UNKNOWN_LOCATION: &str = "Unknown Location";
pub const UNKNOWN_COUNTRY: &str = "Unknown";
pub const DEFAULT_TIMEZONE: &str = "UTC";

const COORDINATE_DECIMALS: i32 = 6;

pub fn map_city_result(raw: &GeocodingResult) -> CityRecord {
    CityRecord {
        name: raw.name.trim().to_string(),
        country: resolve_country(raw.country.as_deref(), raw.country_code.as_deref()),
        latitude: round_to(raw.latitude, COORDINATE_DECIMALS),
        longitude: round_to(raw.longitude, COORDINATE_DECIMALS),
        region: non_blank(raw.admin1.as_deref()),
        population: raw.population,
    }
}

/// Map every match in upstream order, dropping nameless entries
pub fn map_city_results(raw: &GeocodingResponse) -> Vec<CityRecord> {
    raw.results
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|r| !r.name.trim().is_empty())
        .map(map_city_result)
        .collect()
}

pub fn map_weather_result(
    raw: &ForecastResponse,
    city_name_hint: Option<&str>,
    country_name_hint: Option<&str>,
) -> WeatherResult {
    let location = WeatherLocation {
        name: non_blank(city_name_hint).unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
        country: non_blank(country_name_hint).unwrap_or_else(|| UNKNOWN_COUNTRY.to_string()),
        latitude: round_to(raw.latitude, COORDINATE_DECIMALS),
        longitude: round_to(raw.longitude, COORDINATE_DECIMALS),
        timezone: non_blank(raw.timezone.as_deref())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
    };

    WeatherResult {
        location,
        current: match raw.current.as_ref() {
            Some(block) => map_current(block, raw.utc_offset_seconds),
            None => default_current(raw.utc_offset_seconds),
        },
        daily: raw.daily.as_ref().map(map_daily).unwrap_or_default(),
        source: SourceInfo {
            provider: PROVIDER.to_string(),
            model: Some(MODEL.to_string()),
        },
    }
}

fn map_current(block: &CurrentBlock, utc_offset_seconds: Option<i32>) -> CurrentConditions {
    let is_daytime = block.is_day.map_or(true, |flag| flag == 1);
    let (condition, icon) = classify_weather_code(block.weather_code, is_daytime);
    CurrentConditions {
        observed_at: block
            .time
            .as_deref()
            .and_then(parse_local_time)
            .unwrap_or_else(|| local_now(utc_offset_seconds)),
        temperature_c: round_to(block.temperature_2m, 1),
        wind_speed_kph: meters_per_second_to_kph(block.wind_speed_10m),
        weather_code: block.weather_code,
        is_daytime,
        condition: condition.to_string(),
        icon,
    }
}

fn default_current(utc_offset_seconds: Option<i32>) -> CurrentConditions {
    CurrentConditions {
        observed_at: local_now(utc_offset_seconds),
        temperature_c: 0.0,
        wind_speed_kph: 0.0,
        weather_code: 0,
        is_daytime: true,
        condition: "Unknown".to_string(),
        icon: "01d".to_string(),
    }
}

fn map_daily(block: &DailyBlock) -> Vec<DailyForecastEntry> {
    block
        .time
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let weather_code = at(&block.weather_code, i).unwrap_or(0);
            let (condition, icon) = classify_weather_code(weather_code, true);
            DailyForecastEntry {
                date: date.clone(),
                temperature_max_c: round_to(at(&block.temperature_2m_max, i).unwrap_or(0.0), 1),
                temperature_min_c: round_to(at(&block.temperature_2m_min, i).unwrap_or(0.0), 1),
                precipitation_probability_pct: at(&block.precipitation_probability_max, i)
                    .unwrap_or(0.0)
                    .round() as i32,
                wind_speed_max_kph: meters_per_second_to_kph(
                    at(&block.wind_speed_10m_max, i).unwrap_or(0.0),
                ),
                weather_code,
                condition: condition.to_string(),
                icon,
            }
        })
        .collect()
}

fn at<T: Copy>(values: &[Option<T>], index: usize) -> Option<T> {
    values.get(index).copied().flatten()
}

/// Open-Meteo reports local time without an offset, minutes precision
fn parse_local_time(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Current wall-clock time at the location; UTC when upstream gives no offset
fn local_now(utc_offset_seconds: Option<i32>) -> NaiveDateTime {
    let offset = utc_offset_seconds
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset).naive_local()
}

/// Country fallback: explicit name, then code lookup, then the code itself
fn resolve_country(name: Option<&str>, code: Option<&str>) -> String {
    if let Some(name) = non_blank(name) {
        return name;
    }
    match non_blank(code) {
        Some(code) => countries::country_name(&code)
            .map(str::to_string)
            .unwrap_or(code),
        None => UNKNOWN_COUNTRY.to_string(),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
