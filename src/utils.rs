/// Utility functions: coordinate checks, unit conversion, weather code mapping

/// Distance from (0, 0) under which a point is treated as a placeholder
const NULL_ISLAND_TOLERANCE_DEG: f64 = 0.001;

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn is_valid_latitude(value: f64) -> bool {
    value.is_finite() && (-90.0..=90.0).contains(&value)
}

pub fn is_valid_longitude(value: f64) -> bool {
    value.is_finite() && (-180.0..=180.0).contains(&value)
}

pub fn are_valid_coordinates(latitude: f64, longitude: f64) -> bool {
    is_valid_latitude(latitude) && is_valid_longitude(longitude)
}

/// Valid coordinates that are not an uninitialized (0, 0) placeholder,
/// unless `allow_origin` is set
pub fn are_meaningful_coordinates(latitude: f64, longitude: f64, allow_origin: bool) -> bool {
    if !are_valid_coordinates(latitude, longitude) {
        return false;
    }
    allow_origin
        || latitude.abs() >= NULL_ISLAND_TOLERANCE_DEG
        || longitude.abs() >= NULL_ISLAND_TOLERANCE_DEG
}

/// Convert m/s to km/h, rounded to one decimal
pub fn meters_per_second_to_kph(value: f64) -> f64 {
    round_to(value * 3.6, 1)
}

pub fn celsius_to_fahrenheit(value: f64) -> f64 {
    round_to(value * 9.0 / 5.0 + 32.0, 1)
}

/// Map a WMO weather code and day flag to a condition label and an icon id
pub fn classify_weather_code(code: i32, is_daytime: bool) -> (&'static str, String) {
    let (condition, icon) = match code {
        0 => ("Clear sky", "01"),
        1 => ("Mainly clear", "02"),
        2 => ("Partly cloudy", "03"),
        // overcast has no night variant
        3 => return ("Overcast", "04d".to_string()),
        45 => ("Fog", "50"),
        48 => ("Depositing rime fog", "50"),
        51 => ("Light drizzle", "09"),
        53 => ("Moderate drizzle", "09"),
        55 => ("Dense drizzle", "09"),
        61 => ("Slight rain", "10"),
        63 => ("Moderate rain", "10"),
        65 => ("Heavy rain", "10"),
        71 => ("Slight snow fall", "13"),
        73 => ("Moderate snow fall", "13"),
        75 => ("Heavy snow fall", "13"),
        80 => ("Slight rain showers", "09"),
        81 => ("Moderate rain showers", "09"),
        82 => ("Violent rain showers", "09"),
        85 => ("Slight snow showers", "13"),
        86 => ("Heavy snow showers", "13"),
        95 => ("Thunderstorm", "11"),
        96 => ("Thunderstorm with slight hail", "11"),
        99 => ("Thunderstorm with heavy hail", "11"),
        _ => ("Unknown", "01"),
    };
    let suffix = if is_daytime { 'd' } else { 'n' };
    (condition, format!("{icon}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KNOWN_CODES: [i32; 23] = [
        0, 1, 2, 3, 45, 48, 51, 53, 55, 61, 63, 65, 71, 73, 75, 80, 81, 82, 85, 86, 95, 96, 99,
    ];

    fn is_icon(icon: &str) -> bool {
        let bytes = icon.as_bytes();
        bytes.len() == 3
            && bytes[0].is_ascii_digit()
            && bytes[1].is_ascii_digit()
            && (bytes[2] == b'd' || bytes[2] == b'n')
    }

    #[test]
    fn test_latitude_bounds() {
        assert!(is_valid_latitude(90.0));
        assert!(is_valid_latitude(-90.0));
        assert!(is_valid_latitude(0.0));
        assert!(!is_valid_latitude(90.0001));
        assert!(!is_valid_latitude(-91.0));
        assert!(!is_valid_latitude(f64::NAN));
        assert!(!is_valid_latitude(f64::INFINITY));
    }

    #[test]
    fn test_longitude_bounds() {
        assert!(is_valid_longitude(180.0));
        assert!(is_valid_longitude(-180.0));
        assert!(!is_valid_longitude(180.5));
        assert!(!is_valid_longitude(f64::NEG_INFINITY));
    }

    #[test]
    fn test_meaningful_coordinates_rejects_null_island() {
        assert!(!are_meaningful_coordinates(0.0, 0.0, false));
        assert!(!are_meaningful_coordinates(0.0005, -0.0005, false));
        assert!(are_meaningful_coordinates(0.0, 0.0, true));
        assert!(are_meaningful_coordinates(51.5074, -0.1278, false));
        assert!(!are_meaningful_coordinates(95.0, 0.0, true));
    }

    #[test]
    fn test_wind_speed_conversion() {
        assert_eq!(meters_per_second_to_kph(3.5), 12.6);
        assert_eq!(meters_per_second_to_kph(12.5), 45.0);
        assert_eq!(meters_per_second_to_kph(0.0), 0.0);
    }

    #[test]
    fn test_celsius_to_fahrenheit() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
        assert_eq!(celsius_to_fahrenheit(21.3), 70.3);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(51.50853, 6), 51.50853);
        assert_eq!(round_to(-0.125744, 5), -0.12574);
        assert_eq!(round_to(2.25, 1), 2.3);
        assert_eq!(round_to(-2.25, 1), -2.3);
    }

    #[test]
    fn test_overcast_icon_ignores_day_flag() {
        assert_eq!(classify_weather_code(3, true).1, "04d");
        assert_eq!(classify_weather_code(3, false).1, "04d");
        assert_eq!(classify_weather_code(3, false).0, "Overcast");
    }

    #[test]
    fn test_clear_sky_icon_follows_day_flag() {
        assert_eq!(classify_weather_code(0, true), ("Clear sky", "01d".to_string()));
        assert_eq!(classify_weather_code(0, false), ("Clear sky", "01n".to_string()));
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(classify_weather_code(42, true), ("Unknown", "01d".to_string()));
        assert_eq!(classify_weather_code(-1, false), ("Unknown", "01n".to_string()));
    }

    #[test]
    fn test_known_codes_have_condition_and_icon() {
        for code in KNOWN_CODES {
            for is_day in [true, false] {
                let (condition, icon) = classify_weather_code(code, is_day);
                assert!(!condition.is_empty());
                assert_ne!(condition, "Unknown");
                assert!(is_icon(&icon), "bad icon {icon} for code {code}");
            }
        }
    }

    proptest! {
        #[test]
        fn prop_in_range_coordinates_are_valid(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            prop_assert!(are_valid_coordinates(lat, lon));
        }

        #[test]
        fn prop_out_of_range_latitude_is_invalid(lat in 90.000001f64..1.0e6, lon in -180.0f64..=180.0) {
            prop_assert!(!are_valid_coordinates(lat, lon));
            prop_assert!(!are_valid_coordinates(-lat, lon));
        }

        #[test]
        fn prop_out_of_range_longitude_is_invalid(lat in -90.0f64..=90.0, lon in 180.000001f64..1.0e6) {
            prop_assert!(!are_valid_coordinates(lat, lon));
            prop_assert!(!are_valid_coordinates(lat, -lon));
        }

        #[test]
        fn prop_unmapped_codes_are_unknown(code in 100i32..10_000, is_day: bool) {
            let (condition, icon) = classify_weather_code(code, is_day);
            prop_assert_eq!(condition, "Unknown");
            prop_assert!(is_icon(&icon));
        }

        #[test]
        fn prop_wind_conversion_has_one_decimal(mps in 0.0f64..100.0) {
            let kph = meters_per_second_to_kph(mps);
            prop_assert!((kph * 10.0 - (kph * 10.0).round()).abs() < 1e-6);
            prop_assert!((kph - mps * 3.6).abs() <= 0.05 + 1e-9);
        }
    }
}
