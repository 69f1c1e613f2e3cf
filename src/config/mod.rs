/// Application configuration module
use std::env;
use std::time::Duration;

use crate::resilience::ChannelPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub cors_allowed_origin: String,
    pub geocoding: ChannelConfig,
    pub forecast: ChannelConfig,
    /// Budget for the best-effort reverse geocoding on weather requests
    pub reverse_geocode_timeout: Duration,
}

/// Base URL and resilience budgets of one outbound channel
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub base_url: String,
    pub policy: ChannelPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            cors_allowed_origin: "http://localhost:5173".to_string(),
            geocoding: ChannelConfig {
                base_url: "https://geocoding-api.open-meteo.com".to_string(),
                policy: ChannelPolicy::geocoding(),
            },
            forecast: ChannelConfig {
                base_url: "https://api.open-meteo.com".to_string(),
                policy: ChannelPolicy::forecast(),
            },
            reverse_geocode_timeout: Duration::from_millis(2000),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    /// Build configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let max_attempts = parse_or(&lookup, "UPSTREAM_MAX_ATTEMPTS", 3u32).max(1);
        let base_delay_ms = parse_or(&lookup, "UPSTREAM_RETRY_BASE_DELAY_MS", 500u64);

        let channel = |prefix: &str, mut channel: ChannelConfig| {
            let policy = &mut channel.policy;
            policy.overall_timeout = Duration::from_secs(parse_or(
                &lookup,
                &format!("{prefix}_TIMEOUT_SECS"),
                policy.overall_timeout.as_secs(),
            ));
            policy.attempt_timeout = Duration::from_secs(parse_or(
                &lookup,
                &format!("{prefix}_ATTEMPT_TIMEOUT_SECS"),
                policy.attempt_timeout.as_secs(),
            ));
            policy.max_attempts = max_attempts;
            policy.retry_base_delay = Duration::from_millis(base_delay_ms);
            if let Some(url) = lookup(&format!("{prefix}_BASE_URL")).filter(|u| !u.trim().is_empty()) {
                channel.base_url = url;
            }
            channel
        };

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            cors_allowed_origin: lookup("CORS_ALLOWED_ORIGIN")
                .unwrap_or(defaults.cors_allowed_origin),
            geocoding: channel("GEOCODING", defaults.geocoding),
            forecast: channel("FORECAST", defaults.forecast),
            reverse_geocode_timeout: Duration::from_millis(parse_or(
                &lookup,
                "REVERSE_GEOCODE_TIMEOUT_MS",
                defaults.reverse_geocode_timeout.as_millis() as u64,
            )),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
