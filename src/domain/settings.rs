//! Typed runtime settings built from a [`ConfigPort`].
//!
//! Every key is optional. A present key that does not parse or is out of
//! range fails with `ConfigInvalid` rather than falling back to the default.

use crate::domain::error::AnalyticsError;
use crate::domain::fetcher::DEFAULT_CACHE_TTL;
use crate::ports::config_port::ConfigPort;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; stockpulse/0.1)";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

const KNOWN_KEYS: [(&str, &[&str]); 3] = [
    (
        "fetch",
        &["max_retries", "base_delay_ms", "cache_ttl_secs", "timeout_secs", "user_agent"],
    ),
    ("forecast", &["alpha", "beta", "confidence", "min_observations"]),
    ("logging", &["level", "json"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub cache_ttl: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(2_000),
            cache_ttl: DEFAULT_CACHE_TTL,
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSettings {
    pub alpha: f64,
    pub beta: f64,
    pub confidence: f64,
    pub min_observations: usize,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            beta: 0.1,
            confidence: 0.95,
            min_observations: 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub fetch: FetchSettings,
    pub forecast: ForecastSettings,
    pub logging: LoggingSettings,
}

pub fn build_settings(config: &dyn ConfigPort) -> Result<Settings, AnalyticsError> {
    for key in unknown_keys(config) {
        warn!(key = %key, "ignoring unknown config key");
    }
    Ok(Settings {
        fetch: build_fetch_settings(config)?,
        forecast: build_forecast_settings(config)?,
        logging: build_logging_settings(config)?,
    })
}

fn build_fetch_settings(config: &dyn ConfigPort) -> Result<FetchSettings, AnalyticsError> {
    let d = FetchSettings::default();

    let max_retries: u32 = parse_key(config, "fetch", "max_retries", d.max_retries)?;
    if !(1..=10).contains(&max_retries) {
        return Err(invalid("fetch", "max_retries", "max_retries must be between 1 and 10"));
    }
    let base_delay_ms: u64 =
        parse_key(config, "fetch", "base_delay_ms", d.base_delay.as_millis() as u64)?;
    let cache_ttl_secs: u64 = parse_key(config, "fetch", "cache_ttl_secs", d.cache_ttl.as_secs())?;
    let timeout_secs: u64 = parse_key(config, "fetch", "timeout_secs", d.timeout.as_secs())?;
    if timeout_secs == 0 {
        return Err(invalid("fetch", "timeout_secs", "timeout_secs must be positive"));
    }
    let user_agent = config
        .get_string("fetch", "user_agent")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or(d.user_agent);

    Ok(FetchSettings {
        max_retries,
        base_delay: Duration::from_millis(base_delay_ms),
        cache_ttl: Duration::from_secs(cache_ttl_secs),
        timeout: Duration::from_secs(timeout_secs),
        user_agent,
    })
}

fn build_forecast_settings(config: &dyn ConfigPort) -> Result<ForecastSettings, AnalyticsError> {
    let d = ForecastSettings::default();

    let alpha: f64 = parse_key(config, "forecast", "alpha", d.alpha)?;
    let beta: f64 = parse_key(config, "forecast", "beta", d.beta)?;
    let confidence: f64 = parse_key(config, "forecast", "confidence", d.confidence)?;
    for (key, value) in [("alpha", alpha), ("beta", beta), ("confidence", confidence)] {
        if !(value > 0.0 && value < 1.0) {
            return Err(invalid(
                "forecast",
                key,
                &format!("{key} must be between 0 and 1 (exclusive)"),
            ));
        }
    }
    let min_observations: usize =
        parse_key(config, "forecast", "min_observations", d.min_observations)?;
    if min_observations < 3 {
        return Err(invalid(
            "forecast",
            "min_observations",
            "min_observations must be at least 3",
        ));
    }

    Ok(ForecastSettings {
        alpha,
        beta,
        confidence,
        min_observations,
    })
}

fn build_logging_settings(config: &dyn ConfigPort) -> Result<LoggingSettings, AnalyticsError> {
    let d = LoggingSettings::default();

    let level = config
        .get_string("logging", "level")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or(d.level);
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(invalid(
            "logging",
            "level",
            &format!("level must be one of {}", LOG_LEVELS.join(", ")),
        ));
    }
    let json = match config.get_string("logging", "json") {
        None => d.json,
        Some(v) => parse_bool(&v).ok_or_else(|| invalid("logging", "json", "json must be true or false"))?,
    };

    Ok(LoggingSettings { level, json })
}

/// Keys in the known sections that no setting reads, as `section.key`.
pub fn unknown_keys(config: &dyn ConfigPort) -> Vec<String> {
    KNOWN_KEYS
        .iter()
        .flat_map(|(section, known)| {
            config
                .keys(section)
                .into_iter()
                .filter(move |k| !known.contains(&k.as_str()))
                .map(move |k| format!("{section}.{k}"))
        })
        .collect()
}

fn parse_key<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, AnalyticsError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(section, key, &format!("cannot parse '{}'", raw.trim()))),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> AnalyticsError {
    AnalyticsError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
