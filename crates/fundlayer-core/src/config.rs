//! Orchestrator configuration and per data type TTL defaults.

use std::env;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::data_source::DataType;
use crate::ConfigError;

pub const FUND_REALTIME_TTL: Duration = Duration::from_secs(60);
pub const FUND_HISTORY_TTL: Duration = Duration::from_secs(3600);
pub const SECTOR_FLOW_TTL: Duration = Duration::from_secs(60);
pub const NEWS_TTL: Duration = Duration::from_secs(300);

/// Upper bound for every configured duration (100 years).
pub const MAX_DURATION: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Tunables for [`crate::FetchOrchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
    /// TTL used when a request does not set its own.
    pub default_ttl: Duration,
    /// Upper bound for one upstream call.
    pub source_timeout: Duration,
    /// Upper bound for the whole fallback walk, cache fallback excluded.
    pub request_timeout: Duration,
    pub sweep_interval: Duration,
    pub sector_flow_ttl: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let circuit = CircuitBreakerConfig::default();
        Self {
            failure_threshold: circuit.failure_threshold,
            cooldown: circuit.cooldown,
            default_ttl: Duration::from_secs(300),
            source_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(600),
            sector_flow_ttl: SECTOR_FLOW_TTL,
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `FUNDLAYER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`FetchConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |name: &'static str| {
            lookup(name)
                .map(|raw| raw.trim().to_owned())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(raw) = read("FUNDLAYER_FAILURE_THRESHOLD") {
            config.failure_threshold = parse_u64("FUNDLAYER_FAILURE_THRESHOLD", &raw)?
                .try_into()
                .map_err(|_| ConfigError::InvalidEnv {
                    name: "FUNDLAYER_FAILURE_THRESHOLD",
                    value: raw.clone(),
                    expected: "32-bit unsigned integer",
                })?;
        }
        if let Some(raw) = read("FUNDLAYER_COOLDOWN_SECS") {
            config.cooldown = Duration::from_secs(parse_u64("FUNDLAYER_COOLDOWN_SECS", &raw)?);
        }
        if let Some(raw) = read("FUNDLAYER_DEFAULT_TTL_SECS") {
            config.default_ttl =
                Duration::from_secs(parse_u64("FUNDLAYER_DEFAULT_TTL_SECS", &raw)?);
        }
        if let Some(raw) = read("FUNDLAYER_SOURCE_TIMEOUT_MS") {
            config.source_timeout =
                Duration::from_millis(parse_u64("FUNDLAYER_SOURCE_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = read("FUNDLAYER_REQUEST_TIMEOUT_MS") {
            config.request_timeout =
                Duration::from_millis(parse_u64("FUNDLAYER_REQUEST_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = read("FUNDLAYER_SWEEP_INTERVAL_SECS") {
            config.sweep_interval =
                Duration::from_secs(parse_u64("FUNDLAYER_SWEEP_INTERVAL_SECS", &raw)?);
        }
        if let Some(raw) = read("FUNDLAYER_SECTOR_TTL_SECS") {
            config.sector_flow_ttl =
                Duration::from_secs(parse_u64("FUNDLAYER_SECTOR_TTL_SECS", &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("failure_threshold", self.failure_threshold == 0),
            ("cooldown", self.cooldown.is_zero()),
            ("default_ttl", self.default_ttl.is_zero()),
            ("source_timeout", self.source_timeout.is_zero()),
            ("request_timeout", self.request_timeout.is_zero()),
            ("sweep_interval", self.sweep_interval.is_zero()),
            ("sector_flow_ttl", self.sector_flow_ttl.is_zero()),
        ];
        if let Some((field, _)) = checks.into_iter().find(|(_, invalid)| *invalid) {
            return Err(ConfigError::NonPositive { field });
        }

        let bounded = [
            ("cooldown", self.cooldown),
            ("default_ttl", self.default_ttl),
            ("source_timeout", self.source_timeout),
            ("request_timeout", self.request_timeout),
            ("sweep_interval", self.sweep_interval),
            ("sector_flow_ttl", self.sector_flow_ttl),
        ];
        match bounded.into_iter().find(|(_, value)| *value > MAX_DURATION) {
            Some((field, _)) => Err(ConfigError::TooLarge {
                field,
                max_secs: MAX_DURATION.as_secs(),
            }),
            None => Ok(()),
        }
    }

    pub fn circuit(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown: self.cooldown,
        }
    }

    /// TTL for the well-known data types; `default_ttl` for anything else.
    pub fn ttl_for(&self, data_type: &DataType) -> Duration {
        match data_type.as_str() {
            DataType::FUND_REALTIME => FUND_REALTIME_TTL,
            DataType::FUND_HISTORY => FUND_HISTORY_TTL,
            DataType::BOARD_FLOW => self.sector_flow_ttl,
            DataType::NEWS => NEWS_TTL,
            _ => self.default_ttl,
        }
    }
}

fn parse_u64(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
        name,
        value: raw.to_owned(),
        expected: "unsigned integer",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_constants() {
        let config = FetchConfig::from_lookup(lookup(&[])).expect("defaults");

        assert_eq!(config, FetchConfig::default());
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.cooldown, Duration::from_secs(300));
        assert_eq!(config.source_timeout, Duration::from_secs(5));
    }

    #[test]
    fn environment_overrides_apply() {
        let config = FetchConfig::from_lookup(lookup(&[
            ("FUNDLAYER_FAILURE_THRESHOLD", "5"),
            ("FUNDLAYER_COOLDOWN_SECS", "60"),
            ("FUNDLAYER_SOURCE_TIMEOUT_MS", "250"),
            ("FUNDLAYER_SECTOR_TTL_SECS", " 120 "),
        ]))
        .expect("overrides");

        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown, Duration::from_secs(60));
        assert_eq!(config.source_timeout, Duration::from_millis(250));
        assert_eq!(
            config.ttl_for(&DataType::board_flow()),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn rejects_garbage_and_zero_values() {
        let err = FetchConfig::from_lookup(lookup(&[("FUNDLAYER_COOLDOWN_SECS", "soon")]))
            .expect_err("non-numeric");
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                name: "FUNDLAYER_COOLDOWN_SECS",
                ..
            }
        ));

        let err = FetchConfig::from_lookup(lookup(&[("FUNDLAYER_DEFAULT_TTL_SECS", "0")]))
            .expect_err("zero ttl");
        assert!(matches!(
            err,
            ConfigError::NonPositive {
                field: "default_ttl"
            }
        ));
    }

    #[test]
    fn ttl_defaults_per_data_type() {
        let config = FetchConfig::default();

        assert_eq!(config.ttl_for(&DataType::fund_realtime()), FUND_REALTIME_TTL);
        assert_eq!(config.ttl_for(&DataType::fund_history()), FUND_HISTORY_TTL);
        assert_eq!(config.ttl_for(&DataType::news()), NEWS_TTL);
        assert_eq!(
            config.ttl_for(&DataType::parse("custom").expect("valid")),
            config.default_ttl
        );
    }

    #[test]
    fn rejects_durations_beyond_the_bound() {
        let err = FetchConfig::from_lookup(lookup(&[("FUNDLAYER_COOLDOWN_SECS", "1000000000000")]))
            .expect_err("cooldown too large");
        assert!(matches!(err, ConfigError::TooLarge { field: "cooldown", .. }));

        let config = FetchConfig {
            cooldown: MAX_DURATION,
            ..FetchConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
