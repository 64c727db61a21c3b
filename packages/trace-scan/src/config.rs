use crate::device::{CaptureConstraints, FacingMode};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;

/// Capture session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Sampling cadence in milliseconds
    pub sample_interval_ms: u64,
    /// Preferred camera constraints for the first acquisition attempt
    pub constraints: CaptureConstraints,
    /// Retry once without a facing requirement when the preferred camera fails
    pub allow_fallback: bool,
    /// Give up after this long in `Streaming` without a payload. None = scan until stopped.
    pub idle_timeout_ms: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            constraints: CaptureConstraints::default(),
            allow_fallback: true,
            idle_timeout_ms: None,
        }
    }
}

impl ScanConfig {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let sample_interval_ms = match lookup("TRACE_SCAN_INTERVAL_MS") {
            Some(v) => parse_number("TRACE_SCAN_INTERVAL_MS", &v)?,
            None => defaults.sample_interval_ms,
        };

        let facing = match lookup("TRACE_SCAN_FACING") {
            Some(v) => parse_facing(&v)?,
            None => defaults.constraints.facing,
        };

        let ideal_width = match lookup("TRACE_SCAN_IDEAL_WIDTH") {
            Some(v) => Some(parse_number("TRACE_SCAN_IDEAL_WIDTH", &v)?),
            None => defaults.constraints.ideal_width,
        };

        let ideal_height = match lookup("TRACE_SCAN_IDEAL_HEIGHT") {
            Some(v) => Some(parse_number("TRACE_SCAN_IDEAL_HEIGHT", &v)?),
            None => defaults.constraints.ideal_height,
        };

        let idle_timeout_ms = match lookup("TRACE_SCAN_IDLE_TIMEOUT_MS") {
            Some(v) => Some(parse_number("TRACE_SCAN_IDLE_TIMEOUT_MS", &v)?),
            None => defaults.idle_timeout_ms,
        };

        let allow_fallback = match lookup("TRACE_SCAN_FALLBACK") {
            Some(v) => parse_bool("TRACE_SCAN_FALLBACK", &v)?,
            None => defaults.allow_fallback,
        };

        let config = Self {
            sample_interval_ms,
            constraints: CaptureConstraints {
                facing,
                ideal_width,
                ideal_height,
            },
            allow_fallback,
            idle_timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sample interval must be greater than zero".to_string(),
            ));
        }
        if self.idle_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "idle timeout must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_facing(value: &str) -> Result<Option<FacingMode>, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "environment" | "rear" | "back" => Ok(Some(FacingMode::Environment)),
        "user" | "front" => Ok(Some(FacingMode::User)),
        "any" | "" => Ok(None),
        _ => Err(ConfigError::InvalidValue {
            key: "TRACE_SCAN_FACING".to_string(),
            value: value.to_string(),
        }),
    }
}
