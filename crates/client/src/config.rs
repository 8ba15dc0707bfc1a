use std::time::Duration;

use crate::poller::{DEFAULT_PLAN_INTERVAL, DEFAULT_VIDEO_INTERVAL};
use crate::session::TrackingConfig;

/// Environment variable holding the backend base URL.
pub const API_URL_VAR: &str = "MANIMGEN_API_URL";

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL, treated as opaque.
    pub api_url: String,
    /// Poll intervals and give-up policy.
    pub tracking: TrackingConfig,
}

/// Errors while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                  | Default  |
    /// |--------------------------|----------|
    /// | `MANIMGEN_API_URL`       | required |
    /// | `PLAN_POLL_INTERVAL_MS`  | `2000`   |
    /// | `VIDEO_POLL_INTERVAL_MS` | `3000`   |
    /// | `POLL_NOT_FOUND_LIMIT`   | unset (poll forever) |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup(API_URL_VAR)
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(API_URL_VAR))?;

        let mut tracking = TrackingConfig::default();
        tracking.plan.interval =
            interval_ms(&lookup, "PLAN_POLL_INTERVAL_MS")?.unwrap_or(DEFAULT_PLAN_INTERVAL);
        tracking.video.interval =
            interval_ms(&lookup, "VIDEO_POLL_INTERVAL_MS")?.unwrap_or(DEFAULT_VIDEO_INTERVAL);

        let not_found_limit = positive(&lookup, "POLL_NOT_FOUND_LIMIT")?;
        tracking.plan.not_found_limit = not_found_limit;
        tracking.video.not_found_limit = not_found_limit;

        Ok(Self { api_url, tracking })
    }
}

fn interval_ms(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(positive(lookup, var)?.map(|ms| Duration::from_millis(u64::from(ms))))
}

/// Parse an optional strictly positive integer.
fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u32>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::Invalid {
            var,
            expected: "a positive integer",
            value,
        }),
    }
}
