//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;
use totem_core::{parse_timezone, FundGoal};

/// Configuration for a tribe client.
#[derive(Debug, Clone)]
pub struct TribeConfig {
    /// Data directory for local storage
    pub data_dir: PathBuf,

    /// Tribe endpoint to connect to when none is stored yet
    pub tribe_url: Option<String>,

    /// Timezone given to members that have none set
    pub default_timezone: Option<String>,

    /// Upper bound on a single request to the tribe endpoint
    pub http_timeout: Duration,

    /// What the shared fund is saving towards
    pub fund_goal: FundGoal,
}

impl Default for TribeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl TribeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(
            std::env::var("TOTEM_DATA_DIR").unwrap_or_else(|_| "./totem-data".to_string()),
        );

        let tribe_url = non_empty_var("TOTEM_TRIBE_URL");

        // Fall back to the host's zone so new members see the same day the machine does.
        let default_timezone = non_empty_var("TOTEM_TIMEZONE")
            .and_then(|tz| checked_timezone("TOTEM_TIMEZONE", &tz))
            .or_else(|| non_empty_var("TZ").and_then(|tz| checked_timezone("TZ", &tz)))
            .or_else(host_timezone);

        let http_timeout = Duration::from_secs(parse_var("TOTEM_HTTP_TIMEOUT_SECS", 30));

        let defaults = FundGoal::default();
        let fund_goal = FundGoal {
            name: non_empty_var("TOTEM_FUND_GOAL_NAME").unwrap_or(defaults.name),
            amount: parse_var("TOTEM_FUND_GOAL_AMOUNT", defaults.amount),
        };

        Self {
            data_dir,
            tribe_url,
            default_timezone,
            http_timeout,
            fund_goal,
        }
    }

    /// Config rooted at `data_dir` with every other value at its default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            tribe_url: None,
            default_timezone: None,
            http_timeout: Duration::from_secs(30),
            fund_goal: FundGoal::default(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn host_timezone() -> Option<String> {
    match iana_time_zone::get_timezone() {
        Ok(tz) => checked_timezone("host timezone", &tz),
        Err(e) => {
            tracing::debug!("Could not detect host timezone: {}", e);
            None
        }
    }
}

/// `name` if it is a known IANA zone. POSIX `TZ` values may carry a leading `:`.
fn checked_timezone(source: &str, name: &str) -> Option<String> {
    let name = name.trim_start_matches(':');
    match parse_timezone(name) {
        Ok(_) => Some(name.to_string()),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not an IANA timezone", source, name);
            None
        }
    }
}

fn parse_var<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match non_empty_var(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_data_dir_uses_defaults() {
        let config = TribeConfig::with_data_dir("/tmp/totem-test");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/totem-test"));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.fund_goal, FundGoal::default());
        assert!(config.tribe_url.is_none());
    }

    #[test]
    fn malformed_numbers_fall_back() {
        std::env::set_var("TOTEM_TEST_PARSE_VAR", "soon");
        assert_eq!(parse_var("TOTEM_TEST_PARSE_VAR", 30u64), 30);
        std::env::set_var("TOTEM_TEST_PARSE_VAR", " 45 ");
        assert_eq!(parse_var("TOTEM_TEST_PARSE_VAR", 30u64), 45);
        std::env::remove_var("TOTEM_TEST_PARSE_VAR");
        assert_eq!(parse_var("TOTEM_TEST_PARSE_VAR", 30u64), 30);
    }

    #[test]
    fn only_iana_timezones_are_accepted() {
        assert_eq!(checked_timezone("TZ", ":/etc/localtime"), None);
        assert_eq!(checked_timezone("TZ", "Mars/Olympus_Mons"), None);
        assert_eq!(
            checked_timezone("TZ", ":Asia/Kolkata").as_deref(),
            Some("Asia/Kolkata")
        );
        assert_eq!(
            checked_timezone("TOTEM_TIMEZONE", "Europe/Paris").as_deref(),
            Some("Europe/Paris")
        );
    }

    #[test]
    fn invalid_configured_timezone_is_dropped() {
        std::env::set_var("TOTEM_TIMEZONE", ":/etc/localtime");
        let config = TribeConfig::from_env();
        std::env::remove_var("TOTEM_TIMEZONE");

        // Whatever fallback wins must itself be a usable zone.
        if let Some(tz) = &config.default_timezone {
            assert_ne!(tz, ":/etc/localtime");
            assert!(parse_timezone(tz).is_ok());
        }
    }
}
