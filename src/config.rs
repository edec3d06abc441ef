//! Configuration module for the weather streamer.
//!
//! All settings come from environment variables. The connection string is the
//! only required one; everything else falls back to a default.

use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Environment variable holding the Event Hub connection string.
pub const CONNECTION_STRING_VAR: &str = "EVENT_HUB_CONNECTION_STRING";

/// Environment variable holding the target Event Hub name.
pub const EVENT_HUB_NAME_VAR: &str = "EVENT_HUB_NAME";

/// Environment variable holding the delay between publishes, in seconds.
pub const SEND_INTERVAL_VAR: &str = "WEATHER_SEND_INTERVAL_SECS";

/// Default Event Hub name
pub const DEFAULT_EVENT_HUB_NAME: &str = "eh-streaming";

/// Default delay between publishes in seconds
const DEFAULT_SEND_INTERVAL_SECS: u64 = 10;

/// Minimum send interval to avoid flooding the hub
const MIN_SEND_INTERVAL_SECS: u64 = 1;

/// Maximum send interval
const MAX_SEND_INTERVAL_SECS: u64 = 3600;

/// Resolved configuration for the weather streamer.
///
/// - `EVENT_HUB_CONNECTION_STRING`: connection credential (required)
/// - `EVENT_HUB_NAME`: target hub (default: `eh-streaming`)
/// - `WEATHER_SEND_INTERVAL_SECS`: seconds between readings (default: 10)
#[derive(Clone)]
pub struct Config {
    /// Connection string for the Event Hubs namespace
    pub connection_string: String,

    /// Name of the Event Hub to publish to
    pub event_hub_name: String,

    /// Delay after each successful publish
    pub send_interval: Duration,
}

/// Error type for configuration loading failures
#[derive(Debug, Error)]
#[error("Configuration error for {env_var}: {message}")]
pub struct ConfigError {
    pub message: String,
    pub env_var: String,
}

impl ConfigError {
    fn new(env_var: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            env_var: env_var.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `EVENT_HUB_CONNECTION_STRING` is unset or blank
    /// - `WEATHER_SEND_INTERVAL_SECS` is not a number or out of range
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// `from_env` delegates here; tests pass a map instead of touching the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Checked first: nothing else matters without a credential
        let connection_string = lookup(CONNECTION_STRING_VAR)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::new(CONNECTION_STRING_VAR, "environment variable is not set")
            })?;

        let event_hub_name = lookup(EVENT_HUB_NAME_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT_HUB_NAME.to_string());

        let send_interval = Duration::from_secs(Self::parse_send_interval(
            lookup(SEND_INTERVAL_VAR),
        )?);

        Ok(Self {
            connection_string,
            event_hub_name,
            send_interval,
        })
    }

    /// Parse the send interval with range validation.
    fn parse_send_interval(raw: Option<String>) -> Result<u64, ConfigError> {
        let Some(value) = raw else {
            return Ok(DEFAULT_SEND_INTERVAL_SECS);
        };

        let interval: u64 = value.trim().parse().map_err(|_| {
            ConfigError::new(SEND_INTERVAL_VAR, format!("'{}' is not a valid number", value))
        })?;

        if interval < MIN_SEND_INTERVAL_SECS {
            return Err(ConfigError::new(
                SEND_INTERVAL_VAR,
                format!(
                    "send interval {} is below minimum ({}s)",
                    interval, MIN_SEND_INTERVAL_SECS
                ),
            ));
        }

        if interval > MAX_SEND_INTERVAL_SECS {
            return Err(ConfigError::new(
                SEND_INTERVAL_VAR,
                format!(
                    "send interval {} exceeds maximum ({}s)",
                    interval, MAX_SEND_INTERVAL_SECS
                ),
            ));
        }

        Ok(interval)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("connection_string", &"<redacted>")
            .field("event_hub_name", &self.event_hub_name)
            .field("send_interval", &self.send_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const CONN: &str = "Endpoint=sb://contoso.servicebus.windows.net/;SharedAccessKeyName=send;SharedAccessKey=abc";

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_missing_connection_string() {
        let err = load(&[(EVENT_HUB_NAME_VAR, "hub")]).unwrap_err();
        assert_eq!(err.env_var, CONNECTION_STRING_VAR);
        assert!(err.message.contains("not set"));
    }

    #[test]
    fn test_blank_connection_string() {
        assert!(load(&[(CONNECTION_STRING_VAR, "")]).is_err());
        assert!(load(&[(CONNECTION_STRING_VAR, "   ")]).is_err());
    }

    #[test]
    fn test_default_event_hub_name() {
        let config = load(&[(CONNECTION_STRING_VAR, CONN)]).expect("Should load with defaults");
        assert_eq!(config.event_hub_name, "eh-streaming");
        assert_eq!(config.send_interval, Duration::from_secs(10));
        assert_eq!(config.connection_string, CONN);
    }

    #[test]
    fn test_empty_event_hub_name_uses_default() {
        let config = load(&[(CONNECTION_STRING_VAR, CONN), (EVENT_HUB_NAME_VAR, "")]).unwrap();
        assert_eq!(config.event_hub_name, DEFAULT_EVENT_HUB_NAME);
    }

    #[test]
    fn test_custom_values() {
        let config = load(&[
            (CONNECTION_STRING_VAR, CONN),
            (EVENT_HUB_NAME_VAR, "weather"),
            (SEND_INTERVAL_VAR, "30"),
        ])
        .expect("Should load custom values");
        assert_eq!(config.event_hub_name, "weather");
        assert_eq!(config.send_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_send_interval() {
        let err = load(&[(CONNECTION_STRING_VAR, CONN), (SEND_INTERVAL_VAR, "soon")]).unwrap_err();
        assert!(err.message.contains("not a valid number"));

        let err = load(&[(CONNECTION_STRING_VAR, CONN), (SEND_INTERVAL_VAR, "0")]).unwrap_err();
        assert!(err.message.contains("below minimum"));

        let err = load(&[(CONNECTION_STRING_VAR, CONN), (SEND_INTERVAL_VAR, "86400")]).unwrap_err();
        assert!(err.message.contains("exceeds maximum"));
    }

    #[test]
    fn test_missing_credential_reported_before_interval() {
        let err = load(&[(SEND_INTERVAL_VAR, "nope")]).unwrap_err();
        assert_eq!(err.env_var, CONNECTION_STRING_VAR);
    }

    #[test]
    fn test_debug_redacts_connection_string() {
        let config = load(&[(CONNECTION_STRING_VAR, CONN)]).unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("SharedAccessKey=abc"));
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::new("TEST_VAR", "test error");
        assert_eq!(
            format!("{}", error),
            "Configuration error for TEST_VAR: test error"
        );
    }
}
