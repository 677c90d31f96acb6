//! Runtime settings.
//!
//! Loaded once at startup from an optional TOML file and `TDSWATCH_*`
//! environment variables, the latter taking precedence. Nested keys use a
//! double underscore: `TDSWATCH_MQTT__HOST`, `TDSWATCH_PUSHOVER__TOKEN`.
//!
//! ```toml
//! window_capacity = 10
//! data_save_dir = "/var/lib/tdswatch"
//! min_tds = 400.0
//!
//! [mqtt]
//! host = "broker.local"
//!
//! [pushover]
//! token = "app-token"
//! user = "user-key"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

use crate::alert::ResetPolicy;
use crate::error::ConfigError;
use crate::supervisor::RetryPolicy;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "TDSWATCH";

#[derive(Debug, Clone, Deserialize)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub topic: String,
    pub keep_alive_secs: u64,
}

#[derive(Clone, Deserialize)]
pub struct PushoverSettings {
    pub token: String,
    pub user: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for PushoverSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushoverSettings")
            .field("token", &"<redacted>")
            .field("user", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub interval_secs: u64,
}

/// All runtime settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub mqtt: MqttSettings,
    /// Readings averaged into one record.
    pub window_capacity: usize,
    /// Directory holding the history log and chart images.
    pub data_save_dir: PathBuf,
    /// History log file name inside `data_save_dir`.
    pub data_file: String,
    /// Alert threshold in ppm, inclusive.
    pub min_tds: f64,
    pub history_hours: u32,
    pub alert_reset: ResetPolicy,
    pub pushover: PushoverSettings,
    pub retry: RetrySettings,
}

impl Settings {
    /// Load from `path` (if given) and the environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        Self::from_config(builder.build()?)
    }

    /// Parse TOML text on top of the defaults, then validate.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config = defaults()?
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_capacity == 0 {
            return Err(ConfigError::invalid("window_capacity", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.mqtt.topic.trim().is_empty() {
            return Err(ConfigError::invalid("mqtt.topic", "must not be empty"));
        }
        if !self.min_tds.is_finite() {
            return Err(ConfigError::invalid("min_tds", "must be a finite number"));
        }
        if self.history_hours == 0 {
            return Err(ConfigError::invalid("history_hours", "must be at least 1"));
        }
        Ok(())
    }

    /// Full path of the history log.
    pub fn history_path(&self) -> PathBuf {
        self.data_save_dir.join(&self.data_file)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.interval_secs),
        )
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.mqtt.keep_alive_secs)
    }

    pub fn pushover_timeout(&self) -> Duration {
        Duration::from_secs(self.pushover.timeout_secs)
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    Config::builder()
        .set_default("mqtt.host", "localhost")?
        .set_default("mqtt.port", 1883)?
        .set_default("mqtt.client_id", "tdswatch")?
        .set_default("mqtt.topic", "aerogarden/tds")?
        .set_default("mqtt.keep_alive_secs", 30)?
        .set_default("data_file", "tds.csv")?
        .set_default("history_hours", 48)?
        .set_default("alert_reset", "on-recovery")?
        .set_default(
            "pushover.endpoint",
            tdswatch_adapters::pushover::DEFAULT_ENDPOINT,
        )?
        .set_default("pushover.timeout_secs", 10)?
        .set_default("retry.max_attempts", 10)?
        .set_default("retry.interval_secs", 5)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        window_capacity = 10
        data_save_dir = "/tmp/tds"
        min_tds = 400.0

        [pushover]
        token = "tok"
        user = "usr"
    "#;

    #[test]
    fn test_defaults_fill_optional_keys() {
        let settings = Settings::from_toml(MINIMAL).unwrap();
        assert_eq!(settings.mqtt.host, "localhost");
        assert_eq!(settings.mqtt.port, 1883);
        assert_eq!(settings.mqtt.topic, "aerogarden/tds");
        assert_eq!(settings.history_hours, 48);
        assert_eq!(settings.alert_reset, ResetPolicy::OnRecovery);
        assert_eq!(settings.history_path(), PathBuf::from("/tmp/tds/tds.csv"));
        assert_eq!(settings.retry_policy(), RetryPolicy::default());
        assert_eq!(settings.pushover_timeout(), Duration::from_secs(10));
        assert_eq!(settings.pushover.endpoint, "https://api.pushover.net/1/messages.json");
    }

    #[test]
    fn test_overrides() {
        let text = r#"
            window_capacity = 5
            data_save_dir = "/data"
            data_file = "garden.csv"
            min_tds = 350.5
            alert_reset = "never"

            [mqtt]
            host = "broker"
            port = 8883

            [pushover]
            token = "t"
            user = "u"

            [retry]
            max_attempts = 3
            interval_secs = 1
        "#;
        let settings = Settings::from_toml(text).unwrap();
        assert_eq!(settings.alert_reset, ResetPolicy::Never);
        assert_eq!(settings.mqtt.host, "broker");
        assert_eq!(settings.mqtt.port, 8883);
        assert_eq!(settings.mqtt.client_id, "tdswatch");
        assert_eq!(settings.history_path(), PathBuf::from("/data/garden.csv"));
        assert_eq!(
            settings.retry_policy(),
            RetryPolicy::new(3, Duration::from_secs(1))
        );
    }

    #[test]
    fn test_required_keys() {
        let err = Settings::from_toml("min_tds = 1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let text = MINIMAL.replace("window_capacity = 10", "window_capacity = 0");
        let err = Settings::from_toml(&text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "window_capacity",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_attempts_is_rejected() {
        let text = format!("{}\n[retry]\nmax_attempts = 0\n", MINIMAL);
        let err = Settings::from_toml(&text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "retry.max_attempts",
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_reset_policy() {
        let text = format!("alert_reset = \"sometimes\"\n{}", MINIMAL);
        assert!(Settings::from_toml(&text).is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let settings = Settings::from_toml(MINIMAL).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("\"tok\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_load_applies_environment_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        std::env::set_var("TDSWATCH_MQTT__HOST", "env-broker");
        std::env::set_var("TDSWATCH_PUSHOVER__TOKEN", "env-token");
        std::env::set_var("TDSWATCH_RETRY__MAX_ATTEMPTS", "4");
        let result = Settings::load(Some(&path));
        std::env::remove_var("TDSWATCH_MQTT__HOST");
        std::env::remove_var("TDSWATCH_PUSHOVER__TOKEN");
        std::env::remove_var("TDSWATCH_RETRY__MAX_ATTEMPTS");

        let settings = result.unwrap();
        assert_eq!(settings.mqtt.host, "env-broker");
        assert_eq!(settings.pushover.token, "env-token");
        assert_eq!(settings.retry.max_attempts, 4);
        // Keys only in the file survive
        assert_eq!(settings.pushover.user, "usr");
        assert_eq!(settings.window_capacity, 10);
    }
}
