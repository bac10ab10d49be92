use std::{path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::error;

use crate::infra::backoff::BackoffConfig;

pub const DEFAULT_API_BASE: &str = "https://xn--h1aahgceagbyl.xn--p1ai/api";
pub const DEFAULT_CATEGORY_ID: u64 = 2418;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Process settings. Read from an optional TOML file, then from the process
/// environment (`AUTO_REFUND=yes`, `BACKOFF__MAX_MS=10000`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,

    #[serde(default)]
    pub marketplace_url: String,
    #[serde(default)]
    pub marketplace_token: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_user: String,
    #[serde(default)]
    pub api_pass: String,

    #[serde(default)]
    pub directory_url: String,
    #[serde(default)]
    pub directory_token: Option<String>,

    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub auto_refund: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub auto_deactivate: bool,
    #[serde(default = "default_category_id")]
    pub category_id: u64,
    #[serde(default)]
    pub deactivate_category_id: Option<u64>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_token_refresh_secs")]
    pub token_refresh_secs: u64,
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: f64,
    #[serde(default = "default_deactivate_delay_ms")]
    pub deactivate_delay_ms: u64,

    #[serde(default)]
    pub backoff: BackoffConfig,
}

fn default_logs_dir() -> String {
    "logs".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_cooldown_seconds() -> f64 {
    1.0
}

fn default_category_id() -> u64 {
    DEFAULT_CATEGORY_ID
}

fn default_poll_interval_secs() -> f64 {
    3.0
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_token_refresh_secs() -> u64 {
    50 * 60
}

fn default_lookup_timeout_secs() -> f64 {
    15.0
}

fn default_deactivate_delay_ms() -> u64 {
    200
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value == 1,
        Flag::Text(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
    })
}

impl Settings {
    /// Loads settings from `config_path` (required when given, otherwise an
    /// optional `config.toml`) overlaid with the process environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, SettingsError> {
        let file = match config_path {
            Some(path) => File::from(path).required(true),
            None => File::from(Path::new("config.toml")).required(false),
        };

        let builder = Config::builder()
            .add_source(file)
            .add_source(Environment::default().separator("__"));

        match builder.build() {
            Ok(cfg) => Self::from_config(cfg),
            Err(err) => {
                error!("Failed to load configuration: {err}");
                Err(SettingsError::Load(err))
            }
        }
    }

    pub fn from_config(cfg: Config) -> Result<Self, SettingsError> {
        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let required = [
            ("marketplace_url", &self.marketplace_url),
            ("marketplace_token", &self.marketplace_token),
            ("api_user", &self.api_user),
            ("api_pass", &self.api_pass),
            ("directory_url", &self.directory_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(SettingsError::Missing(name));
            }
        }

        let seconds = [
            ("cooldown_seconds", self.cooldown_seconds),
            ("poll_interval_secs", self.poll_interval_secs),
            ("lookup_timeout_secs", self.lookup_timeout_secs),
        ];
        for (name, value) in seconds {
            if let Err(err) = Duration::try_from_secs_f64(value) {
                return Err(SettingsError::Invalid {
                    name,
                    reason: format!("invalid number of seconds {value}: {err}"),
                });
            }
        }

        if self.token_refresh_secs == 0 {
            return Err(SettingsError::Invalid {
                name: "token_refresh_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn deactivate_category(&self) -> u64 {
        self.deactivate_category_id.unwrap_or(self.category_id)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn token_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.token_refresh_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.lookup_timeout_secs)
    }

    pub fn deactivate_delay(&self) -> Duration {
        Duration::from_millis(self.deactivate_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_CATEGORY_ID, Settings, SettingsError};
    use config::Config;
    use std::time::Duration;

    fn base() -> config::ConfigBuilder<config::builder::DefaultState> {
        Config::builder()
            .set_override("marketplace_url", "http://market.local")
            .unwrap()
            .set_override("marketplace_token", "golden-key")
            .unwrap()
            .set_override("api_user", "seller")
            .unwrap()
            .set_override("api_pass", "secret")
            .unwrap()
            .set_override("directory_url", "http://directory.local")
            .unwrap()
    }

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let settings = Settings::from_config(base().build().unwrap()).unwrap();
        assert_eq!(settings.category_id, DEFAULT_CATEGORY_ID);
        assert_eq!(settings.deactivate_category(), DEFAULT_CATEGORY_ID);
        assert_eq!(settings.cooldown(), Duration::from_secs(1));
        assert_eq!(settings.token_refresh_interval(), Duration::from_secs(3000));
        assert_eq!(settings.lookup_timeout(), Duration::from_secs(15));
        assert!(!settings.auto_refund);
        assert!(!settings.auto_deactivate);
    }

    #[test]
    fn flags_accept_env_style_spellings() {
        for (raw, expected) in [("yes", true), ("ON", true), ("y", true), ("1", true), ("no", false), ("0", false)] {
            let cfg = base()
                .set_override("auto_refund", raw)
                .unwrap()
                .build()
                .unwrap();
            let settings = Settings::from_config(cfg).unwrap();
            assert_eq!(settings.auto_refund, expected, "flag value {raw}");
        }
    }

    #[test]
    fn deactivate_category_overrides_target() {
        let cfg = base()
            .set_override("deactivate_category_id", "777")
            .unwrap()
            .build()
            .unwrap();
        let settings = Settings::from_config(cfg).unwrap();
        assert_eq!(settings.deactivate_category(), 777);
    }

    #[test]
    fn missing_credentials_are_fatal() {
        let cfg = base().set_override("api_pass", "  ").unwrap().build().unwrap();
        let err = Settings::from_config(cfg).unwrap_err();
        assert!(matches!(err, SettingsError::Missing("api_pass")));
    }

    #[test]
    fn negative_cooldown_is_rejected() {
        let cfg = base()
            .set_override("cooldown_seconds", -1.0)
            .unwrap()
            .build()
            .unwrap();
        let err = Settings::from_config(cfg).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                name: "cooldown_seconds",
                ..
            }
        ));
    }

    #[test]
    fn overflowing_seconds_are_rejected_not_panicking() {
        for (name, value) in [
            ("cooldown_seconds", 1e20),
            ("poll_interval_secs", f64::INFINITY),
            ("lookup_timeout_secs", 1e30),
        ] {
            let cfg = base().set_override(name, value).unwrap().build().unwrap();
            let err = Settings::from_config(cfg).unwrap_err();
            assert!(
                matches!(err, SettingsError::Invalid { name: got, .. } if got == name),
                "setting {name}"
            );
        }
    }
}
