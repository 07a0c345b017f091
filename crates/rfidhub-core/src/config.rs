//! Hub configuration.
//!
//! Configuration is read from a TOML file with one table per concern:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8899"
//!
//! [device]
//! port = 6005
//! handshake_timeout_secs = 5
//!
//! [sip]
//! addr = "koha.local:6001"
//! username = "autouser"
//! password = "secret"
//! institution = "hutl"
//! pool_size = 3
//!
//! [ui]
//! write_timeout_secs = 5
//! pong_wait_secs = 60
//! max_message_size = 512
//!
//! [station]
//! backend_failure_policy = "continue"
//! ```
//!
//! Every field has a default, and the variables in [`env_vars`] override
//! the file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Environment variable names.
pub mod env_vars {
    pub const BIND: &str = "RFIDHUB_BIND";
    pub const DEVICE_PORT: &str = "RFIDHUB_DEVICE_PORT";
    pub const SIP_ADDR: &str = "RFIDHUB_SIP_ADDR";
    pub const SIP_USER: &str = "RFIDHUB_SIP_USER";
    pub const SIP_PASSWORD: &str = "RFIDHUB_SIP_PASSWORD";
    pub const SIP_INSTITUTION: &str = "RFIDHUB_SIP_INSTITUTION";
    pub const BACKEND_FAILURE_POLICY: &str = "RFIDHUB_BACKEND_FAILURE_POLICY";
    /// Read by the binary only: `true` switches logs to JSON
    pub const LOG_JSON: &str = "RFIDHUB_LOG_JSON";
}

/// HTTP / WebSocket listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8899".to_string(),
        }
    }
}

/// RFID device connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// TCP port the reader listens on at the station's address
    pub port: u16,
    pub connect_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: 6005,
            connect_timeout_secs: 5,
            handshake_timeout_secs: 5,
        }
    }
}

impl DeviceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// SIP2 circulation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipConfig {
    pub addr: String,
    pub username: String,
    pub password: String,
    /// Institution id (AO field)
    pub institution: String,
    /// Location code sent on login (CP field)
    pub location: String,
    /// Terminal password (AC field)
    pub terminal_password: String,
    pub pool_size: usize,
    pub call_timeout_secs: u64,
}

impl Default for SipConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6001".to_string(),
            username: String::new(),
            password: String::new(),
            institution: String::new(),
            location: String::new(),
            terminal_password: String::new(),
            pool_size: 3,
            call_timeout_secs: 10,
        }
    }
}

impl SipConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Browser connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub write_timeout_secs: u64,
    pub pong_wait_secs: u64,
    /// Largest inbound frame accepted, in bytes
    pub max_message_size: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            write_timeout_secs: 5,
            pong_wait_secs: 60,
            max_message_size: 512,
        }
    }
}

impl UiConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    /// Pings go out slightly more often than the read deadline.
    pub fn ping_interval(&self) -> Duration {
        self.pong_wait() * 9 / 10
    }
}

/// What a station does when the backend checkin call fails mid-batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendFailurePolicy {
    /// Report the failure and keep scanning
    #[default]
    Continue,
    /// Report the failure and release the tag
    Release,
    /// Report the failure and end the scan batch
    Abort,
}

impl std::str::FromStr for BackendFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "release" => Ok(Self::Release),
            "abort" => Ok(Self::Abort),
            other => Err(other.to_string()),
        }
    }
}

/// Station actor behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub backend_failure_policy: BackendFailurePolicy,
}

/// Complete hub configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub device: DeviceConfig,
    pub sip: SipConfig,
    pub ui: UiConfig,
    pub station: StationConfig,
}

impl HubConfig {
    /// Load configuration from an optional file, then apply the process
    /// environment and validate.
    ///
    /// A path that does not exist yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(env_vars::BIND) {
            self.server.bind = bind;
        }
        if let Some(port) = lookup(env_vars::DEVICE_PORT) {
            self.device.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                key: env_vars::DEVICE_PORT,
                value: port,
            })?;
        }
        if let Some(addr) = lookup(env_vars::SIP_ADDR) {
            self.sip.addr = addr;
        }
        if let Some(user) = lookup(env_vars::SIP_USER) {
            self.sip.username = user;
        }
        if let Some(password) = lookup(env_vars::SIP_PASSWORD) {
            self.sip.password = password;
        }
        if let Some(institution) = lookup(env_vars::SIP_INSTITUTION) {
            self.sip.institution = institution;
        }
        if let Some(policy) = lookup(env_vars::BACKEND_FAILURE_POLICY) {
            self.station.backend_failure_policy =
                policy.parse().map_err(|value| ConfigError::InvalidEnv {
                    key: env_vars::BACKEND_FAILURE_POLICY,
                    value,
                })?;
        }
        Ok(())
    }

    /// Reject values that would make the hub unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sip.pool_size == 0 {
            return Err(ConfigError::Invalid("sip.pool_size must be at least 1".into()));
        }
        if self.sip.call_timeout_secs == 0 {
            return Err(ConfigError::Invalid("sip.call_timeout_secs must be positive".into()));
        }
        if self.device.connect_timeout_secs == 0 || self.device.handshake_timeout_secs == 0 {
            return Err(ConfigError::Invalid("device timeouts must be positive".into()));
        }
        if self.ui.write_timeout_secs == 0 || self.ui.pong_wait_secs == 0 {
            return Err(ConfigError::Invalid("ui timeouts must be positive".into()));
        }
        if self.ui.max_message_size == 0 {
            return Err(ConfigError::Invalid("ui.max_message_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.server.bind, "0.0.0.0:8899");
        assert_eq!(config.device.port, 6005);
        assert_eq!(config.sip.pool_size, 3);
        assert_eq!(config.ui.max_message_size, 512);
        assert_eq!(
            config.station.backend_failure_policy,
            BackendFailurePolicy::Continue
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HubConfig::from_toml(
            r#"
            [sip]
            addr = "koha:6001"
            institution = "hutl"

            [station]
            backend_failure_policy = "abort"
            "#,
        )
        .unwrap();
        assert_eq!(config.sip.addr, "koha:6001");
        assert_eq!(config.sip.institution, "hutl");
        assert_eq!(config.sip.pool_size, 3);
        assert_eq!(config.device.port, 6005);
        assert_eq!(config.station.backend_failure_policy, BackendFailurePolicy::Abort);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (env_vars::DEVICE_PORT, "7000"),
            (env_vars::SIP_ADDR, "sip:1"),
            (env_vars::BACKEND_FAILURE_POLICY, "Release"),
        ]
        .into_iter()
        .collect();

        let mut config = HubConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.device.port, 7000);
        assert_eq!(config.sip.addr, "sip:1");
        assert_eq!(
            config.station.backend_failure_policy,
            BackendFailurePolicy::Release
        );
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = HubConfig::default();
        let result = config.apply_env(|key| {
            (key == env_vars::DEVICE_PORT).then(|| "not-a-port".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_pool() {
        let mut config = HubConfig::default();
        config.sip.pool_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_ping_interval_below_pong_wait() {
        let ui = UiConfig::default();
        assert_eq!(ui.ping_interval(), Duration::from_secs(54));
        assert!(ui.ping_interval() < ui.pong_wait());
    }
}
