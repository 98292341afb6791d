//! Strongly-typed client configuration.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::adapters::tcp_adapter::DEFAULT_TCL_PORT;
use crate::hardware::normalize_uri;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or merging the sources failed.
    #[error("Configuration load error: {0}")]
    LoadError(#[from] Box<figment::Error>),
    /// A loaded value is out of range.
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
    /// Rendering the configuration failed.
    #[error("Configuration write error: {0}")]
    WriteError(#[from] toml::ser::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IxeConfig {
    /// Logging settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Chassis and Tcl server connection
    pub chassis: ChassisConfig,
    /// Login and port defaults
    #[serde(default)]
    pub session: SessionConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Protocol variant used to reach the Tcl server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    /// IxTclServer socket protocol.
    #[default]
    Socket,
    /// Embedded Tcl interpreter; not supported.
    Tcl,
}

impl std::fmt::Display for ApiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiType::Socket => f.write_str("Socket"),
            ApiType::Tcl => f.write_str("Tcl"),
        }
    }
}

/// Chassis / Tcl server connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChassisConfig {
    /// Chassis host name or IP address (also the Tcl server host)
    pub host: String,
    /// Tcl server port
    #[serde(default = "default_tcl_port")]
    pub port: u16,
    /// Tcl API variant
    #[serde(default)]
    pub api: ApiType,
    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// Default session behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// User name for `ixLogin`
    #[serde(default = "default_user_name")]
    pub user_name: String,
    /// Ports to reserve, `chassis/card/port`
    #[serde(default)]
    pub ports: Vec<String>,
    /// Take ports owned by other users
    #[serde(default)]
    pub force: bool,
    /// Reset ports to factory defaults on reservation
    #[serde(default = "default_clear")]
    pub clear: bool,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tcl_port() -> u16 {
    DEFAULT_TCL_PORT
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_user_name() -> String {
    "rust_ixe".to_string()
}

fn default_clear() -> bool {
    true
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_tcl_port(),
            api: ApiType::default(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_name: default_user_name(),
            ports: Vec::new(),
            force: false,
            clear: default_clear(),
        }
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl ChassisConfig {
    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl IxeConfig {
    /// Load configuration from `config/ixe.toml` and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/ixe.toml")
    }

    /// Load configuration from a specific file path
    ///
    /// Values missing from the file fall back to the defaults; `IXE_`
    /// environment variables override both. The result is validated.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(IxeConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("IXE_").split("__"))
            .extract()
            .map_err(|e| ConfigError::LoadError(Box::new(e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks the log level, the chassis host and port, and that every port
    /// address has three components.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.chassis.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "chassis.host cannot be empty".to_string(),
            ));
        }
        if self.chassis.port == 0 {
            return Err(ConfigError::ValidationError(
                "chassis.port cannot be 0".to_string(),
            ));
        }

        for port in &self.session.ports {
            let uri = normalize_uri(port);
            let parts: Vec<&str> = uri.split(' ').collect();
            if parts.len() != 3 || parts.iter().any(|p| p.parse::<u32>().is_err()) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid port '{}'. Expected chassis/card/port",
                    port
                )));
            }
        }

        Ok(())
    }

    /// Render the configuration as a TOML document `load_from` accepts.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_load_with_defaults() {
        let file = write_config(
            r#"
[chassis]
host = "192.168.1.10"

[session]
ports = ["1/1/1", "1/1/2"]
"#,
        );
        let config = IxeConfig::load_from(file.path()).unwrap();
        assert_eq!(config.chassis.host, "192.168.1.10");
        assert_eq!(config.chassis.port, 4555);
        assert_eq!(config.chassis.api, ApiType::Socket);
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.session.ports.len(), 2);
        assert!(config.session.clear);
        assert!(!config.session.force);
    }

    #[test]
    #[serial]
    fn test_env_override() {
        let file = write_config("[chassis]\nhost = \"10.0.0.1\"\n");
        std::env::set_var("IXE_CHASSIS__PORT", "8022");
        let config = IxeConfig::load_from(file.path());
        std::env::remove_var("IXE_CHASSIS__PORT");
        assert_eq!(config.unwrap().chassis.port, 8022);
    }

    #[test]
    #[serial]
    fn test_tcl_api_parses() {
        let file = write_config("[chassis]\nhost = \"10.0.0.1\"\napi = \"tcl\"\n");
        let config = IxeConfig::load_from(file.path()).unwrap();
        assert_eq!(config.chassis.api, ApiType::Tcl);
    }

    #[test]
    #[serial]
    fn test_rendered_config_loads_back() {
        let mut config = IxeConfig::default();
        config.chassis.host = "10.0.0.7".to_string();
        config.chassis.api = ApiType::Tcl;
        config.session.ports = vec!["1/2/3".to_string()];
        config.session.clear = false;

        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("api = \"tcl\""));
        let file = write_config(&rendered);
        let loaded = IxeConfig::load_from(file.path()).unwrap();
        assert_eq!(loaded.chassis.host, "10.0.0.7");
        assert_eq!(loaded.chassis.api, ApiType::Tcl);
        assert_eq!(loaded.session.ports, vec!["1/2/3"]);
        assert!(!loaded.session.clear);
        assert_eq!(loaded.chassis.connect_timeout_ms, 5000);
    }

    #[test]
    fn test_validate_rejects_bad_port() {
        let mut config = IxeConfig::default();
        config.session.ports = vec!["1/1".to_string()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_log_level() {
        let mut config = IxeConfig::default();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
