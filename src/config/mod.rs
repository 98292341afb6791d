//! Client configuration
//!
//! Configuration is loaded with Figment from (in order of precedence):
//! 1. Environment variables prefixed with `IXE_`, nested keys separated by `__`
//! 2. TOML configuration file (default: `config/ixe.toml`)
//!
//! # Example
//!
//! ```no_run
//! use rust_ixe::config::IxeConfig;
//!
//! let config = IxeConfig::load_from("config/ixe.toml")?;
//! println!("Chassis: {}:{}", config.chassis.host, config.chassis.port);
//! # Ok::<(), rust_ixe::config::ConfigError>(())
//! ```
//!
//! # Environment Variables
//!
//! ```text
//! IXE_CHASSIS__HOST=192.168.1.10
//! IXE_APPLICATION__LOG_LEVEL=debug
//! IXE_SESSION__FORCE=true
//! ```

/// Configuration types and loading.
pub mod ixe_config;

pub use ixe_config::{
    ApiType, ApplicationConfig, ChassisConfig, ConfigError, IxeConfig, SessionConfig,
};
