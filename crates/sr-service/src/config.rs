//! Signaling Relay configuration.
//!
//! Configuration is loaded from environment variables. The relay keeps the
//! original deployment contract of the service it replaces: the listening
//! port comes from `PORT` (default 5000), and a single listener serves
//! signaling, health and metrics.

use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default listening port when neither `PORT` nor `SR_BIND_ADDRESS` is set.
pub const DEFAULT_PORT: u16 = 5000;

/// Default relay instance id prefix.
pub const DEFAULT_RELAY_ID_PREFIX: &str = "sr";

/// Signaling Relay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address the HTTP listener binds to (default: "0.0.0.0:5000").
    pub bind_address: String,

    /// Unique identifier for this relay instance.
    pub relay_id: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        // SR_BIND_ADDRESS wins over PORT; PORT keeps the original contract.
        let bind_address = match vars.get("SR_BIND_ADDRESS") {
            Some(addr) => addr.clone(),
            None => {
                let port: u16 = match vars.get("PORT") {
                    Some(raw) => raw.parse().map_err(|_| {
                        ConfigError::InvalidValue(format!("PORT is not a valid port: {raw}"))
                    })?,
                    None => DEFAULT_PORT,
                };
                format!("0.0.0.0:{port}")
            }
        };

        let relay_id = vars.get("SR_ID").cloned().unwrap_or_else(|| {
            let hostname = vars
                .get("HOSTNAME")
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_RELAY_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            bind_address,
            relay_id,
        })
    }
}
