//! Bus and id-generator configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for a [`SessionIdManager`](crate::SessionIdManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionIdConfig {
    pub prefix: String,
    pub suffix: String,
    pub start: u64,
    pub step: u64,
}

impl Default for SessionIdConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            start: 0,
            step: 1,
        }
    }
}

impl SessionIdConfig {
    /// Reject a zero `step`, which would hand out the same id forever.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step == 0 {
            return Err(ConfigError::ZeroStep);
        }
        Ok(())
    }
}

/// Settings for a root [`MessageBus`](crate::MessageBus).
///
/// The name labels the bus in logs and errors, and prefixes the names of
/// every delivery bus created beneath it (`root/0`, `root/0/2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub name: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { name: "bus".into() }
    }
}

impl BusConfig {
    /// Default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Load and validate a configuration from JSON.
    ///
    /// ```
    /// use nestbus::BusConfig;
    ///
    /// let config = BusConfig::from_json(r#"{"name":"orders"}"#).unwrap();
    /// assert_eq!(config.name, "orders");
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject an empty name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        Ok(())
    }

    /// Id generator used to name the consumers registered on this bus.
    pub(crate) fn consumer_ids(&self) -> SessionIdConfig {
        SessionIdConfig {
            prefix: format!("{}/", self.name),
            ..SessionIdConfig::default()
        }
    }
}
