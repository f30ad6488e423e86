//! Monotonic session identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::SessionIdConfig;
use crate::error::ConfigError;

/// Generates `prefix + (start + n * step) + suffix` on the n-th call.
///
/// ```
/// use nestbus::{SessionIdConfig, SessionIdManager};
///
/// let ids = SessionIdManager::new(SessionIdConfig {
///     prefix: "prefix-".into(),
///     suffix: ".suffix".into(),
///     start: 0,
///     step: 512,
/// })
/// .unwrap();
///
/// assert_eq!(ids.next_id(), "prefix-0.suffix");
/// assert_eq!(ids.next_id(), "prefix-512.suffix");
/// ```
#[derive(Debug)]
pub struct SessionIdManager {
    config: SessionIdConfig,
    issued: AtomicU64,
}

impl SessionIdManager {
    /// Create a manager, rejecting a zero `step`.
    pub fn new(config: SessionIdConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            issued: AtomicU64::new(0),
        })
    }

    /// Build without validating; for configs constructed inside the crate.
    pub(crate) fn unchecked(config: SessionIdConfig) -> Self {
        Self {
            config,
            issued: AtomicU64::new(0),
        }
    }

    /// The next id. Values are computed in `u128`, so they keep increasing
    /// past `u64::MAX` instead of wrapping.
    pub fn next_id(&self) -> String {
        let n = u128::from(self.issued.fetch_add(1, Ordering::Relaxed));
        let value = u128::from(self.config.start) + n * u128::from(self.config.step);
        format!("{}{}{}", self.config.prefix, value, self.config.suffix)
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    /// The configuration ids are generated from.
    pub fn config(&self) -> &SessionIdConfig {
        &self.config
    }
}

impl Default for SessionIdManager {
    fn default() -> Self {
        Self::unchecked(SessionIdConfig::default())
    }
}
