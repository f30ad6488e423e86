use thiserror::Error;

use crate::bus::ConsumerKind;

/// Error raised by a match or transform callback.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// One consumer whose callback failed during a routing pass.
#[derive(Debug)]
pub struct CallbackFailure {
    /// Id of the consumer record (also the name of its delivery bus).
    pub consumer: String,
    pub kind: ConsumerKind,
    pub source: CallbackError,
}

impl std::fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.consumer, self.source)
    }
}

#[derive(Error, Debug)]
pub enum BusError {
    #[error("bus lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("backfill of {kind} {consumer} failed at history index {index}: {source}")]
    Backfill {
        consumer: String,
        kind: ConsumerKind,
        index: usize,
        #[source]
        source: CallbackError,
    },

    #[error(
        "{} callback(s) failed while routing message {index} on bus {bus}: {}",
        .failures.len(),
        describe(.failures)
    )]
    Routing {
        bus: String,
        index: usize,
        failures: Vec<CallbackFailure>,
    },

    /// Routing errors from `send_batch`, one per message whose pass failed.
    #[error(
        "{} of {sent} batched message(s) failed to route on bus {bus}",
        .errors.len()
    )]
    Batch {
        bus: String,
        sent: usize,
        errors: Vec<BusError>,
    },
}

impl BusError {
    /// Failures collected by a single routing pass, empty for every other
    /// variant. Use [`errors`](Self::errors) to walk a batch.
    pub fn failures(&self) -> &[CallbackFailure] {
        match self {
            BusError::Routing { failures, .. } => failures,
            _ => &[],
        }
    }

    /// Per-message errors of a `send_batch`, empty for every other variant.
    pub fn errors(&self) -> &[BusError] {
        match self {
            BusError::Batch { errors, .. } => errors,
            _ => &[],
        }
    }
}

fn describe(failures: &[CallbackFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("session id step must be non-zero")]
    ZeroStep,

    #[error("bus name must not be empty")]
    EmptyName,

    #[error("invalid bus configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
