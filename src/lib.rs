pub mod bus;
mod config;
mod error;
mod session_id;

pub use bus::{ConsumerCounts, ConsumerKind, MessageBus, Registration};
pub use config::{BusConfig, SessionIdConfig};
pub use error::{BusError, CallbackError, CallbackFailure, ConfigError};
pub use session_id::SessionIdManager;
