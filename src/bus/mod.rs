//! Message Bus - routing and replay engine
//!
//! One ordered stream, consumed several ways at once.
//!
//! ## Architecture
//!
//! ```text
//!                 send(msg)
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MessageBus                                │
//! │  history: append-only, index i is always the same message   │
//! └─────────────────────────────────────────────────────────────┘
//!        │ 1. captors (live only, claim + withhold)
//!        │ 2. subscriptions (read pointer, unchanged message)
//!        │ 3. modifiers (read pointer, transformed message)
//!        │ 4. fallback channel (only if nobody claimed it)
//!        ▼
//! ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────┐
//! │ MessageBus  │  │ MessageBus  │  │ MessageBus  │  │ receive()│
//! │ (captor)    │  │ (subscr.)   │  │ (modifier)  │  │          │
//! └─────────────┘  └─────────────┘  └─────────────┘  └──────────┘
//! ```
//!
//! Each consumer's delivery bus is a full `MessageBus`, so the structure
//! nests: a subscription can be subscribed to, captured, and so on.
//!
//! ## Usage
//!
//! ```
//! use nestbus::MessageBus;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let bus = MessageBus::<i64>::new();
//! let doubled = bus.modify(|n: &i64| Some(n * 2), false).unwrap();
//!
//! bus.send(5).unwrap();
//!
//! assert_eq!(doubled.receive().await, 10);
//! assert_eq!(bus.try_receive(), None);
//! # });
//! ```

mod consumer;
mod fallback;
mod history;
mod matcher;
mod message_bus;
mod registration;

pub use consumer::{ConsumerCounts, ConsumerKind};
pub use matcher::{fallible, with_args, Always, Fallible, Matcher, Transform, WithArgs};
pub use message_bus::MessageBus;
pub use registration::Registration;
