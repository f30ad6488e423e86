//! Consumer records held in a bus's live tables.

use std::fmt;

use super::history::ReadPointer;
use super::matcher::{Matcher, Transform};
use super::message_bus::MessageBus;

/// The three ways a consumer can be registered on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerKind {
    /// Forwards matching messages unchanged. `observe` registers one of these.
    Subscription,
    /// Forwards a transformed copy of matching messages.
    Modifier,
    /// Claims matching live messages ahead of every subscription and modifier.
    Captor,
}

impl fmt::Display for ConsumerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerKind::Subscription => write!(f, "subscription"),
            ConsumerKind::Modifier => write!(f, "modifier"),
            ConsumerKind::Captor => write!(f, "captor"),
        }
    }
}

/// Number of live consumers on a bus, per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsumerCounts {
    pub subscriptions: usize,
    pub modifiers: usize,
    pub captors: usize,
}

impl ConsumerCounts {
    /// All live consumers, regardless of kind.
    pub fn total(&self) -> usize {
        self.subscriptions + self.modifiers + self.captors
    }
}

pub(crate) struct SubscriptionRecord<M> {
    pub id: String,
    pub pointer: ReadPointer,
    pub matcher: Box<dyn Matcher<M>>,
    pub delivery: MessageBus<M>,
}

pub(crate) struct ModifierRecord<M> {
    pub id: String,
    pub pointer: ReadPointer,
    pub transform: Box<dyn Transform<M>>,
    pub delivery: MessageBus<M>,
}

/// Captors evaluate live messages only, so they carry no read pointer.
pub(crate) struct CaptorRecord<M> {
    pub id: String,
    pub transform: Box<dyn Transform<M>>,
    pub delivery: MessageBus<M>,
}
