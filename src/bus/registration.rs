//! Scope-bound consumer registrations.

use std::fmt;
use std::ops::Deref;
use std::sync::Weak;

use super::consumer::ConsumerKind;
use super::message_bus::{Inner, MessageBus};

/// A live consumer of a bus.
///
/// Derefs to the consumer's delivery bus, which is drained with
/// [`receive`](MessageBus::receive) and can itself be subscribed to,
/// modified, captured or observed.
///
/// Dropping the registration removes the consumer from the owning bus.
/// Because this happens in `Drop`, it also happens on early return, on
/// panic unwinding, and when an enclosing future is cancelled. Messages
/// already delivered stay readable through any clone of the delivery bus.
#[must_use = "the consumer is deregistered as soon as the registration is dropped"]
pub struct Registration<M> {
    owner: Weak<Inner<M>>,
    kind: ConsumerKind,
    id: String,
    delivery: MessageBus<M>,
}

impl<M> Registration<M> {
    pub(crate) fn new(
        owner: Weak<Inner<M>>,
        kind: ConsumerKind,
        id: String,
        delivery: MessageBus<M>,
    ) -> Self {
        Self {
            owner,
            kind,
            id,
            delivery,
        }
    }

    /// The consumer id, which is also the delivery bus's name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this is a subscription, modifier or captor.
    pub fn kind(&self) -> ConsumerKind {
        self.kind
    }

    /// The delivery bus, also reachable through `Deref`.
    pub fn bus(&self) -> &MessageBus<M> {
        &self.delivery
    }
}

impl<M> Deref for Registration<M> {
    type Target = MessageBus<M>;

    fn deref(&self) -> &MessageBus<M> {
        &self.delivery
    }
}

impl<M> Drop for Registration<M> {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.deregister(self.kind, &self.id);
        }
    }
}

impl<M> fmt::Debug for Registration<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
