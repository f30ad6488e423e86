//! The message bus: history, live consumer tables and routing.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::consumer::{
    CaptorRecord, ConsumerCounts, ConsumerKind, ModifierRecord, SubscriptionRecord,
};
use super::fallback::Fallback;
use super::history::{History, ReadPointer, ScanFailure};
use super::matcher::{Always, Matcher, Transform};
use super::registration::Registration;
use crate::config::BusConfig;
use crate::error::{BusError, CallbackFailure, ConfigError};
use crate::session_id::SessionIdManager;

/// A single ordered message stream with several ways to consume it.
///
/// Messages are appended to an append-only history and routed, in order, to:
/// - captors, which claim a matching message ahead of everyone else;
/// - subscriptions, which receive matching messages unchanged;
/// - modifiers, which receive a transformed copy of matching messages;
/// - the bus's own fallback channel, when nobody above claimed the message.
///
/// Every consumer delivers into its own nested `MessageBus`, so a
/// subscription is drained, filtered or observed exactly like the root.
///
/// `MessageBus` is a cheap handle; clones share the same bus.
///
/// ## Example
///
/// ```
/// use nestbus::MessageBus;
///
/// # tokio_test_block(async {
/// let bus = MessageBus::<String>::new();
/// bus.send("X".to_string()).unwrap();
/// bus.send("Y".to_string()).unwrap();
///
/// let texts = bus.subscribe(|m: &String| m.len() == 1, true).unwrap();
/// assert_eq!(texts.receive().await, "X");
/// assert_eq!(texts.receive().await, "Y");
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct MessageBus<M> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for MessageBus<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct Inner<M> {
    name: String,
    ids: SessionIdManager,
    state: Mutex<State<M>>,
    fallback: Fallback<M>,
}

struct State<M> {
    history: History<M>,
    subscriptions: Vec<SubscriptionRecord<M>>,
    modifiers: Vec<ModifierRecord<M>>,
    captors: Vec<CaptorRecord<M>>,
}

impl<M> Default for State<M> {
    fn default() -> Self {
        Self {
            history: History::default(),
            subscriptions: Vec::new(),
            modifiers: Vec::new(),
            captors: Vec::new(),
        }
    }
}

impl<M> Inner<M> {
    /// Remove a consumer record. Runs from `Registration::drop`, so a
    /// poisoned lock is recovered rather than reported.
    pub(crate) fn deregister(&self, kind: ConsumerKind, id: &str) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let removed = match kind {
            ConsumerKind::Subscription => remove_by_id(&mut state.subscriptions, id, |r| &r.id),
            ConsumerKind::Modifier => remove_by_id(&mut state.modifiers, id, |r| &r.id),
            ConsumerKind::Captor => remove_by_id(&mut state.captors, id, |r| &r.id),
        };
        drop(state);

        if removed {
            debug!(bus = %self.name, consumer = %id, %kind, "deregistered consumer");
        }
    }
}

fn remove_by_id<T>(records: &mut Vec<T>, id: &str, key: impl Fn(&T) -> &String) -> bool {
    match records.iter().position(|r| key(r) == id) {
        Some(pos) => {
            records.remove(pos);
            true
        }
        None => false,
    }
}

impl<M> Default for MessageBus<M> {
    fn default() -> Self {
        Self::from_name(BusConfig::default().name)
    }
}

impl<M> MessageBus<M> {
    /// Create a bus with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus from a validated configuration.
    pub fn with_config(config: BusConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_name(config.name))
    }

    /// Create a bus called `name`. Its consumers are named `name/0`,
    /// `name/1`, and so on.
    pub fn named(name: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_config(BusConfig::named(name))
    }

    fn from_name(name: String) -> Self {
        let ids = SessionIdManager::unchecked(BusConfig::named(name.clone()).consumer_ids());
        Self {
            inner: Arc::new(Inner {
                name,
                ids,
                state: Mutex::new(State::default()),
                fallback: Fallback::new(),
            }),
        }
    }

    /// The bus name. For a delivery bus this is the owning consumer's id.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of messages waiting in the fallback channel.
    pub fn pending(&self) -> usize {
        self.inner.fallback.pending()
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner<M>> {
        Arc::downgrade(&self.inner)
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, State<M>>, BusError> {
        self.inner
            .state
            .lock()
            .map_err(|_| BusError::LockPoisoned(operation))
    }

    /// Number of messages ever sent to this bus, captured ones included.
    pub fn history_len(&self) -> Result<usize, BusError> {
        Ok(self.lock("history_len")?.history.len())
    }

    /// Live consumers of this bus, by kind.
    pub fn consumers(&self) -> Result<ConsumerCounts, BusError> {
        let state = self.lock("consumers")?;
        Ok(ConsumerCounts {
            subscriptions: state.subscriptions.len(),
            modifiers: state.modifiers.len(),
            captors: state.captors.len(),
        })
    }

    /// Wait for the next message in this bus's fallback channel.
    ///
    /// Only messages that no consumer of this bus claimed arrive here, in the
    /// order they were sent. Cancelling the returned future does not lose or
    /// reorder messages.
    pub async fn receive(&self) -> M {
        self.inner.fallback.pop().await
    }

    /// Take the next fallback message if one is ready, without waiting.
    ///
    /// `None` means nothing could be taken right now: either the channel is
    /// empty, or another task is parked in [`receive`](Self::receive) on
    /// this bus and has first claim on the next message. Use
    /// [`pending`](Self::pending) to tell the two apart.
    pub fn try_receive(&self) -> Option<M> {
        self.inner.fallback.try_pop()
    }

    /// [`receive`](Self::receive) bounded by `timeout`; `None` when it
    /// elapses first.
    pub async fn receive_timeout(&self, timeout: Duration) -> Option<M> {
        tokio::time::timeout(timeout, self.receive()).await.ok()
    }
}

impl<M: Clone + Send + 'static> MessageBus<M> {
    /// Snapshot of every message ever sent to this bus, in send order.
    pub fn history(&self) -> Result<Vec<M>, BusError> {
        Ok(self.lock("history")?.history.messages().cloned().collect())
    }

    /// Append `message` to the history and route it.
    ///
    /// Routing runs under the bus lock: captors first, then subscriptions,
    /// then modifiers, and finally the fallback channel if nobody claimed
    /// the message. A captured message is withheld from every subscription
    /// and modifier, whose read pointers still step past it.
    ///
    /// A failing callback does not stop the pass. Failures are collected and
    /// returned together as [`BusError::Routing`] once every consumer has
    /// been evaluated; the message is still appended and routed.
    pub fn send(&self, message: M) -> Result<(), BusError> {
        let mut state = self.lock("send")?;
        let State {
            history,
            subscriptions,
            modifiers,
            captors,
        } = &mut *state;

        let index = history.push(message);
        let mut failures = Vec::new();

        let mut captured = false;
        if let Some(entry) = history.get(index) {
            for captor in captors.iter() {
                match captor.transform.transform(&entry.message) {
                    Ok(Some(output)) => {
                        captured = true;
                        deliver(
                            &captor.id,
                            ConsumerKind::Captor,
                            &captor.delivery,
                            output,
                            &mut failures,
                        );
                    }
                    Ok(None) => {}
                    Err(source) => failures.push(callback_failure(
                        &self.inner.name,
                        &captor.id,
                        ConsumerKind::Captor,
                        ScanFailure { index, source },
                    )),
                }
            }
        }
        if captured {
            history.mark_captured(index);
        }

        let mut claimed = captured;

        for sub in subscriptions.iter_mut() {
            if captured {
                history.skip(&mut sub.pointer);
                continue;
            }
            let matcher = &sub.matcher;
            let (matched, scan_failures) = history.scan(&mut sub.pointer, false, |m| {
                Ok(matcher.matches(m)?.then(|| m.clone()))
            });
            for failure in scan_failures {
                failures.push(callback_failure(
                    &self.inner.name,
                    &sub.id,
                    ConsumerKind::Subscription,
                    failure,
                ));
            }
            for (_, message) in matched {
                claimed = true;
                deliver(
                    &sub.id,
                    ConsumerKind::Subscription,
                    &sub.delivery,
                    message,
                    &mut failures,
                );
            }
        }

        for modifier in modifiers.iter_mut() {
            if captured {
                history.skip(&mut modifier.pointer);
                continue;
            }
            let transform = &modifier.transform;
            let (matched, scan_failures) =
                history.scan(&mut modifier.pointer, false, |m| transform.transform(m));
            for failure in scan_failures {
                failures.push(callback_failure(
                    &self.inner.name,
                    &modifier.id,
                    ConsumerKind::Modifier,
                    failure,
                ));
            }
            for (_, message) in matched {
                claimed = true;
                deliver(
                    &modifier.id,
                    ConsumerKind::Modifier,
                    &modifier.delivery,
                    message,
                    &mut failures,
                );
            }
        }

        if !claimed {
            if let Some(entry) = history.get(index) {
                self.inner.fallback.push(entry.message.clone());
            }
        }
        drop(state);

        trace!(bus = %self.inner.name, index, captured, claimed, "routed message");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BusError::Routing {
                bus: self.inner.name.clone(),
                index,
                failures,
            })
        }
    }

    /// Send each message in order, each as its own routing pass.
    ///
    /// A [`BusError::Routing`] on one message does not stop the batch: every
    /// message is still appended and routed, and the routing errors come back
    /// together as [`BusError::Batch`]. Any other error ends the batch at
    /// the message that raised it.
    pub fn send_batch(&self, messages: impl IntoIterator<Item = M>) -> Result<(), BusError> {
        let mut errors = Vec::new();
        let mut sent = 0usize;
        for message in messages {
            match self.send(message) {
                Ok(()) => {}
                Err(err @ BusError::Routing { .. }) => errors.push(err),
                Err(err) => return Err(err),
            }
            sent += 1;
        }

        if errors.is_empty() {
            Ok(())
        } else {
            warn!(
                bus = %self.inner.name,
                sent,
                failed = errors.len(),
                "batch routed with failures"
            );
            Err(BusError::Batch {
                bus: self.inner.name.clone(),
                sent,
                errors,
            })
        }
    }

    /// Register a subscription that receives every matching message.
    ///
    /// With `history` set, every already-sent message that matches is
    /// delivered before this returns; otherwise only messages sent after
    /// registration are considered. The subscription stays live until the
    /// returned [`Registration`] is dropped.
    ///
    /// `matcher` runs under this bus's lock and must not call back into it.
    pub fn subscribe(
        &self,
        matcher: impl Matcher<M> + 'static,
        history: bool,
    ) -> Result<Registration<M>, BusError> {
        self.register_subscription(Box::new(matcher), history)
    }

    /// Register a subscription to the whole stream.
    pub fn observe(&self, history: bool) -> Result<Registration<M>, BusError> {
        self.register_subscription(Box::new(Always), history)
    }

    /// Register a modifier that receives the transformed form of every
    /// message `transform` accepts. Backfill and lifetime follow
    /// [`subscribe`](Self::subscribe).
    pub fn modify(
        &self,
        transform: impl Transform<M> + 'static,
        history: bool,
    ) -> Result<Registration<M>, BusError> {
        let mut state = self.lock("modify")?;
        let id = self.inner.ids.next_id();
        let delivery = MessageBus::from_name(id.clone());

        let mut pointer = start_pointer(&state.history, history);
        let (matched, failures) = state
            .history
            .scan(&mut pointer, true, |m| transform.transform(m));
        backfill(&id, ConsumerKind::Modifier, &delivery, matched, failures)?;

        state.modifiers.push(ModifierRecord {
            id: id.clone(),
            pointer,
            transform: Box::new(transform),
            delivery: delivery.clone(),
        });
        drop(state);

        debug!(bus = %self.inner.name, consumer = %id, history, "registered modifier");
        Ok(Registration::new(self.downgrade(), ConsumerKind::Modifier, id, delivery))
    }

    /// Register a captor. Captors see live messages only: no backfill, and
    /// any message they accept is withheld from subscriptions and modifiers.
    /// Several captors may accept the same message; each receives its own
    /// transformed copy.
    pub fn capture(
        &self,
        transform: impl Transform<M> + 'static,
    ) -> Result<Registration<M>, BusError> {
        let mut state = self.lock("capture")?;
        let id = self.inner.ids.next_id();
        let delivery = MessageBus::from_name(id.clone());

        state.captors.push(CaptorRecord {
            id: id.clone(),
            transform: Box::new(transform),
            delivery: delivery.clone(),
        });
        drop(state);

        debug!(bus = %self.inner.name, consumer = %id, "registered captor");
        Ok(Registration::new(self.downgrade(), ConsumerKind::Captor, id, delivery))
    }

    fn register_subscription(
        &self,
        matcher: Box<dyn Matcher<M>>,
        history: bool,
    ) -> Result<Registration<M>, BusError> {
        let mut state = self.lock("subscribe")?;
        let id = self.inner.ids.next_id();
        let delivery = MessageBus::from_name(id.clone());

        let mut pointer = start_pointer(&state.history, history);
        let (matched, failures) = state.history.scan(&mut pointer, true, |m| {
            Ok(matcher.matches(m)?.then(|| m.clone()))
        });
        backfill(&id, ConsumerKind::Subscription, &delivery, matched, failures)?;

        state.subscriptions.push(SubscriptionRecord {
            id: id.clone(),
            pointer,
            matcher,
            delivery: delivery.clone(),
        });
        drop(state);

        debug!(bus = %self.inner.name, consumer = %id, history, "registered subscription");
        Ok(Registration::new(
            self.downgrade(),
            ConsumerKind::Subscription,
            id,
            delivery,
        ))
    }
}

fn start_pointer<M>(history: &History<M>, replay: bool) -> ReadPointer {
    if replay {
        ReadPointer::default()
    } else {
        history.end()
    }
}

/// Deliver backfilled matches into a fresh delivery bus, or turn the first
/// scan failure into a registration error.
fn backfill<M: Clone + Send + 'static>(
    id: &str,
    kind: ConsumerKind,
    delivery: &MessageBus<M>,
    matched: Vec<(usize, M)>,
    failures: Vec<ScanFailure>,
) -> Result<(), BusError> {
    if let Some(failure) = failures.into_iter().next() {
        warn!(
            consumer = %id,
            %kind,
            index = failure.index,
            error = %failure.source,
            "backfill callback failed"
        );
        return Err(BusError::Backfill {
            consumer: id.to_string(),
            kind,
            index: failure.index,
            source: failure.source,
        });
    }
    for (_, message) in matched {
        delivery.send(message)?;
    }
    Ok(())
}

fn deliver<M: Clone + Send + 'static>(
    id: &str,
    kind: ConsumerKind,
    delivery: &MessageBus<M>,
    message: M,
    failures: &mut Vec<CallbackFailure>,
) {
    if let Err(err) = delivery.send(message) {
        warn!(consumer = %id, %kind, error = %err, "delivery bus reported an error");
        failures.push(CallbackFailure {
            consumer: id.to_string(),
            kind,
            source: Box::new(err),
        });
    }
}

fn callback_failure(
    bus: &str,
    id: &str,
    kind: ConsumerKind,
    failure: ScanFailure,
) -> CallbackFailure {
    warn!(
        bus = %bus,
        consumer = %id,
        %kind,
        index = failure.index,
        error = %failure.source,
        "callback failed"
    );
    CallbackFailure {
        consumer: id.to_string(),
        kind,
        source: failure.source,
    }
}

impl<M> fmt::Debug for MessageBus<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("name", &self.inner.name)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
