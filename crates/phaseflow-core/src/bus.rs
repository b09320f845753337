//! Typed publish/subscribe primitive for cross-cutting signals.
//!
//! The bus is single-threaded. `publish` only enqueues; queued signals are
//! fanned out by [`EventBus::dispatch`], which the flow graph calls once at
//! the start of every frame. Handlers for one signal run in registration
//! order, and signals are delivered in publish order.
//!
//! Subscriptions are scoped: [`EventBus::subscribe`] returns a
//! [`Subscription`] guard that unregisters its handler when dropped.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::trace;

/// Name of a signal channel, e.g. `ui.continue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Topic(&'static str);

impl Topic {
    /// Declares a topic.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the topic name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Primary continue action.
pub const CONTINUE: Topic = Topic::new("ui.continue");

/// Secondary / back action.
pub const BACK: Topic = Topic::new("ui.back");

/// Gating checkbox toggled. Payload: `bool`.
pub const GATE_TOGGLED: Topic = Topic::new("ui.gate_toggled");

/// A published notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Channel the signal is published on.
    pub topic: Topic,
    /// Optional payload, `Value::Null` when absent.
    pub payload: Value,
}

impl Signal {
    /// A signal without payload.
    #[must_use]
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            payload: Value::Null,
        }
    }

    /// A signal carrying a payload.
    #[must_use]
    pub fn with_payload(topic: Topic, payload: Value) -> Self {
        Self { topic, payload }
    }

    /// Reads a boolean payload.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.payload.as_bool()
    }
}

/// Opaque registration handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Handler = Box<dyn FnMut(&Signal)>;

struct Entry {
    token: SubscriptionToken,
    topic: Topic,
    // `None` while the handler is being invoked.
    handler: Option<Handler>,
}

#[derive(Default)]
struct Registry {
    next_token: u64,
    entries: Vec<Entry>,
}

impl Registry {
    fn remove(&mut self, token: SubscriptionToken) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.token != token);
        before != self.entries.len()
    }
}

type Queue = Rc<RefCell<VecDeque<Signal>>>;

/// Single-threaded signal bus. Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
    queue: Queue,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscription_count())
            .field("pending", &self.pending())
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `topic`. The handler stays registered until
    /// the returned guard is dropped or released.
    pub fn subscribe(
        &self,
        topic: Topic,
        handler: impl FnMut(&Signal) + 'static,
    ) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        registry.next_token += 1;
        let token = SubscriptionToken(registry.next_token);
        registry.entries.push(Entry {
            token,
            topic,
            handler: Some(Box::new(handler)),
        });
        trace!(%topic, ?token, "subscribed");
        Subscription {
            token,
            topic,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Removes a registration. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.registry.borrow_mut().remove(token)
    }

    /// Enqueues a signal for the next dispatch.
    pub fn publish(&self, signal: Signal) {
        self.queue.borrow_mut().push_back(signal);
    }

    /// Returns a publish-only handle for collaborators.
    #[must_use]
    pub fn sender(&self) -> SignalSender {
        SignalSender {
            queue: Rc::clone(&self.queue),
        }
    }

    /// Delivers every signal queued before this call and returns the number
    /// of handler invocations.
    ///
    /// Handlers may publish, subscribe or drop subscriptions: signals they
    /// publish wait for the next dispatch, handlers they add do not see the
    /// signal currently being delivered, and handlers they remove are not
    /// invoked again.
    pub fn dispatch(&self) -> usize {
        let signals: Vec<Signal> = self.queue.borrow_mut().drain(..).collect();
        let mut delivered = 0;

        for signal in &signals {
            let tokens: Vec<SubscriptionToken> = self
                .registry
                .borrow()
                .entries
                .iter()
                .filter(|entry| entry.topic == signal.topic)
                .map(|entry| entry.token)
                .collect();

            for token in tokens {
                let Some(mut handler) = self.take_handler(token) else {
                    continue;
                };
                handler(signal);
                delivered += 1;
                self.restore_handler(token, handler);
            }
        }

        delivered
    }

    /// Number of live registrations.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.registry.borrow().entries.len()
    }

    /// Number of signals waiting for dispatch.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    fn take_handler(&self, token: SubscriptionToken) -> Option<Handler> {
        self.registry
            .borrow_mut()
            .entries
            .iter_mut()
            .find(|entry| entry.token == token)
            .and_then(|entry| entry.handler.take())
    }

    fn restore_handler(&self, token: SubscriptionToken, handler: Handler) {
        let mut registry = self.registry.borrow_mut();
        if let Some(entry) = registry.entries.iter_mut().find(|e| e.token == token) {
            entry.handler = Some(handler);
        }
    }
}

/// Publish-only handle to an [`EventBus`].
#[derive(Clone)]
pub struct SignalSender {
    queue: Queue,
}

impl fmt::Debug for SignalSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSender").finish_non_exhaustive()
    }
}

impl SignalSender {
    /// Enqueues a signal for the next dispatch.
    pub fn publish(&self, signal: Signal) {
        self.queue.borrow_mut().push_back(signal);
    }
}

/// Scoped registration. Dropping it unregisters the handler.
#[must_use = "dropping a subscription unregisters its handler"]
pub struct Subscription {
    token: SubscriptionToken,
    topic: Topic,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    /// The registration token.
    #[must_use]
    pub fn token(&self) -> SubscriptionToken {
        self.token
    }

    /// The subscribed topic.
    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("token", &self.token)
            .field("topic", &self.topic)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().remove(self.token);
        }
    }
}

/// The registrations owned by one node activation.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    held: Vec<Subscription>,
}

impl SubscriptionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a registration.
    pub fn hold(&mut self, subscription: Subscription) {
        self.held.push(subscription);
    }

    /// Number of registrations held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Returns `true` if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Unregisters everything. Safe to call repeatedly.
    pub fn release_all(&mut self) {
        self.held.clear();
    }
}
