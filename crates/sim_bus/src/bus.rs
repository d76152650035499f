//! Generic in-process publish/subscribe channel.
//!
//! Subscriptions live in an arena of slots, each with an `active` flag. A
//! publish snapshots the slot count when it starts, skips inactive slots, and
//! only compacts the arena once the outermost publish has finished. That
//! keeps slot indices stable while subscribers subscribe, unsubscribe or
//! publish again from inside a callback.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::trace;

use crate::error::BusError;
use crate::predicate::Predicate;

type Callback<M> = Arc<dyn Fn(M) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

struct Slot<M> {
    id: u64,
    predicate: Option<Predicate<M>>,
    callback: Callback<M>,
    active: bool,
}

struct State<M> {
    slots: Vec<Slot<M>>,
    next_id: u64,
    /// Number of publishes currently iterating the arena.
    depth: usize,
}

struct Inner<M> {
    state: Mutex<State<M>>,
}

impl<M> Inner<M> {
    fn state(&self) -> MutexGuard<'_, State<M>> {
        // Callbacks never run under the lock, so a poisoned lock still holds a
        // consistent arena.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_slot(&self, index: usize) -> Option<(Option<Predicate<M>>, Callback<M>)> {
        let state = self.state();
        let slot = state.slots.get(index)?;
        slot.active
            .then(|| (slot.predicate.clone(), Arc::clone(&slot.callback)))
    }
}

/// Lets a [`Subscription`] reach its bus without knowing the message type.
trait SlotControl: Send + Sync {
    fn deactivate(&self, id: u64);
    fn is_active(&self, id: u64) -> bool;
}

impl<M> SlotControl for Inner<M> {
    fn deactivate(&self, id: u64) {
        let mut state = self.state();
        if let Some(slot) = state.slots.iter_mut().find(|s| s.id == id) {
            slot.active = false;
        }
        if state.depth == 0 {
            state.slots.retain(|s| s.active);
        }
    }

    fn is_active(&self, id: u64) -> bool {
        self.state().slots.iter().any(|s| s.id == id && s.active)
    }
}

/// Marks one publish as in progress; compacts on the way out of the
/// outermost one, including when the publish future is dropped early.
struct Dispatch<'a, M> {
    inner: &'a Inner<M>,
}

impl<'a, M> Dispatch<'a, M> {
    fn enter(inner: &'a Inner<M>) -> (Self, usize) {
        let mut state = inner.state();
        state.depth += 1;
        let count = state.slots.len();
        (Self { inner }, count)
    }
}

impl<M> Drop for Dispatch<'_, M> {
    fn drop(&mut self) {
        let mut state = self.inner.state();
        state.depth -= 1;
        if state.depth == 0 {
            state.slots.retain(|s| s.active);
        }
    }
}

/// Summary of one publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Number of subscribers the message was handed to.
    pub deliveries: usize,
    /// `false` when no subscriber matched.
    pub acknowledged: bool,
}

/// A cloneable handle to a publish/subscribe channel for messages of type `M`.
///
/// Clones share the same subscribers.
pub struct Bus<M> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for Bus<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> Default for Bus<M> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    slots: Vec::new(),
                    next_id: 0,
                    depth: 0,
                }),
            }),
        }
    }
}

impl<M> std::fmt::Debug for Bus<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("Bus")
            .field("slots", &state.slots.len())
            .field("depth", &state.depth)
            .finish()
    }
}

impl<M> Bus<M>
where
    M: Clone + Send + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every message.
    pub fn subscribe<F, Fut>(&self, callback: F) -> Subscription
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.insert(None, callback)
    }

    /// Subscribe to messages accepted by `predicate`.
    pub fn subscribe_when<F, Fut>(&self, predicate: Predicate<M>, callback: F) -> Subscription
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.insert(Some(predicate), callback)
    }

    fn insert<F, Fut>(&self, predicate: Option<Predicate<M>>, callback: F) -> Subscription
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let callback: Callback<M> = Arc::new(move |message: M| callback(message).boxed());
        let mut state = self.inner.state();
        let id = state.next_id;
        state.next_id += 1;
        state.slots.push(Slot {
            id,
            predicate,
            callback,
            active: true,
        });

        let bus: Weak<Inner<M>> = Arc::downgrade(&self.inner);
        let bus: Weak<dyn SlotControl> = bus;
        Subscription { id, bus }
    }

    /// Deliver `message` to every active subscriber whose predicate matches.
    ///
    /// Subscribers run one after another, in subscription order, and every
    /// matching subscriber runs even if an earlier one failed. Subscribers
    /// added during this publish do not see the message; subscribers removed
    /// before they are reached do not either.
    ///
    /// # Errors
    ///
    /// Returns the failing subscriber's error if exactly one failed, or
    /// [`BusError::Aggregate`] if several did.
    pub async fn publish(&self, message: M) -> Result<Delivery, BusError> {
        let (dispatch, count) = Dispatch::enter(&self.inner);
        let mut deliveries = 0;
        let mut failures = Vec::new();

        for index in 0..count {
            let Some((predicate, callback)) = self.inner.active_slot(index) else {
                continue;
            };
            if predicate.is_some_and(|p| !p.matches(&message)) {
                continue;
            }
            deliveries += 1;
            if let Err(error) = callback(message.clone()).await {
                failures.push(error);
            }
        }
        drop(dispatch);

        trace!(deliveries, failures = failures.len(), "bus message published");
        match BusError::from_failures(failures) {
            Some(error) => Err(error),
            None => Ok(Delivery {
                deliveries,
                acknowledged: deliveries > 0,
            }),
        }
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.state().slots.iter().filter(|s| s.active).count()
    }
}

/// Handle returned by [`Bus::subscribe`].
///
/// Dropping the handle keeps the subscription alive; call
/// [`unsubscribe`](Self::unsubscribe) to end it.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    bus: Weak<dyn SlotControl>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    /// Stop delivery to this subscriber, effective immediately, even during
    /// a publish that has not reached it yet. Idempotent.
    pub fn unsubscribe(&self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.deactivate(self.id);
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.bus.upgrade().is_some_and(|bus| bus.is_active(self.id))
    }
}
