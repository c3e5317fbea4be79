//! Per-deployment publish/subscribe channel for progress events
//!
//! Every subscriber owns an unbounded queue, so a slow observer never blocks
//! the workflow publishing to it. Nothing is retained for subscribers that
//! register after an event was published.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::models::event::Event;

/// Handle identifying one registration, used to unsubscribe
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    deployment_id: String,
    seq: u64,
}

impl SubscriptionToken {
    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }
}

struct Subscriber {
    seq: u64,
    tx: mpsc::UnboundedSender<Event>,
}

#[derive(Default)]
struct BusInner {
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
    next_seq: AtomicU64,
}

/// Event bus shared by the orchestrator and its observers
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new, empty event bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every current subscriber of `deployment_id`.
    ///
    /// Subscribers whose receiving side is gone are dropped on the way.
    pub fn publish(&self, deployment_id: &str, event: Event) {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let Some(list) = subscribers.get_mut(deployment_id) else {
            return;
        };

        list.retain(|sub| sub.tx.send(event.clone()).is_ok());
        if list.is_empty() {
            subscribers.remove(deployment_id);
        }
    }

    /// Register a new subscriber for `deployment_id`
    pub fn subscribe(&self, deployment_id: &str) -> Subscription {
        self.subscribe_with(deployment_id, Vec::new)
    }

    /// Register a new subscriber whose queue starts with the events built by
    /// `preamble`.
    ///
    /// `preamble` runs while the registry is locked, so no concurrent
    /// [`publish`](Self::publish) can slip in ahead of those events.
    pub fn subscribe_with<F>(&self, deployment_id: &str, preamble: F) -> Subscription
    where
        F: FnOnce() -> Vec<Event>,
    {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut subscribers = self
                .inner
                .subscribers
                .lock()
                .unwrap_or_else(|e| e.into_inner());

            for event in preamble() {
                // The receiver is held right here, so the send cannot fail.
                let _ = tx.send(event);
            }

            subscribers
                .entry(deployment_id.to_string())
                .or_default()
                .push(Subscriber { seq, tx });
        }

        debug!(deployment_id, seq, "Subscriber registered");

        Subscription {
            token: SubscriptionToken {
                deployment_id: deployment_id.to_string(),
                seq,
            },
            rx,
            bus: self.clone(),
        }
    }

    /// Remove a registration. Unknown or already removed tokens are ignored.
    pub fn unsubscribe(&self, token: &SubscriptionToken) {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        if let Some(list) = subscribers.get_mut(&token.deployment_id) {
            list.retain(|sub| sub.seq != token.seq);
            if list.is_empty() {
                subscribers.remove(&token.deployment_id);
            }
        }
    }

    /// Number of live subscribers for `deployment_id`
    pub fn subscriber_count(&self, deployment_id: &str) -> usize {
        let subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        subscribers.get(deployment_id).map_or(0, Vec::len)
    }
}

/// Receiving side of a registration.
///
/// Dropping it unsubscribes, which covers client disconnects.
pub struct Subscription {
    token: SubscriptionToken,
    rx: mpsc::UnboundedReceiver<Event>,
    bus: EventBus,
}

impl Subscription {
    pub fn token(&self) -> &SubscriptionToken {
        &self.token
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.token);
    }
}
