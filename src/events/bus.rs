//! Replay-buffered event bus
//! 
//! Published events stay buffered for the replay window, so a subscriber
//! that arrives shortly after an event still sees it. Each subscription
//! fires at most once and lives no longer than the window.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use futures::future::{BoxFuture, FutureExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::utils::logging::log_event_published;
use super::Event;

type Predicate = Box<dyn Fn(&Event) -> bool + Send + Sync>;
type Callback = Box<dyn FnOnce(Event) -> BoxFuture<'static, ()> + Send>;

struct Subscription {
    id: u64,
    predicate: Predicate,
    callback: Callback,
    expires_at: Instant,
    delivered: Arc<AtomicBool>,
}

struct BufferedEvent {
    event: Event,
    published_at: Instant,
}

#[derive(Default)]
struct BusInner {
    buffer: VecDeque<BufferedEvent>,
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl BusInner {
    fn evict(&mut self, now: Instant, window: Duration) -> PruneReport {
        let events_before = self.buffer.len();
        while let Some(front) = self.buffer.front() {
            if now.duration_since(front.published_at) < window {
                break;
            }
            self.buffer.pop_front();
        }

        let subscriptions_before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.expires_at > now);

        PruneReport {
            events: events_before - self.buffer.len(),
            subscriptions: subscriptions_before - self.subscriptions.len(),
        }
    }
}

/// What a prune pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub events: usize,
    pub subscriptions: usize,
}

/// Publish/subscribe with a time-bounded replay buffer.
///
/// Callbacks are spawned on the Tokio runtime, so `publish` and `subscribe`
/// must be called from within one.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
    window: Duration,
}

impl EventBus {
    pub fn new(window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner::default())),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Buffer `event` and fire every live subscription it matches.
    ///
    /// Returns the number of subscriptions fired.
    pub fn publish(&self, event: Event) -> usize {
        let now = Instant::now();
        let ready: Vec<Subscription> = {
            let mut inner = self.lock();
            inner.evict(now, self.window);
            inner.buffer.push_back(BufferedEvent {
                event: event.clone(),
                published_at: now,
            });

            let (ready, pending) = std::mem::take(&mut inner.subscriptions)
                .into_iter()
                .partition(|s| (s.predicate)(&event));
            inner.subscriptions = pending;
            ready
        };

        let delivered = ready.len();
        for subscription in ready {
            subscription.delivered.store(true, Ordering::SeqCst);
            debug!(subscription_id = subscription.id, kind = %event.kind, "Delivering event");
            tokio::spawn((subscription.callback)(event.clone()));
        }

        log_event_published(event.kind.as_str(), &event.correlation_id, delivered);
        delivered
    }

    /// Fire `callback` once for the first event, buffered or future, that
    /// satisfies `predicate` within the window.
    pub fn subscribe<P, F, Fut>(&self, predicate: P, callback: F) -> SubscriptionHandle
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
        F: FnOnce(Event) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let now = Instant::now();
        let delivered = Arc::new(AtomicBool::new(false));

        let mut inner = self.lock();
        inner.evict(now, self.window);
        let id = inner.next_id;
        inner.next_id += 1;

        let replay = inner
            .buffer
            .iter()
            .find(|b| predicate(&b.event))
            .map(|b| b.event.clone());

        match replay {
            Some(event) => {
                drop(inner);
                delivered.store(true, Ordering::SeqCst);
                debug!(subscription_id = id, kind = %event.kind, "Replaying buffered event");
                tokio::spawn(callback(event));
            }
            None => {
                inner.subscriptions.push(Subscription {
                    id,
                    predicate: Box::new(predicate),
                    callback: Box::new(move |event| callback(event).boxed()),
                    expires_at: now + self.window,
                    delivered: delivered.clone(),
                });
            }
        }

        SubscriptionHandle {
            id,
            inner: Arc::downgrade(&self.inner),
            delivered,
        }
    }

    /// Drop buffered events and subscriptions older than the window
    pub fn prune(&self) -> PruneReport {
        self.lock().evict(Instant::now(), self.window)
    }

    pub fn buffered_events(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn pending_subscriptions(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Prune on a fixed interval until the returned handle is dropped
    pub fn spawn_pruner(&self, interval: Duration) -> PrunerHandle {
        let bus = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let report = bus.prune();
                if report != PruneReport::default() {
                    debug!(events = report.events, subscriptions = report.subscriptions, "Pruned event bus");
                }
            }
        });
        info!("Started event bus pruner with interval {:?}", interval);
        PrunerHandle { handle: Some(handle) }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("window", &self.window)
            .field("buffered_events", &self.buffered_events())
            .field("pending_subscriptions", &self.pending_subscriptions())
            .finish()
    }
}

/// Observes and cancels one subscription
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: u64,
    inner: Weak<Mutex<BusInner>>,
    delivered: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the callback has been fired
    pub fn was_delivered(&self) -> bool {
        self.delivered.load(Ordering::SeqCst)
    }

    /// True once the subscription can no longer fire: delivered, expired or cancelled
    pub fn is_spent(&self) -> bool {
        if self.was_delivered() {
            return true;
        }
        match self.inner.upgrade() {
            Some(inner) => {
                let inner = inner.lock().unwrap_or_else(|e| e.into_inner());
                let now = Instant::now();
                !inner.subscriptions.iter().any(|s| s.id == self.id && s.expires_at > now)
            }
            None => true,
        }
    }

    /// Withdraw the subscription; returns false if it had already been spent
    pub fn cancel(&self) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = inner.subscriptions.len();
        inner.subscriptions.retain(|s| s.id != self.id);
        inner.subscriptions.len() != before
    }
}

/// Background pruning task; aborted on drop
#[derive(Debug)]
pub struct PrunerHandle {
    handle: Option<JoinHandle<()>>,
}

impl PrunerHandle {
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Stopped event bus pruner");
        }
    }
}

impl Drop for PrunerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
