//! Pub/Sub bus publishing coordinator state to host views.
//!
//! Architecture:
//! - Hosts subscribe with callbacks (immediate invocation on the owner thread)
//! - emit() invokes callbacks immediately AND queues for deferred processing
//! - poll() returns queued events for batch processing in a host's frame loop
//!
//! Callback order: FIFO (first-subscribed, first-called).
//! Events are delivered in emission order.

use log::{trace, warn};
use std::sync::{Arc, Mutex, RwLock};

use super::ids::HostId;
use super::session::PlaybackSession;
use super::state::PresentationMode;

/// Maximum events in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Change notifications published by the coordinator.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    SessionChanged(PlaybackSession),
    ModeChanged(PresentationMode),
    /// The owning host changed. A host seeing itself as `previous` lost the
    /// session (superseded, closed, or handed off).
    OwnerChanged {
        previous: Option<HostId>,
        current: Option<HostId>,
    },
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    list: Vec<(SubscriptionId, Callback)>,
}

/// Session event bus with deferred processing support.
///
/// Cloning shares subscribers and queue.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Subscribers>>,
    queue: Arc<Mutex<Vec<SessionEvent>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.read().map(|s| s.list.len()).unwrap_or(0))
            .field("queue_len", &self.queue.lock().map(|q| q.len()).unwrap_or(0))
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Pub/Sub (immediate) ==========

    /// Subscribe to every event.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.next_id += 1;
        let id = SubscriptionId(subs.next_id);
        subs.list.push((id, Arc::new(callback)));
        id
    }

    /// Subscribe to the `PlaybackSession` stream only.
    pub fn subscribe_session<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PlaybackSession) + Send + Sync + 'static,
    {
        self.subscribe(move |e| {
            if let SessionEvent::SessionChanged(s) = e {
                callback(s);
            }
        })
    }

    /// Subscribe to the `PresentationMode` stream only.
    pub fn subscribe_mode<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PresentationMode) + Send + Sync + 'static,
    {
        self.subscribe(move |e| {
            if let SessionEvent::ModeChanged(m) = e {
                callback(m);
            }
        })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let before = subs.list.len();
        subs.list.retain(|(sid, _)| *sid != id);
        subs.list.len() != before
    }

    /// Emit event: invoke callbacks immediately AND queue for deferred processing.
    ///
    /// Callbacks run outside the subscriber lock, so a callback may
    /// subscribe or unsubscribe.
    pub fn emit(&self, event: SessionEvent) {
        let callbacks: Vec<Callback> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .list
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        trace!("EventBus: {:?} -> {} subscribers", event, callbacks.len());
        for cb in &callbacks {
            cb(&event);
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            let evict_count = queue.len() / 2;
            warn!("EventBus queue full ({} events), evicting oldest {}", queue.len(), evict_count);
            queue.drain(0..evict_count);
        }
        queue.push(event);
    }

    // ========== Deferred Processing ==========

    /// Take all events emitted since last poll.
    pub fn poll(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    // ========== Utilities ==========

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.read().unwrap_or_else(|e| e.into_inner()).list.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribe_emit_immediate() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(SessionEvent::ModeChanged(PresentationMode::Hidden));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_queues_for_poll() {
        let bus = EventBus::new();
        bus.emit(SessionEvent::ModeChanged(PresentationMode::Fullscreen));
        bus.emit(SessionEvent::SessionChanged(PlaybackSession::idle()));

        let events = bus.poll();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], SessionEvent::ModeChanged(PresentationMode::Fullscreen));
        assert_eq!(bus.poll().len(), 0);
    }

    #[test]
    fn test_filtered_streams() {
        let bus = EventBus::new();
        let modes = Arc::new(AtomicUsize::new(0));
        let sessions = Arc::new(AtomicUsize::new(0));

        let m = Arc::clone(&modes);
        bus.subscribe_mode(move |_| {
            m.fetch_add(1, Ordering::SeqCst);
        });
        let s = Arc::clone(&sessions);
        bus.subscribe_session(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(SessionEvent::ModeChanged(PresentationMode::Mini(0.0)));
        bus.emit(SessionEvent::ModeChanged(PresentationMode::Hidden));
        bus.emit(SessionEvent::SessionChanged(PlaybackSession::idle()));
        bus.emit(SessionEvent::OwnerChanged { previous: None, current: None });

        assert_eq!(modes.load(Ordering::SeqCst), 2);
        assert_eq!(sessions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let id = bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(SessionEvent::ModeChanged(PresentationMode::Hidden));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        // still queued
        assert_eq!(bus.queue_len(), 1);
    }

    #[test]
    fn test_callback_may_subscribe() {
        let bus = EventBus::new();
        let inner = bus.clone();
        bus.subscribe(move |_| {
            inner.subscribe(|_| {});
        });
        bus.emit(SessionEvent::ModeChanged(PresentationMode::Hidden));
        assert!(bus.has_subscribers());
    }

    #[test]
    fn test_queue_eviction() {
        let bus = EventBus::new();
        for _ in 0..(MAX_QUEUE_SIZE + 1) {
            bus.emit(SessionEvent::ModeChanged(PresentationMode::Hidden));
        }
        assert_eq!(bus.queue_len(), MAX_QUEUE_SIZE / 2 + 1);
    }
}
