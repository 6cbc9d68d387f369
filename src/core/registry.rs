//! Time observer registry - at most one live progress callback process-wide.
//!
//! **Why**: native players keep periodic observers alive until explicitly
//! removed. An observer left on a replaced engine keeps ticking into a
//! session that no longer exists, and removing it from the wrong engine
//! crashes some backends.
//!
//! # Invariants
//!
//! - `attach()` cancels any existing registration (for any engine) before
//!   registering the new one.
//! - `detach()` is idempotent: unknown or already-cancelled tokens are no-ops.
//! - Every registration except the live one has been cancelled exactly once,
//!   so `cancel_count() == attach_count() - 1` whenever one is active.
//!
//! The registry holds a clone of the engine `Arc` so it can always cancel on
//! the engine it registered with, regardless of what the coordinator holds.

use log::trace;
use std::sync::Arc;

use super::engine::{MediaEngine, ProgressToken, TickCallback};
use super::ids::EngineId;

/// Opaque registry token returned by [`TimeObserverRegistry::attach`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

struct Entry {
    token: ObserverToken,
    engine_id: EngineId,
    engine: Arc<dyn MediaEngine>,
    native: ProgressToken,
}

#[derive(Default)]
pub struct TimeObserverRegistry {
    active: Option<Entry>,
    next_seq: u64,
    attach_count: u64,
    cancel_count: u64,
}

impl std::fmt::Debug for TimeObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeObserverRegistry")
            .field("active", &self.active.as_ref().map(|e| (e.token, e.engine_id)))
            .field("attach_count", &self.attach_count)
            .field("cancel_count", &self.cancel_count)
            .finish()
    }
}

impl TimeObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `on_tick` on `engine`, cancelling any previous registration
    /// first.
    pub fn attach(
        &mut self,
        engine_id: EngineId,
        engine: &Arc<dyn MediaEngine>,
        interval_ms: u64,
        on_tick: TickCallback,
    ) -> ObserverToken {
        if let Some(prev) = self.active.take() {
            self.cancel(prev);
        }

        self.next_seq += 1;
        let token = ObserverToken(self.next_seq);
        let native = engine.observe_progress(interval_ms, on_tick);
        self.attach_count += 1;
        trace!(
            "TimeObserverRegistry: attached {:?} to {} every {}ms",
            token, engine_id, interval_ms
        );

        self.active = Some(Entry {
            token,
            engine_id,
            engine: Arc::clone(engine),
            native,
        });
        token
    }

    /// Cancel `token` if it is the live registration. Returns whether
    /// anything was cancelled.
    pub fn detach(&mut self, token: ObserverToken) -> bool {
        match self.active.take() {
            Some(entry) if entry.token == token => {
                self.cancel(entry);
                true
            }
            other => {
                self.active = other;
                trace!("TimeObserverRegistry: detach {:?} is a no-op", token);
                false
            }
        }
    }

    fn cancel(&mut self, entry: Entry) {
        entry.engine.cancel_observation(entry.native);
        self.cancel_count += 1;
        trace!(
            "TimeObserverRegistry: cancelled {:?} on {}",
            entry.token, entry.engine_id
        );
    }

    pub fn active_token(&self) -> Option<ObserverToken> {
        self.active.as_ref().map(|e| e.token)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn attach_count(&self) -> u64 {
        self.attach_count
    }

    pub fn cancel_count(&self) -> u64 {
        self.cancel_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::FakeEngine;

    fn engine(id: u64) -> (EngineId, Arc<FakeEngine>, Arc<dyn MediaEngine>) {
        let fake = Arc::new(FakeEngine::new(EngineId(id)));
        let dyn_engine: Arc<dyn MediaEngine> = fake.clone();
        (EngineId(id), fake, dyn_engine)
    }

    #[test]
    fn test_attach_replaces_previous_on_other_engine() {
        let mut reg = TimeObserverRegistry::new();
        let (id_a, fake_a, a) = engine(1);
        let (id_b, fake_b, b) = engine(2);

        reg.attach(id_a, &a, 100, Box::new(|_| {}));
        assert_eq!(fake_a.live_observations(), 1);

        reg.attach(id_b, &b, 100, Box::new(|_| {}));
        assert_eq!(fake_a.live_observations(), 0);
        assert_eq!(fake_b.live_observations(), 1);
        assert!(reg.is_active());
        assert_eq!(reg.cancel_count(), 1);
    }

    #[test]
    fn test_detach_is_idempotent() {
        let mut reg = TimeObserverRegistry::new();
        let (id, fake, e) = engine(1);
        let token = reg.attach(id, &e, 100, Box::new(|_| {}));

        assert!(reg.detach(token));
        assert!(!reg.detach(token));
        assert_eq!(reg.cancel_count(), 1);
        assert_eq!(fake.cancel_calls(), 1);
        assert!(!reg.is_active());
    }

    #[test]
    fn test_stale_token_does_not_cancel_live_one() {
        let mut reg = TimeObserverRegistry::new();
        let (id, _fake, e) = engine(1);
        let old = reg.attach(id, &e, 100, Box::new(|_| {}));
        let new = reg.attach(id, &e, 100, Box::new(|_| {}));

        assert!(!reg.detach(old));
        assert_eq!(reg.active_token(), Some(new));
    }

    #[test]
    fn test_fifty_interleaved_calls_leave_one_token() {
        let mut reg = TimeObserverRegistry::new();
        let engines: Vec<_> = (0..4).map(engine).collect();
        let mut issued: Vec<ObserverToken> = Vec::new();

        for i in 0..50usize {
            match i % 5 {
                // detach the live token
                1 => {
                    if let Some(t) = issued.last().copied() {
                        reg.detach(t);
                    }
                }
                // detach a stale token
                3 => {
                    if let Some(t) = issued.first().copied() {
                        reg.detach(t);
                    }
                }
                _ => {
                    let (id, _, e) = &engines[i % engines.len()];
                    issued.push(reg.attach(*id, e, 100, Box::new(|_| {})));
                }
            }
        }
        // make sure the sequence ends on an attach
        let (id, _, e) = &engines[0];
        reg.attach(*id, e, 100, Box::new(|_| {}));

        assert!(reg.is_active());
        assert_eq!(reg.cancel_count(), reg.attach_count() - 1);
        let live: usize = engines.iter().map(|(_, f, _)| f.live_observations()).sum();
        assert_eq!(live, 1);
    }
}
