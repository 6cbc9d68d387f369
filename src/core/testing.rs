//! Recording engine doubles for coordinator and registry tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::engine::{
    EngineError, EngineFactory, EngineSink, MediaEngine, PreparedInfo, ProgressToken,
    RenderTarget, TickCallback,
};
use super::ids::{EngineId, MediaItem};

#[derive(Default)]
struct FakeState {
    url: Option<String>,
    prepare_calls: usize,
    abort_calls: usize,
    play_calls: usize,
    pause_calls: usize,
    seeks: Vec<f64>,
    muted: Option<bool>,
    rate: Option<f32>,
    volume: Option<f32>,
    observations: HashMap<u64, TickCallback>,
    next_obs: u64,
    cancel_calls: usize,
    dispose_calls: usize,
}

/// Engine that records every call and lets the test drive callbacks.
pub struct FakeEngine {
    id: EngineId,
    sink: Option<EngineSink>,
    fail_dispose: bool,
    state: Mutex<FakeState>,
}

impl FakeEngine {
    pub fn new(id: EngineId) -> Self {
        Self {
            id,
            sink: None,
            fail_dispose: false,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_sink(id: EngineId, sink: EngineSink, fail_dispose: bool) -> Self {
        Self {
            id,
            sink: Some(sink),
            fail_dispose,
            state: Mutex::new(FakeState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    fn sink(&self) -> &EngineSink {
        self.sink.as_ref().expect("FakeEngine created without sink")
    }

    // === Driving callbacks ===

    pub fn resolve(&self, duration: Option<f64>) {
        self.sink().prepared(Ok(PreparedInfo { duration }));
    }

    pub fn reject(&self, err: EngineError) {
        self.sink().prepared(Err(err));
    }

    pub fn sink_handle(&self) -> EngineSink {
        self.sink().clone()
    }

    /// Fire every live observer with `seconds`.
    pub fn tick(&self, seconds: f64) {
        let state = self.lock();
        for cb in state.observations.values() {
            cb(seconds);
        }
    }

    // === Inspection ===

    pub fn url(&self) -> Option<String> {
        self.lock().url.clone()
    }

    pub fn prepare_calls(&self) -> usize {
        self.lock().prepare_calls
    }

    pub fn abort_calls(&self) -> usize {
        self.lock().abort_calls
    }

    pub fn play_calls(&self) -> usize {
        self.lock().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.lock().pause_calls
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.lock().seeks.clone()
    }

    pub fn muted(&self) -> Option<bool> {
        self.lock().muted
    }

    pub fn rate(&self) -> Option<f32> {
        self.lock().rate
    }

    pub fn volume(&self) -> Option<f32> {
        self.lock().volume
    }

    pub fn live_observations(&self) -> usize {
        self.lock().observations.len()
    }

    pub fn cancel_calls(&self) -> usize {
        self.lock().cancel_calls
    }

    pub fn dispose_calls(&self) -> usize {
        self.lock().dispose_calls
    }

    pub fn is_disposed(&self) -> bool {
        self.dispose_calls() > 0
    }
}

impl MediaEngine for FakeEngine {
    fn prepare(&self, url: &str) {
        let mut state = self.lock();
        state.url = Some(url.to_string());
        state.prepare_calls += 1;
    }

    fn abort_prepare(&self) {
        self.lock().abort_calls += 1;
    }

    fn play(&self) {
        self.lock().play_calls += 1;
    }

    fn pause(&self) {
        self.lock().pause_calls += 1;
    }

    fn seek(&self, seconds: f64) {
        self.lock().seeks.push(seconds);
    }

    fn set_muted(&self, muted: bool) {
        self.lock().muted = Some(muted);
    }

    fn set_rate(&self, rate: f32) {
        self.lock().rate = Some(rate);
    }

    fn set_volume(&self, volume: f32) {
        self.lock().volume = Some(volume);
    }

    fn observe_progress(&self, _interval_ms: u64, on_tick: TickCallback) -> ProgressToken {
        let mut state = self.lock();
        state.next_obs += 1;
        let token = state.next_obs;
        state.observations.insert(token, on_tick);
        ProgressToken(token)
    }

    fn cancel_observation(&self, token: ProgressToken) {
        let mut state = self.lock();
        state.cancel_calls += 1;
        state.observations.remove(&token.0);
    }

    fn render_target(&self) -> RenderTarget {
        RenderTarget(self.id.0 + 1000)
    }

    fn dispose(&self) -> Result<(), EngineError> {
        self.lock().dispose_calls += 1;
        if self.fail_dispose {
            Err(EngineError::Backend("dispose blew up".into()))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
struct FactoryState {
    engines: Vec<Arc<FakeEngine>>,
    fail_next_create: Option<EngineError>,
    fail_dispose: bool,
}

/// Factory that keeps every engine it built. Cloning shares the record, so
/// a test can keep a clone after boxing one into the coordinator.
#[derive(Clone, Default)]
pub struct FakeEngineFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl FakeEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FactoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_next_create(&self, err: EngineError) {
        self.lock().fail_next_create = Some(err);
    }

    /// Engines built from now on report an error from `dispose()`.
    pub fn fail_dispose(&self) {
        self.lock().fail_dispose = true;
    }

    pub fn last(&self) -> Arc<FakeEngine> {
        self.lock().engines.last().cloned().expect("no engine constructed")
    }

    pub fn constructed(&self) -> usize {
        self.lock().engines.len()
    }

    pub fn disposed(&self) -> usize {
        self.lock().engines.iter().filter(|e| e.is_disposed()).count()
    }

    /// Engines constructed and not yet disposed.
    pub fn live(&self) -> usize {
        self.constructed() - self.disposed()
    }
}

impl EngineFactory for FakeEngineFactory {
    fn create(
        &mut self,
        id: EngineId,
        _item: &MediaItem,
        sink: EngineSink,
    ) -> Result<Arc<dyn MediaEngine>, EngineError> {
        let mut state = self.lock();
        if let Some(err) = state.fail_next_create.take() {
            return Err(err);
        }
        let engine = Arc::new(FakeEngine::with_sink(id, sink, state.fail_dispose));
        state.engines.push(Arc::clone(&engine));
        Ok(engine)
    }
}
