//! Media engine capability consumed by the coordinator.
//!
//! **Why**: the native decode/render pipeline is platform code. The
//! coordinator only needs a narrow contract: prepare, transport commands,
//! one periodic progress observation, dispose.
//!
//! # Message boundary
//!
//! Engines never touch coordinator state. Every asynchronous outcome
//! (prepare finished, stall, end of media, progress tick) is posted through
//! an [`EngineSink`] onto a channel that the owner thread drains with
//! `PresentationCoordinator::pump()`. Each sink is stamped with the
//! generation of the session it was created for, so completions that arrive
//! after the session was superseded are recognized as stale and dropped.

use crossbeam_channel::Sender;
use log::trace;
use std::sync::Arc;

use super::ids::{EngineId, MediaId, MediaItem};

/// Periodic progress callback handed to [`MediaEngine::observe_progress`].
/// Receives the current playback position in seconds. May be invoked from
/// any thread.
pub type TickCallback = Box<dyn Fn(f64) + Send + Sync + 'static>;

/// Engine-issued handle for one periodic observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgressToken(pub u64);

/// Opaque native render target (layer/surface handle).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderTarget(pub u64);

/// Facts learned when preparation succeeds.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedInfo {
    /// Media duration in seconds, if the container reports one.
    pub duration: Option<f64>,
}

/// Engine failures
#[derive(Clone, Debug, PartialEq)]
pub enum EngineError {
    InvalidUrl(String),
    Network(String),
    Codec(String),
    Unsupported(String),
    /// Call reached an engine that was already released.
    Disposed,
    Backend(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidUrl(u) => write!(f, "Invalid media URL: {}", u),
            EngineError::Network(e) => write!(f, "Network error: {}", e),
            EngineError::Codec(e) => write!(f, "Codec error: {}", e),
            EngineError::Unsupported(e) => write!(f, "Unsupported format: {}", e),
            EngineError::Disposed => write!(f, "Engine already disposed"),
            EngineError::Backend(e) => write!(f, "Engine backend error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

/// Decode/render/playback pipeline for one media resource.
///
/// Methods take `&self`: implementations wrap native handles with their own
/// interior synchronization, and the coordinator shares the instance with
/// the time observer registry.
pub trait MediaEngine: Send + Sync {
    /// Start preparing `url`. Returns immediately; the outcome is posted
    /// through the sink the engine was created with.
    fn prepare(&self, url: &str);

    /// Cooperatively abort an in-flight prepare. The engine may still post a
    /// late completion, which the coordinator ignores.
    fn abort_prepare(&self);

    fn play(&self);
    fn pause(&self);
    fn seek(&self, seconds: f64);
    fn set_muted(&self, muted: bool);
    fn set_rate(&self, rate: f32);
    /// Output level in `0.0..=1.0`, independent of mute.
    fn set_volume(&self, volume: f32);

    /// Register a periodic progress callback.
    fn observe_progress(&self, interval_ms: u64, on_tick: TickCallback) -> ProgressToken;

    /// Cancel a registration made with `observe_progress`.
    fn cancel_observation(&self, token: ProgressToken);

    fn render_target(&self) -> RenderTarget;

    /// Release native resources. The coordinator calls this at most once
    /// per engine.
    fn dispose(&self) -> Result<(), EngineError>;
}

/// Constructs engines. The coordinator is the only caller.
pub trait EngineFactory {
    fn create(
        &mut self,
        id: EngineId,
        item: &MediaItem,
        sink: EngineSink,
    ) -> Result<Arc<dyn MediaEngine>, EngineError>;
}

/// Asynchronous engine notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    Prepared(Result<PreparedInfo, EngineError>),
    Progress(f64),
    /// End of the buffered range, in seconds.
    Buffered(f64),
    Stalled,
    Resumed,
    Ended,
    /// Playback failure after preparation succeeded.
    Failed(EngineError),
}

/// One notification crossing from engine context to owner context.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineMessage {
    pub generation: u64,
    pub engine: EngineId,
    pub event: EngineEvent,
}

/// Generation-stamped sender given to each engine at construction.
#[derive(Clone, Debug)]
pub struct EngineSink {
    generation: u64,
    engine: EngineId,
    tx: Sender<EngineMessage>,
}

impl EngineSink {
    pub fn new(generation: u64, engine: EngineId, tx: Sender<EngineMessage>) -> Self {
        Self { generation, engine, tx }
    }

    pub fn engine(&self) -> EngineId {
        self.engine
    }

    /// Post an event. A closed channel means the coordinator is gone; the
    /// event is dropped.
    pub fn send(&self, event: EngineEvent) {
        let msg = EngineMessage {
            generation: self.generation,
            engine: self.engine,
            event,
        };
        if self.tx.send(msg).is_err() {
            trace!("{}: coordinator gone, dropping event", self.engine);
        }
    }

    pub fn prepared(&self, result: Result<PreparedInfo, EngineError>) {
        self.send(EngineEvent::Prepared(result));
    }

    pub fn progress(&self, seconds: f64) {
        self.send(EngineEvent::Progress(seconds));
    }

    pub fn buffered(&self, seconds: f64) {
        self.send(EngineEvent::Buffered(seconds));
    }

    pub fn stalled(&self) {
        self.send(EngineEvent::Stalled);
    }

    pub fn resumed(&self) {
        self.send(EngineEvent::Resumed);
    }

    pub fn ended(&self) {
        self.send(EngineEvent::Ended);
    }

    pub fn failed(&self, err: EngineError) {
        self.send(EngineEvent::Failed(err));
    }

    /// Progress callback for the time observer that posts ticks through
    /// this sink.
    pub fn tick_callback(&self) -> TickCallback {
        let sink = self.clone();
        Box::new(move |seconds| sink.progress(seconds))
    }
}

/// Borrowed, read-only reference a host uses to render the live engine.
///
/// Carries no capability to command or dispose the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderHandle {
    pub engine: EngineId,
    pub media_id: MediaId,
    pub target: RenderTarget,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_sink_stamps_generation() {
        let (tx, rx) = unbounded();
        let sink = EngineSink::new(3, EngineId(1), tx);
        sink.progress(1.5);
        sink.ended();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.generation, 3);
        assert_eq!(first.engine, EngineId(1));
        assert_eq!(first.event, EngineEvent::Progress(1.5));
        assert_eq!(rx.try_recv().unwrap().event, EngineEvent::Ended);
    }

    #[test]
    fn test_tick_callback_posts_progress() {
        let (tx, rx) = unbounded();
        let sink = EngineSink::new(1, EngineId(9), tx);
        let tick = sink.tick_callback();
        tick(4.0);
        assert_eq!(rx.try_recv().unwrap().event, EngineEvent::Progress(4.0));
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (tx, rx) = unbounded();
        drop(rx);
        let sink = EngineSink::new(1, EngineId(1), tx);
        sink.stalled();
    }
}
