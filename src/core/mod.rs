//! Core coordinator modules - engine contract, session, registry, drag, events
//!
//! These modules form the playback coordinator, independent of any UI.

pub mod coordinator;
pub mod drag;
pub mod engine;
pub mod event_bus;
pub mod ids;
pub mod registry;
pub mod session;
pub mod state;

#[cfg(test)]
pub mod testing;

// Re-exports for convenience
pub use coordinator::{LifecycleSignal, PresentationCoordinator};
pub use drag::{DragConfig, DragGesture, DragResolution, MiniFeedback};
pub use engine::{
    EngineError, EngineEvent, EngineFactory, EngineMessage, EngineSink, MediaEngine, PreparedInfo,
    ProgressToken, RenderHandle, RenderTarget, TickCallback,
};
pub use event_bus::{EventBus, SessionEvent, SubscriptionId};
pub use ids::{EngineId, HostId, MediaId, MediaItem};
pub use registry::{ObserverToken, TimeObserverRegistry};
pub use session::{CommandOutcome, PlaybackSession, SessionError, TransportState, format_time};
pub use state::{PresentationMode, SessionState};
