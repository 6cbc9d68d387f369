//! ONEPLAY - playback session coordinator library
//!
//! One live media engine per process, handed off between inline, mini and
//! fullscreen presentation. Re-exports all modules for use by the binary.

// Core coordinator (engine contract, session, registry, drag, events)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod script;
pub mod sim;

// Re-export commonly used types from core
pub use core::coordinator::{LifecycleSignal, PresentationCoordinator};
pub use core::event_bus::{EventBus, SessionEvent};
pub use core::ids::{HostId, MediaId, MediaItem};
pub use core::session::{CommandOutcome, PlaybackSession, TransportState};
pub use core::state::{PresentationMode, SessionState};
