//! Playback session: *what* is playing and its transport state.
//!
//! # State machine
//!
//! ```text
//! Idle -> Loading -> Ready -> Playing <-> Paused -> Ended
//!                              |   ^
//!                              v   |
//!                            Buffering
//! ```
//!
//! Any state except `Idle` may move to `Failed(reason)`. `Loading` falls
//! back to `Idle` when superseded before it resolves. `Ended` is terminal
//! until the next start.
//!
//! The session is a value: hosts receive clones on every publish, only the
//! coordinator mutates it (through the crate-private transition methods).

use serde::Serialize;

use super::ids::MediaId;

/// Transport status of the session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum TransportState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Buffering,
    Ended,
    Failed(String),
}

impl TransportState {
    pub fn is_failed(&self) -> bool {
        matches!(self, TransportState::Failed(_))
    }

    /// States in which the engine is prepared and transport commands apply.
    pub fn is_prepared(&self) -> bool {
        matches!(
            self,
            TransportState::Ready
                | TransportState::Playing
                | TransportState::Paused
                | TransportState::Buffering
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransportState::Idle => "Idle",
            TransportState::Loading => "Loading",
            TransportState::Ready => "Ready",
            TransportState::Playing => "Playing",
            TransportState::Paused => "Paused",
            TransportState::Buffering => "Buffering",
            TransportState::Ended => "Ended",
            TransportState::Failed(_) => "Failed",
        }
    }
}

/// Coordinator error taxonomy.
///
/// Only `PrepareFailed` is ever visible to hosts, as
/// `TransportState::Failed`. The rest are reported through
/// [`CommandOutcome`] or logged.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionError {
    PrepareFailed(String),
    SeekOutOfRange { requested: f64, clamped: f64 },
    EngineDisposedWhileLoading,
    NoActiveSession,
    InvalidTransition {
        command: &'static str,
        state: &'static str,
    },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::PrepareFailed(r) => write!(f, "Prepare failed: {}", r),
            SessionError::SeekOutOfRange { requested, clamped } => {
                write!(f, "Seek to {:.3}s out of range, clamped to {:.3}s", requested, clamped)
            }
            SessionError::EngineDisposedWhileLoading => write!(f, "Engine disposed while loading"),
            SessionError::NoActiveSession => write!(f, "No active session"),
            SessionError::InvalidTransition { command, state } => {
                write!(f, "'{}' not valid in state {}", command, state)
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Result of a host command. Commands never fail across the API; they are
/// applied, adjusted, deferred or ignored.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    Applied,
    /// Applied with an adjusted argument (out-of-range seek).
    Clamped(SessionError),
    /// Deferred until the engine is ready.
    Queued,
    Ignored(SessionError),
}

impl CommandOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, CommandOutcome::Ignored(_))
    }
}

/// Transport-state value for the currently selected media item.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlaybackSession {
    media_id: Option<MediaId>,
    transport: TransportState,
    current_time: f64,
    duration: Option<f64>,
    buffered_fraction: f64,
    is_muted: bool,
    /// Output level in `0.0..=1.0`, independent of mute.
    volume: f32,
    playback_rate: f32,
    looping: bool,
    /// Next buffered report replaces the fraction instead of raising it.
    #[serde(skip)]
    buffered_rebase: bool,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::idle()
    }
}

impl PlaybackSession {
    pub fn idle() -> Self {
        Self {
            media_id: None,
            transport: TransportState::Idle,
            current_time: 0.0,
            duration: None,
            buffered_fraction: 0.0,
            is_muted: false,
            volume: 1.0,
            playback_rate: 1.0,
            looping: false,
            buffered_rebase: false,
        }
    }

    // === Accessors ===

    pub fn media_id(&self) -> Option<&MediaId> {
        self.media_id.as_ref()
    }

    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// `None` until the engine reports it.
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn buffered_fraction(&self) -> f64 {
        self.buffered_fraction
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_idle(&self) -> bool {
        self.transport == TransportState::Idle
    }

    // === Derived values ===

    /// `current_time / duration` when duration > 0, else 0.
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(d) if d > 0.0 => (self.current_time / d).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// Seconds left, or `None` when duration is unknown.
    pub fn remaining(&self) -> Option<f64> {
        self.duration.map(|d| (d - self.current_time).max(0.0))
    }

    pub fn current_time_string(&self) -> String {
        format_time(self.current_time)
    }

    /// `"--:--"` while duration is unknown.
    pub fn duration_string(&self) -> String {
        match self.duration {
            Some(d) => format_time(d),
            None => "--:--".to_string(),
        }
    }

    /// Clamp a target into `[0, duration]` (or `[0, inf)` when unknown).
    pub fn clamp_time(&self, seconds: f64) -> f64 {
        if !seconds.is_finite() {
            return match (seconds > 0.0, self.duration) {
                (true, Some(d)) => d,
                _ => 0.0,
            };
        }
        match self.duration {
            Some(d) => seconds.clamp(0.0, d.max(0.0)),
            None => seconds.max(0.0),
        }
    }

    // === Transitions (coordinator only) ===

    /// Fresh session for `media_id` in `Loading`. Audio and transport
    /// settings are given by the caller so they can carry over between
    /// sessions.
    pub(crate) fn loading(
        media_id: MediaId,
        is_muted: bool,
        volume: f32,
        playback_rate: f32,
        looping: bool,
    ) -> Self {
        Self {
            media_id: Some(media_id),
            transport: TransportState::Loading,
            is_muted,
            volume,
            playback_rate,
            looping,
            ..Self::idle()
        }
    }

    pub(crate) fn mark_ready(&mut self, duration: Option<f64>) {
        self.duration = duration.filter(|d| d.is_finite() && *d >= 0.0);
        self.current_time = self.clamp_time(self.current_time);
        self.transport = TransportState::Ready;
    }

    pub(crate) fn set_transport(&mut self, state: TransportState) {
        self.transport = state;
    }

    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        self.transport = TransportState::Failed(reason.into());
    }

    /// Write a position; out-of-range values are clamped. Returns the value
    /// stored.
    pub(crate) fn set_time(&mut self, seconds: f64) -> f64 {
        self.current_time = self.clamp_time(seconds);
        self.current_time
    }

    /// Record the end of the buffered range.
    ///
    /// Non-decreasing for the same media, except the first report after a
    /// seek, which rebases to the new position.
    pub(crate) fn set_buffered(&mut self, end_seconds: f64) {
        let Some(d) = self.duration.filter(|d| *d > 0.0) else {
            return;
        };
        let fraction = (end_seconds / d).clamp(0.0, 1.0);
        if self.buffered_rebase {
            self.buffered_fraction = fraction;
            self.buffered_rebase = false;
        } else if fraction > self.buffered_fraction {
            self.buffered_fraction = fraction;
        }
    }

    pub(crate) fn note_seek(&mut self) {
        self.buffered_rebase = true;
    }

    pub(crate) fn set_muted(&mut self, muted: bool) {
        self.is_muted = muted;
    }

    pub(crate) fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    pub(crate) fn set_rate(&mut self, rate: f32) {
        self.playback_rate = rate;
    }

    pub(crate) fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }
}

/// Format seconds as `M:SS`, or `H:MM:SS` from one hour up.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = total % 3600 / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
