//! Presentation mode and the snapshot published to hosts.

use serde::Serialize;

use super::engine::RenderHandle;
use super::ids::HostId;
use super::session::PlaybackSession;

/// Where the session is shown. Exactly one is active process-wide.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum PresentationMode {
    Inline(HostId),
    /// Live drag offset from the resting mini position. Gesture feedback
    /// only; reset to 0 after every gesture.
    Mini(f64),
    Fullscreen,
    Hidden,
}

impl PresentationMode {
    pub fn is_hidden(&self) -> bool {
        matches!(self, PresentationMode::Hidden)
    }

    pub fn is_mini(&self) -> bool {
        matches!(self, PresentationMode::Mini(_))
    }

    /// Inline and fullscreen are the owning modes a disappearing host can
    /// hand back to the mini-player.
    pub fn is_owning(&self) -> bool {
        matches!(self, PresentationMode::Inline(_) | PresentationMode::Fullscreen)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PresentationMode::Inline(_) => "Inline",
            PresentationMode::Mini(_) => "Mini",
            PresentationMode::Fullscreen => "Fullscreen",
            PresentationMode::Hidden => "Hidden",
        }
    }
}

/// Immutable snapshot of everything a host may observe.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionState {
    pub session: PlaybackSession,
    pub mode: PresentationMode,
    /// Host that last requested or adopted the session.
    pub owner: Option<HostId>,
    #[serde(skip)]
    pub render: Option<RenderHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owning_modes() {
        assert!(PresentationMode::Fullscreen.is_owning());
        assert!(PresentationMode::Inline("a".into()).is_owning());
        assert!(!PresentationMode::Mini(0.0).is_owning());
        assert!(!PresentationMode::Hidden.is_owning());
    }
}
