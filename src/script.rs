//! JSON scripts driving a coordinator, for the demo binary.
//!
//! A script is a list of steps. Unit steps are bare strings, the rest are
//! single-key objects:
//!
//! ```json
//! [
//!   {"inline": {"host": "feed", "media": "a", "url": "sim://a?duration=30"}},
//!   {"wait_ms": 300},
//!   {"volume": 0.5},
//!   {"adopt": {"host": "detail", "mode": "fullscreen"}},
//!   "minimize",
//!   {"drag": {"deltas": [60, 60], "velocity": 0}},
//!   "close"
//! ]
//! ```

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::core::coordinator::{LifecycleSignal, PresentationCoordinator};
use crate::core::drag::DragResolution;
use crate::core::ids::{HostId, MediaItem};
use crate::core::session::{CommandOutcome, TransportState};
use crate::core::state::{PresentationMode, SessionState};

/// Pump interval while waiting.
const WAIT_STEP: Duration = Duration::from_millis(10);

pub const DEMO_SCRIPT: &str = r#"[
    {"inline": {"host": "feed", "media": "trailer", "url": "sim://trailer?duration=6&load_ms=120"}},
    {"wait_ms": 500},
    {"inline": {"host": "detail", "media": "trailer", "url": "sim://trailer?duration=6"}},
    {"seek": 2.5},
    "mute",
    "minimize",
    {"wait_ms": 300},
    {"drag": {"deltas": [20, 25], "velocity": 0}},
    {"drag": {"deltas": [-70], "velocity": 0}},
    {"disappear": "detail"},
    {"drag": {"deltas": [60, 60], "velocity": 0}},
    {"inline": {"host": "shorts", "media": "short-1", "url": "sim://short-1?duration=1.5&load_ms=80&stall_at=0.5&stall_ms=200"}},
    {"inline": {"host": "shorts", "media": "short-2", "url": "sim://short-2?duration=1&load_ms=80"}},
    {"wait_ms": 400},
    "background",
    {"wait_ms": 200},
    "foreground",
    {"wait_ms": 1000},
    {"open": {"host": "live", "media": "channel-7", "url": "sim://channel-7?load_ms=60", "mode": "fullscreen"}},
    {"volume": 0.6},
    {"wait_ms": 200},
    "minimize",
    {"inline": {"host": "feed", "media": "broken", "url": "sim://broken?load_ms=50&fail=network"}},
    {"wait_ms": 200},
    "retry",
    {"wait_ms": 200},
    "close",
    "close"
]"#;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeArg {
    Inline,
    Mini,
    Fullscreen,
}

impl ModeArg {
    fn for_host(self, host: &HostId) -> PresentationMode {
        match self {
            ModeArg::Inline => PresentationMode::Inline(host.clone()),
            ModeArg::Mini => PresentationMode::Mini(0.0),
            ModeArg::Fullscreen => PresentationMode::Fullscreen,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Inline { host: String, media: String, url: String },
    /// Start playback directly in `mode`.
    Open { host: String, media: String, url: String, mode: ModeArg },
    Adopt { host: String, mode: ModeArg },
    Minimize,
    Expand,
    Close,
    Retry,
    Play,
    Pause,
    Toggle,
    Seek(f64),
    SeekFraction(f64),
    SkipForward,
    SkipBackward,
    Mute,
    Unmute,
    Volume(f32),
    Rate(f32),
    Loop(bool),
    Drag {
        deltas: Vec<f64>,
        #[serde(default)]
        velocity: f64,
    },
    Background,
    Foreground,
    Disappear(String),
    WaitMs(u64),
}

/// What a step did.
#[derive(Clone, Debug, PartialEq)]
pub enum StepResult {
    Command(CommandOutcome),
    Drag(Option<DragResolution>),
    /// Engine messages consumed while waiting.
    Waited(usize),
}

pub fn parse_script(raw: &str) -> Result<Vec<Step>> {
    serde_json::from_str(raw).context("Failed to parse script")
}

pub fn load_script(path: &Path) -> Result<Vec<Step>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    parse_script(&raw).with_context(|| format!("Invalid script: {}", path.display()))
}

/// Run one step. Engine messages are pumped before the step runs.
pub fn apply(coord: &mut PresentationCoordinator, step: &Step) -> StepResult {
    coord.pump();
    debug!("Step: {:?}", step);
    let outcome = match step {
        Step::Inline { host, media, url } => {
            coord.request_inline(HostId::new(host.as_str()), &MediaItem::new(media.as_str(), url.as_str()))
        }
        Step::Open { host, media, url, mode } => {
            let host = HostId::new(host.as_str());
            let mode = mode.for_host(&host);
            coord.request_playback(host, &MediaItem::new(media.as_str(), url.as_str()), mode)
        }
        Step::Adopt { host, mode } => {
            let host = HostId::new(host.as_str());
            let mode = mode.for_host(&host);
            coord.adopt(host, mode)
        }
        Step::Minimize => coord.minimize(),
        Step::Expand => coord.expand(),
        Step::Close => coord.close(),
        Step::Retry => coord.retry(),
        Step::Play => coord.play(),
        Step::Pause => coord.pause(),
        Step::Toggle => coord.toggle_play_pause(),
        Step::Seek(t) => coord.seek(*t),
        Step::SeekFraction(f) => coord.seek_to_fraction(*f),
        Step::SkipForward => coord.skip_forward(),
        Step::SkipBackward => coord.skip_backward(),
        Step::Mute => coord.set_muted(true),
        Step::Unmute => coord.set_muted(false),
        Step::Volume(v) => coord.set_volume(*v),
        Step::Rate(r) => coord.set_rate(*r),
        Step::Loop(on) => coord.set_looping(*on),
        Step::Drag { deltas, velocity } => {
            for d in deltas {
                coord.update_drag_offset(*d);
            }
            return StepResult::Drag(coord.commit_drag(*velocity));
        }
        Step::Background => coord.handle_lifecycle(LifecycleSignal::Background),
        Step::Foreground => coord.handle_lifecycle(LifecycleSignal::Foreground),
        Step::Disappear(host) => {
            coord.handle_lifecycle(LifecycleSignal::ViewDisappeared(HostId::new(host.as_str())))
        }
        Step::WaitMs(ms) => return StepResult::Waited(wait(coord, Duration::from_millis(*ms))),
    };
    StepResult::Command(outcome)
}

/// Pump engine messages for `duration`.
pub fn wait(coord: &mut PresentationCoordinator, duration: Duration) -> usize {
    let deadline = Instant::now() + duration;
    let mut consumed = coord.pump();
    while Instant::now() < deadline {
        thread::sleep(WAIT_STEP);
        consumed += coord.pump();
    }
    consumed
}

/// One-line state summary.
pub fn describe(state: &SessionState) -> String {
    let mode = match &state.mode {
        PresentationMode::Inline(host) => format!("Inline({})", host),
        PresentationMode::Mini(offset) if *offset != 0.0 => format!("Mini({:+.0})", offset),
        other => other.name().to_string(),
    };
    let session = &state.session;
    let Some(media) = session.media_id() else {
        return format!("[{}] idle", mode);
    };

    let transport = match session.transport() {
        TransportState::Failed(reason) => format!("Failed({})", reason),
        other => other.name().to_string(),
    };
    let mut line = format!(
        "[{}] {} {} {} / {} ({:.0}%) buf {:.0}%",
        mode,
        media,
        transport,
        session.current_time_string(),
        session.duration_string(),
        session.progress() * 100.0,
        session.buffered_fraction() * 100.0
    );
    if session.is_muted() {
        line.push_str(" muted");
    } else if session.volume() < 1.0 {
        line.push_str(&format!(" vol {:.0}%", session.volume() * 100.0));
    }
    if let Some(render) = &state.render {
        line.push_str(&format!(" {}", render.engine));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::core::testing::FakeEngineFactory;

    #[test]
    fn test_parse_steps() {
        let steps = parse_script(
            r#"[
                {"inline": {"host": "detail", "media": "a", "url": "sim://a?duration=30"}},
                "minimize",
                {"wait_ms": 300},
                {"seek": 12.5},
                {"drag": {"deltas": [10, 20]}},
                {"adopt": {"host": "x", "mode": "fullscreen"}},
                {"disappear": "detail"}
            ]"#,
        )
        .unwrap();

        assert_eq!(steps.len(), 7);
        assert_eq!(steps[1], Step::Minimize);
        assert_eq!(steps[2], Step::WaitMs(300));
        assert_eq!(steps[4], Step::Drag { deltas: vec![10.0, 20.0], velocity: 0.0 });
        assert_eq!(steps[5], Step::Adopt { host: "x".into(), mode: ModeArg::Fullscreen });
    }

    #[test]
    fn test_demo_script_parses() {
        assert!(parse_script(DEMO_SCRIPT).unwrap().len() > 10);
    }

    #[test]
    fn test_unknown_step_is_error() {
        let err = parse_script(r#"["explode"]"#).unwrap_err();
        assert!(err.to_string().contains("Failed to parse script"));
    }

    #[test]
    fn test_apply_against_fake_engine() {
        let factory = FakeEngineFactory::new();
        let mut coord = PresentationCoordinator::new(Box::new(factory.clone()), CoordinatorConfig::default());

        let inline = Step::Inline { host: "feed".into(), media: "a".into(), url: "sim://a".into() };
        assert_eq!(apply(&mut coord, &inline), StepResult::Command(CommandOutcome::Applied));
        factory.last().resolve(Some(30.0));
        apply(&mut coord, &Step::Minimize);
        assert!(coord.mode().is_mini());

        let drag = Step::Drag { deltas: vec![60.0, 60.0], velocity: 0.0 };
        assert_eq!(apply(&mut coord, &drag), StepResult::Drag(Some(DragResolution::Dismiss)));
        assert_eq!(factory.disposed(), 1);
    }

    #[test]
    fn test_open_and_volume_steps() {
        let steps = parse_script(
            r#"[
                {"open": {"host": "live", "media": "c", "url": "sim://c", "mode": "fullscreen"}},
                {"volume": 0.5}
            ]"#,
        )
        .unwrap();
        assert_eq!(steps[1], Step::Volume(0.5));

        let factory = FakeEngineFactory::new();
        let mut coord = PresentationCoordinator::new(Box::new(factory.clone()), CoordinatorConfig::default());
        assert_eq!(apply(&mut coord, &steps[0]), StepResult::Command(CommandOutcome::Applied));
        assert_eq!(*coord.mode(), PresentationMode::Fullscreen);
        assert_eq!(coord.owner(), Some(&HostId::new("live")));

        apply(&mut coord, &steps[1]);
        assert_eq!(factory.last().volume(), Some(0.5));
        factory.last().resolve(Some(60.0));
        coord.pump();
        assert_eq!(
            describe(&coord.state()),
            "[Fullscreen] c Playing 0:00 / 1:00 (0%) buf 0% vol 50% engine#1"
        );
    }

    #[test]
    fn test_describe() {
        let factory = FakeEngineFactory::new();
        let mut coord = PresentationCoordinator::new(Box::new(factory.clone()), CoordinatorConfig::default());
        assert_eq!(describe(&coord.state()), "[Hidden] idle");

        coord.request_inline("feed".into(), &MediaItem::new("a", "sim://a"));
        factory.last().resolve(Some(90.0));
        coord.pump();
        coord.seek(45.0);
        assert_eq!(
            describe(&coord.state()),
            "[Inline(feed)] a Playing 0:45 / 1:30 (50%) buf 0% engine#1"
        );
    }
}
