//! Presentation coordinator - the one owner of the live media engine.
//!
//! Many screens can ask for video (feed cell, detail view, short-form feed,
//! mini-player, fullscreen); at most one engine is ever live. The coordinator
//! is the only code that constructs, commands or disposes engines. Hosts
//! observe snapshots and send commands.
//!
//! **Used by**: host views (commands + `EventBus` subscriptions), the app
//! lifecycle layer (`handle_lifecycle`), the owner-thread loop (`pump`).
//!
//! # Ownership model
//!
//! Constructed once at startup and injected into hosts; there is no global
//! instance. All mutation happens on the owner thread through `&mut self`.
//! Engines post asynchronous outcomes through an [`EngineSink`] channel,
//! drained by [`PresentationCoordinator::pump`].
//!
//! # Generation counter
//!
//! Incremented on every start and every teardown. Engine messages carry the
//! generation of the session they were created for; mismatches are stale and
//! dropped. This is how a superseded prepare can never move the new session
//! to `Ready`.
//!
//! # Ordering
//!
//! - Supersession: observer detach → stop → dispose of the old engine all
//!   complete before the new engine is constructed.
//! - Adoption: only mode and owner change. No prepare, play, pause or dispose
//!   reaches the engine.

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info, trace, warn};
use std::sync::Arc;

use super::drag::{DragGesture, DragResolution, MiniFeedback};
use super::engine::{
    EngineError, EngineEvent, EngineFactory, EngineMessage, EngineSink, MediaEngine, PreparedInfo,
    RenderHandle,
};
use super::event_bus::{EventBus, SessionEvent, SubscriptionId};
use super::ids::{EngineId, HostId, MediaItem};
use super::registry::{ObserverToken, TimeObserverRegistry};
use super::session::{CommandOutcome, PlaybackSession, SessionError, TransportState};
use super::state::{PresentationMode, SessionState};
use crate::config::CoordinatorConfig;

/// External lifecycle notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleSignal {
    /// App moved to background: pause, never close.
    Background,
    Foreground,
    /// A host view left the screen (navigation pop, cell recycled).
    ViewDisappeared(HostId),
}

/// The engine currently owned, with its observer registration.
struct LiveEngine {
    id: EngineId,
    engine: Arc<dyn MediaEngine>,
    item: MediaItem,
    observer: ObserverToken,
}

pub struct PresentationCoordinator {
    config: CoordinatorConfig,
    factory: Box<dyn EngineFactory>,
    live: Option<LiveEngine>,
    /// Item of the current session; survives a failed prepare for `retry()`.
    item: Option<MediaItem>,
    session: PlaybackSession,
    mode: PresentationMode,
    owner: Option<HostId>,
    registry: TimeObserverRegistry,
    generation: u64,
    next_engine: u64,
    pending_seek: Option<f64>,
    drag: Option<DragGesture>,
    muted_pref: bool,
    volume_pref: f32,
    /// Backgrounding arrived while loading: do not autoplay.
    hold_autoplay: bool,
    resume_after_background: bool,
    bus: EventBus,
    tx: Sender<EngineMessage>,
    rx: Receiver<EngineMessage>,
}

impl PresentationCoordinator {
    pub fn new(factory: Box<dyn EngineFactory>, config: CoordinatorConfig) -> Self {
        let (tx, rx) = unbounded();
        info!(
            "PresentationCoordinator initialized (tick {}ms, autoplay {})",
            config.tick_interval_ms, config.autoplay
        );
        Self {
            config,
            factory,
            live: None,
            item: None,
            session: PlaybackSession::idle(),
            mode: PresentationMode::Hidden,
            owner: None,
            registry: TimeObserverRegistry::new(),
            generation: 0,
            next_engine: 0,
            pending_seek: None,
            drag: None,
            muted_pref: false,
            volume_pref: 1.0,
            hold_autoplay: false,
            resume_after_background: false,
            bus: EventBus::new(),
            tx,
            rx,
        }
    }

    // ========== Observation ==========

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn mode(&self) -> &PresentationMode {
        &self.mode
    }

    pub fn owner(&self) -> Option<&HostId> {
        self.owner.as_ref()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Event bus hosts subscribe to. Cloning it is cheap.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(callback)
    }

    pub fn registry(&self) -> &TimeObserverRegistry {
        &self.registry
    }

    pub fn has_live_engine(&self) -> bool {
        self.live.is_some()
    }

    /// Read-only render reference for the live engine.
    pub fn render_handle(&self) -> Option<RenderHandle> {
        self.live.as_ref().map(|l| RenderHandle {
            engine: l.id,
            media_id: l.item.id.clone(),
            target: l.engine.render_target(),
        })
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            session: self.session.clone(),
            mode: self.mode.clone(),
            owner: self.owner.clone(),
            render: self.render_handle(),
        }
    }

    /// Opacity/scale for the mini-player at its current offset.
    pub fn drag_feedback(&self) -> Option<MiniFeedback> {
        match self.mode {
            PresentationMode::Mini(offset) => Some(self.config.drag.feedback(offset)),
            _ => None,
        }
    }

    fn has_session(&self) -> bool {
        self.session.media_id().is_some()
    }

    fn engine(&self) -> Option<Arc<dyn MediaEngine>> {
        self.live.as_ref().map(|l| Arc::clone(&l.engine))
    }

    // ========== Publishing ==========

    fn publish_session(&self) {
        self.bus.emit(SessionEvent::SessionChanged(self.session.clone()));
    }

    fn set_mode(&mut self, mode: PresentationMode) {
        if self.mode != mode {
            debug!("Mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode.clone();
            self.bus.emit(SessionEvent::ModeChanged(mode));
        }
    }

    fn set_owner(&mut self, owner: Option<HostId>) {
        if self.owner != owner {
            let previous = std::mem::replace(&mut self.owner, owner.clone());
            debug!("Owner {:?} -> {:?}", previous, owner);
            self.bus.emit(SessionEvent::OwnerChanged {
                previous,
                current: owner,
            });
        }
    }

    fn set_transport(&mut self, state: TransportState) {
        if *self.session.transport() != state {
            debug!(
                "{}: {} -> {}",
                self.session.media_id().map(|m| m.as_str()).unwrap_or("-"),
                self.session.transport().name(),
                state.name()
            );
            self.session.set_transport(state);
            self.publish_session();
        }
    }

    fn reset_session(&mut self) {
        if self.session != PlaybackSession::idle() {
            self.session = PlaybackSession::idle();
            self.publish_session();
        }
        self.item = None;
    }

    // ========== Host commands: ownership ==========

    /// Show `item` inline in `host`.
    pub fn request_inline(&mut self, host: HostId, item: &MediaItem) -> CommandOutcome {
        self.request_playback(host.clone(), item, PresentationMode::Inline(host))
    }

    /// Play `item` for `host`, presented in `mode` from the start.
    ///
    /// Same media already live → adoption into `mode`. Anything else live, or
    /// the same media after it ended → synchronous teardown first, then a
    /// fresh engine.
    pub fn request_playback(&mut self, host: HostId, item: &MediaItem, mode: PresentationMode) -> CommandOutcome {
        let Some(mode) = Self::resting_mode(Some(&host), mode) else {
            return CommandOutcome::Ignored(SessionError::InvalidTransition {
                command: "request_playback",
                state: "Hidden",
            });
        };
        let same_media = self.live.as_ref().is_some_and(|l| l.item.id == item.id);
        if same_media && *self.session.transport() != TransportState::Ended {
            debug!("request_playback: {} already live, adopting into {}", item.id, host);
            return self.transfer(Some(host), mode, "request_playback");
        }

        if self.teardown("superseded") || self.has_session() {
            self.reset_session();
        }
        self.start_session(Some(host), item, mode, 1.0, false);
        CommandOutcome::Applied
    }

    /// Hand the live session to `host` in `mode` without touching the engine.
    pub fn adopt(&mut self, host: HostId, mode: PresentationMode) -> CommandOutcome {
        self.transfer(Some(host), mode, "adopt")
    }

    pub fn minimize(&mut self) -> CommandOutcome {
        let owner = self.owner.clone();
        self.transfer(owner, PresentationMode::Mini(0.0), "minimize")
    }

    pub fn expand(&mut self) -> CommandOutcome {
        let owner = self.owner.clone();
        self.transfer(owner, PresentationMode::Fullscreen, "expand")
    }

    fn transfer(&mut self, owner: Option<HostId>, mode: PresentationMode, command: &'static str) -> CommandOutcome {
        if !self.has_session() {
            debug!("{}: no active session", command);
            return CommandOutcome::Ignored(SessionError::NoActiveSession);
        }
        let Some(mode) = Self::resting_mode(owner.as_ref(), mode) else {
            return CommandOutcome::Ignored(SessionError::InvalidTransition {
                command,
                state: "Hidden",
            });
        };
        // A gesture never survives a transfer.
        self.drag = None;

        info!(
            "{}: {} {} -> {}",
            command,
            self.session.media_id().map(|m| m.as_str()).unwrap_or("-"),
            self.mode.name(),
            mode.name()
        );
        self.set_owner(owner);
        self.set_mode(mode);
        CommandOutcome::Applied
    }

    /// Target mode as stored: Mini rests at 0 and Inline names the owning
    /// host. `None` for Hidden, which only `close()` reaches.
    fn resting_mode(owner: Option<&HostId>, mode: PresentationMode) -> Option<PresentationMode> {
        match mode {
            PresentationMode::Hidden => None,
            PresentationMode::Mini(_) => Some(PresentationMode::Mini(0.0)),
            PresentationMode::Inline(host) => Some(PresentationMode::Inline(owner.cloned().unwrap_or(host))),
            other => Some(other),
        }
    }

    /// Fully release the engine: mode `Hidden`, session `Idle`.
    ///
    /// Idempotent; a second call is a no-op.
    pub fn close(&mut self) -> CommandOutcome {
        if !self.has_session() && self.live.is_none() && self.mode.is_hidden() {
            trace!("close: already closed");
            return CommandOutcome::Ignored(SessionError::NoActiveSession);
        }
        self.teardown("closed");
        self.drag = None;
        self.hold_autoplay = false;
        self.resume_after_background = false;
        self.reset_session();
        self.set_mode(PresentationMode::Hidden);
        self.set_owner(None);
        info!("Session closed");
        CommandOutcome::Applied
    }

    /// Restart a failed session in place, keeping its rate and loop flag.
    pub fn retry(&mut self) -> CommandOutcome {
        if !self.session.transport().is_failed() {
            return CommandOutcome::Ignored(SessionError::InvalidTransition {
                command: "retry",
                state: self.session.transport().name(),
            });
        }
        let Some(item) = self.item.clone() else {
            return CommandOutcome::Ignored(SessionError::NoActiveSession);
        };
        info!("Retrying {}", item.id);
        let rate = self.session.playback_rate();
        let looping = self.session.is_looping();
        self.teardown("retry");
        let owner = self.owner.clone();
        let mode = self.mode.clone();
        self.start_session(owner, &item, mode, rate, looping);
        CommandOutcome::Applied
    }

    // ========== Lifecycle ==========

    fn start_session(
        &mut self,
        owner: Option<HostId>,
        item: &MediaItem,
        mode: PresentationMode,
        rate: f32,
        looping: bool,
    ) {
        self.generation += 1;
        self.next_engine += 1;
        let generation = self.generation;
        let id = EngineId(self.next_engine);
        let muted = self.config.inherit_mute && self.muted_pref;

        self.session = PlaybackSession::loading(item.id.clone(), muted, self.volume_pref, rate, looping);
        self.item = Some(item.clone());
        self.pending_seek = None;
        self.drag = None;
        self.hold_autoplay = false;
        self.resume_after_background = false;
        self.set_owner(owner);
        self.set_mode(mode);

        let sink = EngineSink::new(generation, id, self.tx.clone());
        match self.factory.create(id, item, sink.clone()) {
            Ok(engine) => {
                let observer =
                    self.registry
                        .attach(id, &engine, self.config.tick_interval_ms, sink.tick_callback());
                engine.prepare(&item.url);
                info!("Started {} on {} (generation {})", item.id, id, generation);
                self.live = Some(LiveEngine {
                    id,
                    engine,
                    item: item.clone(),
                    observer,
                });
            }
            Err(e) => {
                let err = SessionError::PrepareFailed(e.to_string());
                warn!("{}: {}", item.id, err);
                self.session.fail(e.to_string());
            }
        }
        self.publish_session();
    }

    /// Synchronous stop-the-world release of the live engine.
    ///
    /// Observer detach, stop and dispose all happen before returning.
    /// Returns whether an engine was released.
    fn teardown(&mut self, reason: &str) -> bool {
        self.generation += 1;
        self.pending_seek = None;
        let Some(live) = self.live.take() else {
            return false;
        };

        if *self.session.transport() == TransportState::Loading {
            live.engine.abort_prepare();
            debug!("{}: {}", live.id, SessionError::EngineDisposedWhileLoading);
        }

        self.registry.detach(live.observer);
        live.engine.pause();
        if let Err(e) = live.engine.dispose() {
            warn!("{}: dispose failed ({}), continuing", live.id, e);
        }
        info!("Released {} for {} ({})", live.id, live.item.id, reason);
        true
    }

    fn fail_session(&mut self, reason: String) {
        warn!(
            "{}: {}",
            self.session.media_id().map(|m| m.as_str()).unwrap_or("-"),
            SessionError::PrepareFailed(reason.clone())
        );
        self.session.fail(reason);
        self.teardown("failed");
        self.publish_session();
    }

    /// Apply an external lifecycle signal.
    pub fn handle_lifecycle(&mut self, signal: LifecycleSignal) -> CommandOutcome {
        match signal {
            LifecycleSignal::Background => self.on_background(),
            LifecycleSignal::Foreground => self.on_foreground(),
            LifecycleSignal::ViewDisappeared(host) => {
                if self.owner.as_ref() == Some(&host) && self.mode.is_owning() {
                    debug!("Owner {} disappeared, minimizing", host);
                    self.minimize()
                } else {
                    trace!("View {} disappeared, not an owner", host);
                    CommandOutcome::Ignored(SessionError::InvalidTransition {
                        command: "view_disappeared",
                        state: self.mode.name(),
                    })
                }
            }
        }
    }

    fn on_background(&mut self) -> CommandOutcome {
        if !self.has_session() {
            return CommandOutcome::Ignored(SessionError::NoActiveSession);
        }
        match self.session.transport().clone() {
            TransportState::Playing | TransportState::Buffering => {
                self.pause_engine();
                self.resume_after_background = true;
                info!("Backgrounded: paused");
                CommandOutcome::Applied
            }
            TransportState::Loading => {
                self.hold_autoplay = true;
                self.resume_after_background = self.config.autoplay;
                info!("Backgrounded while loading: autoplay held");
                CommandOutcome::Applied
            }
            state => CommandOutcome::Ignored(SessionError::InvalidTransition {
                command: "background",
                state: state.name(),
            }),
        }
    }

    fn on_foreground(&mut self) -> CommandOutcome {
        self.hold_autoplay = false;
        let resume = std::mem::take(&mut self.resume_after_background);
        if !resume || !self.config.resume_on_foreground {
            return CommandOutcome::Ignored(SessionError::InvalidTransition {
                command: "foreground",
                state: self.session.transport().name(),
            });
        }
        match self.session.transport().clone() {
            TransportState::Ready | TransportState::Paused => {
                info!("Foregrounded: resuming");
                self.play()
            }
            // Still loading: autoplay applies when it resolves.
            TransportState::Loading => CommandOutcome::Queued,
            state => CommandOutcome::Ignored(SessionError::InvalidTransition {
                command: "foreground",
                state: state.name(),
            }),
        }
    }

    // ========== Host commands: transport ==========

    pub fn play(&mut self) -> CommandOutcome {
        if !self.has_session() {
            return CommandOutcome::Ignored(SessionError::NoActiveSession);
        }
        match self.session.transport().clone() {
            TransportState::Ready | TransportState::Paused => {
                if let Some(engine) = self.engine() {
                    engine.play();
                }
                self.set_transport(TransportState::Playing);
                CommandOutcome::Applied
            }
            TransportState::Playing => CommandOutcome::Applied,
            state => {
                debug!("play ignored in {}", state.name());
                CommandOutcome::Ignored(SessionError::InvalidTransition {
                    command: "play",
                    state: state.name(),
                })
            }
        }
    }

    pub fn pause(&mut self) -> CommandOutcome {
        if !self.has_session() {
            return CommandOutcome::Ignored(SessionError::NoActiveSession);
        }
        self.resume_after_background = false;
        match self.session.transport().clone() {
            TransportState::Ready | TransportState::Playing | TransportState::Buffering => {
                self.pause_engine();
                CommandOutcome::Applied
            }
            TransportState::Paused => CommandOutcome::Applied,
            state => {
                debug!("pause ignored in {}", state.name());
                CommandOutcome::Ignored(SessionError::InvalidTransition {
                    command: "pause",
                    state: state.name(),
                })
            }
        }
    }

    fn pause_engine(&mut self) {
        if let Some(engine) = self.engine() {
            engine.pause();
        }
        self.set_transport(TransportState::Paused);
    }

    pub fn toggle_play_pause(&mut self) -> CommandOutcome {
        match self.session.transport().clone() {
            TransportState::Playing | TransportState::Buffering => self.pause(),
            _ => self.play(),
        }
    }

    /// Seek to `target` seconds. Clamped into `[0, duration]`; queued while
    /// loading.
    pub fn seek(&mut self, target: f64) -> CommandOutcome {
        if !self.has_session() {
            return CommandOutcome::Ignored(SessionError::NoActiveSession);
        }
        let state = self.session.transport().clone();
        if state == TransportState::Loading {
            let queued = if target.is_finite() { target.max(0.0) } else { 0.0 };
            debug!("seek to {:.3}s queued until ready", queued);
            self.pending_seek = Some(queued);
            return CommandOutcome::Queued;
        }
        if !state.is_prepared() {
            return CommandOutcome::Ignored(SessionError::InvalidTransition {
                command: "seek",
                state: state.name(),
            });
        }

        let clamped = self.session.set_time(target);
        self.session.note_seek();
        if let Some(engine) = self.engine() {
            engine.seek(clamped);
        }
        self.publish_session();

        if clamped != target {
            let err = SessionError::SeekOutOfRange {
                requested: target,
                clamped,
            };
            debug!("{}", err);
            CommandOutcome::Clamped(err)
        } else {
            CommandOutcome::Applied
        }
    }

    /// Seek by progress fraction (0..1). Needs a known duration.
    pub fn seek_to_fraction(&mut self, fraction: f64) -> CommandOutcome {
        match self.session.duration() {
            Some(d) if d > 0.0 => {
                let f = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
                self.seek(f * d)
            }
            _ if !self.has_session() => CommandOutcome::Ignored(SessionError::NoActiveSession),
            _ => CommandOutcome::Ignored(SessionError::InvalidTransition {
                command: "seek_to_fraction",
                state: self.session.transport().name(),
            }),
        }
    }

    pub fn skip_forward(&mut self) -> CommandOutcome {
        let target = self.session.current_time() + self.config.skip_seconds;
        self.seek(target)
    }

    pub fn skip_backward(&mut self) -> CommandOutcome {
        let target = self.session.current_time() - self.config.skip_seconds;
        self.seek(target)
    }

    pub fn set_muted(&mut self, muted: bool) -> CommandOutcome {
        if !self.has_session() {
            return CommandOutcome::Ignored(SessionError::NoActiveSession);
        }
        self.muted_pref = muted;
        if let Some(engine) = self.engine() {
            engine.set_muted(muted);
        }
        if self.session.is_muted() != muted {
            self.session.set_muted(muted);
            self.publish_session();
        }
        CommandOutcome::Applied
    }

    /// Output level, clamped into `0.0..=1.0`. Independent of mute and kept
    /// for later sessions.
    pub fn set_volume(&mut self, volume: f32) -> CommandOutcome {
        if !self.has_session() {
            return CommandOutcome::Ignored(SessionError::NoActiveSession);
        }
        if !volume.is_finite() {
            return CommandOutcome::Ignored(SessionError::InvalidTransition {
                command: "set_volume",
                state: self.session.transport().name(),
            });
        }
        let level = volume.clamp(0.0, 1.0);
        self.volume_pref = level;
        if let Some(engine) = self.engine() {
            engine.set_volume(level);
        }
        if self.session.volume() != level {
            self.session.set_volume(level);
            self.publish_session();
        }
        CommandOutcome::Applied
    }

    pub fn set_rate(&mut self, rate: f32) -> CommandOutcome {
        if !self.has_session() {
            return CommandOutcome::Ignored(SessionError::NoActiveSession);
        }
        if !rate.is_finite() || rate <= 0.0 {
            return CommandOutcome::Ignored(SessionError::InvalidTransition {
                command: "set_rate",
                state: self.session.transport().name(),
            });
        }
        if let Some(engine) = self.engine() {
            engine.set_rate(rate);
        }
        if self.session.playback_rate() != rate {
            self.session.set_rate(rate);
            self.publish_session();
        }
        CommandOutcome::Applied
    }

    /// Per-session loop flag: replay from 0 on end instead of `Ended`.
    pub fn set_looping(&mut self, looping: bool) -> CommandOutcome {
        if !self.has_session() {
            return CommandOutcome::Ignored(SessionError::NoActiveSession);
        }
        if self.session.is_looping() != looping {
            self.session.set_looping(looping);
            self.publish_session();
        }
        CommandOutcome::Applied
    }

    // ========== Mini-player drag ==========

    /// Add one drag sample. The first sample of a gesture starts from zero.
    pub fn update_drag_offset(&mut self, delta: f64) -> CommandOutcome {
        if !self.mode.is_mini() {
            return self.not_mini("update_drag_offset");
        }
        let offset = self.drag.get_or_insert_with(DragGesture::new).push(delta);
        self.set_mode(PresentationMode::Mini(offset));
        CommandOutcome::Applied
    }

    /// End the gesture: snap back, dismiss (close) or reopen fullscreen.
    ///
    /// Returns `None` when the mini-player is not shown.
    pub fn commit_drag(&mut self, velocity: f64) -> Option<DragResolution> {
        if !self.mode.is_mini() {
            self.drag = None;
            return None;
        }
        let gesture = self.drag.take().unwrap_or_default();
        let distance = gesture.distance();
        let resolution = gesture.commit(&self.config.drag, velocity);
        debug!(
            "commit_drag: distance {:.1}, velocity {:.1} -> {:?}",
            distance, velocity, resolution
        );

        match resolution {
            DragResolution::SnapBack => self.set_mode(PresentationMode::Mini(0.0)),
            DragResolution::Dismiss => {
                self.close();
            }
            DragResolution::Expand => {
                self.expand();
            }
        }
        Some(resolution)
    }

    fn not_mini(&self, command: &'static str) -> CommandOutcome {
        if self.mode.is_hidden() {
            CommandOutcome::Ignored(SessionError::NoActiveSession)
        } else {
            CommandOutcome::Ignored(SessionError::InvalidTransition {
                command,
                state: self.mode.name(),
            })
        }
    }

    // ========== Engine messages ==========

    /// Drain engine notifications on the owner thread. Returns the number of
    /// messages consumed, stale ones included.
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while let Ok(msg) = self.rx.try_recv() {
            self.handle_message(msg);
            count += 1;
        }
        count
    }

    fn handle_message(&mut self, msg: EngineMessage) {
        let current = self.live.as_ref().map(|l| l.id);
        if msg.generation != self.generation || current != Some(msg.engine) {
            trace!(
                "Dropping stale {:?} from {} (generation {} != {})",
                msg.event, msg.engine, msg.generation, self.generation
            );
            return;
        }

        match msg.event {
            EngineEvent::Prepared(Ok(info)) => self.on_prepared(info),
            EngineEvent::Prepared(Err(e)) => self.on_prepare_failed(e),
            EngineEvent::Progress(seconds) => self.on_progress(seconds),
            EngineEvent::Buffered(seconds) => {
                let before = self.session.buffered_fraction();
                self.session.set_buffered(seconds);
                if self.session.buffered_fraction() != before {
                    self.publish_session();
                }
            }
            EngineEvent::Stalled => {
                if *self.session.transport() == TransportState::Playing {
                    self.set_transport(TransportState::Buffering);
                }
            }
            EngineEvent::Resumed => {
                if *self.session.transport() == TransportState::Buffering {
                    self.set_transport(TransportState::Playing);
                }
            }
            EngineEvent::Ended => self.on_reach_end(),
            EngineEvent::Failed(e) => self.fail_session(e.to_string()),
        }
    }

    fn on_prepared(&mut self, info: PreparedInfo) {
        if *self.session.transport() != TransportState::Loading {
            trace!("Prepared outside Loading, ignoring");
            return;
        }
        let Some(engine) = self.engine() else {
            return;
        };

        self.session.mark_ready(info.duration);
        engine.set_muted(self.session.is_muted());
        engine.set_volume(self.session.volume());
        if self.session.playback_rate() != 1.0 {
            engine.set_rate(self.session.playback_rate());
        }
        if let Some(target) = self.pending_seek.take() {
            let clamped = self.session.set_time(target);
            self.session.note_seek();
            engine.seek(clamped);
            debug!("Applied queued seek to {:.3}s", clamped);
        }
        info!(
            "{} ready (duration {})",
            self.session.media_id().map(|m| m.as_str()).unwrap_or("-"),
            self.session.duration_string()
        );
        self.publish_session();

        if self.config.autoplay && !self.hold_autoplay {
            engine.play();
            self.set_transport(TransportState::Playing);
        }
    }

    fn on_prepare_failed(&mut self, err: EngineError) {
        self.fail_session(err.to_string());
    }

    fn on_progress(&mut self, seconds: f64) {
        let state = self.session.transport();
        if !state.is_prepared() {
            return;
        }
        let before = self.session.current_time();
        if self.session.set_time(seconds) != before {
            self.publish_session();
        }
    }

    fn on_reach_end(&mut self) {
        if !matches!(
            self.session.transport(),
            TransportState::Playing | TransportState::Buffering
        ) {
            trace!("Ended outside playback, ignoring");
            return;
        }
        let Some(engine) = self.engine() else {
            return;
        };

        if self.session.is_looping() {
            debug!("Looping back to start");
            engine.seek(0.0);
            engine.play();
            self.session.set_time(0.0);
            self.session.note_seek();
            self.session.set_transport(TransportState::Playing);
            self.publish_session();
            return;
        }

        if let Some(d) = self.session.duration() {
            self.session.set_time(d);
        }
        self.set_transport(TransportState::Ended);
    }
}

impl Drop for PresentationCoordinator {
    fn drop(&mut self) {
        if self.teardown("coordinator dropped") {
            debug!("PresentationCoordinator dropped with a live engine, disposed");
        }
    }
}
