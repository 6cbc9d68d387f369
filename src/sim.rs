//! Simulated media engine backed by one clock thread per engine.
//!
//! Stands in for a platform decoder in the demo binary. Media is described
//! entirely by its URL:
//!
//! ```text
//! sim://<name>?duration=30&load_ms=200&fail=network&stall_at=5&stall_ms=400&buffer_ahead=8
//! ```
//!
//! - `duration` seconds; omitted means unknown (live stream, never ends)
//! - `load_ms` prepare latency (default 150)
//! - `fail` rejects the prepare: `network`, `codec` or anything else (backend)
//! - `stall_at` / `stall_ms` one buffering stall at a position
//! - `buffer_ahead` seconds buffered past the play head (default 5)
//!
//! All notifications leave through the [`EngineSink`]; the clock thread never
//! touches coordinator state.

use log::{debug, trace, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::engine::{
    EngineError, EngineFactory, EngineSink, MediaEngine, PreparedInfo, ProgressToken,
    RenderTarget, TickCallback,
};
use crate::core::ids::{EngineId, MediaItem};

/// Clock thread resolution.
const STEP: Duration = Duration::from_millis(5);

/// Media parameters parsed from a `sim://` URL.
#[derive(Clone, Debug, PartialEq)]
pub struct SimMedia {
    pub name: String,
    pub duration: Option<f64>,
    pub load_ms: u64,
    pub fail: Option<String>,
    pub stall_at: Option<f64>,
    pub stall_ms: u64,
    pub buffer_ahead: f64,
}

impl SimMedia {
    pub fn parse(url: &str) -> Result<Self, EngineError> {
        let rest = url
            .strip_prefix("sim://")
            .ok_or_else(|| EngineError::InvalidUrl(url.to_string()))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));
        if name.is_empty() {
            return Err(EngineError::InvalidUrl(url.to_string()));
        }

        let mut media = SimMedia {
            name: name.to_string(),
            duration: None,
            load_ms: 150,
            fail: None,
            stall_at: None,
            stall_ms: 300,
            buffer_ahead: 5.0,
        };

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let bad = || EngineError::InvalidUrl(format!("{}: bad '{}' in {}", name, key, url));
            match key {
                "duration" => media.duration = Some(value.parse().map_err(|_| bad())?),
                "load_ms" => media.load_ms = value.parse().map_err(|_| bad())?,
                "fail" => media.fail = Some(value.to_string()),
                "stall_at" => media.stall_at = Some(value.parse().map_err(|_| bad())?),
                "stall_ms" => media.stall_ms = value.parse().map_err(|_| bad())?,
                "buffer_ahead" => media.buffer_ahead = value.parse().map_err(|_| bad())?,
                other => trace!("sim: ignoring unknown parameter '{}'", other),
            }
        }
        Ok(media)
    }

    fn failure(&self) -> Option<EngineError> {
        self.fail.as_deref().map(|kind| match kind {
            "network" => EngineError::Network(format!("{}: host unreachable", self.name)),
            "codec" => EngineError::Codec(format!("{}: unsupported codec", self.name)),
            other => EngineError::Backend(format!("{}: {}", self.name, other)),
        })
    }
}

struct Observer {
    interval: Duration,
    last: Instant,
    on_tick: TickCallback,
}

#[derive(Default)]
struct Clock {
    load_started: Option<Instant>,
    prepared: bool,
    playing: bool,
    position: f64,
    rate: f64,
    muted: bool,
    volume: f32,
    stall_until: Option<Instant>,
    stalled_once: bool,
    last_buffered: f64,
    observers: HashMap<u64, Observer>,
    next_obs: u64,
}

struct Shared {
    clock: Mutex<Clock>,
    stop: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct SimEngine {
    id: EngineId,
    media: SimMedia,
    sink: EngineSink,
    shared: Arc<Shared>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl SimEngine {
    pub fn new(id: EngineId, media: SimMedia, sink: EngineSink) -> Self {
        Self {
            id,
            media,
            sink,
            shared: Arc::new(Shared {
                clock: Mutex::new(Clock {
                    rate: 1.0,
                    volume: 1.0,
                    ..Clock::default()
                }),
                stop: AtomicBool::new(false),
            }),
            handle: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn position(&self) -> f64 {
        self.shared.lock().position
    }

    pub fn is_playing(&self) -> bool {
        self.shared.lock().playing
    }

    pub fn is_muted(&self) -> bool {
        self.shared.lock().muted
    }

    pub fn volume(&self) -> f32 {
        self.shared.lock().volume
    }

    fn spawn_clock(&self) -> Result<(), EngineError> {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle.is_some() {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let sink = self.sink.clone();
        let media = self.media.clone();
        let spawned = thread::Builder::new()
            .name(format!("oneplay-sim-{}", self.id.0))
            .spawn(move || run_clock(shared, sink, media))
            .map_err(|e| EngineError::Backend(format!("failed to spawn clock thread: {}", e)))?;
        *handle = Some(spawned);
        Ok(())
    }

    fn stop_clock(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("{}: clock thread panicked", self.id);
            }
        }
    }
}

fn run_clock(shared: Arc<Shared>, sink: EngineSink, media: SimMedia) {
    trace!("{}: clock started", sink.engine());
    let mut last = Instant::now();

    while !shared.stop.load(Ordering::Relaxed) {
        thread::sleep(STEP);
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;

        let mut clock = shared.lock();

        if let Some(started) = clock.load_started {
            if now.duration_since(started) >= Duration::from_millis(media.load_ms) {
                clock.load_started = None;
                match media.failure() {
                    Some(err) => sink.prepared(Err(err)),
                    None => {
                        clock.prepared = true;
                        sink.prepared(Ok(PreparedInfo {
                            duration: media.duration,
                        }));
                    }
                }
            }
            continue;
        }
        if !clock.prepared {
            continue;
        }

        if let Some(until) = clock.stall_until {
            if now < until {
                continue;
            }
            clock.stall_until = None;
            sink.resumed();
        }

        if clock.playing {
            let rate = clock.rate;
            clock.position += dt * rate;

            if let Some(at) = media.stall_at {
                if !clock.stalled_once && clock.position >= at {
                    clock.stalled_once = true;
                    clock.stall_until = Some(now + Duration::from_millis(media.stall_ms));
                    sink.stalled();
                }
            }

            if let Some(d) = media.duration {
                if clock.position >= d {
                    clock.position = d;
                    clock.playing = false;
                    sink.ended();
                }
            }
        }

        let buffered = match media.duration {
            Some(d) => (clock.position + media.buffer_ahead).min(d),
            None => clock.position + media.buffer_ahead,
        };
        if (buffered - clock.last_buffered).abs() >= 0.5 {
            clock.last_buffered = buffered;
            sink.buffered(buffered);
        }

        let position = clock.position;
        for obs in clock.observers.values_mut() {
            if now.duration_since(obs.last) >= obs.interval {
                obs.last = now;
                (obs.on_tick)(position);
            }
        }
    }
    trace!("{}: clock stopped", sink.engine());
}

impl MediaEngine for SimEngine {
    fn prepare(&self, url: &str) {
        debug!("{}: prepare {}", self.id, url);
        self.shared.lock().load_started = Some(Instant::now());
        if let Err(e) = self.spawn_clock() {
            self.shared.lock().load_started = None;
            self.sink.prepared(Err(e));
        }
    }

    fn abort_prepare(&self) {
        debug!("{}: abort prepare", self.id);
        self.shared.lock().load_started = None;
    }

    fn play(&self) {
        self.shared.lock().playing = true;
    }

    fn pause(&self) {
        self.shared.lock().playing = false;
    }

    fn seek(&self, seconds: f64) {
        let position = seconds.max(0.0);
        let mut clock = self.shared.lock();
        clock.position = position;
        clock.last_buffered = position;
    }

    fn set_muted(&self, muted: bool) {
        self.shared.lock().muted = muted;
    }

    fn set_rate(&self, rate: f32) {
        self.shared.lock().rate = f64::from(rate);
    }

    fn set_volume(&self, volume: f32) {
        self.shared.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn observe_progress(&self, interval_ms: u64, on_tick: TickCallback) -> ProgressToken {
        let mut clock = self.shared.lock();
        clock.next_obs += 1;
        let token = clock.next_obs;
        clock.observers.insert(
            token,
            Observer {
                interval: Duration::from_millis(interval_ms.max(1)),
                last: Instant::now(),
                on_tick,
            },
        );
        ProgressToken(token)
    }

    fn cancel_observation(&self, token: ProgressToken) {
        self.shared.lock().observers.remove(&token.0);
    }

    fn render_target(&self) -> RenderTarget {
        RenderTarget(self.id.0)
    }

    fn dispose(&self) -> Result<(), EngineError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Err(EngineError::Disposed);
        }
        self.stop_clock();
        let mut clock = self.shared.lock();
        clock.observers.clear();
        clock.playing = false;
        debug!("{}: disposed", self.id);
        Ok(())
    }
}

impl Drop for SimEngine {
    fn drop(&mut self) {
        self.stop_clock();
    }
}

/// Builds a [`SimEngine`] per item. Only `sim://` URLs are supported.
#[derive(Debug, Default)]
pub struct SimEngineFactory;

impl SimEngineFactory {
    pub fn new() -> Self {
        Self
    }
}

impl EngineFactory for SimEngineFactory {
    fn create(
        &mut self,
        id: EngineId,
        item: &MediaItem,
        sink: EngineSink,
    ) -> Result<Arc<dyn MediaEngine>, EngineError> {
        let media = SimMedia::parse(&item.url)?;
        debug!("SimEngineFactory: {} for {} ({:?})", id, item.id, media);
        Ok(Arc::new(SimEngine::new(id, media, sink)))
    }
}
