//! Mini-player drag physics.
//!
//! A gesture is a finite sequence of vertical offset deltas (positive =
//! down), started from zero and consumed by a single commit. Nothing carries
//! over to the next gesture.
//!
//! # Resolution
//!
//! Given only cumulative distance and release velocity:
//! - down past `dismiss_fraction * travel_range`, or a downward flick faster
//!   than `dismiss_velocity` → `Dismiss` (close the session)
//! - up past `reopen_distance`, or an upward flick faster than
//!   `dismiss_velocity` → `Expand` (back to fullscreen)
//! - anything else → `SnapBack` to the resting mini position

use serde::{Deserialize, Serialize};

/// Thresholds in points and points per second.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    /// Vertical distance between resting position and off-screen.
    pub travel_range: f64,
    /// Share of `travel_range` past which a release dismisses.
    pub dismiss_fraction: f64,
    /// Release speed that dismisses (or reopens, upward) regardless of distance.
    pub dismiss_velocity: f64,
    /// Upward distance that reopens fullscreen. `0` disables reopening.
    pub reopen_distance: f64,
    /// Offset at which the mini-player is fully transparent.
    pub fade_distance: f64,
    /// Offset scale divisor for the shrink effect.
    pub shrink_distance: f64,
    pub min_scale: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            travel_range: 250.0,
            dismiss_fraction: 0.4,
            dismiss_velocity: 800.0,
            reopen_distance: 50.0,
            fade_distance: 100.0,
            shrink_distance: 400.0,
            min_scale: 0.8,
        }
    }
}

impl DragConfig {
    pub fn dismiss_distance(&self) -> f64 {
        self.travel_range * self.dismiss_fraction
    }

    /// Decide the end state of a gesture.
    ///
    /// With no net distance the release velocity picks the direction.
    pub fn resolve(&self, distance: f64, velocity: f64) -> DragResolution {
        let downward = distance > 0.0 || (distance == 0.0 && velocity >= 0.0);
        if downward {
            if distance > self.dismiss_distance() || velocity > self.dismiss_velocity {
                return DragResolution::Dismiss;
            }
            return DragResolution::SnapBack;
        }

        let reopen_enabled = self.reopen_distance > 0.0;
        if reopen_enabled && (-distance > self.reopen_distance || -velocity > self.dismiss_velocity) {
            DragResolution::Expand
        } else {
            DragResolution::SnapBack
        }
    }

    /// Visual feedback for a live offset.
    pub fn feedback(&self, offset: f64) -> MiniFeedback {
        let offset = offset.max(0.0);
        let opacity = if self.fade_distance > 0.0 {
            (1.0 - offset / self.fade_distance).max(0.0)
        } else {
            1.0
        };
        let scale = if self.shrink_distance > 0.0 {
            (1.0 - offset / self.shrink_distance).max(self.min_scale)
        } else {
            1.0
        };
        MiniFeedback { opacity, scale }
    }
}

/// Legal end states of a mini-player drag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DragResolution {
    SnapBack,
    Dismiss,
    Expand,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MiniFeedback {
    pub opacity: f64,
    pub scale: f64,
}

/// One in-progress gesture.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DragGesture {
    distance: f64,
    samples: usize,
}

impl DragGesture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a whole sample sequence into a gesture.
    pub fn from_deltas<I: IntoIterator<Item = f64>>(deltas: I) -> Self {
        let mut gesture = Self::new();
        for d in deltas {
            gesture.push(d);
        }
        gesture
    }

    /// Add one sample. Returns the offset to display: the floating panel
    /// never moves above its resting position.
    pub fn push(&mut self, delta: f64) -> f64 {
        if delta.is_finite() {
            self.distance += delta;
            self.samples += 1;
        }
        self.offset()
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn offset(&self) -> f64 {
        self.distance.max(0.0)
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Consume the gesture.
    pub fn commit(self, config: &DragConfig, velocity: f64) -> DragResolution {
        let velocity = if velocity.is_finite() { velocity } else { 0.0 };
        config.resolve(self.distance, velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dismiss_distance_is_100() {
        assert!((DragConfig::default().dismiss_distance() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolution_by_distance() {
        let cfg = DragConfig::default();
        assert_eq!(cfg.resolve(45.0, 10.0), DragResolution::SnapBack);
        assert_eq!(cfg.resolve(120.0, 0.0), DragResolution::Dismiss);
        assert_eq!(cfg.resolve(100.0, 0.0), DragResolution::SnapBack);
        assert_eq!(cfg.resolve(0.0, 0.0), DragResolution::SnapBack);
    }

    #[test]
    fn test_fast_flick_dismisses() {
        let cfg = DragConfig::default();
        assert_eq!(cfg.resolve(20.0, 1200.0), DragResolution::Dismiss);
    }

    #[test]
    fn test_upward_reopens() {
        let cfg = DragConfig::default();
        assert_eq!(cfg.resolve(-60.0, 0.0), DragResolution::Expand);
        assert_eq!(cfg.resolve(-20.0, 0.0), DragResolution::SnapBack);
        assert_eq!(cfg.resolve(-10.0, -900.0), DragResolution::Expand);

        let no_reopen = DragConfig {
            reopen_distance: 0.0,
            ..DragConfig::default()
        };
        assert_eq!(no_reopen.resolve(-200.0, -2000.0), DragResolution::SnapBack);
    }

    #[test]
    fn test_zero_distance_flick_follows_velocity() {
        let cfg = DragConfig::default();
        assert_eq!(cfg.resolve(0.0, -900.0), DragResolution::Expand);
        assert_eq!(cfg.resolve(0.0, 900.0), DragResolution::Dismiss);
        assert_eq!(cfg.resolve(0.0, -100.0), DragResolution::SnapBack);
        assert_eq!(cfg.resolve(0.0, 0.0), DragResolution::SnapBack);
        assert_eq!(DragGesture::new().commit(&cfg, -1200.0), DragResolution::Expand);
    }

    #[test]
    fn test_gesture_accumulates_deltas() {
        let cfg = DragConfig::default();
        let g = DragGesture::from_deltas([20.0, 15.0, 10.0]);
        assert_eq!(g.samples(), 3);
        assert!((g.distance() - 45.0).abs() < 1e-9);
        assert_eq!(g.commit(&cfg, 0.0), DragResolution::SnapBack);

        let g = DragGesture::from_deltas([60.0, 60.0]);
        assert_eq!(g.commit(&cfg, 0.0), DragResolution::Dismiss);
    }

    #[test]
    fn test_offset_floor_and_nan_samples() {
        let mut g = DragGesture::new();
        assert_eq!(g.push(-30.0), 0.0);
        assert_eq!(g.push(f64::NAN), 0.0);
        assert_eq!(g.samples(), 1);
        assert_eq!(g.push(50.0), 20.0);
    }

    #[test]
    fn test_feedback() {
        let cfg = DragConfig::default();
        let rest = cfg.feedback(0.0);
        assert_eq!(rest, MiniFeedback { opacity: 1.0, scale: 1.0 });

        let half = cfg.feedback(50.0);
        assert!((half.opacity - 0.5).abs() < 1e-9);
        assert!((half.scale - 0.875).abs() < 1e-9);

        let far = cfg.feedback(300.0);
        assert_eq!(far.opacity, 0.0);
        assert!((far.scale - 0.8).abs() < 1e-9);
    }
}
