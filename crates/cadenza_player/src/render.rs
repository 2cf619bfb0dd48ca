// SPDX-License-Identifier: MIT OR Apache-2.0
//! Renderer boundary.
//!
//! The update thread is the sole writer of session state; everything the draw
//! side needs is published as a [`VisualFrame`] snapshot through
//! [`SharedFrame`]. The draw side reads the most recently committed frame and
//! tolerates at most one frame of staleness. This core issues no drawing
//! calls itself; a renderer receives frames through [`FrameSink`].

use crate::chart::{EntityId, Position};
use crate::controller::CursorState;
use crate::session::SessionPhase;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One active entity as the renderer sees it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveEntity {
    /// Stable entity ID
    pub id: EntityId,
    /// Playfield position
    pub position: Position,
    /// Fade alpha in `[0, 1]`
    pub alpha: f64,
    /// Progress toward the hit moment in `[0, 1]`, for approach effects
    pub approach: f64,
    /// Whether this entity opens a new combo
    pub new_combo: bool,
}

/// Everything the draw side needs for one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualFrame {
    /// Session phase at publish time
    pub phase: SessionPhase,
    /// Progress time, in milliseconds
    pub progress_ms: f64,
    /// Background dim visibility in `[0, 1]` (1 undimmed)
    pub dim: f64,
    /// Background blur amount in `[0, 1]`
    pub blur: f64,
    /// Effects/logo visibility in `[0, 1]`
    pub effects: f64,
    /// Cursor visibility in `[0, 1]`
    pub cursor_alpha: f64,
    /// HUD visibility in `[0, 1]`
    pub hud_alpha: f64,
    /// Global object visibility in `[0, 1]`
    pub objects_alpha: f64,
    /// Photosensitivity warning visibility in `[0, 1]`
    pub warning_alpha: f64,
    /// Applied output volume in `[0, 1]`
    pub volume: f64,
    /// Current playback speed multiplier
    pub speed: f64,
    /// Current pitch multiplier
    pub pitch: f64,
    /// Beat-reactive scale, at least one
    pub beat_pulse: f64,
    /// Cursors reported by the controller
    pub cursors: Vec<CursorState>,
    /// Entities whose visibility window contains the progress time
    pub active_entities: Vec<ActiveEntity>,
}

/// Shared handle to the last-published frame
///
/// The update thread publishes, the draw side snapshots; the lock is held
/// only for the copy in either direction.
#[derive(Debug, Clone, Default)]
pub struct SharedFrame {
    inner: Arc<RwLock<VisualFrame>>,
}

impl SharedFrame {
    /// Create a handle holding an empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published frame
    pub fn publish(&self, frame: VisualFrame) {
        *self.inner.write() = frame;
    }

    /// Clone the most recently published frame
    pub fn snapshot(&self) -> VisualFrame {
        self.inner.read().clone()
    }
}

/// Receives frames on the draw cadence
pub trait FrameSink {
    /// Present one frame
    fn present(&mut self, frame: &VisualFrame);
}

/// Attack rate toward a louder beat, per normalized step
const PULSE_ATTACK: f64 = 0.3;
/// Decay rate back toward rest, per normalized step
const PULSE_DECAY: f64 = 0.15;
/// Rates are tuned against a 60 Hz step
const PULSE_STEP_MS: f64 = 16.666_667;

/// Eases a scale value toward the current beat energy
///
/// Rises fast on a beat and relaxes slowly after it, so pulse-scaled visuals
/// feel punchy without flickering.
#[derive(Debug, Clone)]
pub struct BeatPulse {
    scale: f64,
    beat_scale: f64,
}

impl BeatPulse {
    /// Create a pulse bounded to `[1, beat_scale]`
    pub fn new(beat_scale: f64) -> Self {
        Self {
            scale: 1.0,
            beat_scale: beat_scale.max(1.0),
        }
    }

    /// Advance toward `energy` in `[0, 1]` and return the new scale
    pub fn update(&mut self, delta_ms: f64, energy: f64) -> f64 {
        let target = (1.0 + energy * (self.beat_scale - 1.0)).clamp(1.0, self.beat_scale);
        let step = delta_ms / PULSE_STEP_MS;
        if target > self.scale {
            self.scale += (target - self.scale) * PULSE_ATTACK * step;
        } else {
            self.scale -= (self.scale - target) * PULSE_DECAY * step;
        }
        self.scale = self.scale.clamp(1.0, self.beat_scale);
        self.scale
    }

    /// Current scale, at least one
    pub fn value(&self) -> f64 {
        self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_frame_roundtrip() {
        let shared = SharedFrame::new();
        assert_eq!(shared.snapshot().phase, SessionPhase::Preparing);
        let frame = VisualFrame {
            progress_ms: 1234.0,
            phase: SessionPhase::Active,
            ..VisualFrame::default()
        };
        shared.publish(frame);
        let read = shared.snapshot();
        assert_eq!(read.progress_ms, 1234.0);
        assert_eq!(read.phase, SessionPhase::Active);
    }

    #[test]
    fn test_pulse_rises_on_energy() {
        let mut pulse = BeatPulse::new(1.4);
        let first = pulse.update(16.666_667, 1.0);
        assert!(first > 1.0);
        let second = pulse.update(16.666_667, 1.0);
        assert!(second > first);
        assert!(second <= 1.4);
    }

    #[test]
    fn test_pulse_decays_slower_than_it_rises() {
        let mut pulse = BeatPulse::new(1.4);
        pulse.update(16.666_667, 1.0);
        let peak = pulse.value();
        let rise = peak - 1.0;
        let after_decay = pulse.update(16.666_667, 0.0);
        let fall = peak - after_decay;
        assert!(fall < rise);
        assert!(after_decay >= 1.0);
    }

    #[test]
    fn test_pulse_never_leaves_bounds() {
        let mut pulse = BeatPulse::new(1.4);
        for _ in 0..1000 {
            pulse.update(100.0, 1.0);
        }
        assert!(pulse.value() <= 1.4);
        for _ in 0..1000 {
            pulse.update(100.0, 0.0);
        }
        assert!(pulse.value() >= 1.0);
    }
}
