// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wall-clock / device-clock reconciliation.
//!
//! Audio devices report their playback position at their own polling
//! granularity, not every tick. [`SyncClock`] snaps to the device whenever the
//! reported position changes (the device is the source of truth and corrects
//! accumulated drift) and free-runs on wall-clock deltas between reports so
//! animation never stutters while waiting for the next position update.

/// Fixed latency of the platform audio path, in milliseconds
#[cfg(target_os = "windows")]
const PLATFORM_OFFSET_MS: f64 = 15.0;
/// Fixed latency of the platform audio path, in milliseconds
#[cfg(not(target_os = "windows"))]
const PLATFORM_OFFSET_MS: f64 = 0.0;

/// Reconciles wall-clock deltas with reported device positions
///
/// The update pass owns the clock and is its only writer; everything else
/// consumes the progress time it produces.
#[derive(Debug, Clone)]
pub struct SyncClock {
    progress_ms: f64,
    last_device_ms: Option<f64>,
    speed: f64,
    pitch: f64,
    user_offset_ms: f64,
}

impl SyncClock {
    /// Create a clock at progress zero, unit speed and pitch
    pub fn new() -> Self {
        Self {
            progress_ms: 0.0,
            last_device_ms: None,
            speed: 1.0,
            pitch: 1.0,
            user_offset_ms: 0.0,
        }
    }

    /// Set the user-configured audio offset, in milliseconds
    pub fn with_user_offset(mut self, offset_ms: f64) -> Self {
        self.user_offset_ms = offset_ms;
        self
    }

    /// Advance the clock by one tick and return the new progress time
    ///
    /// While the device plays, its reported position (plus the platform and
    /// user offsets, scaled by speed) wins whenever it changes; an unchanged
    /// report free-runs by `wall_delta_ms * speed`. A stopped device
    /// free-runs by the raw delta, which is what lead-ins and lead-outs want.
    pub fn tick(
        &mut self,
        wall_delta_ms: f64,
        device_position_ms: f64,
        device_playing: bool,
    ) -> f64 {
        let wall_delta_ms = if wall_delta_ms < 0.0 {
            tracing::warn!("Negative wall delta {:.3}ms clamped to zero", wall_delta_ms);
            0.0
        } else {
            wall_delta_ms
        };

        if device_playing {
            let adjusted =
                device_position_ms + (PLATFORM_OFFSET_MS + self.user_offset_ms) * self.speed;
            if self.last_device_ms != Some(adjusted) {
                self.progress_ms = adjusted;
                self.last_device_ms = Some(adjusted);
            } else {
                self.progress_ms += wall_delta_ms * self.speed;
            }
        } else {
            self.progress_ms += wall_delta_ms;
        }
        self.progress_ms
    }

    /// Jump to `time_ms`, bypassing reconciliation
    ///
    /// Clears the last-seen device position so the next playing tick snaps.
    pub fn seek(&mut self, time_ms: f64) {
        self.progress_ms = time_ms;
        self.last_device_ms = None;
    }

    /// Current progress time, in milliseconds
    pub fn progress(&self) -> f64 {
        self.progress_ms
    }

    /// Current speed multiplier
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Set the speed multiplier applied to deltas and offsets
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    /// Current pitch multiplier
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Set the pitch multiplier (held for collaborators; not used in
    /// reconciliation)
    pub fn set_pitch(&mut self, pitch: f64) {
        self.pitch = pitch;
    }

    /// The user-configured audio offset, in milliseconds
    pub fn user_offset_ms(&self) -> f64 {
        self.user_offset_ms
    }
}

impl Default for SyncClock {
    fn default() -> Self {
        Self::new()
    }
}
