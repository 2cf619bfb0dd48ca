// SPDX-License-Identifier: MIT OR Apache-2.0
//! Adaptive frame pacing.
//!
//! The update loop runs as fast as the limiter lets it, and the limiter's
//! target is derived from how fast the draw side actually renders: measured
//! draw FPS times a headroom factor, clamped to configured bounds. Updating
//! much faster than anyone can draw burns CPU for nothing; updating slower
//! starves the draw loop of fresh state.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Headroom applied to measured draw FPS when retargeting
const HEADROOM: f64 = 1.2;

/// Sleep is released this early and the remainder is spun, for precision
const SPIN_RESERVE: Duration = Duration::from_micros(500);

/// Paces a loop to an adaptive target rate
#[derive(Debug)]
pub struct FrameLimiter {
    min_fps: f64,
    max_fps: f64,
    target_fps: f64,
    last_tick: Option<Instant>,
}

impl FrameLimiter {
    /// Create a limiter bounded to `[min_fps, max_fps]`, starting at the
    /// lower bound
    pub fn new(min_fps: f64, max_fps: f64) -> Self {
        debug_assert!(min_fps > 0.0 && max_fps >= min_fps);
        Self {
            min_fps,
            max_fps,
            target_fps: min_fps,
            last_tick: None,
        }
    }

    /// Re-bound the limiter, re-clamping the current target
    pub fn configure(&mut self, min_fps: f64, max_fps: f64) {
        debug_assert!(min_fps > 0.0 && max_fps >= min_fps);
        self.min_fps = min_fps;
        self.max_fps = max_fps;
        self.target_fps = self.target_fps.clamp(min_fps, max_fps);
    }

    /// Retarget from a measured draw-side FPS
    ///
    /// `target = clamp(fps * 1.2, min, max)`. Non-positive measurements are
    /// ignored; a fresh counter reports zero until it has samples.
    pub fn report_measured_fps(&mut self, fps: f64) {
        if fps <= 0.0 {
            return;
        }
        let target = (fps * HEADROOM).clamp(self.min_fps, self.max_fps);
        if (target - self.target_fps).abs() >= 1.0 {
            tracing::debug!(
                "Frame limiter retargeted from {:.0} to {:.0} FPS",
                self.target_fps,
                target
            );
        }
        self.target_fps = target;
    }

    /// Current target rate
    pub fn target_fps(&self) -> f64 {
        self.target_fps
    }

    /// Block until one target period has elapsed since the previous return
    ///
    /// Returns immediately when already past the deadline and resets the
    /// baseline to now, so a slow iteration never banks sleep debt.
    pub fn sync(&mut self) {
        let period = Duration::from_secs_f64(1.0 / self.target_fps);
        let now = Instant::now();
        let Some(last) = self.last_tick else {
            self.last_tick = Some(now);
            return;
        };
        let deadline = last + period;
        if now >= deadline {
            self.last_tick = Some(now);
            return;
        }
        let wait = deadline - now;
        if wait > SPIN_RESERVE {
            std::thread::sleep(wait - SPIN_RESERVE);
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
        self.last_tick = Some(deadline);
    }
}

/// Rolling frame-rate counter over a fixed sample window
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    samples: VecDeque<f64>,
    sum_ms: f64,
}

impl FrameCounter {
    /// Samples kept in the rolling window
    const WINDOW: usize = 60;

    /// Create an empty counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame's duration, in milliseconds
    ///
    /// Non-positive samples are ignored.
    pub fn put_sample(&mut self, delta_ms: f64) {
        if delta_ms <= 0.0 {
            return;
        }
        self.samples.push_back(delta_ms);
        self.sum_ms += delta_ms;
        if self.samples.len() > Self::WINDOW {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum_ms -= evicted;
            }
        }
    }

    /// Average rate over the window, or zero before any samples
    pub fn fps(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        1000.0 * self.samples.len() as f64 / self.sum_ms
    }

    /// Average frame duration over the window, in milliseconds
    pub fn average_frame_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum_ms / self.samples.len() as f64
    }
}
