// SPDX-License-Identifier: MIT OR Apache-2.0
//! Update-thread ownership and pacing.
//!
//! [`SessionRunner`] moves a [`PlaybackSession`] onto its own thread and runs
//! it at the configured update rate:
//! - The update thread is the sole writer; it publishes a
//!   [`VisualFrame`](crate::render::VisualFrame) snapshot after every tick
//! - The draw side reads snapshots through [`SharedFrame`] and may report its
//!   measured FPS back, which retargets the limiter between ticks
//! - Stopping is cooperative; `join` returns the run's summary

use crate::render::SharedFrame;
use crate::session::{PlaybackSession, SessionPhase};
use cadenza_timeline::{FrameCounter, FrameLimiter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// What a completed run looked like
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Update ticks executed
    pub ticks: u64,
    /// Wall time spent in the loop, in seconds
    pub wall_time_s: f64,
    /// Mean tick-to-tick interval, in milliseconds
    pub average_tick_ms: f64,
    /// Phase at loop exit
    pub final_phase: SessionPhase,
    /// Progress time at loop exit, in milliseconds
    pub final_progress_ms: f64,
}

/// Runs a session on a dedicated update thread
pub struct SessionRunner {
    frame: SharedFrame,
    stop: Arc<AtomicBool>,
    render_fps: Arc<Mutex<Option<f64>>>,
    handle: Option<JoinHandle<SessionSummary>>,
}

impl SessionRunner {
    /// Move the session onto its own thread and start ticking
    pub fn spawn(session: PlaybackSession) -> Self {
        let pacing = session.options().pacing;
        let frame = SharedFrame::new();
        let stop = Arc::new(AtomicBool::new(false));
        let render_fps: Arc<Mutex<Option<f64>>> = Arc::new(Mutex::new(None));

        let thread_frame = frame.clone();
        let thread_stop = Arc::clone(&stop);
        let thread_fps = Arc::clone(&render_fps);
        let handle = thread::spawn(move || {
            update_loop(
                session,
                &thread_frame,
                &thread_stop,
                &thread_fps,
                pacing.min_update_fps,
                pacing.max_update_fps,
            )
        });

        Self {
            frame,
            stop,
            render_fps,
            handle: Some(handle),
        }
    }

    /// Handle for the draw side to snapshot frames from
    pub fn shared_frame(&self) -> SharedFrame {
        self.frame.clone()
    }

    /// Report the draw side's measured FPS; picked up on the next tick
    pub fn report_render_fps(&self, fps: f64) {
        *self.render_fps.lock() = Some(fps);
    }

    /// Whether the update thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Ask the update thread to exit after its current tick
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Stop if still running, wait for the thread, and return the summary
    ///
    /// A panic on the update thread is fatal to the session and resumes here;
    /// a torn animation/audio state is worse than a hard stop.
    pub fn join(mut self) -> SessionSummary {
        self.stop.store(true, Ordering::Relaxed);
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(summary)) => summary,
            Some(Err(payload)) => {
                tracing::error!("Update thread panicked; aborting session");
                std::panic::resume_unwind(payload);
            }
            None => SessionSummary::default(),
        }
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn update_loop(
    mut session: PlaybackSession,
    frame: &SharedFrame,
    stop: &AtomicBool,
    render_fps: &Mutex<Option<f64>>,
    min_fps: f64,
    max_fps: f64,
) -> SessionSummary {
    let mut limiter = FrameLimiter::new(min_fps, max_fps);
    let mut counter = FrameCounter::new();
    let started = Instant::now();
    let mut last_tick = Instant::now();

    tracing::debug!("Update thread started, pacing {:.0}-{:.0} FPS", min_fps, max_fps);

    loop {
        if stop.load(Ordering::Relaxed) {
            tracing::debug!("Update thread stopping on request");
            break;
        }

        limiter.sync();

        let now = Instant::now();
        let delta_ms = now.duration_since(last_tick).as_secs_f64() * 1000.0;
        last_tick = now;
        counter.put_sample(delta_ms);

        let finished = session.advance(delta_ms);
        frame.publish(session.visual_frame());

        if let Some(fps) = render_fps.lock().take() {
            limiter.report_measured_fps(fps);
        }

        if finished {
            break;
        }
    }

    let summary = SessionSummary {
        ticks: session.ticks(),
        wall_time_s: started.elapsed().as_secs_f64(),
        average_tick_ms: counter.average_frame_ms(),
        final_phase: session.phase(),
        final_progress_ms: session.progress_time(),
    };
    tracing::info!(
        "Update thread exiting: {} ticks over {:.1}s, {:.2}ms average tick, final phase {:?}",
        summary.ticks,
        summary.wall_time_s,
        summary.average_tick_ms,
        summary.final_phase
    );
    summary
}
