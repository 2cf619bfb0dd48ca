// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playback session orchestration.
//!
//! A [`PlaybackSession`] owns the clock, the visual tracks, the visibility
//! index, the audio device and the controller, and drives them through one
//! update pass per tick:
//! - Reconcile wall delta against the device position
//! - Push rate automation to the device and the clock
//! - Evaluate every track at the new progress time
//! - Update only the entities whose window contains the progress time
//! - Feed the controller real time, or frozen time once the chart is over
//!
//! Phases move `Preparing -> LeadingIn -> Active -> Ending -> Finished`,
//! driven purely by comparing progress time against thresholds computed at
//! construction.

use crate::audio::{BoxedDevice, DeviceState};
use crate::chart::Chart;
use crate::controller::BoxedController;
use crate::options::SessionOptions;
use crate::render::{ActiveEntity, BeatPulse, VisualFrame};
use cadenza_timeline::{SyncClock, TimeSpan, ValueTrack, VisibilityIndex};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session construction errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// The chart contains no objects at all
    #[error("Chart has no objects")]
    EmptyChart,

    /// The configured trim range is inverted or empty
    #[error("Invalid trim range: start {start_ms:.0}ms is not before end {end_ms:.0}ms")]
    InvalidTrim {
        /// Trim start, in milliseconds
        start_ms: f64,
        /// Trim end, in milliseconds
        end_ms: f64,
    },

    /// The trim range left nothing to play
    #[error("Trim range removed every object")]
    NothingToPlay,

    /// An option value is out of its valid range
    #[error("Invalid option {name}: {value}")]
    InvalidOption {
        /// Dotted path of the offending option
        name: &'static str,
        /// The rejected value
        value: f64,
    },
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Constructed; no time has advanced
    #[default]
    Preparing,
    /// Pre-roll before the primary start point
    LeadingIn,
    /// Normal play
    Active,
    /// Past the chart end; fade-out tracks still evaluating
    Ending,
    /// Terminal
    Finished,
}

/// Named visual parameters driven by the session's tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisualParam {
    /// Background visibility (1 undimmed, 0 black)
    Dim,
    /// Background blur amount
    Blur,
    /// Effects/logo visibility
    Effects,
    /// Cursor visibility
    Cursor,
    /// HUD visibility
    Hud,
    /// Global object visibility
    Objects,
    /// Photosensitivity warning visibility
    Warning,
}

/// Extra slack on the frozen controller timestamp once the chart is over
pub const ENDING_FREEZE_SLACK_MS: f64 = 100.0;

/// Spawn window is capped so extreme charts still pre-roll sensibly
const MAX_PREEMPT_MS: f64 = 1800.0;
/// Intro ramps run this long, ending at the hold point
const INTRO_RAMP_MS: f64 = 500.0;
/// Cursor reveal leads the first object by this much
const CURSOR_FADE_LEAD_MS: f64 = 750.0;
/// Cursor reveal duration
const CURSOR_FADE_MS: f64 = 500.0;
/// Ramp from intro to normal levels once objects arrive
const NORMAL_RAMP_MS: f64 = 1000.0;
/// Breaks shorter than this (speed-scaled) are not staged
const MIN_BREAK_MS: f64 = 1000.0;
/// Ramp into and out of break levels (speed-scaled)
const BREAK_RAMP_MS: f64 = 1000.0;
/// Cursor hide at a break start (speed-scaled)
const BREAK_CURSOR_HIDE_MS: f64 = 100.0;
/// Lead-in never shrinks below this
const MIN_LEAD_IN_MS: f64 = 1000.0;
/// Warning overlay never shows shorter than this
const MIN_WARNING_MS: f64 = 1000.0;
/// Warning overlay fade duration
const WARNING_FADE_MS: f64 = 500.0;
/// Volume and object reveal after a skip or mid-chart start
const SKIP_FADE_MS: f64 = 400.0;
/// Catch-up replay starts here
const CATCH_UP_START_MS: f64 = -1000.0;
/// Catch-up replay step
const CATCH_UP_STEP_MS: f64 = 1.0;

/// Events planned out of order, applied sorted
///
/// Tracks require ordered appends; schedule construction is easier to read
/// grouped by concern, so events buffer here first.
#[derive(Default)]
struct PlannedEvents(Vec<(f64, f64, f64)>);

impl PlannedEvents {
    fn add(&mut self, start: f64, end: f64, target: f64) {
        self.0.push((start, end, target));
    }

    fn apply(mut self, track: &mut ValueTrack) {
        self.0.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (start, end, target) in self.0 {
            track.add_event(start, end, target);
        }
    }
}

/// One playback run over a chart
pub struct PlaybackSession {
    chart: Chart,
    options: SessionOptions,
    device: BoxedDevice,
    controller: BoxedController,
    clock: SyncClock,
    index: VisibilityIndex,
    tracks: IndexMap<VisualParam, ValueTrack>,
    volume_track: ValueTrack,
    speed_track: ValueTrack,
    pitch_track: ValueTrack,
    pulse: BeatPulse,
    phase: SessionPhase,
    start_point: f64,
    start_offset: f64,
    chart_end: f64,
    session_end: f64,
    freeze_time: f64,
    catch_up_until: Option<f64>,
    audio_started: bool,
    applied_volume: f64,
    active_cache: Vec<usize>,
    ticks: u64,
}

impl PlaybackSession {
    /// Validate options, trim the chart, compute thresholds and build the
    /// whole track schedule
    ///
    /// All configuration and data errors surface here; a constructed session
    /// has nothing left to refuse at runtime.
    pub fn new(
        mut chart: Chart,
        options: SessionOptions,
        device: BoxedDevice,
        controller: BoxedController,
    ) -> Result<Self> {
        validate_options(&options)?;
        if chart.is_empty() {
            return Err(SessionError::EmptyChart);
        }

        let speed = options.playback.speed;
        let pitch = options.playback.pitch;
        let trim_start = options.playback.start_s * 1000.0;
        let trim_end = options.playback.end_s.map(|s| s * 1000.0);
        if let Some(end) = trim_end {
            if end <= trim_start {
                return Err(SessionError::InvalidTrim {
                    start_ms: trim_start,
                    end_ms: end,
                });
            }
        }
        chart.retain_range(trim_start, trim_end.unwrap_or(f64::INFINITY));
        if chart.is_empty() {
            return Err(SessionError::NothingToPlay);
        }

        // Thresholds. first/last are present on a non-empty chart.
        let preempt_ms = chart.timing.preempt_ms.min(MAX_PREEMPT_MS);
        let first_start = chart.first_start_time().unwrap_or(0.0);
        let last_end = chart.last_end_time().unwrap_or(first_start);
        let gameplay_end = trim_end.map_or(last_end, |end| end.min(last_end));
        let end_trimmed = trim_end.is_some_and(|end| end < last_end);
        let chart_end = gameplay_end + chart.timing.hit_window_ms;
        let fade_out_ms = options.playback.fade_out_s * 1000.0;
        let session_end = chart_end + fade_out_ms;
        let freeze_time = chart_end + ENDING_FREEZE_SLACK_MS;
        let chart_start = first_start.max(trim_start) - preempt_ms;

        let skip_target = if options.playback.skip_intro {
            first_start.max(trim_start)
        } else {
            trim_start
        };
        let late_start = skip_target > 0.01;
        // Anchoring at -preempt keeps the intro ramps at or before chart_start
        // even when the first object sits inside the spawn window
        let (skip_offset, start_point) = if late_start {
            let offset = skip_target - preempt_ms;
            (offset, offset.max(0.0))
        } else {
            (-preempt_ms, 0.0)
        };
        let mut start_offset = skip_offset;

        // Trimmed-away audio: straddling objects keep rendering, silenced
        if late_start {
            chart.disable_audio_where(|o| o.start_time < start_point);
        }
        if end_trimmed {
            chart.disable_audio_where(|o| o.end_time > gameplay_end);
        }

        let visuals = &options.visuals;
        let mut dim = ValueTrack::new(0.0);
        let mut blur = ValueTrack::new(0.0);
        let mut effects = ValueTrack::new(0.0);
        let mut cursor = ValueTrack::new(0.0);
        let mut hud = ValueTrack::new(0.0);
        let mut objects = ValueTrack::new(1.0);
        let mut warning = ValueTrack::new(0.0);
        let mut volume = ValueTrack::new(1.0);

        let mut dim_plan = PlannedEvents::default();
        let mut blur_plan = PlannedEvents::default();
        let mut effects_plan = PlannedEvents::default();
        let mut cursor_plan = PlannedEvents::default();
        let mut hud_plan = PlannedEvents::default();
        let mut objects_plan = PlannedEvents::default();
        let mut warning_plan = PlannedEvents::default();
        let mut volume_plan = PlannedEvents::default();

        // A late start comes in silent and reveals over the skip fade
        if late_start {
            volume.set_value(0.0);
            volume_plan.add(skip_offset, skip_offset + SKIP_FADE_MS, 1.0);
            if trim_start > 0.01 {
                objects.set_value(0.0);
                objects_plan.add(skip_offset, skip_offset + SKIP_FADE_MS, 1.0);
            }
        }

        // Hold, then intro ramps ending at the hold point
        start_offset -= options.playback.lead_in_hold_s * 1000.0;
        dim_plan.add(start_offset - INTRO_RAMP_MS, start_offset, 1.0 - visuals.dim.intro);
        blur_plan.add(start_offset - INTRO_RAMP_MS, start_offset, visuals.blur.intro);
        effects_plan.add(
            start_offset - INTRO_RAMP_MS,
            start_offset,
            1.0 - visuals.effects.intro,
        );
        hud_plan.add(start_offset - INTRO_RAMP_MS, start_offset, 1.0);

        // Cursor reveals just ahead of the first object
        cursor_plan.add(
            chart_start - CURSOR_FADE_LEAD_MS,
            chart_start - CURSOR_FADE_LEAD_MS + CURSOR_FADE_MS,
            1.0,
        );

        // Normal levels as objects arrive
        dim_plan.add(chart_start, chart_start + NORMAL_RAMP_MS, 1.0 - visuals.dim.normal);
        blur_plan.add(chart_start, chart_start + NORMAL_RAMP_MS, visuals.blur.normal);
        effects_plan.add(
            chart_start,
            chart_start + NORMAL_RAMP_MS,
            1.0 - visuals.effects.normal,
        );

        // Breaks long enough to stage, inside the playable range
        let break_ramp = BREAK_RAMP_MS * speed;
        for pause in &chart.breaks {
            if pause.length() < MIN_BREAK_MS * speed {
                continue;
            }
            if pause.end_time < start_point || pause.start_time > chart_end {
                continue;
            }
            dim_plan.add(
                pause.start_time,
                pause.start_time + break_ramp,
                1.0 - visuals.dim.breaks,
            );
            blur_plan.add(pause.start_time, pause.start_time + break_ramp, visuals.blur.breaks);
            effects_plan.add(
                pause.start_time,
                pause.start_time + break_ramp,
                1.0 - visuals.effects.breaks,
            );
            if !visuals.show_cursor_on_breaks {
                cursor_plan.add(
                    pause.start_time,
                    pause.start_time + BREAK_CURSOR_HIDE_MS * speed,
                    0.0,
                );
                cursor_plan.add(pause.end_time, pause.end_time + break_ramp, 1.0);
            }
            dim_plan.add(pause.end_time, pause.end_time + break_ramp, 1.0 - visuals.dim.normal);
            blur_plan.add(pause.end_time, pause.end_time + break_ramp, visuals.blur.normal);
            effects_plan.add(
                pause.end_time,
                pause.end_time + break_ramp,
                1.0 - visuals.effects.normal,
            );
        }

        // Fade-out after the chart end
        dim_plan.add(chart_end, session_end, 0.0);
        effects_plan.add(chart_end, session_end, 0.0);
        cursor_plan.add(chart_end, session_end, 0.0);
        hud_plan.add(chart_end, session_end, 0.0);
        volume_plan.add(chart_end, session_end, 0.0);
        if end_trimmed {
            objects_plan.add(chart_end, session_end, 0.0);
        }

        // Warning overlay extends the pre-roll by its own span
        if visuals.warning.enabled {
            let span = (visuals.warning.duration_s * 1000.0).max(MIN_WARNING_MS);
            start_offset -= span;
            warning_plan.add(start_offset, start_offset + WARNING_FADE_MS, 1.0);
            warning_plan.add(start_offset + span - WARNING_FADE_MS, start_offset + span, 0.0);
        }

        start_offset -= (options.playback.lead_in_s * 1000.0).max(MIN_LEAD_IN_MS);

        dim_plan.apply(&mut dim);
        blur_plan.apply(&mut blur);
        effects_plan.apply(&mut effects);
        cursor_plan.apply(&mut cursor);
        hud_plan.apply(&mut hud);
        objects_plan.apply(&mut objects);
        warning_plan.apply(&mut warning);
        volume_plan.apply(&mut volume);

        let mut tracks = IndexMap::new();
        tracks.insert(VisualParam::Dim, dim);
        tracks.insert(VisualParam::Blur, blur);
        tracks.insert(VisualParam::Effects, effects);
        tracks.insert(VisualParam::Cursor, cursor);
        tracks.insert(VisualParam::Hud, hud);
        tracks.insert(VisualParam::Objects, objects);
        tracks.insert(VisualParam::Warning, warning);

        let mut clock = SyncClock::new().with_user_offset(options.audio.offset_ms);
        clock.set_speed(speed);
        clock.set_pitch(pitch);
        clock.seek(start_offset);

        let index = VisibilityIndex::build(chart.objects());
        let pulse = BeatPulse::new(options.audio.beat_scale);

        tracing::info!(
            "Session prepared: {:?} controller, {} objects, start point {:.0}ms, chart end {:.0}ms, session end {:.0}ms, initial offset {:.0}ms",
            controller.kind(),
            chart.len(),
            start_point,
            chart_end,
            session_end,
            start_offset
        );

        Ok(Self {
            chart,
            options,
            device,
            controller,
            clock,
            index,
            tracks,
            volume_track: volume,
            speed_track: ValueTrack::new(speed),
            pitch_track: ValueTrack::new(pitch),
            pulse,
            phase: SessionPhase::Preparing,
            start_point,
            start_offset,
            chart_end,
            session_end,
            freeze_time,
            catch_up_until: late_start.then_some(skip_offset),
            audio_started: false,
            applied_volume: 0.0,
            active_cache: Vec::new(),
            ticks: 0,
        })
    }

    /// Run one update pass; returns true once the session is finished
    pub fn advance(&mut self, wall_delta_ms: f64) -> bool {
        if self.phase == SessionPhase::Finished {
            return true;
        }
        let wall_delta_ms = if wall_delta_ms < 0.0 {
            tracing::warn!("Negative wall delta {:.3}ms clamped to zero", wall_delta_ms);
            0.0
        } else {
            wall_delta_ms
        };
        if let Some(until) = self.catch_up_until.take() {
            self.run_catch_up(until);
        }
        self.ticks += 1;

        // Devices without their own clock model it from our deltas
        self.device.advance(wall_delta_ms);
        let device_position = self.device.position_ms();
        let playing = self.device.state() == DeviceState::Playing;
        let progress = self.clock.tick(wall_delta_ms, device_position, playing);

        // Rate automation feeds the device and the clock every tick
        let speed = self.speed_track.update(progress);
        let pitch = self.pitch_track.update(progress);
        self.clock.set_speed(speed);
        self.clock.set_pitch(pitch);
        self.device.set_tempo(speed);
        self.device.set_pitch(pitch);

        // Audio start command, exactly once, from this context only
        if !self.audio_started && progress >= self.start_point {
            tracing::info!("Audio playback started at {:.0}ms", self.start_point);
            self.device.play();
            self.device.set_position_ms(self.start_point);
            self.audio_started = true;
        }

        for track in self.tracks.values_mut() {
            track.update(progress);
        }

        // Only entities whose window contains the progress time do work
        let active = self.index.active_at(progress);
        self.active_cache.clear();
        self.active_cache.extend_from_slice(active);
        for &i in &self.active_cache {
            self.chart.objects_mut()[i].update(progress);
        }

        // Past the chart end the controller stops simulating; effects keep
        // evaluating against real time
        let controller_time = if progress < self.chart_end {
            progress
        } else {
            self.freeze_time
        };
        self.controller.update(controller_time, wall_delta_ms);

        self.volume_track.update(progress);
        if playing {
            self.applied_volume = self.volume_track.value() * self.options.audio.master_volume;
            self.device.set_volume(self.applied_volume);
        }

        self.pulse.update(wall_delta_ms, self.device.beat_energy());

        self.recompute_phase(progress);
        self.phase == SessionPhase::Finished
    }

    /// Jump to `time_ms`, clamped into the session's time range
    pub fn seek(&mut self, time_ms: f64) {
        if self.phase == SessionPhase::Finished {
            tracing::warn!("Seek ignored on a finished session");
            return;
        }
        let target = time_ms.clamp(self.start_offset, self.session_end);
        tracing::debug!("Seek from {:.0}ms to {:.0}ms", self.clock.progress(), target);
        self.clock.seek(target);
        if target >= self.start_point {
            if !self.audio_started {
                self.device.play();
                self.audio_started = true;
            }
            self.device.set_position_ms(target);
        } else if self.audio_started {
            // Rewound into the lead-in; the start command re-fires
            self.device.stop();
            self.device.set_position_ms(self.start_point);
            self.audio_started = false;
        }
        self.recompute_phase(target);
    }

    /// Schedule a playback-rate transition
    pub fn schedule_speed_change(&mut self, start_ms: f64, end_ms: f64, speed: f64) {
        self.speed_track.add_event(start_ms, end_ms, speed.max(0.05));
    }

    /// Schedule a pitch transition
    pub fn schedule_pitch_change(&mut self, start_ms: f64, end_ms: f64, pitch: f64) {
        self.pitch_track.add_event(start_ms, end_ms, pitch.max(0.05));
    }

    /// Current progress time, in milliseconds
    pub fn progress_time(&self) -> f64 {
        self.clock.progress()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The chart being played
    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    /// The options this session was built with
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Where audio begins, in milliseconds
    pub fn start_point(&self) -> f64 {
        self.start_point
    }

    /// Initial progress time, in milliseconds
    pub fn start_offset(&self) -> f64 {
        self.start_offset
    }

    /// Where Active turns into Ending, in milliseconds
    pub fn chart_end(&self) -> f64 {
        self.chart_end
    }

    /// Where Ending turns into Finished, in milliseconds
    pub fn session_end(&self) -> f64 {
        self.session_end
    }

    /// Update ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Snapshot everything the draw side needs
    pub fn visual_frame(&self) -> VisualFrame {
        let progress = self.clock.progress();
        let objects_alpha = self.track_value(VisualParam::Objects);
        let active_entities = self
            .active_cache
            .iter()
            .map(|&i| {
                let object = &self.chart.objects()[i];
                let window = object.start_time - object.span_start();
                let approach = if window <= 0.0 {
                    1.0
                } else {
                    ((progress - object.span_start()) / window).clamp(0.0, 1.0)
                };
                ActiveEntity {
                    id: object.id,
                    position: object.position,
                    alpha: object.alpha() * objects_alpha,
                    approach,
                    new_combo: object.new_combo,
                }
            })
            .collect();
        VisualFrame {
            phase: self.phase,
            progress_ms: progress,
            dim: self.track_value(VisualParam::Dim),
            blur: self.track_value(VisualParam::Blur),
            effects: self.track_value(VisualParam::Effects),
            cursor_alpha: self.track_value(VisualParam::Cursor),
            hud_alpha: self.track_value(VisualParam::Hud),
            objects_alpha,
            warning_alpha: self.track_value(VisualParam::Warning),
            volume: self.applied_volume,
            speed: self.clock.speed(),
            pitch: self.clock.pitch(),
            beat_pulse: self.pulse.value(),
            cursors: self.controller.cursor_states().to_vec(),
            active_entities,
        }
    }

    fn track_value(&self, param: VisualParam) -> f64 {
        self.tracks.get(&param).map_or(0.0, ValueTrack::value)
    }

    /// Replay the controller across the skipped interval, silently
    fn run_catch_up(&mut self, until: f64) {
        self.controller.set_audio_submission(false);
        let mut t = CATCH_UP_START_MS;
        let mut steps = 0u32;
        while t < until {
            self.controller.update(t, CATCH_UP_STEP_MS);
            t += CATCH_UP_STEP_MS;
            steps += 1;
        }
        self.controller.set_audio_submission(true);
        tracing::info!(
            "Controller caught up over skipped interval: {} steps to {:.0}ms",
            steps,
            until
        );
    }

    fn recompute_phase(&mut self, progress: f64) {
        let next = if progress >= self.session_end {
            SessionPhase::Finished
        } else if progress >= self.chart_end {
            SessionPhase::Ending
        } else if progress >= self.start_point {
            SessionPhase::Active
        } else {
            SessionPhase::LeadingIn
        };
        if next != self.phase {
            tracing::info!("Session phase {:?} -> {:?} at {:.1}ms", self.phase, next, progress);
            if next == SessionPhase::Finished {
                self.device.stop();
                tracing::info!("Session finished after {} ticks", self.ticks);
            }
            self.phase = next;
        }
    }
}

fn validate_options(options: &SessionOptions) -> Result<()> {
    if options.playback.speed <= 0.0 {
        return Err(SessionError::InvalidOption {
            name: "playback.speed",
            value: options.playback.speed,
        });
    }
    if options.playback.pitch <= 0.0 {
        return Err(SessionError::InvalidOption {
            name: "playback.pitch",
            value: options.playback.pitch,
        });
    }
    if options.playback.start_s < 0.0 {
        return Err(SessionError::InvalidOption {
            name: "playback.start_s",
            value: options.playback.start_s,
        });
    }
    if options.playback.lead_in_s < 0.0 {
        return Err(SessionError::InvalidOption {
            name: "playback.lead_in_s",
            value: options.playback.lead_in_s,
        });
    }
    if options.playback.lead_in_hold_s < 0.0 {
        return Err(SessionError::InvalidOption {
            name: "playback.lead_in_hold_s",
            value: options.playback.lead_in_hold_s,
        });
    }
    if options.playback.fade_out_s < 0.0 {
        return Err(SessionError::InvalidOption {
            name: "playback.fade_out_s",
            value: options.playback.fade_out_s,
        });
    }
    if !(0.0..=1.0).contains(&options.audio.master_volume) {
        return Err(SessionError::InvalidOption {
            name: "audio.master_volume",
            value: options.audio.master_volume,
        });
    }
    if options.pacing.min_update_fps <= 0.0
        || options.pacing.max_update_fps < options.pacing.min_update_fps
    {
        return Err(SessionError::InvalidOption {
            name: "pacing.max_update_fps",
            value: options.pacing.max_update_fps,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SilentDevice;
    use crate::chart::{ChartMetadata, ChartObject, ChartTiming, Position};
    use crate::controller::{Controller, ControllerKind, CursorState};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every (time, delta) fed to it through a shared handle
    struct ProbeController {
        calls: Arc<Mutex<Vec<(f64, f64)>>>,
        cursors: [CursorState; 1],
    }

    impl ProbeController {
        fn new() -> (Self, Arc<Mutex<Vec<(f64, f64)>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let probe = Self {
                calls: Arc::clone(&calls),
                cursors: [CursorState::default()],
            };
            (probe, calls)
        }
    }

    impl Controller for ProbeController {
        fn kind(&self) -> ControllerKind {
            ControllerKind::Autoplay
        }

        fn update(&mut self, time_ms: f64, delta_ms: f64) {
            self.calls.lock().push((time_ms, delta_ms));
        }

        fn cursor_states(&self) -> &[CursorState] {
            &self.cursors
        }
    }

    fn test_chart() -> Chart {
        let objects = (0..20)
            .map(|i| ChartObject::instant(2000.0 + 500.0 * f64::from(i), Position::default()))
            .collect();
        Chart::new(
            ChartMetadata::default(),
            ChartTiming {
                preempt_ms: 1200.0,
                hit_window_ms: 200.0,
            },
            objects,
            Vec::new(),
        )
    }

    fn quick_options() -> SessionOptions {
        let mut options = SessionOptions::default();
        options.playback.lead_in_s = 1.0;
        options.playback.lead_in_hold_s = 0.0;
        options.playback.fade_out_s = 1.0;
        options
    }

    fn device() -> crate::audio::BoxedDevice {
        Box::new(SilentDevice::new(60_000.0).with_granularity(0.0))
    }

    fn probe() -> Box<ProbeController> {
        Box::new(ProbeController::new().0)
    }

    #[test]
    fn test_empty_chart_rejected() {
        let chart = Chart::new(
            ChartMetadata::default(),
            ChartTiming::default(),
            Vec::new(),
            Vec::new(),
        );
        let result = PlaybackSession::new(chart, SessionOptions::default(), device(), probe());
        assert!(matches!(result, Err(SessionError::EmptyChart)));
    }

    #[test]
    fn test_invalid_speed_rejected() {
        let mut options = SessionOptions::default();
        options.playback.speed = 0.0;
        let result = PlaybackSession::new(test_chart(), options, device(), probe());
        assert!(matches!(
            result,
            Err(SessionError::InvalidOption { name: "playback.speed", .. })
        ));
    }

    #[test]
    fn test_inverted_trim_rejected() {
        let mut options = SessionOptions::default();
        options.playback.start_s = 10.0;
        options.playback.end_s = Some(5.0);
        let result = PlaybackSession::new(test_chart(), options, device(), probe());
        assert!(matches!(result, Err(SessionError::InvalidTrim { .. })));
    }

    #[test]
    fn test_trim_removing_everything_rejected() {
        let mut options = quick_options();
        options.playback.start_s = 100.0;
        let result = PlaybackSession::new(test_chart(), options, device(), probe());
        assert!(matches!(result, Err(SessionError::NothingToPlay)));
    }

    #[test]
    fn test_initial_offset_covers_lead_in() {
        let session =
            PlaybackSession::new(test_chart(), quick_options(), device(), probe()).unwrap();
        assert_eq!(session.phase(), SessionPhase::Preparing);
        // Spawn window of 1200ms plus one second of lead-in
        assert_eq!(session.start_offset(), -2200.0);
        assert_eq!(session.progress_time(), -2200.0);
    }

    #[test]
    fn test_warning_extends_pre_roll() {
        let mut options = quick_options();
        options.visuals.warning.enabled = true;
        options.visuals.warning.duration_s = 3.0;
        let session = PlaybackSession::new(test_chart(), options, device(), probe()).unwrap();
        assert_eq!(session.start_offset(), -5200.0);
    }

    #[test]
    fn test_session_goes_active_past_start_point() {
        let mut session =
            PlaybackSession::new(test_chart(), quick_options(), device(), probe()).unwrap();
        // 2.2s of pre-roll at 10ms ticks, then a little more
        for _ in 0..240 {
            session.advance(10.0);
        }
        assert_eq!(session.phase(), SessionPhase::Active);
        assert!(session.progress_time() > 0.0);
    }

    #[test]
    fn test_controller_time_freezes_past_chart_end() {
        let (controller, calls) = ProbeController::new();
        let mut session = PlaybackSession::new(
            test_chart(),
            quick_options(),
            device(),
            Box::new(controller),
        )
        .unwrap();
        let chart_end = session.chart_end();
        while !session.advance(10.0) {}
        let calls = calls.lock();
        let frozen: Vec<&(f64, f64)> = calls.iter().filter(|(t, _)| *t >= chart_end).collect();
        assert!(!frozen.is_empty());
        for (t, _) in frozen {
            assert_eq!(*t, chart_end + ENDING_FREEZE_SLACK_MS);
        }
    }

    #[test]
    fn test_active_levels_win_over_intro_with_early_first_object() {
        // First object inside the spawn window: the normal ramp starts before
        // progress zero and must still land after the intro ramp
        let objects = (0..20)
            .map(|i| ChartObject::instant(500.0 + 500.0 * f64::from(i), Position::default()))
            .collect();
        let chart = Chart::new(
            ChartMetadata::default(),
            ChartTiming {
                preempt_ms: 1200.0,
                hit_window_ms: 200.0,
            },
            objects,
            Vec::new(),
        );
        let mut session = PlaybackSession::new(chart, quick_options(), device(), probe()).unwrap();
        while session.progress_time() < 2000.0 {
            session.advance(10.0);
        }
        assert_eq!(session.phase(), SessionPhase::Active);
        let frame = session.visual_frame();
        assert!((frame.dim - 0.2).abs() < 1e-9, "dim held at {}", frame.dim);
        assert!((frame.blur - 0.6).abs() < 1e-9, "blur held at {}", frame.blur);
        assert!((frame.effects - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_delta_never_regresses_progress() {
        let mut session =
            PlaybackSession::new(test_chart(), quick_options(), device(), probe()).unwrap();
        while session.progress_time() < 2000.0 {
            session.advance(10.0);
        }
        let before = session.progress_time();
        session.advance(-500.0);
        assert!(
            session.progress_time() >= before,
            "progress went backwards: {} -> {}",
            before,
            session.progress_time()
        );
    }

    #[test]
    fn test_scheduled_rate_ramp_reaches_device_and_clock() {
        let mut session =
            PlaybackSession::new(test_chart(), quick_options(), device(), probe()).unwrap();
        session.schedule_speed_change(3000.0, 3000.0, 1.5);
        session.schedule_pitch_change(3000.0, 3000.0, 1.2);
        while session.progress_time() < 4000.0 {
            session.advance(10.0);
        }
        let frame = session.visual_frame();
        assert_eq!(frame.speed, 1.5);
        assert_eq!(frame.pitch, 1.2);
        // The device clock runs at the new tempo, so progress follows suit
        let before = session.progress_time();
        session.advance(10.0);
        assert!((session.progress_time() - before - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_visual_frame_reflects_phase_and_tracks() {
        let mut session =
            PlaybackSession::new(test_chart(), quick_options(), device(), probe()).unwrap();
        for _ in 0..50 {
            session.advance(10.0);
        }
        let frame = session.visual_frame();
        assert_eq!(frame.phase, session.phase());
        assert_eq!(frame.progress_ms, session.progress_time());
        assert!(frame.beat_pulse >= 1.0);
        assert_eq!(frame.cursors.len(), 1);
    }

    #[test]
    fn test_seek_clamps_and_recomputes_phase() {
        let mut session =
            PlaybackSession::new(test_chart(), quick_options(), device(), probe()).unwrap();
        session.advance(10.0);
        session.seek(1_000_000.0);
        assert_eq!(session.progress_time(), session.session_end());
        assert_eq!(session.phase(), SessionPhase::Finished);
    }
}
