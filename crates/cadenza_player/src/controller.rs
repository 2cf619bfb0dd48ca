// SPDX-License-Identifier: MIT OR Apache-2.0
//! Gameplay controller capability.
//!
//! Controllers decide where cursors are and what they press; the session only
//! feeds them time. Variant behavior is resolved through the trait plus an
//! explicit kind tag, never through downcasting.

use crate::chart::{Chart, Position};
use serde::{Deserialize, Serialize};

/// Which flavor of controller is driving the cursors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerKind {
    /// Generated movement that follows the chart
    Autoplay,
    /// Recorded frames played back
    Replay,
    /// Live input; polling lives outside this crate, behind this same trait
    LiveInput,
}

/// One cursor's state as the controller reports it
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CursorState {
    /// Playfield position
    pub position: Position,
    /// Whether a press is held
    pub pressed: bool,
}

/// The capability the session drives each tick
pub trait Controller {
    /// Variant tag for logging and UI, never for dispatch
    fn kind(&self) -> ControllerKind;
    /// Advance controller state to `time_ms`
    ///
    /// Must tolerate repeated and non-monotonic times; the session replays
    /// skipped intervals through here and freezes the time once the chart is
    /// over.
    fn update(&mut self, time_ms: f64, delta_ms: f64);
    /// Current cursor states, one entry per cursor
    fn cursor_states(&self) -> &[CursorState];
    /// Allow or withhold the controller's hit sounds
    fn set_audio_submission(&mut self, _enabled: bool) {}
}

/// A boxed controller that can cross into the update thread
pub type BoxedController = Box<dyn Controller + Send>;

/// How close to a target time the autoplay cursor holds its press
const AUTOPLAY_PRESS_WINDOW_MS: f64 = 50.0;

/// Generated controller that glides between object positions
pub struct AutoController {
    targets: Vec<(f64, Position)>,
    cursors: [CursorState; 1],
    audio_submission: bool,
}

impl AutoController {
    /// Build from a chart, targeting every object at its start time
    pub fn new(chart: &Chart) -> Self {
        let targets: Vec<(f64, Position)> = chart
            .objects()
            .iter()
            .map(|o| (o.start_time, o.position))
            .collect();
        let initial = targets.first().map(|t| t.1).unwrap_or_default();
        Self {
            targets,
            cursors: [CursorState {
                position: initial,
                pressed: false,
            }],
            audio_submission: true,
        }
    }

    /// Whether hit sounds are currently allowed
    pub fn audio_submission(&self) -> bool {
        self.audio_submission
    }
}

impl Controller for AutoController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Autoplay
    }

    fn update(&mut self, time_ms: f64, _delta_ms: f64) {
        if self.targets.is_empty() {
            return;
        }
        let next = self.targets.partition_point(|t| t.0 <= time_ms);
        let position = if next == 0 {
            self.targets[0].1
        } else if next == self.targets.len() {
            self.targets[next - 1].1
        } else {
            let (t0, p0) = self.targets[next - 1];
            let (t1, p1) = self.targets[next];
            let span = t1 - t0;
            let t = if span <= 0.0 {
                1.0
            } else {
                ((time_ms - t0) / span).clamp(0.0, 1.0)
            };
            Position::new(
                p0.x + (p1.x - p0.x) * t as f32,
                p0.y + (p1.y - p0.y) * t as f32,
            )
        };
        let near_target = self
            .targets
            .get(next.saturating_sub(1))
            .is_some_and(|t| (time_ms - t.0).abs() <= AUTOPLAY_PRESS_WINDOW_MS);
        self.cursors[0] = CursorState {
            position,
            pressed: near_target,
        };
    }

    fn cursor_states(&self) -> &[CursorState] {
        &self.cursors
    }

    fn set_audio_submission(&mut self, enabled: bool) {
        self.audio_submission = enabled;
    }
}

/// One recorded input frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Frame time, in milliseconds
    pub time_ms: f64,
    /// Cursor position at that time
    pub position: Position,
    /// Whether a press was held
    pub pressed: bool,
}

/// Plays back recorded frames, interpolating cursor movement between them
pub struct ReplayController {
    frames: Vec<ReplayFrame>,
    cursors: [CursorState; 1],
    audio_submission: bool,
}

impl ReplayController {
    /// Build from recorded frames ordered by time
    pub fn new(mut frames: Vec<ReplayFrame>) -> Self {
        frames.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
        let initial = frames.first().map(|f| f.position).unwrap_or_default();
        Self {
            frames,
            cursors: [CursorState {
                position: initial,
                pressed: false,
            }],
            audio_submission: true,
        }
    }

    /// Whether hit sounds are currently allowed
    pub fn audio_submission(&self) -> bool {
        self.audio_submission
    }
}

impl Controller for ReplayController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Replay
    }

    fn update(&mut self, time_ms: f64, _delta_ms: f64) {
        if self.frames.is_empty() {
            return;
        }
        let next = self.frames.partition_point(|f| f.time_ms <= time_ms);
        self.cursors[0] = if next == 0 {
            CursorState {
                position: self.frames[0].position,
                pressed: false,
            }
        } else if next == self.frames.len() {
            let last = self.frames[next - 1];
            CursorState {
                position: last.position,
                pressed: last.pressed,
            }
        } else {
            let a = self.frames[next - 1];
            let b = self.frames[next];
            let span = b.time_ms - a.time_ms;
            let t = if span <= 0.0 {
                1.0
            } else {
                ((time_ms - a.time_ms) / span).clamp(0.0, 1.0)
            };
            CursorState {
                position: Position::new(
                    a.position.x + (b.position.x - a.position.x) * t as f32,
                    a.position.y + (b.position.y - a.position.y) * t as f32,
                ),
                // Presses are edges, not ramps
                pressed: a.pressed,
            }
        };
    }

    fn cursor_states(&self) -> &[CursorState] {
        &self.cursors
    }

    fn set_audio_submission(&mut self, enabled: bool) {
        self.audio_submission = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartMetadata, ChartObject, ChartTiming};

    fn chart_with_two_objects() -> Chart {
        Chart::new(
            ChartMetadata::default(),
            ChartTiming::default(),
            vec![
                ChartObject::instant(1000.0, Position::new(0.0, 0.0)),
                ChartObject::instant(2000.0, Position::new(100.0, 50.0)),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn test_autoplay_glides_between_targets() {
        let chart = chart_with_two_objects();
        let mut auto = AutoController::new(&chart);
        auto.update(1500.0, 16.0);
        let cursor = auto.cursor_states()[0];
        assert!((cursor.position.x - 50.0).abs() < 1e-4);
        assert!((cursor.position.y - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_autoplay_holds_ends() {
        let chart = chart_with_two_objects();
        let mut auto = AutoController::new(&chart);
        auto.update(0.0, 16.0);
        assert_eq!(auto.cursor_states()[0].position, Position::new(0.0, 0.0));
        auto.update(9000.0, 16.0);
        assert_eq!(auto.cursor_states()[0].position, Position::new(100.0, 50.0));
    }

    #[test]
    fn test_autoplay_presses_near_target() {
        let chart = chart_with_two_objects();
        let mut auto = AutoController::new(&chart);
        auto.update(1010.0, 16.0);
        assert!(auto.cursor_states()[0].pressed);
        auto.update(1500.0, 16.0);
        assert!(!auto.cursor_states()[0].pressed);
    }

    #[test]
    fn test_autoplay_audio_submission_toggle() {
        let chart = chart_with_two_objects();
        let mut auto = AutoController::new(&chart);
        assert!(auto.audio_submission());
        auto.set_audio_submission(false);
        assert!(!auto.audio_submission());
    }

    #[test]
    fn test_replay_interpolates_frames() {
        let mut replay = ReplayController::new(vec![
            ReplayFrame {
                time_ms: 0.0,
                position: Position::new(0.0, 0.0),
                pressed: false,
            },
            ReplayFrame {
                time_ms: 100.0,
                position: Position::new(10.0, 0.0),
                pressed: true,
            },
        ]);
        replay.update(50.0, 16.0);
        let cursor = replay.cursor_states()[0];
        assert!((cursor.position.x - 5.0).abs() < 1e-4);
        assert!(!cursor.pressed);
        replay.update(100.0, 16.0);
        assert!(replay.cursor_states()[0].pressed);
    }

    #[test]
    fn test_replay_sorts_frames_on_build() {
        let mut replay = ReplayController::new(vec![
            ReplayFrame {
                time_ms: 100.0,
                position: Position::new(10.0, 0.0),
                pressed: false,
            },
            ReplayFrame {
                time_ms: 0.0,
                position: Position::new(0.0, 0.0),
                pressed: false,
            },
        ]);
        replay.update(0.0, 16.0);
        assert_eq!(replay.cursor_states()[0].position, Position::new(0.0, 0.0));
    }

    #[test]
    fn test_empty_controllers_are_inert() {
        let chart = Chart::new(
            ChartMetadata::default(),
            ChartTiming::default(),
            Vec::new(),
            Vec::new(),
        );
        let mut auto = AutoController::new(&chart);
        auto.update(500.0, 16.0);
        assert_eq!(auto.cursor_states()[0].position, Position::default());

        let mut replay = ReplayController::new(Vec::new());
        replay.update(500.0, 16.0);
        assert_eq!(replay.cursor_states()[0].position, Position::default());
    }
}
