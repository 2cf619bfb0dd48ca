// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chart model: scheduled entities plus session boundary metadata.
//!
//! A chart is the entity source handed to a playback session:
//! - Objects ordered by start time, each with a visibility window
//! - Break intervals between dense sections
//! - Timing windows (approach preempt, judgment tail)
//!
//! Objects are created once at load time and never destroyed during a
//! session; trimming produces a new sequence and straddling objects are
//! silenced, not removed.

use cadenza_timeline::{TimeSpan, ValueTrack};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a scheduled entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new random entity ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Playfield position of an entity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f32,
    /// Vertical coordinate
    pub y: f32,
}

impl Position {
    /// Create a position
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Timing windows shared by every object in a chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartTiming {
    /// How long before its start time an object becomes visible, in
    /// milliseconds
    pub preempt_ms: f64,
    /// Judgment tail after an object's end time, in milliseconds
    pub hit_window_ms: f64,
}

impl Default for ChartTiming {
    fn default() -> Self {
        Self {
            preempt_ms: 1200.0,
            hit_window_ms: 200.0,
        }
    }
}

/// Descriptive chart fields carried through to logs and overlays
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartMetadata {
    /// Track title
    pub title: String,
    /// Track artist
    pub artist: String,
    /// Difficulty name
    pub difficulty: String,
}

/// A pause between dense sections of a chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakInterval {
    /// Break start, in milliseconds
    pub start_time: f64,
    /// Break end, in milliseconds
    pub end_time: f64,
}

impl BreakInterval {
    /// Create a break interval
    pub fn new(start_time: f64, end_time: f64) -> Self {
        Self { start_time, end_time }
    }

    /// Length of the break, in milliseconds
    pub fn length(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// One scheduled entity: a time-bounded object with a fade envelope
#[derive(Debug, Clone)]
pub struct ChartObject {
    /// Unique entity ID
    pub id: EntityId,
    /// Gameplay start time, in milliseconds
    pub start_time: f64,
    /// Gameplay end time, in milliseconds (equals start for instant objects)
    pub end_time: f64,
    /// Playfield position
    pub position: Position,
    /// Whether this object opens a new combo
    pub new_combo: bool,
    audio_disabled: bool,
    spawn_time: f64,
    despawn_time: f64,
    fade: ValueTrack,
}

impl ChartObject {
    /// Create an object over `[start_time, end_time]`
    pub fn new(start_time: f64, end_time: f64, position: Position) -> Self {
        debug_assert!(end_time >= start_time);
        Self {
            id: EntityId::new(),
            start_time,
            end_time,
            position,
            new_combo: false,
            audio_disabled: false,
            spawn_time: start_time,
            despawn_time: end_time,
            fade: ValueTrack::new(0.0),
        }
    }

    /// Create an instant object (end equals start)
    pub fn instant(time: f64, position: Position) -> Self {
        Self::new(time, time, position)
    }

    /// Mark this object as opening a new combo
    pub fn with_new_combo(mut self) -> Self {
        self.new_combo = true;
        self
    }

    /// Extend the visibility window around the gameplay window and program
    /// the fade envelope into it
    fn schedule_window(&mut self, timing: &ChartTiming) {
        self.spawn_time = self.start_time - timing.preempt_ms;
        self.despawn_time = self.end_time + timing.hit_window_ms;
        self.fade = ValueTrack::new(0.0);
        self.fade.add_event(self.spawn_time, self.start_time, 1.0);
        self.fade.add_event(self.end_time, self.despawn_time, 0.0);
    }

    /// Advance the fade envelope to `time`
    pub fn update(&mut self, time: f64) {
        self.fade.update(time);
    }

    /// Current fade alpha in `[0, 1]`
    pub fn alpha(&self) -> f64 {
        self.fade.value()
    }

    /// Whether this object's sounds are withheld from the audio path
    pub fn audio_disabled(&self) -> bool {
        self.audio_disabled
    }

    /// Withhold this object's sounds from the audio path
    pub fn disable_audio(&mut self) {
        self.audio_disabled = true;
    }

    /// Gameplay duration, in milliseconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

impl TimeSpan for ChartObject {
    fn span_start(&self) -> f64 {
        self.spawn_time
    }

    fn span_end(&self) -> f64 {
        self.despawn_time
    }
}

/// The entity source for a playback session
#[derive(Debug, Clone)]
pub struct Chart {
    /// Descriptive fields
    pub metadata: ChartMetadata,
    /// Timing windows applied to every object
    pub timing: ChartTiming,
    /// Breaks between dense sections, in time order
    pub breaks: Vec<BreakInterval>,
    objects: Vec<ChartObject>,
}

impl Chart {
    /// Assemble a chart, ordering objects by start time and computing their
    /// visibility windows
    pub fn new(
        metadata: ChartMetadata,
        timing: ChartTiming,
        mut objects: Vec<ChartObject>,
        breaks: Vec<BreakInterval>,
    ) -> Self {
        objects.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        for object in &mut objects {
            object.schedule_window(&timing);
        }
        tracing::info!(
            "Chart assembled: {} - {} [{}], {} objects, {} breaks",
            metadata.artist,
            metadata.title,
            metadata.difficulty,
            objects.len(),
            breaks.len()
        );
        Self {
            metadata,
            timing,
            breaks,
            objects,
        }
    }

    /// Objects in start-time order
    pub fn objects(&self) -> &[ChartObject] {
        &self.objects
    }

    /// Mutable access to the objects, preserving order
    pub fn objects_mut(&mut self) -> &mut [ChartObject] {
        &mut self.objects
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the chart has no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Start time of the first object, in milliseconds
    pub fn first_start_time(&self) -> Option<f64> {
        self.objects.first().map(|o| o.start_time)
    }

    /// Latest end time across all objects, in milliseconds
    pub fn last_end_time(&self) -> Option<f64> {
        self.objects
            .iter()
            .map(|o| o.end_time)
            .fold(None, |acc, end| Some(acc.map_or(end, |a: f64| a.max(end))))
    }

    /// Keep only objects whose gameplay window intersects
    /// `[start_ms, end_ms]`, returning how many were dropped
    ///
    /// A filter pass that produces a fresh sequence; relative order is
    /// preserved.
    pub fn retain_range(&mut self, start_ms: f64, end_ms: f64) -> usize {
        let before = self.objects.len();
        let kept: Vec<ChartObject> = self
            .objects
            .drain(..)
            .filter(|o| o.end_time >= start_ms && o.start_time <= end_ms)
            .collect();
        self.objects = kept;
        let removed = before - self.objects.len();
        if removed > 0 {
            tracing::info!(
                "Dropped {} objects outside trim range [{:.0}ms, {:.0}ms]",
                removed,
                start_ms,
                end_ms
            );
        }
        removed
    }

    /// Disable audio submission for every object matching `predicate`,
    /// returning how many were marked
    ///
    /// Marked objects keep rendering; silenced is a distinct state from
    /// removed.
    pub fn disable_audio_where(&mut self, predicate: impl Fn(&ChartObject) -> bool) -> usize {
        let mut marked = 0;
        for object in &mut self.objects {
            if predicate(object) {
                object.disable_audio();
                marked += 1;
            }
        }
        if marked > 0 {
            tracing::debug!("Audio submission disabled for {} objects", marked);
        }
        marked
    }
}
