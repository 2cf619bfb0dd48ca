// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframed value tracks.
//!
//! A [`ValueTrack`] holds an ordered list of eased transitions and answers
//! "what is this parameter worth at time t". Evaluation is a pure function of
//! the transition list, so repeated or non-monotonic queries are safe; the
//! playback scheduler relies on that when it replays skipped intervals or
//! seeks backwards.

use crate::easing::Easing;
use serde::{Deserialize, Serialize};

/// One scheduled change of a track's value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Time at which interpolation begins, in milliseconds
    pub start_time: f64,
    /// Time at which `end_value` is fully reached, in milliseconds
    pub end_time: f64,
    /// Value at `start_time`
    pub start_value: f64,
    /// Value at and after `end_time`
    pub end_value: f64,
    /// Curve applied to normalized progress
    pub easing: Easing,
}

impl Transition {
    /// Value of this transition at `time`, clamped to its interval
    fn value_at(self, time: f64) -> f64 {
        if time >= self.end_time {
            return self.end_value;
        }
        let duration = self.end_time - self.start_time;
        // Zero-duration transitions act as an instantaneous set
        let progress = if duration.abs() < 0.0001 {
            1.0
        } else {
            ((time - self.start_time) / duration).clamp(0.0, 1.0)
        };
        let eased = self.easing.apply(progress);
        self.start_value + (self.end_value - self.start_value) * eased
    }
}

/// A single animated parameter driven by appended transitions
///
/// Transitions must be appended in non-decreasing `start_time` order and must
/// not overlap; the track does not sort or validate, it only evaluates. Each
/// appended transition starts from the previous transition's end value (or the
/// base value for the first one), so a schedule built front-to-back is always
/// continuous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueTrack {
    base: f64,
    value: f64,
    easing: Easing,
    transitions: Vec<Transition>,
}

impl ValueTrack {
    /// Create a track resting at `base` until its first transition
    pub fn new(base: f64) -> Self {
        Self {
            base,
            value: base,
            easing: Easing::Linear,
            transitions: Vec::new(),
        }
    }

    /// Set the default easing used by [`ValueTrack::add_event`]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Change the default easing for later events
    pub fn set_easing(&mut self, easing: Easing) {
        self.easing = easing;
    }

    /// Append a transition to `end_value` over `[start_time, end_time]`
    ///
    /// `end_time == start_time` is legal and acts as an instantaneous set at
    /// that time.
    pub fn add_event(&mut self, start_time: f64, end_time: f64, end_value: f64) {
        self.add_event_eased(start_time, end_time, end_value, self.easing);
    }

    /// Append a transition with an explicit easing
    pub fn add_event_eased(&mut self, start_time: f64, end_time: f64, end_value: f64, easing: Easing) {
        let start_value = self.transitions.last().map_or(self.base, |t| t.end_value);
        self.transitions.push(Transition {
            start_time,
            end_time,
            start_value,
            end_value,
            easing,
        });
    }

    /// Drop every scheduled transition and rest at `v`
    pub fn set_value(&mut self, v: f64) {
        self.transitions.clear();
        self.base = v;
        self.value = v;
    }

    /// Evaluate the track at `time`, caching and returning the result
    ///
    /// Idempotent for a fixed time: the cached value is a convenience for
    /// readers, never an input to evaluation.
    pub fn update(&mut self, time: f64) -> f64 {
        self.value = self.value_at(time);
        self.value
    }

    /// Value from the most recent [`ValueTrack::update`]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Evaluate the track at `time` without touching the cached value
    pub fn value_at(&self, time: f64) -> f64 {
        // Last transition whose start is at or before `time`; transitions are
        // ordered and non-overlapping, so it alone decides the value.
        let started = self.transitions.partition_point(|t| t.start_time <= time);
        match started {
            0 => self.base,
            n => self.transitions[n - 1].value_at(time),
        }
    }

    /// Whether any transitions have been scheduled
    pub fn has_events(&self) -> bool {
        !self.transitions.is_empty()
    }

    /// End time of the last scheduled transition, if any
    pub fn last_event_end(&self) -> Option<f64> {
        self.transitions.last().map(|t| t.end_time)
    }

    /// Scheduled transitions, in append order
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }
}

impl Default for ValueTrack {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_value_before_first_event() {
        let mut track = ValueTrack::new(0.3);
        track.add_event(1000.0, 2000.0, 1.0);
        assert_eq!(track.update(0.0), 0.3);
        assert_eq!(track.update(999.9), 0.3);
    }

    #[test]
    fn test_linear_envelope() {
        let mut track = ValueTrack::new(0.0);
        track.add_event(0.0, 1000.0, 1.0);
        assert_eq!(track.update(0.0), 0.0);
        assert!((track.update(500.0) - 0.5).abs() < 1e-9);
        assert_eq!(track.update(1000.0), 1.0);
        // Terminal value holds past the last event
        assert_eq!(track.update(1500.0), 1.0);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut track = ValueTrack::new(0.0);
        track.add_event(0.0, 1000.0, 1.0);
        let first = track.update(250.0);
        let second = track.update(250.0);
        assert_eq!(first, second);
        // Non-monotonic queries re-evaluate from the schedule, not the cache
        track.update(900.0);
        assert_eq!(track.update(250.0), first);
    }

    #[test]
    fn test_zero_duration_event() {
        let mut track = ValueTrack::new(0.0);
        track.add_event(500.0, 500.0, 5.0);
        assert_eq!(track.update(499.0), 0.0);
        assert_eq!(track.update(500.0), 5.0);
        assert_eq!(track.update(501.0), 5.0);
    }

    #[test]
    fn test_events_chain_from_previous_terminal() {
        let mut track = ValueTrack::new(0.0);
        track.add_event(0.0, 100.0, 1.0);
        track.add_event(200.0, 300.0, 0.5);
        // Gap between events holds the first event's terminal value
        assert_eq!(track.update(150.0), 1.0);
        assert!((track.update(250.0) - 0.75).abs() < 1e-9);
        assert_eq!(track.update(300.0), 0.5);
    }

    #[test]
    fn test_set_value_clears_schedule() {
        let mut track = ValueTrack::new(0.0);
        track.add_event(0.0, 1000.0, 1.0);
        track.update(500.0);
        track.set_value(0.2);
        assert!(!track.has_events());
        assert_eq!(track.value(), 0.2);
        assert_eq!(track.update(500.0), 0.2);
    }

    #[test]
    fn test_eased_event() {
        let mut track = ValueTrack::new(0.0).with_easing(Easing::OutQuad);
        track.add_event(0.0, 1000.0, 1.0);
        // OutQuad is past the halfway mark at half time
        assert!(track.update(500.0) > 0.5);
        assert_eq!(track.update(1000.0), 1.0);
    }

    #[test]
    fn test_value_at_is_pure() {
        let mut track = ValueTrack::new(0.0);
        track.add_event(0.0, 1000.0, 1.0);
        track.update(1000.0);
        assert!((track.value_at(500.0) - 0.5).abs() < 1e-9);
        // Cached value untouched by value_at
        assert_eq!(track.value(), 1.0);
    }
}
