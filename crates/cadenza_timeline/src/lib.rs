// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timing primitives for Cadenza.
//!
//! This crate provides the leaf components of the playback engine:
//! - Keyframed value tracks with eased transitions
//! - A visibility window index over time-bounded spans
//! - Wall-clock / device-clock reconciliation
//! - Adaptive frame pacing and frame-rate measurement
//!
//! ## Architecture
//!
//! Everything here is renderer- and audio-agnostic:
//! - Tracks map a query time to a value, nothing more
//! - The window index answers "which spans contain this time"
//! - The clock turns deltas plus device reports into one progress time
//! - The limiter paces whoever calls it; it never spawns threads

pub mod clock;
pub mod easing;
pub mod limiter;
pub mod track;
pub mod window;

pub use clock::SyncClock;
pub use easing::Easing;
pub use limiter::{FrameCounter, FrameLimiter};
pub use track::{Transition, ValueTrack};
pub use window::{TimeSpan, VisibilityIndex};
