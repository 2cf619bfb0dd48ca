// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playback engine for Cadenza.
//!
//! This crate runs a chart against its music:
//! - Chart model with per-object visibility windows
//! - Audio device abstraction with a silent fallback
//! - Autoplay and replay controllers
//! - Session orchestration over clock, tracks and phases
//! - Update-thread runner publishing frame snapshots
//!
//! ## Architecture
//!
//! A [`session::PlaybackSession`] is built from a [`chart::Chart`], a device
//! and a controller, then either stepped manually with `advance` or handed to
//! a [`runner::SessionRunner`] that paces it on its own thread. The draw side
//! only ever sees [`render::VisualFrame`] snapshots.

pub mod audio;
pub mod chart;
pub mod controller;
pub mod options;
pub mod render;
pub mod runner;
pub mod session;

pub use audio::{AudioDevice, AudioError, BoxedDevice, DeviceState, SilentDevice};
pub use chart::{BreakInterval, Chart, ChartMetadata, ChartObject, ChartTiming, EntityId, Position};
pub use controller::{
    AutoController, BoxedController, Controller, ControllerKind, CursorState, ReplayController,
    ReplayFrame,
};
pub use options::{
    AudioOptions, PacingOptions, PlaybackOptions, SessionOptions, StageLevels, VisualOptions,
    WarningOptions,
};
pub use render::{ActiveEntity, BeatPulse, FrameSink, SharedFrame, VisualFrame};
pub use runner::{SessionRunner, SessionSummary};
pub use session::{PlaybackSession, SessionError, SessionPhase, VisualParam, ENDING_FREEZE_SLACK_MS};

#[cfg(feature = "audio")]
pub use audio::RodioDevice;
