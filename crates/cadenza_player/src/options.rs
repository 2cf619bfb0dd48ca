// SPDX-License-Identifier: MIT OR Apache-2.0
//! Session options and profile persistence.
//!
//! This module holds everything the user can configure about a session:
//! - Playback (speed, pitch, trimming, skip, lead-in/out)
//! - Audio (master volume, device offset, beat response)
//! - Visual levels (dim, blur, effects) per session stage
//! - Update pacing bounds
//!
//! Profiles persist as JSON next to the charts they apply to.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Playback shaping: rate, trimming and pre/post-roll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackOptions {
    /// Playback rate multiplier
    pub speed: f64,
    /// Pitch multiplier, independent of speed
    pub pitch: f64,
    /// Jump straight to the first object instead of playing the intro
    pub skip_intro: bool,
    /// Start the session this many seconds into the chart
    pub start_s: f64,
    /// Optional end trim, in seconds into the chart
    pub end_s: Option<f64>,
    /// Quiet run-up before the chart starts, in seconds (floored at one)
    pub lead_in_s: f64,
    /// Extra hold before the lead-in, in seconds
    pub lead_in_hold_s: f64,
    /// Fade-out window after the chart ends, in seconds
    pub fade_out_s: f64,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 1.0,
            skip_intro: false,
            start_s: 0.0,
            end_s: None,
            lead_in_s: 5.0,
            lead_in_hold_s: 2.0,
            fade_out_s: 5.0,
        }
    }
}

/// Audio-path configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioOptions {
    /// Master volume in `[0, 1]`
    pub master_volume: f64,
    /// User calibration offset added to reported device positions, in
    /// milliseconds
    pub offset_ms: f64,
    /// Upper bound of the beat-pulse scale
    pub beat_scale: f64,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            master_volume: 0.5,
            offset_ms: 0.0,
            beat_scale: 1.4,
        }
    }
}

/// One visual level per session stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageLevels {
    /// Level during the intro and lead-in
    pub intro: f64,
    /// Level during normal play
    pub normal: f64,
    /// Level during breaks
    pub breaks: f64,
}

impl StageLevels {
    /// Same level for every stage
    pub fn uniform(level: f64) -> Self {
        Self {
            intro: level,
            normal: level,
            breaks: level,
        }
    }
}

impl Default for StageLevels {
    fn default() -> Self {
        Self::uniform(0.0)
    }
}

/// Photosensitivity warning overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningOptions {
    /// Whether to show the warning before the session
    pub enabled: bool,
    /// How long the warning stays up, in seconds
    pub duration_s: f64,
}

impl Default for WarningOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_s: 5.0,
        }
    }
}

/// Visual parameter levels and related toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualOptions {
    /// Background dim amount per stage (0 none, 1 black)
    pub dim: StageLevels,
    /// Background blur amount per stage
    pub blur: StageLevels,
    /// Effects/logo dim amount per stage
    pub effects: StageLevels,
    /// Keep cursors visible during breaks
    pub show_cursor_on_breaks: bool,
    /// Photosensitivity warning overlay
    pub warning: WarningOptions,
}

impl Default for VisualOptions {
    fn default() -> Self {
        Self {
            dim: StageLevels {
                intro: 0.0,
                normal: 0.8,
                breaks: 0.6,
            },
            blur: StageLevels {
                intro: 0.0,
                normal: 0.6,
                breaks: 0.3,
            },
            effects: StageLevels {
                intro: 0.0,
                normal: 1.0,
                breaks: 1.0,
            },
            show_cursor_on_breaks: true,
            warning: WarningOptions::default(),
        }
    }
}

/// Update-loop pacing bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingOptions {
    /// Lower bound for the adaptive update rate
    pub min_update_fps: f64,
    /// Upper bound for the adaptive update rate
    pub max_update_fps: f64,
}

impl Default for PacingOptions {
    fn default() -> Self {
        Self {
            min_update_fps: 2000.0,
            max_update_fps: 10000.0,
        }
    }
}

/// Everything configurable about a playback session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Playback shaping
    pub playback: PlaybackOptions,
    /// Audio path
    pub audio: AudioOptions,
    /// Visual levels
    pub visuals: VisualOptions,
    /// Update pacing
    pub pacing: PacingOptions,
}

impl SessionOptions {
    /// Load a profile from a JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let options: SessionOptions = serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to parse options profile: {}", e),
            )
        })?;
        Ok(options)
    }

    /// Save this profile as pretty-printed JSON
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to serialize options profile: {}", e),
            )
        })?;
        std::fs::write(path, content)
    }
}
