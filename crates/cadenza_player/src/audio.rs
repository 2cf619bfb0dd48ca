// SPDX-License-Identifier: MIT OR Apache-2.0
//! Audio device boundary.
//!
//! This module provides:
//! - The [`AudioDevice`] contract the session drives each tick
//! - [`SilentDevice`], a deterministic device clock used headless and in tests
//! - A rodio-backed output device (when the "audio" feature is enabled)
//!
//! Devices report their position at their own granularity, not every tick;
//! the clock synchronizer owns reconciling that against wall time.

use thiserror::Error;

/// Errors raised while opening the real audio backend
#[derive(Debug, Error)]
pub enum AudioError {
    /// No usable output stream
    #[error("Failed to open audio output: {0}")]
    Output(String),

    /// The audio file could not be decoded
    #[error("Failed to decode audio file: {0}")]
    Decode(String),

    /// Filesystem failure while reading the audio file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse device playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    /// Not producing samples
    #[default]
    Stopped,
    /// Producing samples, position advancing
    Playing,
}

/// The playback device contract consumed by the session
///
/// Commands are issued from the update context only; the draw side never
/// touches the device.
pub trait AudioDevice {
    /// Reported playback position, in milliseconds
    fn position_ms(&self) -> f64;
    /// Current playback state
    fn state(&self) -> DeviceState;
    /// Begin or resume playback at the current position
    fn play(&mut self);
    /// Halt playback
    fn stop(&mut self);
    /// Seek the device to `position_ms`
    fn set_position_ms(&mut self, position_ms: f64);
    /// Set the tempo multiplier
    fn set_tempo(&mut self, tempo: f64);
    /// Set the pitch multiplier
    fn set_pitch(&mut self, pitch: f64);
    /// Set the output volume in `[0, 1]`
    fn set_volume(&mut self, volume: f64);
    /// Total track length, in milliseconds
    fn length_ms(&self) -> f64;
    /// Low-band energy in `[0, 1]` for beat-reactive effects
    fn beat_energy(&self) -> f64 {
        0.0
    }
    /// Advance a device that has no clock of its own
    ///
    /// Real backends ignore this; the silent device models its position from
    /// the deltas the session feeds it, which keeps sessions deterministic
    /// under synthetic tick rates.
    fn advance(&mut self, _wall_delta_ms: f64) {}
}

/// A boxed device that can cross into the update thread
pub type BoxedDevice = Box<dyn AudioDevice + Send>;

/// Device clock without an output path
///
/// Position advances only through [`AudioDevice::advance`], scaled by tempo,
/// and is reported quantized to a polling granularity so consumers see the
/// same update cadence a real device would give them.
#[derive(Debug, Clone)]
pub struct SilentDevice {
    position_ms: f64,
    length_ms: f64,
    granularity_ms: f64,
    tempo: f64,
    pitch: f64,
    volume: f64,
    state: DeviceState,
}

impl SilentDevice {
    /// Create a silent device for a track of `length_ms`
    pub fn new(length_ms: f64) -> Self {
        Self {
            position_ms: 0.0,
            length_ms,
            granularity_ms: 10.0,
            tempo: 1.0,
            pitch: 1.0,
            volume: 1.0,
            state: DeviceState::Stopped,
        }
    }

    /// Set the position-report quantization, in milliseconds (zero reports
    /// the exact position)
    pub fn with_granularity(mut self, granularity_ms: f64) -> Self {
        self.granularity_ms = granularity_ms;
        self
    }

    /// Last applied volume, for assertions
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Last applied pitch, for assertions
    pub fn pitch(&self) -> f64 {
        self.pitch
    }
}

impl AudioDevice for SilentDevice {
    fn position_ms(&self) -> f64 {
        if self.granularity_ms > 0.0 {
            (self.position_ms / self.granularity_ms).floor() * self.granularity_ms
        } else {
            self.position_ms
        }
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    fn play(&mut self) {
        self.state = DeviceState::Playing;
    }

    fn stop(&mut self) {
        self.state = DeviceState::Stopped;
    }

    fn set_position_ms(&mut self, position_ms: f64) {
        self.position_ms = position_ms.clamp(0.0, self.length_ms);
    }

    fn set_tempo(&mut self, tempo: f64) {
        self.tempo = tempo.max(0.05);
    }

    fn set_pitch(&mut self, pitch: f64) {
        self.pitch = pitch.max(0.05);
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn length_ms(&self) -> f64 {
        self.length_ms
    }

    fn advance(&mut self, wall_delta_ms: f64) {
        if self.state != DeviceState::Playing {
            return;
        }
        self.position_ms += wall_delta_ms * self.tempo;
        if self.position_ms >= self.length_ms {
            // Track ran out
            self.position_ms = self.length_ms;
            self.state = DeviceState::Stopped;
        }
    }
}

// ============================================================================
// Real output device (with rodio)
// ============================================================================

#[cfg(feature = "audio")]
mod rodio_backend {
    use super::{AudioDevice, AudioError, DeviceState};
    use rodio::{Decoder, OutputStream, Sink, Source};
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;
    use std::time::Duration;

    /// Output device backed by a rodio sink
    pub struct RodioDevice {
        sink: Sink,
        length_ms: f64,
        tempo: f64,
        pitch: f64,
    }

    impl RodioDevice {
        /// Open `path` on the default output stream
        pub fn open(path: &Path) -> Result<Self, AudioError> {
            let (stream, handle) =
                OutputStream::try_default().map_err(|e| AudioError::Output(e.to_string()))?;
            // The stream must outlive every sink for the whole process;
            // dropping it silences the output
            std::mem::forget(stream);

            let file = File::open(path)?;
            let source = Decoder::new(BufReader::new(file))
                .map_err(|e| AudioError::Decode(e.to_string()))?;
            let length_ms = source
                .total_duration()
                .map_or(0.0, |d| d.as_secs_f64() * 1000.0);

            let sink = Sink::try_new(&handle).map_err(|e| AudioError::Output(e.to_string()))?;
            sink.pause();
            sink.append(source);
            tracing::info!(
                "Audio device opened: {} ({:.0}ms)",
                path.display(),
                length_ms
            );
            Ok(Self {
                sink,
                length_ms,
                tempo: 1.0,
                pitch: 1.0,
            })
        }

        // rodio resamples through a single speed control, so tempo and pitch
        // fold into one rate
        fn apply_rate(&self) {
            self.sink.set_speed((self.tempo * self.pitch) as f32);
        }
    }

    impl AudioDevice for RodioDevice {
        fn position_ms(&self) -> f64 {
            self.sink.get_pos().as_secs_f64() * 1000.0
        }

        fn state(&self) -> DeviceState {
            if self.sink.is_paused() || self.sink.empty() {
                DeviceState::Stopped
            } else {
                DeviceState::Playing
            }
        }

        fn play(&mut self) {
            self.sink.play();
        }

        fn stop(&mut self) {
            self.sink.pause();
        }

        fn set_position_ms(&mut self, position_ms: f64) {
            let target = Duration::from_secs_f64(position_ms.max(0.0) / 1000.0);
            if let Err(e) = self.sink.try_seek(target) {
                tracing::warn!("Device seek to {:.0}ms failed: {e}", position_ms);
            }
        }

        fn set_tempo(&mut self, tempo: f64) {
            self.tempo = tempo.max(0.05);
            self.apply_rate();
        }

        fn set_pitch(&mut self, pitch: f64) {
            self.pitch = pitch.max(0.05);
            self.apply_rate();
        }

        fn set_volume(&mut self, volume: f64) {
            self.sink.set_volume(volume.clamp(0.0, 1.0) as f32);
        }

        fn length_ms(&self) -> f64 {
            self.length_ms
        }
    }
}

#[cfg(feature = "audio")]
pub use rodio_backend::RodioDevice;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_device_starts_stopped() {
        let device = SilentDevice::new(10_000.0);
        assert_eq!(device.state(), DeviceState::Stopped);
        assert_eq!(device.position_ms(), 0.0);
    }

    #[test]
    fn test_advance_only_while_playing() {
        let mut device = SilentDevice::new(10_000.0).with_granularity(0.0);
        device.advance(100.0);
        assert_eq!(device.position_ms(), 0.0);
        device.play();
        device.advance(100.0);
        assert_eq!(device.position_ms(), 100.0);
    }

    #[test]
    fn test_advance_scales_by_tempo() {
        let mut device = SilentDevice::new(10_000.0).with_granularity(0.0);
        device.set_tempo(1.5);
        device.play();
        device.advance(100.0);
        assert_eq!(device.position_ms(), 150.0);
    }

    #[test]
    fn test_position_quantized_to_granularity() {
        let mut device = SilentDevice::new(10_000.0).with_granularity(10.0);
        device.play();
        device.advance(7.0);
        assert_eq!(device.position_ms(), 0.0);
        device.advance(7.0);
        assert_eq!(device.position_ms(), 10.0);
    }

    #[test]
    fn test_stops_at_end_of_track() {
        let mut device = SilentDevice::new(50.0).with_granularity(0.0);
        device.play();
        device.advance(100.0);
        assert_eq!(device.position_ms(), 50.0);
        assert_eq!(device.state(), DeviceState::Stopped);
    }

    #[test]
    fn test_set_position_clamps_to_track() {
        let mut device = SilentDevice::new(1000.0).with_granularity(0.0);
        device.set_position_ms(-50.0);
        assert_eq!(device.position_ms(), 0.0);
        device.set_position_ms(5000.0);
        assert_eq!(device.position_ms(), 1000.0);
    }
}
