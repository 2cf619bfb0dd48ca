// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cadenza - chart playback engine
//!
//! Headless player binary featuring:
//! - A built-in demonstration chart with breaks and combo groups
//! - Autoplay control with scheduled cursor glides
//! - Silent device by default; a decoded audio file with the `audio` feature
//! - Update thread paced independently of the presenting loop
//!
//! ## Usage
//!
//! `cadenza [options.json] [audio-file]`
//!
//! The options file is optional; defaults play the demo chart end to end.
//! The audio file argument is only honored when built with the `audio`
//! feature.

use cadenza_player::{
    AudioError, AutoController, BoxedDevice, BreakInterval, Chart, ChartMetadata, ChartObject,
    ChartTiming, FrameSink, PlaybackSession, Position, SessionOptions, SessionRunner, SilentDevice,
    VisualFrame,
};
use cadenza_timeline::FrameCounter;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Draw work beyond this is worth a warning when the loop otherwise keeps up
const SLOW_FRAME_MS: f64 = 18.0;
/// Slow-frame warnings only fire above this average rate
const SLOW_FRAME_MIN_FPS: f64 = 58.0;

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("cadenza_player=debug".parse().unwrap())
        .add_directive("cadenza_timeline=debug".parse().unwrap());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Cadenza v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        tracing::error!("Playback failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let options = match std::env::args().nth(1) {
        Some(path) => SessionOptions::load(Path::new(&path))?,
        None => SessionOptions::default(),
    };

    let chart = demo_chart();
    let device = open_device(&chart)?;
    let controller = AutoController::new(&chart);
    let session = PlaybackSession::new(chart, options, device, Box::new(controller))?;

    let runner = SessionRunner::spawn(session);
    present_until_finished(&runner);
    let summary = runner.join();

    tracing::info!(
        "Playback complete: {} ticks over {:.1}s, final phase {:?}",
        summary.ticks,
        summary.wall_time_s,
        summary.final_phase
    );
    Ok(())
}

/// Two combo rings separated by a break
fn demo_chart() -> Chart {
    let mut objects = Vec::with_capacity(32);
    for i in 0..32i32 {
        let start = 1_000.0 + 450.0 * f64::from(i) + if i >= 16 { 3_000.0 } else { 0.0 };
        let angle = f64::from(i) * std::f64::consts::TAU / 16.0;
        let position = Position::new(
            (256.0 + 160.0 * angle.cos()) as f32,
            (192.0 + 120.0 * angle.sin()) as f32,
        );
        let object = ChartObject::instant(start, position);
        objects.push(if i % 4 == 0 {
            object.with_new_combo()
        } else {
            object
        });
    }
    let breaks = vec![BreakInterval::new(8_200.0, 9_800.0)];
    Chart::new(
        ChartMetadata {
            title: "Cadenza Demo".into(),
            artist: "Built-in".into(),
            difficulty: "Normal".into(),
        },
        ChartTiming::default(),
        objects,
        breaks,
    )
}

#[cfg(feature = "audio")]
fn open_device(chart: &Chart) -> Result<BoxedDevice, AudioError> {
    if let Some(path) = std::env::args().nth(2) {
        let device = cadenza_player::RodioDevice::open(Path::new(&path))?;
        return Ok(Box::new(device));
    }
    Ok(silent_device(chart))
}

#[cfg(not(feature = "audio"))]
fn open_device(chart: &Chart) -> Result<BoxedDevice, AudioError> {
    Ok(silent_device(chart))
}

fn silent_device(chart: &Chart) -> BoxedDevice {
    let length_ms = chart.last_end_time().unwrap_or(0.0) + 5_000.0;
    Box::new(SilentDevice::new(length_ms))
}

/// Logs one line per second of progress
struct ConsoleSink {
    last_logged_s: f64,
}

impl FrameSink for ConsoleSink {
    fn present(&mut self, frame: &VisualFrame) {
        let second = (frame.progress_ms / 1000.0).floor();
        if second > self.last_logged_s {
            self.last_logged_s = second;
            tracing::debug!(
                "t={:.1}s phase {:?}, {} active, dim {:.2}, cursor {:.2}, volume {:.2}",
                frame.progress_ms / 1000.0,
                frame.phase,
                frame.active_entities.len(),
                frame.dim,
                frame.cursor_alpha,
                frame.volume
            );
        }
    }
}

/// The presenting loop: snapshot, sink, report measured FPS back
fn present_until_finished(runner: &SessionRunner) {
    let shared = runner.shared_frame();
    let mut sink = ConsoleSink {
        last_logged_s: f64::NEG_INFINITY,
    };
    let mut counter = FrameCounter::new();
    let mut last = Instant::now();
    while !runner.is_finished() {
        std::thread::sleep(Duration::from_millis(16));
        let now = Instant::now();
        counter.put_sample(now.duration_since(last).as_secs_f64() * 1000.0);
        last = now;
        let frame = shared.snapshot();
        sink.present(&frame);
        let work_ms = now.elapsed().as_secs_f64() * 1000.0;
        if work_ms > SLOW_FRAME_MS && counter.fps() > SLOW_FRAME_MIN_FPS {
            tracing::warn!(
                "Slow frame: {:.3}ms of draw work at {:.1} FPS average",
                work_ms,
                counter.fps()
            );
        }
        runner.report_render_fps(counter.fps());
    }
}
