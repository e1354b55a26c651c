//! # TILESTREAM Walk
//!
//! Headless streaming run: a viewpoint walks across the grid while the
//! control loop keeps a window of chunks resident on an in-memory surface.
//!
//! ```bash
//! # Defaults, 10 seconds
//! RUST_LOG=info ./tilestream_walk
//!
//! # Config file, 30 seconds
//! RUST_LOG=tilestream_streaming=debug ./tilestream_walk config/tilestream.toml 30
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tilestream::prelude::*;
use tracing::{error, info};

const DEFAULT_SECONDS: u64 = 10;

/// Walk pattern: a long diagonal run with a periodic jump back toward the
/// start, into ground that was streamed out earlier.
fn walk(viewpoint: &SharedViewpoint, running: &RunningFlag, chunk_size: u32, duration: Duration) {
    #[allow(clippy::cast_precision_loss)]
    let step = chunk_size as f32 / 8.0;
    let started = Instant::now();
    let mut frame = 0u64;

    while running.is_running() && started.elapsed() < duration {
        frame += 1;
        if frame % 600 == 0 {
            let (x, y) = viewpoint.position();
            viewpoint.set(x * 0.5, y * 0.5);
        } else {
            viewpoint.translate(step, step * 0.25);
        }
        thread::sleep(Duration::from_millis(16));
    }
    running.stop();
}

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match ConfigFile::load(&path) {
            Ok(config) => {
                info!(path = %path, "config loaded");
                config
            }
            Err(err) => {
                error!("{err}");
                return ExitCode::FAILURE;
            }
        },
        None => ConfigFile::default(),
    };
    let seconds = match args.next().map(|s| s.parse::<u64>()) {
        None => DEFAULT_SECONDS,
        Some(Ok(seconds)) => seconds,
        Some(Err(err)) => {
            error!("invalid duration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let chunk_size = config.streaming.chunk_size;
    let generator = Arc::new(BandedGenerator::new(config.generator));
    let manager = match ChunkLifecycleManager::new(config.streaming, generator) {
        Ok(manager) => manager,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let viewpoint = SharedViewpoint::new(0.0, 0.0, chunk_size);
    let mut control = ControlLoop::new(manager, viewpoint.clone(), ControlLoopConfig::default());
    let running = control.running_flag();

    let walker = {
        let running = running.clone();
        thread::Builder::new()
            .name("tilestream-walker".into())
            .spawn(move || walk(&viewpoint, &running, chunk_size, Duration::from_secs(seconds)))
    };
    let walker = match walker {
        Ok(handle) => handle,
        Err(err) => {
            error!("failed to spawn walker: {err}");
            control.shutdown();
            return ExitCode::FAILURE;
        }
    };

    let mut surface = MemorySurface::new();
    let frames = control.run(&mut surface);
    if walker.join().is_err() {
        error!("walker thread panicked");
    }

    let stats = control.streaming_stats();
    let frame_stats = control.frame_stats();
    info!(
        frames,
        avg_frame_ms = frame_stats.avg_frame_ms(),
        max_frame_us = frame_stats.max_frame_us,
        frames_over_budget = frame_stats.frames_over_budget,
        "walk finished"
    );
    info!(
        admitted = stats.admitted_total,
        resurrected = stats.resurrected_total,
        generated = stats.generated_total,
        discarded = stats.discarded_total,
        failed = stats.failed_total,
        reclaimed = stats.reclaimed_total,
        drawn_cells = surface.drawn_cells(),
        "streaming totals"
    );
    let counts = surface.tag_counts();
    for tag in ContentTag::ALL {
        info!(tag = ?tag, cells = counts[usize::from(tag.as_u8())], "resident content");
    }

    ExitCode::SUCCESS
}
