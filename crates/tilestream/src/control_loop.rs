//! # Streaming Control Loop
//!
//! One cooperative thread, one quantum per frame:
//!
//! ```text
//! Frame N:
//! ┌──────────────────────────────────────────────────────────────┐
//! │ 1. SAMPLE VIEWPOINT                                          │
//! │    └─ current_chunk() compared by value with last frame      │
//! │                                                              │
//! │ 2. ADMISSION (only if the chunk changed)                     │
//! │    ├─ admit neighborhood, dispatch generation                │
//! │    └─ queue out-of-range loaded chunks for unload            │
//! │                                                              │
//! │ 3. APPLY QUANTUM                                             │
//! │    ├─ erase + delete reclaimed chunks                        │
//! │    └─ draw chunks whose content arrived                      │
//! │                                                              │
//! │ 4. END FRAME                                                 │
//! │    └─ sleep out the rest of the frame budget                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Workers are never waited on. Clearing the running flag ends `run` after
//! the current frame and shuts the worker pool down.

use std::time::{Duration, Instant};

use tilestream_streaming::{
    ApplyLoop, ChunkLifecycleManager, PresentationSurface, QuantumReport, RunningFlag,
    StreamingStats, ViewpointSource,
};
use tracing::{info, warn};

/// Target frame time for 60 FPS.
pub const TARGET_FRAME_TIME: Duration = Duration::from_micros(16_666);

/// Frame time above which a frame is logged as slow.
pub const MAX_FRAME_TIME: Duration = Duration::from_millis(33);

/// Configuration for the control loop.
#[derive(Clone, Debug)]
pub struct ControlLoopConfig {
    /// Target frames (quanta) per second. Zero disables pacing.
    pub target_fps: u32,
    /// Log streaming statistics every this many frames. Zero disables.
    pub log_every_quanta: u64,
    /// Log frames that exceed `MAX_FRAME_TIME`.
    pub enable_timing_logs: bool,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            log_every_quanta: 600,
            enable_timing_logs: false,
        }
    }
}

impl ControlLoopConfig {
    /// Frame budget for `target_fps`, or `None` when unpaced.
    #[must_use]
    pub fn frame_time(&self) -> Option<Duration> {
        (self.target_fps > 0).then(|| Duration::from_micros(1_000_000 / u64::from(self.target_fps)))
    }
}

/// Timing and work of one frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    /// Frame number, starting at 1.
    pub frame: u64,
    /// Whether the viewpoint changed chunk this frame.
    pub moved: bool,
    /// Admission time in microseconds.
    pub admission_us: u64,
    /// Apply quantum time in microseconds.
    pub apply_us: u64,
    /// Total frame work in microseconds, excluding pacing sleep.
    pub total_us: u64,
    /// What the apply quantum did.
    pub quantum: QuantumReport,
}

/// Accumulated frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Frames recorded.
    pub frames_recorded: u64,
    /// Frames in which the viewpoint changed chunk.
    pub frames_moved: u64,
    /// Sum of frame work times.
    pub total_us_sum: u64,
    /// Shortest frame.
    pub min_frame_us: u64,
    /// Longest frame.
    pub max_frame_us: u64,
    /// Frames over `TARGET_FRAME_TIME`.
    pub frames_over_budget: u64,
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self {
            frames_recorded: 0,
            frames_moved: 0,
            total_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
        }
    }
}

impl FrameStatsAccumulator {
    /// Records one frame.
    pub fn record(&mut self, stats: &FrameStats) {
        self.frames_recorded += 1;
        self.frames_moved += u64::from(stats.moved);
        self.total_us_sum += stats.total_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        if u128::from(stats.total_us) > TARGET_FRAME_TIME.as_micros() {
            self.frames_over_budget += 1;
        }
    }

    /// Average frame work time in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }
}

fn elapsed_us(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_micros()).unwrap_or(u64::MAX)
}

/// Drives a lifecycle manager and its apply loop from a viewpoint source.
pub struct ControlLoop<V> {
    manager: ChunkLifecycleManager,
    apply: ApplyLoop,
    viewpoint: V,
    config: ControlLoopConfig,
    running: RunningFlag,
    frame_count: u64,
    stats: FrameStatsAccumulator,
}

impl<V: ViewpointSource> ControlLoop<V> {
    /// Creates a control loop in the running state.
    #[must_use]
    pub fn new(manager: ChunkLifecycleManager, viewpoint: V, config: ControlLoopConfig) -> Self {
        let apply = manager.apply_loop();
        Self {
            manager,
            apply,
            viewpoint,
            config,
            running: RunningFlag::new(),
            frame_count: 0,
            stats: FrameStatsAccumulator::default(),
        }
    }

    /// Handle to the running flag. Clearing it stops `run`.
    #[must_use]
    pub fn running_flag(&self) -> RunningFlag {
        self.running.clone()
    }

    /// The lifecycle manager.
    #[must_use]
    pub const fn manager(&self) -> &ChunkLifecycleManager {
        &self.manager
    }

    /// The viewpoint source.
    #[must_use]
    pub const fn viewpoint(&self) -> &V {
        &self.viewpoint
    }

    /// Mutable access to the viewpoint source, for callers that own the
    /// position.
    pub fn viewpoint_mut(&mut self) -> &mut V {
        &mut self.viewpoint
    }

    /// Frames run so far.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Accumulated frame statistics.
    #[must_use]
    pub const fn frame_stats(&self) -> &FrameStatsAccumulator {
        &self.stats
    }

    /// Current streaming statistics.
    #[must_use]
    pub fn streaming_stats(&self) -> StreamingStats {
        self.manager.stats()
    }

    /// Runs one frame without pacing.
    pub fn tick<S: PresentationSurface + ?Sized>(&mut self, surface: &mut S) -> FrameStats {
        let frame_start = Instant::now();
        self.frame_count += 1;

        let center = self.viewpoint.current_chunk();
        let moved = self.manager.on_viewpoint_moved(center);
        let admission_us = elapsed_us(frame_start);

        let apply_start = Instant::now();
        let quantum = self.apply.run_quantum(surface);
        let apply_us = elapsed_us(apply_start);

        let stats = FrameStats {
            frame: self.frame_count,
            moved,
            admission_us,
            apply_us,
            total_us: elapsed_us(frame_start),
            quantum,
        };
        self.stats.record(&stats);

        if self.config.enable_timing_logs && u128::from(stats.total_us) > MAX_FRAME_TIME.as_micros() {
            warn!(
                frame = stats.frame,
                total_us = stats.total_us,
                apply_us = stats.apply_us,
                "frame exceeded budget"
            );
        }
        if self.config.log_every_quanta > 0 && self.frame_count % self.config.log_every_quanta == 0 {
            self.log_stats();
        }
        stats
    }

    /// Runs paced frames until the running flag is cleared, then shuts the
    /// worker pool down. Returns the number of frames run.
    pub fn run<S: PresentationSurface + ?Sized>(&mut self, surface: &mut S) -> u64 {
        let frame_time = self.config.frame_time();
        let first_frame = self.frame_count;
        info!(target_fps = self.config.target_fps, "control loop running");

        while self.running.is_running() {
            let start = Instant::now();
            self.tick(surface);
            if let Some(budget) = frame_time {
                if let Some(rest) = budget.checked_sub(start.elapsed()) {
                    std::thread::sleep(rest);
                }
            }
        }

        self.manager.shutdown();
        let frames = self.frame_count - first_frame;
        info!(frames, "control loop stopped");
        self.log_stats();
        frames
    }

    /// Runs at most `frames` unpaced frames, stopping early if the running
    /// flag is cleared. Returns the number of frames run.
    pub fn run_for<S: PresentationSurface + ?Sized>(&mut self, surface: &mut S, frames: u64) -> u64 {
        let mut ran = 0;
        while ran < frames && self.running.is_running() {
            self.tick(surface);
            ran += 1;
        }
        ran
    }

    /// Stops the loop and the worker pool.
    pub fn shutdown(&self) {
        self.running.stop();
        self.manager.shutdown();
    }

    fn log_stats(&self) {
        let stats = self.manager.stats();
        info!(
            frame = self.frame_count,
            center = ?self.manager.current_center(),
            resident = stats.resident_chunks,
            loaded = stats.loaded,
            queued_for_load = stats.queued_for_load,
            queued_for_unload = stats.queued_for_unload,
            in_flight = stats.in_flight_generations,
            generated = stats.generated_total,
            reclaimed = stats.reclaimed_total,
            avg_frame_ms = self.stats.avg_frame_ms(),
            "streaming stats"
        );
    }
}
