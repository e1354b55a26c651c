//! # TILESTREAM
//!
//! Streams an effectively infinite 2D grid of procedural content in and out
//! of a bounded window around a moving viewpoint.
//!
//! ## Crates
//!
//! - `tilestream_procedural`: coordinates, content cells, noise, generators
//! - `tilestream_streaming`: registry, lifecycle manager, workers, apply loop
//! - `tilestream` (this crate): the cooperative control loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tilestream::prelude::*;
//!
//! let manager = ChunkLifecycleManager::new(
//!     StreamingConfig::default(),
//!     Arc::new(BandedGenerator::default()),
//! )?;
//! let viewpoint = SharedViewpoint::new(0.0, 0.0, manager.config().chunk_size);
//! let mut control = ControlLoop::new(manager, viewpoint.clone(), ControlLoopConfig::default());
//! let mut surface = MemorySurface::new();
//!
//! // Another thread moves `viewpoint` and eventually clears the flag.
//! let running = control.running_flag();
//! control.run(&mut surface);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod control_loop;

pub use control_loop::{
    ControlLoop, ControlLoopConfig, FrameStats, FrameStatsAccumulator, MAX_FRAME_TIME,
    TARGET_FRAME_TIME,
};

/// Re-exported procedural crate.
pub use tilestream_procedural as procedural;

/// Re-exported streaming crate.
pub use tilestream_streaming as streaming;

/// Commonly used types.
pub mod prelude {
    pub use crate::control_loop::{ControlLoop, ControlLoopConfig, FrameStats};
    pub use tilestream_procedural::{
        BandedGenerator, BandedGeneratorConfig, CellOrder, CellPos, ChunkCoord, ContentGenerator,
        ContentTag, NoiseSeed,
    };
    pub use tilestream_streaming::{
        ChunkLifecycleManager, ChunkPhase, ConfigFile, MemorySurface, PresentationSurface,
        RunningFlag, SharedViewpoint, StreamingConfig, StreamingError, StreamingStats,
        ViewpointSource, WorldViewpoint,
    };
}
