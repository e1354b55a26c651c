//! # TILESTREAM Streaming
//!
//! Keeps a bounded square window of chunks resident around a moving
//! viewpoint over an effectively infinite grid.
//!
//! ## Architecture
//!
//! ```text
//!  viewpoint ──> ChunkLifecycleManager ──dispatch──> GenerationWorkerPool
//!                     │ admit / reclaim                   │ write-back
//!                     ▼                                   ▼
//!               ┌──────────────────── ChunkRegistry ────────────────────┐
//!               │    one lock, HashMap<ChunkCoord, Chunk>               │
//!               └───────────────────────────────────────────────────────┘
//!                                     │ drain once per quantum
//!                                     ▼
//!                                 ApplyLoop ──draw/erase──> PresentationSurface
//! ```
//!
//! ## Guarantees
//!
//! - The registry is never observed half-updated: every access holds its lock
//! - At most one live generation task per coordinate
//! - A result for a chunk that left the registry is discarded, never stored
//! - A chunk is drawn once per materialization and erased once before its
//!   coordinate can be admitted again
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tilestream_procedural::{BandedGenerator, ChunkCoord};
//! use tilestream_streaming::{ChunkLifecycleManager, MemorySurface, StreamingConfig};
//!
//! let mut manager = ChunkLifecycleManager::new(
//!     StreamingConfig::default(),
//!     Arc::new(BandedGenerator::default()),
//! )?;
//! let mut apply = manager.apply_loop();
//! let mut surface = MemorySurface::new();
//!
//! manager.on_viewpoint_moved(ChunkCoord::new(0, 0));
//! apply.run_quantum(&mut surface);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod apply;
pub mod config;
pub mod error;
pub mod manager;
pub mod registry;
pub mod state;
pub mod stats;
pub mod surface;
pub mod viewpoint;
pub mod worker;

pub use apply::{ApplyLoop, RunningFlag};
pub use config::{ConfigFile, StreamingConfig};
pub use error::{StreamingError, StreamingResult};
pub use manager::{Admission, ChunkLifecycleManager};
pub use registry::{ChunkRegistry, WriteBack};
pub use state::{Chunk, ChunkContent, ChunkPhase, ChunkState};
pub use stats::{QuantumReport, StreamingStats};
pub use surface::{MemorySurface, PresentationSurface};
pub use viewpoint::{SharedViewpoint, ViewpointSource, WorldViewpoint};
pub use worker::GenerationWorkerPool;
