//! # TILESTREAM Procedural Content
//!
//! Deterministic content for an effectively infinite 2D grid.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed always produces the same content
//! 2. **Chunked**: The grid is split into square chunks of `chunk_size` cells
//! 3. **Pure**: A generator is a function `(world_x, world_y) -> ContentTag`
//!    with no shared mutable state, so any number of workers may call it
//!
//! ## Core Components
//!
//! - `ChunkCoord` / `CellPos`: chunk-grid and world-grid positions
//! - `ContentCell` / `ContentTag`: one generated cell of a chunk
//! - `SimplexNoise`: 2D noise generation
//! - `ContentGenerator`: the pluggable per-cell content rule
//! - `BandedGenerator`: default rule, three content bands from one noise score
//! - `generate_chunk_cells`: fills a chunk footprint in a chosen `CellOrder`
//!
//! ## Example
//!
//! ```rust,ignore
//! use tilestream_procedural::{
//!     generate_chunk_cells, BandedGenerator, CellOrder, ChunkCoord, NoiseSeed,
//! };
//!
//! let generator = BandedGenerator::with_seed(NoiseSeed::new(12345));
//! let cells = generate_chunk_cells(&generator, ChunkCoord::new(2, -1), 64, CellOrder::RowMajor);
//! assert_eq!(cells.len(), 64 * 64);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod chunk;
pub mod content;
pub mod generator;
pub mod noise;

pub use chunk::{CellPos, ChunkCoord};
pub use content::{ContentCell, ContentTag};
pub use generator::{
    generate_chunk_cells, BandedGenerator, BandedGeneratorConfig, CellOrder, ContentGenerator,
    MAX_OCTAVES,
};
pub use noise::{NoiseSeed, SimplexNoise};
