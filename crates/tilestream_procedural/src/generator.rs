//! # Content Generation
//!
//! The streaming core asks for content one cell at a time through the
//! `ContentGenerator` contract:
//!
//! ```text
//! generate(world_x, world_y) -> ContentTag
//! ```
//!
//! Generators must be pure and total: the same position always yields the
//! same tag, no call may block on shared state, and calls arrive
//! concurrently from every generation worker.
//!
//! ## Default Rule
//!
//! `BandedGenerator` scores each cell with simplex noise at a low frequency
//! (0.01 per cell), optionally layered over several octaves, then cuts the
//! `[0, 1]` score into three bands:
//!
//! ```text
//! 0.0 ──── low ──── high ──── 1.0
//!   Mountain   Desert    Forest
//! ```
//!
//! A score exactly on a threshold belongs to the lower band.

use serde::Deserialize;

use crate::chunk::ChunkCoord;
use crate::content::{ContentCell, ContentTag};
use crate::noise::{NoiseSeed, SimplexNoise};

/// Pure per-cell content rule.
pub trait ContentGenerator: Send + Sync {
    /// Returns the content of the world cell at `(world_x, world_y)`.
    fn generate(&self, world_x: i32, world_y: i32) -> ContentTag;
}

impl<F> ContentGenerator for F
where
    F: Fn(i32, i32) -> ContentTag + Send + Sync,
{
    #[inline]
    fn generate(&self, world_x: i32, world_y: i32) -> ContentTag {
        self(world_x, world_y)
    }
}

/// Order in which a chunk's cells appear in its content sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellOrder {
    /// Row by row: index `local_y * chunk_size + local_x`.
    #[default]
    RowMajor,
    /// Column by column: index `local_x * chunk_size + local_y`.
    ColumnMajor,
}

/// Generates the full content sequence for one chunk.
///
/// Invokes the generator exactly once per cell of the chunk's
/// `chunk_size x chunk_size` footprint, starting at `coord * chunk_size`.
#[must_use]
pub fn generate_chunk_cells<G>(
    generator: &G,
    coord: ChunkCoord,
    chunk_size: u32,
    order: CellOrder,
) -> Vec<ContentCell>
where
    G: ContentGenerator + ?Sized,
{
    let origin = coord.origin(chunk_size);
    let size = chunk_size as i32;
    let mut cells = Vec::with_capacity(ChunkCoord::cell_count(chunk_size));

    for outer in 0..size {
        for inner in 0..size {
            let (local_x, local_y) = match order {
                CellOrder::RowMajor => (inner, outer),
                CellOrder::ColumnMajor => (outer, inner),
            };
            let pos = origin.offset(local_x, local_y);
            cells.push(ContentCell::new(pos, generator.generate(pos.x, pos.y)));
        }
    }

    cells
}

/// Upper bound on `BandedGeneratorConfig::octaves`.
pub const MAX_OCTAVES: u32 = 8;

/// Settings for the default banded generator.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct BandedGeneratorConfig {
    /// Noise seed.
    pub seed: u64,
    /// Noise frequency in samples per world cell.
    pub frequency: f64,
    /// Noise layers; 1 is a single plain sample per cell.
    pub octaves: u32,
    /// Amplitude falloff per extra octave.
    pub persistence: f64,
    /// Scores at or below this are the low band.
    pub low_threshold: f64,
    /// Scores above this are the high band.
    pub high_threshold: f64,
}

impl Default for BandedGeneratorConfig {
    fn default() -> Self {
        Self {
            seed: NoiseSeed::default().value(),
            frequency: 0.01,
            octaves: 1,
            persistence: 0.5,
            low_threshold: 0.3,
            high_threshold: 0.6,
        }
    }
}

impl BandedGeneratorConfig {
    /// Checks that the thresholds partition `[0, 1]` into three ordered
    /// bands and that the frequency is usable.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return Err("generator frequency must be a positive finite number");
        }
        if !(1..=MAX_OCTAVES).contains(&self.octaves) {
            return Err("generator octaves must be between 1 and 8");
        }
        if !(self.persistence > 0.0 && self.persistence <= 1.0) {
            return Err("generator persistence must lie in (0, 1]");
        }
        if !(0.0..=1.0).contains(&self.low_threshold) || !(0.0..=1.0).contains(&self.high_threshold) {
            return Err("generator thresholds must lie in [0, 1]");
        }
        if self.low_threshold > self.high_threshold {
            return Err("generator low_threshold must not exceed high_threshold");
        }
        Ok(())
    }
}

/// Default generator: one noise score per cell, three content bands.
pub struct BandedGenerator {
    noise: SimplexNoise,
    config: BandedGeneratorConfig,
}

impl BandedGenerator {
    /// Creates a generator from explicit settings.
    #[must_use]
    pub fn new(config: BandedGeneratorConfig) -> Self {
        Self {
            noise: SimplexNoise::new(NoiseSeed::new(config.seed)),
            config,
        }
    }

    /// Creates a generator with default bands and the given seed.
    #[must_use]
    pub fn with_seed(seed: NoiseSeed) -> Self {
        Self::new(BandedGeneratorConfig {
            seed: seed.value(),
            ..BandedGeneratorConfig::default()
        })
    }

    /// Returns the generator settings.
    #[must_use]
    pub const fn config(&self) -> &BandedGeneratorConfig {
        &self.config
    }

    /// Continuous score of a world cell, in `[0, 1]`.
    #[must_use]
    pub fn score(&self, world_x: i32, world_y: i32) -> f64 {
        let x = f64::from(world_x) * self.config.frequency;
        let y = f64::from(world_y) * self.config.frequency;
        if self.config.octaves <= 1 {
            return self.noise.sample_unit(x, y);
        }
        let layered = self.noise.fbm(x, y, self.config.octaves, self.config.persistence);
        ((layered + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Maps a score to its band.
    #[must_use]
    pub fn classify(&self, score: f64) -> ContentTag {
        if score > self.config.high_threshold {
            ContentTag::Forest
        } else if score > self.config.low_threshold {
            ContentTag::Desert
        } else {
            ContentTag::Mountain
        }
    }
}

impl Default for BandedGenerator {
    fn default() -> Self {
        Self::new(BandedGeneratorConfig::default())
    }
}

impl ContentGenerator for BandedGenerator {
    #[inline]
    fn generate(&self, world_x: i32, world_y: i32) -> ContentTag {
        self.classify(self.score(world_x, world_y))
    }
}
