//! # Chunk Coordinates
//!
//! The grid is addressed in two unit systems:
//! - **World cells** (`CellPos`): one unit per content cell
//! - **Chunk grid** (`ChunkCoord`): one unit per `chunk_size x chunk_size` block of cells
//!
//! Conversion from world to chunk units always floors, so negative world
//! positions land in negative chunks (`-1 / 64` is chunk `-1`, not `0`).
//!
//! Chunk size is a runtime value (fixed at construction by the streaming
//! config), so every conversion takes it as an argument.
//!
//! Chunk-to-cell conversion wraps at the `i32` edge. Chunks that far out
//! alias cells on the opposite side of the grid instead of overflowing.

use std::fmt;

/// Chunk coordinate (identifies a chunk in the chunk grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not cells).
    pub x: i32,
    /// Y coordinate (in chunks, not cells).
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts a world cell position to the chunk containing it.
    #[inline]
    #[must_use]
    pub const fn from_world_pos(world_x: i32, world_y: i32, chunk_size: u32) -> Self {
        let size = chunk_size as i32;
        Self {
            x: world_x.div_euclid(size),
            y: world_y.div_euclid(size),
        }
    }

    /// Converts a continuous world-space point (e.g. a camera position) to
    /// the chunk containing it.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_world_point(x: f32, y: f32, chunk_size: u32) -> Self {
        let size = chunk_size as f32;
        Self {
            x: (x / size).floor() as i32,
            y: (y / size).floor() as i32,
        }
    }

    /// Returns the world cell at the chunk's origin (lowest x and y corner).
    #[inline]
    #[must_use]
    pub const fn origin(self, chunk_size: u32) -> CellPos {
        let size = chunk_size as i32;
        CellPos {
            x: self.x.wrapping_mul(size),
            y: self.y.wrapping_mul(size),
        }
    }

    /// Chebyshev distance to another chunk, in chunks.
    #[inline]
    #[must_use]
    pub const fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy {
            dx
        } else {
            dy
        }
    }

    /// Returns true if this chunk lies inside the square window of the given
    /// radius around `center` (inclusive).
    #[inline]
    #[must_use]
    pub const fn is_within(self, center: Self, radius: u32) -> bool {
        self.chebyshev_distance(center) <= radius
    }

    /// Iterates every chunk within Chebyshev distance `radius` of this one,
    /// a square window of side `2 * radius + 1`.
    ///
    /// Columns are visited left to right, each column bottom to top.
    pub fn neighborhood(self, radius: u32) -> impl Iterator<Item = Self> {
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        (-r..=r).flat_map(move |dx| {
            (-r..=r).map(move |dy| Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy)))
        })
    }

    /// Iterates every world cell covered by this chunk, row by row.
    pub fn footprint(self, chunk_size: u32) -> impl Iterator<Item = CellPos> {
        let origin = self.origin(chunk_size);
        let size = chunk_size as i32;
        (0..size).flat_map(move |local_y| {
            (0..size).map(move |local_x| origin.offset(local_x, local_y))
        })
    }

    /// Number of cells in a chunk footprint.
    #[inline]
    #[must_use]
    pub const fn cell_count(chunk_size: u32) -> usize {
        chunk_size as usize * chunk_size as usize
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

/// A world cell position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellPos {
    /// World X (in cells).
    pub x: i32,
    /// World Y (in cells).
    pub y: i32,
}

impl CellPos {
    /// Creates a new cell position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The cell `(dx, dy)` away, wrapping at the `i32` edge.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
        }
    }

    /// Returns the chunk containing this cell.
    #[inline]
    #[must_use]
    pub const fn chunk(self, chunk_size: u32) -> ChunkCoord {
        ChunkCoord::from_world_pos(self.x, self.y, chunk_size)
    }
}
