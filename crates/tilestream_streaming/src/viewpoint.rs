//! # Viewpoint Sources
//!
//! The control loop samples one of these once per quantum and hands the
//! chunk coordinate to the lifecycle manager, which compares by value.

use std::sync::Arc;

use parking_lot::Mutex;
use tilestream_procedural::ChunkCoord;

/// Polled source of the viewpoint's current chunk.
pub trait ViewpointSource {
    /// Chunk the viewpoint is in right now.
    fn current_chunk(&self) -> ChunkCoord;
}

/// A viewpoint pinned to one chunk.
impl ViewpointSource for ChunkCoord {
    #[inline]
    fn current_chunk(&self) -> ChunkCoord {
        *self
    }
}

impl<V: ViewpointSource + ?Sized> ViewpointSource for &V {
    #[inline]
    fn current_chunk(&self) -> ChunkCoord {
        (**self).current_chunk()
    }
}

/// World-space position owned by the control loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldViewpoint {
    /// World X, in cells.
    pub x: f32,
    /// World Y, in cells.
    pub y: f32,
    chunk_size: u32,
}

impl WorldViewpoint {
    /// Creates a viewpoint at `(x, y)` on a grid of `chunk_size` chunks.
    #[must_use]
    pub const fn new(x: f32, y: f32, chunk_size: u32) -> Self {
        Self { x, y, chunk_size }
    }

    /// Moves by `(dx, dy)` world cells.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    /// Jumps to `(x, y)`.
    pub fn set(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }
}

impl ViewpointSource for WorldViewpoint {
    fn current_chunk(&self) -> ChunkCoord {
        ChunkCoord::from_world_point(self.x, self.y, self.chunk_size)
    }
}

/// World-space position that other threads can move.
///
/// Clones share the same position.
#[derive(Clone, Debug)]
pub struct SharedViewpoint {
    position: Arc<Mutex<(f32, f32)>>,
    chunk_size: u32,
}

impl SharedViewpoint {
    /// Creates a shared viewpoint at `(x, y)`.
    #[must_use]
    pub fn new(x: f32, y: f32, chunk_size: u32) -> Self {
        Self {
            position: Arc::new(Mutex::new((x, y))),
            chunk_size,
        }
    }

    /// Current world-space position.
    #[must_use]
    pub fn position(&self) -> (f32, f32) {
        *self.position.lock()
    }

    /// Jumps to `(x, y)`.
    pub fn set(&self, x: f32, y: f32) {
        *self.position.lock() = (x, y);
    }

    /// Moves by `(dx, dy)` world cells.
    pub fn translate(&self, dx: f32, dy: f32) {
        let mut position = self.position.lock();
        position.0 += dx;
        position.1 += dy;
    }
}

impl ViewpointSource for SharedViewpoint {
    fn current_chunk(&self) -> ChunkCoord {
        let (x, y) = self.position();
        ChunkCoord::from_world_point(x, y, self.chunk_size)
    }
}
