//! # Chunk Registry
//!
//! The authoritative map from chunk coordinate to chunk state.
//!
//! ## Locking
//!
//! One `parking_lot::Mutex` covers every read and every write. Admission,
//! reclamation, worker write-back and the apply scan each hold it for their
//! whole critical section, so no reader ever sees a half-applied transition.
//! There is no finer-grained path.
//!
//! Lock order, where two locks are held together, is always
//! registry first, then the worker pool's in-flight map.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tilestream_procedural::ChunkCoord;

use crate::state::{Chunk, ChunkContent, ChunkPhase};

/// Exclusive access to the registry map for one critical section.
pub(crate) type RegistryGuard<'a> = MutexGuard<'a, HashMap<ChunkCoord, Chunk>>;

/// Outcome of a worker writing generated content back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteBack {
    /// Content stored; the chunk can be applied next quantum.
    Stored,
    /// The chunk was removed while generating; the result is dropped.
    Missing,
    /// The chunk is no longer queued for load; the result is dropped.
    Rejected,
}

/// Shared chunk registry.
#[derive(Debug, Default)]
pub struct ChunkRegistry {
    chunks: Mutex<HashMap<ChunkCoord, Chunk>>,
}

impl ChunkRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry ready to be injected into components.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Locks the map for one critical section.
    #[inline]
    pub(crate) fn lock(&self) -> RegistryGuard<'_> {
        self.chunks.lock()
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    /// True if no chunk is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }

    /// True if the chunk is resident in any phase.
    #[must_use]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.lock().contains_key(&coord)
    }

    /// Phase of a resident chunk.
    #[must_use]
    pub fn phase(&self, coord: ChunkCoord) -> Option<ChunkPhase> {
        self.chunks.lock().get(&coord).map(Chunk::phase)
    }

    /// Content of a resident chunk, if generated.
    #[must_use]
    pub fn content(&self, coord: ChunkCoord) -> Option<ChunkContent> {
        self.chunks
            .lock()
            .get(&coord)
            .and_then(|chunk| chunk.state.content().cloned())
    }

    /// Every resident chunk and its phase, ordered by coordinate.
    ///
    /// Intended for debug views; taken under one lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(ChunkCoord, ChunkPhase)> {
        let mut entries: Vec<_> = self
            .chunks
            .lock()
            .values()
            .map(|chunk| (chunk.coord, chunk.phase()))
            .collect();
        entries.sort_unstable_by_key(|(coord, _)| *coord);
        entries
    }

    /// Counts of resident chunks per phase:
    /// `(queued_for_load, loaded, queued_for_unload)`.
    #[must_use]
    pub fn phase_counts(&self) -> (usize, usize, usize) {
        let chunks = self.chunks.lock();
        chunks.values().fold((0, 0, 0), |(q, l, u), chunk| match chunk.phase() {
            ChunkPhase::QueuedForLoad => (q + 1, l, u),
            ChunkPhase::Loaded => (q, l + 1, u),
            ChunkPhase::QueuedForUnload => (q, l, u + 1),
        })
    }

    /// Writes generated content into an existing chunk without changing
    /// its phase.
    ///
    /// The existence check and the write happen under one lock, so a chunk
    /// removed while its content was generating is never recreated.
    pub fn write_back(&self, coord: ChunkCoord, content: ChunkContent) -> WriteBack {
        let mut chunks = self.chunks.lock();
        match chunks.get_mut(&coord) {
            None => WriteBack::Missing,
            Some(chunk) => {
                if chunk.store_content(content) {
                    WriteBack::Stored
                } else {
                    WriteBack::Rejected
                }
            }
        }
    }

    /// Removes a chunk without erasing its presentation.
    ///
    /// The apply loop is the normal path for deletion; this is for callers
    /// that tear down part of the world themselves. Any in-flight generation
    /// for the coordinate will find it missing and discard its result; if
    /// the chunk is admitted again first, admission replaces that task.
    pub fn remove(&self, coord: ChunkCoord) -> Option<Chunk> {
        self.chunks.lock().remove(&coord)
    }
}
