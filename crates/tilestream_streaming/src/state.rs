//! # Chunk State Machine
//!
//! ```text
//!            admit                worker write-back          apply
//!  (absent) ──────> QueuedForLoad{None} ──────> QueuedForLoad{Some} ──────> Loaded
//!                          ▲                           ▲                      │
//!                          │ regenerate                │ resurrect            │ out of range
//!                          │ (policy)                  │                      ▼
//!                          └── (stuck, no task)        └──────────── QueuedForUnload
//!                                                                             │ apply
//!                                                                             ▼
//!                                                                      (deleted)
//! ```
//!
//! Content lives inside the state variant, so "loaded without content" and
//! "queued for unload without content" cannot be represented. Deletion from
//! the registry is the terminal transition; there is no stored `Unloaded`.

use std::sync::Arc;

use tilestream_procedural::{ChunkCoord, ContentCell};

/// Generated content of one chunk, shared cheaply between states.
pub type ChunkContent = Arc<[ContentCell]>;

/// Lifecycle state of a resident chunk.
#[derive(Clone, Debug)]
pub enum ChunkState {
    /// Admitted; generation requested or in flight. `content` is `Some`
    /// once a worker wrote back, or after a resurrection.
    QueuedForLoad {
        /// Generated content, if available.
        content: Option<ChunkContent>,
    },
    /// Content drawn on the presentation surface.
    Loaded {
        /// The drawn content.
        content: ChunkContent,
    },
    /// Fell out of range while loaded; erase pending.
    QueuedForUnload {
        /// The drawn content, kept for resurrection.
        content: ChunkContent,
    },
}

impl ChunkState {
    /// Returns the observable phase of this state.
    #[must_use]
    pub const fn phase(&self) -> ChunkPhase {
        match self {
            Self::QueuedForLoad { .. } => ChunkPhase::QueuedForLoad,
            Self::Loaded { .. } => ChunkPhase::Loaded,
            Self::QueuedForUnload { .. } => ChunkPhase::QueuedForUnload,
        }
    }

    /// Returns the content, if any.
    #[must_use]
    pub const fn content(&self) -> Option<&ChunkContent> {
        match self {
            Self::QueuedForLoad { content } => content.as_ref(),
            Self::Loaded { content } | Self::QueuedForUnload { content } => Some(content),
        }
    }

    /// True if queued for load with content present: the apply loop may draw it.
    #[must_use]
    pub const fn is_ready_to_apply(&self) -> bool {
        matches!(self, Self::QueuedForLoad { content: Some(_) })
    }

    /// True if queued for load and still waiting on generation.
    #[must_use]
    pub const fn is_awaiting_content(&self) -> bool {
        matches!(self, Self::QueuedForLoad { content: None })
    }
}

/// Observable discriminant of `ChunkState`, for stats and debug views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkPhase {
    /// Admitted, not yet drawn.
    QueuedForLoad,
    /// Drawn.
    Loaded,
    /// Erase pending.
    QueuedForUnload,
}

/// A registry entry.
#[derive(Clone, Debug)]
pub struct Chunk {
    /// Chunk position in the chunk grid.
    pub coord: ChunkCoord,
    /// Lifecycle state.
    pub state: ChunkState,
    /// Apply quanta spent waiting for content since the last dispatch.
    pub quanta_waiting: u32,
}

impl Chunk {
    /// A freshly admitted chunk: queued for load, no content.
    #[must_use]
    pub const fn admitted(coord: ChunkCoord) -> Self {
        Self {
            coord,
            state: ChunkState::QueuedForLoad { content: None },
            quanta_waiting: 0,
        }
    }

    /// Returns the observable phase.
    #[inline]
    #[must_use]
    pub const fn phase(&self) -> ChunkPhase {
        self.state.phase()
    }

    /// Stores generated content without changing the phase.
    ///
    /// Only a chunk queued for load accepts content. Returns false (and
    /// leaves the chunk untouched) otherwise.
    pub fn store_content(&mut self, content: ChunkContent) -> bool {
        match &mut self.state {
            ChunkState::QueuedForLoad { content: slot } => {
                *slot = Some(content);
                self.quanta_waiting = 0;
                true
            }
            ChunkState::Loaded { .. } | ChunkState::QueuedForUnload { .. } => false,
        }
    }

    /// `QueuedForUnload -> QueuedForLoad`, keeping content.
    ///
    /// Returns false for any other phase.
    pub fn resurrect(&mut self) -> bool {
        let ChunkState::QueuedForUnload { content } = &self.state else {
            return false;
        };
        self.state = ChunkState::QueuedForLoad {
            content: Some(Arc::clone(content)),
        };
        true
    }

    /// `QueuedForLoad{Some} -> Loaded`. Returns the content that was
    /// materialized, or `None` if the chunk was not ready.
    pub fn materialize(&mut self) -> Option<ChunkContent> {
        let ChunkState::QueuedForLoad { content: Some(content) } = &self.state else {
            return None;
        };
        let content = Arc::clone(content);
        self.state = ChunkState::Loaded {
            content: Arc::clone(&content),
        };
        Some(content)
    }

    /// `Loaded -> QueuedForUnload`. Returns false for any other phase.
    pub fn queue_unload(&mut self) -> bool {
        let ChunkState::Loaded { content } = &self.state else {
            return false;
        };
        self.state = ChunkState::QueuedForUnload {
            content: Arc::clone(content),
        };
        true
    }
}
