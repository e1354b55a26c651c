//! # Chunk Lifecycle Manager
//!
//! Decides which chunks must be resident around the viewpoint and drives
//! the admission side of the state machine.
//!
//! ## Per-move protocol
//!
//! ```text
//! on_viewpoint_moved(center)
//!   │  unchanged since last call? ──> no-op
//!   ▼
//! admit_neighborhood(center, r)      square window, side 2r+1
//!   ├─ absent            -> insert QueuedForLoad{None}, dispatch generation
//!   │                       (replacing any task left from an earlier visit)
//!   ├─ QueuedForUnload   -> resurrect, content kept, no dispatch
//!   └─ anything else     -> untouched
//!   ▼
//! reclaim_out_of_range(center, r)
//!   └─ Loaded beyond r   -> QueuedForUnload
//! ```
//!
//! Admission always runs first, so a chunk that comes back into range is
//! resurrected before reclamation could see it.

use std::collections::hash_map::Entry;
use std::sync::Arc;

use tilestream_procedural::{ChunkCoord, ContentGenerator};
use tracing::{debug, info, trace, warn};

use crate::apply::ApplyLoop;
use crate::config::StreamingConfig;
use crate::error::StreamingResult;
use crate::registry::ChunkRegistry;
use crate::state::Chunk;
use crate::stats::{StreamingCounters, StreamingStats};
use crate::worker::GenerationWorkerPool;

/// Result of one admission pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Admission {
    /// Chunks inserted and dispatched.
    pub admitted: usize,
    /// Chunks pulled back from `QueuedForUnload`.
    pub resurrected: usize,
}

/// Owns the registry handle and runs admission control.
#[derive(Debug)]
pub struct ChunkLifecycleManager {
    config: StreamingConfig,
    registry: Arc<ChunkRegistry>,
    pool: Arc<GenerationWorkerPool>,
    counters: Arc<StreamingCounters>,
    /// Center of the last processed move; `None` until the first one.
    previous_center: Option<ChunkCoord>,
}

impl ChunkLifecycleManager {
    /// Creates a manager over a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or workers cannot start.
    pub fn new(
        config: StreamingConfig,
        generator: Arc<dyn ContentGenerator>,
    ) -> StreamingResult<Self> {
        Self::with_registry(config, ChunkRegistry::shared(), generator)
    }

    /// Creates a manager over an existing registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or workers cannot start.
    pub fn with_registry(
        config: StreamingConfig,
        registry: Arc<ChunkRegistry>,
        generator: Arc<dyn ContentGenerator>,
    ) -> StreamingResult<Self> {
        let counters = Arc::new(StreamingCounters::default());
        let pool = GenerationWorkerPool::new(
            &config,
            Arc::clone(&registry),
            generator,
            Arc::clone(&counters),
        )?;

        info!(
            chunk_size = config.chunk_size,
            render_distance = config.render_distance,
            window = config.window_chunk_count(),
            "chunk lifecycle manager ready"
        );

        Ok(Self {
            config,
            registry,
            pool: Arc::new(pool),
            counters,
            previous_center: None,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Returns the shared registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ChunkRegistry> {
        &self.registry
    }

    /// Returns the worker pool.
    #[must_use]
    pub fn pool(&self) -> &GenerationWorkerPool {
        &self.pool
    }

    /// Center of the last processed viewpoint move.
    #[must_use]
    pub const fn current_center(&self) -> Option<ChunkCoord> {
        self.previous_center
    }

    /// Creates the apply loop that drains this manager's registry.
    ///
    /// Only one apply loop should run at a time.
    #[must_use]
    pub fn apply_loop(&self) -> ApplyLoop {
        ApplyLoop::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.pool),
            Arc::clone(&self.counters),
            self.config.chunk_size,
            self.config.regenerate_after_quanta,
        )
    }

    /// Reacts to the viewpoint being in chunk `center`.
    ///
    /// Returns false, doing nothing, if `center` equals the previous call's.
    pub fn on_viewpoint_moved(&mut self, center: ChunkCoord) -> bool {
        if self.previous_center == Some(center) {
            return false;
        }

        let radius = self.config.render_distance;
        let admission = self.admit_neighborhood(center, radius);
        let queued_for_unload = self.reclaim_out_of_range(center, radius);

        debug!(
            from = ?self.previous_center,
            to = %center,
            admitted = admission.admitted,
            resurrected = admission.resurrected,
            queued_for_unload,
            "viewpoint moved"
        );

        self.previous_center = Some(center);
        true
    }

    /// Makes every chunk within `radius` of `center` resident.
    ///
    /// Absent chunks are inserted and dispatched, chunks queued for unload
    /// are resurrected, the rest are untouched. Repeating a call is a no-op.
    pub fn admit_neighborhood(&self, center: ChunkCoord, radius: u32) -> Admission {
        let mut admission = Admission::default();
        let mut chunks = self.registry.lock();

        for coord in center.neighborhood(radius) {
            match chunks.entry(coord) {
                Entry::Vacant(slot) => match self.pool.dispatch_superseding(coord) {
                    Ok(()) => {
                        slot.insert(Chunk::admitted(coord));
                        admission.admitted += 1;
                        trace!(chunk = %coord, "admitted");
                    }
                    Err(err) => {
                        warn!(chunk = %coord, "admission skipped: {err}");
                    }
                },
                Entry::Occupied(mut slot) => {
                    if slot.get_mut().resurrect() {
                        admission.resurrected += 1;
                        trace!(chunk = %coord, "resurrected");
                    }
                }
            }
        }
        drop(chunks);

        self.counters.record_admitted(admission.admitted as u64);
        self.counters.record_resurrected(admission.resurrected as u64);
        admission
    }

    /// Queues every `Loaded` chunk farther than `radius` from `center` for
    /// unload. Returns how many were queued.
    pub fn reclaim_out_of_range(&self, center: ChunkCoord, radius: u32) -> usize {
        let mut queued = 0;
        let mut chunks = self.registry.lock();

        for chunk in chunks.values_mut() {
            if !chunk.coord.is_within(center, radius) && chunk.queue_unload() {
                queued += 1;
                trace!(chunk = %chunk.coord, "queued for unload");
            }
        }
        drop(chunks);

        self.counters.record_queued_for_unload(queued as u64);
        queued
    }

    /// Point-in-time statistics. Phase counts come from one registry lock.
    #[must_use]
    pub fn stats(&self) -> StreamingStats {
        let (queued_for_load, loaded, queued_for_unload) = self.registry.phase_counts();
        let mut stats = StreamingStats {
            resident_chunks: queued_for_load + loaded + queued_for_unload,
            queued_for_load,
            loaded,
            queued_for_unload,
            in_flight_generations: self.pool.in_flight_count(),
            ..StreamingStats::default()
        };
        self.counters.fill(&mut stats);
        stats
    }

    /// Stops generation. Pending tasks are cancelled, running ones are not
    /// awaited. The registry stays readable.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChunkPhase;
    use std::time::Duration;
    use tilestream_procedural::ContentTag;

    fn manager(render_distance: u32) -> ChunkLifecycleManager {
        let config = StreamingConfig {
            render_distance,
            ..StreamingConfig::test()
        };
        ChunkLifecycleManager::new(config, Arc::new(|_x: i32, _y: i32| ContentTag::Mountain)).unwrap()
    }

    #[test]
    fn test_first_move_admits_window() {
        let mut manager = manager(1);
        assert!(manager.current_center().is_none());

        assert!(manager.on_viewpoint_moved(ChunkCoord::new(0, 0)));
        assert_eq!(manager.registry().len(), 9);
        assert_eq!(manager.current_center(), Some(ChunkCoord::new(0, 0)));
        assert!(manager.pool().wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn test_unchanged_viewpoint_is_noop() {
        let mut manager = manager(0);
        assert!(manager.on_viewpoint_moved(ChunkCoord::new(2, 2)));
        assert!(!manager.on_viewpoint_moved(ChunkCoord::new(2, 2)));
        assert_eq!(manager.stats().admitted_total, 1);
    }

    #[test]
    fn test_admission_is_idempotent() {
        let manager = manager(1);
        let first = manager.admit_neighborhood(ChunkCoord::new(0, 0), 1);
        let second = manager.admit_neighborhood(ChunkCoord::new(0, 0), 1);

        assert_eq!(first.admitted, 9);
        assert_eq!(second, Admission::default());
        assert_eq!(manager.registry().len(), 9);
        assert!(manager.pool().wait_idle(Duration::from_secs(5)));
        assert_eq!(manager.stats().generated_total, 9, "one generation per chunk");
    }

    #[test]
    fn test_reclaim_only_touches_loaded() {
        let manager = manager(0);
        manager.admit_neighborhood(ChunkCoord::new(0, 0), 0);
        assert!(manager.pool().wait_idle(Duration::from_secs(5)));

        // Still QueuedForLoad: reclamation leaves it alone.
        assert_eq!(manager.reclaim_out_of_range(ChunkCoord::new(9, 9), 0), 0);

        manager
            .registry()
            .lock()
            .get_mut(&ChunkCoord::new(0, 0))
            .unwrap()
            .materialize();
        assert_eq!(manager.reclaim_out_of_range(ChunkCoord::new(9, 9), 0), 1);
        assert_eq!(
            manager.registry().phase(ChunkCoord::new(0, 0)),
            Some(ChunkPhase::QueuedForUnload)
        );
    }

    #[test]
    fn test_admission_after_shutdown_inserts_nothing() {
        let mut manager = manager(0);
        manager.shutdown();
        assert!(manager.on_viewpoint_moved(ChunkCoord::new(0, 0)));
        assert!(manager.registry().is_empty());
    }
}
