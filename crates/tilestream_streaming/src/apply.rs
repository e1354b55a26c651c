//! # Apply Loop
//!
//! Single-threaded drain of the registry, once per scheduling quantum.
//!
//! ```text
//! run_quantum(surface)
//!   lock registry (held for the whole quantum)
//!   ├─ partition: QueuedForUnload | QueuedForLoad{Some} | QueuedForLoad{None}
//!   ├─ reclaim:     erase footprint, delete entry, cancel any ticket
//!   ├─ materialize: draw content, -> Loaded
//!   └─ regenerate:  stalled chunks past the wait limit get one new dispatch
//!   unlock
//! ```
//!
//! Holding the lock across surface calls keeps workers from writing back
//! mid-quantum. Workers only block for the length of one quantum.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tilestream_procedural::ChunkCoord;
use tracing::{debug, trace};

use crate::registry::ChunkRegistry;
use crate::state::{Chunk, ChunkState};
use crate::stats::{QuantumReport, StreamingCounters};
use crate::surface::PresentationSurface;
use crate::worker::GenerationWorkerPool;

/// Process-wide running flag for the control loop.
///
/// Clones share the flag. Clearing it stops further quanta; in-flight
/// generation is not awaited.
#[derive(Clone, Debug)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    /// Creates a flag in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// True until `stop` is called.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clears the flag.
    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Drains ready and reclaimable chunks onto a presentation surface.
#[derive(Debug)]
pub struct ApplyLoop {
    registry: Arc<ChunkRegistry>,
    pool: Arc<GenerationWorkerPool>,
    counters: Arc<StreamingCounters>,
    chunk_size: u32,
    regenerate_after_quanta: Option<u32>,
    quantum: u64,
}

impl ApplyLoop {
    pub(crate) fn new(
        registry: Arc<ChunkRegistry>,
        pool: Arc<GenerationWorkerPool>,
        counters: Arc<StreamingCounters>,
        chunk_size: u32,
        regenerate_after_quanta: Option<u32>,
    ) -> Self {
        Self {
            registry,
            pool,
            counters,
            chunk_size,
            regenerate_after_quanta,
            quantum: 0,
        }
    }

    /// Quanta run so far.
    #[must_use]
    pub const fn quanta(&self) -> u64 {
        self.quantum
    }

    /// Runs one quantum against `surface`.
    pub fn run_quantum<S: PresentationSurface + ?Sized>(&mut self, surface: &mut S) -> QuantumReport {
        self.quantum += 1;
        let mut report = QuantumReport {
            quantum: self.quantum,
            ..QuantumReport::default()
        };

        let mut chunks = self.registry.lock();

        let mut reclaimable = Vec::new();
        let mut ready = Vec::new();
        let mut stalled = Vec::new();
        for chunk in chunks.values() {
            match &chunk.state {
                ChunkState::QueuedForUnload { .. } => reclaimable.push(chunk.coord),
                ChunkState::QueuedForLoad { content: Some(_) } => ready.push(chunk.coord),
                ChunkState::QueuedForLoad { content: None } => stalled.push(chunk.coord),
                ChunkState::Loaded { .. } => {}
            }
        }

        for coord in reclaimable {
            if chunks.remove(&coord).is_none() {
                continue;
            }
            for pos in coord.footprint(self.chunk_size) {
                surface.erase(pos);
            }
            self.pool.cancel(coord);
            report.reclaimed += 1;
            report.cells_erased += ChunkCoord::cell_count(self.chunk_size);
            trace!(chunk = %coord, "reclaimed");
        }

        for coord in ready {
            let Some(content) = chunks.get_mut(&coord).and_then(Chunk::materialize) else {
                continue;
            };
            for cell in content.iter() {
                surface.draw(cell.pos, cell.tag);
            }
            report.materialized += 1;
            report.cells_drawn += content.len();
            trace!(chunk = %coord, cells = content.len(), "materialized");
        }

        for coord in stalled {
            let Some(chunk) = chunks.get_mut(&coord) else {
                continue;
            };
            chunk.quanta_waiting = chunk.quanta_waiting.saturating_add(1);

            let Some(limit) = self.regenerate_after_quanta else {
                continue;
            };
            if chunk.quanta_waiting < limit || self.pool.is_in_flight(coord) {
                continue;
            }
            if let Ok(true) = self.pool.dispatch(coord) {
                debug!(chunk = %coord, waited = chunk.quanta_waiting, "generation re-dispatched");
                chunk.quanta_waiting = 0;
                report.regenerated += 1;
            }
        }

        drop(chunks);

        self.counters.record_reclaimed(report.reclaimed as u64);
        self.counters.record_cells_erased(report.cells_erased as u64);
        self.counters.record_cells_drawn(report.cells_drawn as u64);
        self.counters.record_regenerated(report.regenerated as u64);

        if !report.is_idle() {
            debug!(
                quantum = report.quantum,
                reclaimed = report.reclaimed,
                materialized = report.materialized,
                regenerated = report.regenerated,
                "apply quantum"
            );
        }
        report
    }
}
