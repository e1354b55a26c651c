//! # Streaming Statistics
//!
//! Session counters are atomics shared by the manager, the workers and the
//! apply loop; they are only ever incremented. Phase counts are taken under
//! the registry lock when a snapshot is requested.

use std::sync::atomic::{AtomicU64, Ordering};

/// Session counters, shared between threads.
#[derive(Debug, Default)]
pub struct StreamingCounters {
    admitted: AtomicU64,
    resurrected: AtomicU64,
    queued_for_unload: AtomicU64,
    reclaimed: AtomicU64,
    generated: AtomicU64,
    discarded: AtomicU64,
    failed: AtomicU64,
    regenerated: AtomicU64,
    cells_drawn: AtomicU64,
    cells_erased: AtomicU64,
}

macro_rules! counter_ops {
    ($($name:ident => $record:ident),* $(,)?) => {
        impl StreamingCounters {
            $(
                #[inline]
                pub(crate) fn $record(&self, n: u64) {
                    self.$name.fetch_add(n, Ordering::Relaxed);
                }
            )*
        }
    };
}

counter_ops! {
    admitted => record_admitted,
    resurrected => record_resurrected,
    queued_for_unload => record_queued_for_unload,
    reclaimed => record_reclaimed,
    generated => record_generated,
    discarded => record_discarded,
    failed => record_failed,
    regenerated => record_regenerated,
    cells_drawn => record_cells_drawn,
    cells_erased => record_cells_erased,
}

impl StreamingCounters {
    /// Copies the counters into `stats`.
    pub(crate) fn fill(&self, stats: &mut StreamingStats) {
        stats.admitted_total = self.admitted.load(Ordering::Relaxed);
        stats.resurrected_total = self.resurrected.load(Ordering::Relaxed);
        stats.queued_for_unload_total = self.queued_for_unload.load(Ordering::Relaxed);
        stats.reclaimed_total = self.reclaimed.load(Ordering::Relaxed);
        stats.generated_total = self.generated.load(Ordering::Relaxed);
        stats.discarded_total = self.discarded.load(Ordering::Relaxed);
        stats.failed_total = self.failed.load(Ordering::Relaxed);
        stats.regenerated_total = self.regenerated.load(Ordering::Relaxed);
        stats.cells_drawn_total = self.cells_drawn.load(Ordering::Relaxed);
        stats.cells_erased_total = self.cells_erased.load(Ordering::Relaxed);
    }
}

/// Point-in-time view of the streaming system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamingStats {
    /// Chunks currently in the registry.
    pub resident_chunks: usize,
    /// Chunks queued for load (with or without content).
    pub queued_for_load: usize,
    /// Chunks drawn on the surface.
    pub loaded: usize,
    /// Chunks awaiting erase.
    pub queued_for_unload: usize,
    /// Generation tasks dispatched and not yet finished.
    pub in_flight_generations: usize,
    /// Chunks admitted this session.
    pub admitted_total: u64,
    /// Chunks pulled back from `QueuedForUnload` this session.
    pub resurrected_total: u64,
    /// `Loaded -> QueuedForUnload` transitions this session.
    pub queued_for_unload_total: u64,
    /// Chunks erased and deleted this session.
    pub reclaimed_total: u64,
    /// Generation results written back this session.
    pub generated_total: u64,
    /// Generation results dropped because the chunk was gone or cancelled.
    pub discarded_total: u64,
    /// Generation tasks that panicked.
    pub failed_total: u64,
    /// Generation tasks re-dispatched by the regeneration policy.
    pub regenerated_total: u64,
    /// Cells drawn this session.
    pub cells_drawn_total: u64,
    /// Cells erased this session.
    pub cells_erased_total: u64,
}

/// What one apply quantum did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuantumReport {
    /// Quantum number (starts at 1).
    pub quantum: u64,
    /// Chunks erased and deleted.
    pub reclaimed: usize,
    /// Chunks drawn and moved to `Loaded`.
    pub materialized: usize,
    /// Draw calls issued.
    pub cells_drawn: usize,
    /// Erase calls issued.
    pub cells_erased: usize,
    /// Generation tasks re-dispatched.
    pub regenerated: usize,
}

impl QuantumReport {
    /// True if the quantum changed nothing.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.reclaimed == 0 && self.materialized == 0 && self.regenerated == 0
    }
}
