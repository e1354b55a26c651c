//! Integration tests for the chunk lifecycle: admission, generation,
//! apply, reclamation and the races between them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tilestream_procedural::{CellPos, ChunkCoord, ContentGenerator, ContentTag};
use tilestream_streaming::{
    ApplyLoop, ChunkLifecycleManager, ChunkPhase, MemorySurface, PresentationSurface,
    StreamingConfig, StreamingError,
};

const CHUNK_SIZE: u32 = 4;
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

fn config(render_distance: u32, worker_threads: usize) -> StreamingConfig {
    StreamingConfig {
        chunk_size: CHUNK_SIZE,
        render_distance,
        worker_threads,
        ..StreamingConfig::default()
    }
}

/// Counts generator calls at chunk origins, one per generation task.
#[derive(Default)]
struct CountingGenerator {
    origins: Mutex<HashMap<ChunkCoord, usize>>,
}

impl CountingGenerator {
    fn generations(&self, coord: ChunkCoord) -> usize {
        self.origins.lock().get(&coord).copied().unwrap_or(0)
    }

    fn note(&self, x: i32, y: i32) {
        if x.rem_euclid(CHUNK_SIZE as i32) == 0 && y.rem_euclid(CHUNK_SIZE as i32) == 0 {
            *self
                .origins
                .lock()
                .entry(ChunkCoord::from_world_pos(x, y, CHUNK_SIZE))
                .or_default() += 1;
        }
    }
}

impl ContentGenerator for CountingGenerator {
    fn generate(&self, x: i32, y: i32) -> ContentTag {
        self.note(x, y);
        match (x + y).rem_euclid(3) {
            0 => ContentTag::Mountain,
            1 => ContentTag::Desert,
            _ => ContentTag::Forest,
        }
    }
}

/// Blocks every call until the gate is opened.
#[derive(Default)]
struct GatedGenerator {
    open: Mutex<bool>,
    opened: Condvar,
    counting: CountingGenerator,
}

impl GatedGenerator {
    fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }
}

impl ContentGenerator for GatedGenerator {
    fn generate(&self, x: i32, y: i32) -> ContentTag {
        self.counting.note(x, y);
        let mut open = self.open.lock();
        while !*open {
            self.opened.wait(&mut open);
        }
        ContentTag::Desert
    }
}

/// Records erase calls per cell.
#[derive(Default)]
struct RecordingSurface {
    inner: MemorySurface,
    erases: HashMap<CellPos, usize>,
}

impl PresentationSurface for RecordingSurface {
    fn draw(&mut self, pos: CellPos, tag: ContentTag) {
        self.inner.draw(pos, tag);
    }

    fn erase(&mut self, pos: CellPos) {
        *self.erases.entry(pos).or_default() += 1;
        self.inner.erase(pos);
    }
}

/// Runs quanta until generation is idle and a quantum changes nothing.
fn settle<S: PresentationSurface>(
    manager: &ChunkLifecycleManager,
    apply: &mut ApplyLoop,
    surface: &mut S,
) {
    for _ in 0..100 {
        assert!(manager.pool().wait_idle(SETTLE_TIMEOUT), "generation never went idle");
        if apply.run_quantum(surface).is_idle() && manager.pool().in_flight_count() == 0 {
            return;
        }
    }
    panic!("streaming did not settle");
}

#[test]
fn test_move_scenario() {
    let mut manager =
        ChunkLifecycleManager::new(config(0, 2), Arc::new(CountingGenerator::default())).unwrap();
    let mut apply = manager.apply_loop();
    let mut surface = MemorySurface::new();
    let origin = ChunkCoord::new(0, 0);
    let far = ChunkCoord::new(5, 5);

    manager.on_viewpoint_moved(origin);
    assert_eq!(manager.registry().snapshot(), vec![(origin, ChunkPhase::QueuedForLoad)]);

    assert!(manager.pool().wait_idle(SETTLE_TIMEOUT));
    let report = apply.run_quantum(&mut surface);
    assert_eq!(manager.registry().snapshot(), vec![(origin, ChunkPhase::Loaded)]);
    assert_eq!(report.cells_drawn, 16);
    assert_eq!(surface.draw_calls(), 16);

    manager.on_viewpoint_moved(far);
    assert_eq!(manager.registry().phase(origin), Some(ChunkPhase::QueuedForUnload));
    assert_eq!(manager.registry().phase(far), Some(ChunkPhase::QueuedForLoad));

    assert!(manager.pool().wait_idle(SETTLE_TIMEOUT));
    let report = apply.run_quantum(&mut surface);
    assert_eq!(report.cells_erased, 16);
    assert_eq!(surface.erase_calls(), 16);
    assert_eq!(manager.registry().snapshot(), vec![(far, ChunkPhase::Loaded)]);
    assert_eq!(surface.drawn_cells(), 16);
    assert!(surface.get(CellPos::new(20, 20)).is_some());
    assert!(surface.get(CellPos::new(0, 0)).is_none());
}

#[test]
fn test_admission_idempotence() {
    let generator = Arc::new(CountingGenerator::default());
    let manager = ChunkLifecycleManager::new(config(2, 2), generator.clone()).unwrap();
    let center = ChunkCoord::new(-3, 7);

    manager.admit_neighborhood(center, 2);
    let once = manager.registry().snapshot();
    manager.admit_neighborhood(center, 2);
    assert_eq!(manager.registry().snapshot(), once);
    assert_eq!(once.len(), 25);

    assert!(manager.pool().wait_idle(SETTLE_TIMEOUT));
    for coord in center.neighborhood(2) {
        assert_eq!(generator.generations(coord), 1, "{coord} generated more than once");
    }
    assert_eq!(manager.stats().admitted_total, 25);
}

#[test]
fn test_resurrection_preserves_content() {
    let generator = Arc::new(CountingGenerator::default());
    let mut manager = ChunkLifecycleManager::new(config(0, 1), generator.clone()).unwrap();
    let mut apply = manager.apply_loop();
    let mut surface = MemorySurface::new();
    let home = ChunkCoord::new(0, 0);

    manager.on_viewpoint_moved(home);
    settle(&manager, &mut apply, &mut surface);
    let original = manager.registry().content(home).unwrap();

    // Out of range and straight back, no quantum in between.
    manager.on_viewpoint_moved(ChunkCoord::new(1, 0));
    assert_eq!(manager.registry().phase(home), Some(ChunkPhase::QueuedForUnload));
    manager.on_viewpoint_moved(home);
    assert_eq!(manager.registry().phase(home), Some(ChunkPhase::QueuedForLoad));

    let report = apply.run_quantum(&mut surface);
    assert!(report.materialized >= 1);
    assert_eq!(report.reclaimed, 0);
    assert_eq!(manager.registry().phase(home), Some(ChunkPhase::Loaded));

    let again = manager.registry().content(home).unwrap();
    assert!(Arc::ptr_eq(&original, &again), "content must be reused, not regenerated");
    assert_eq!(generator.generations(home), 1);
    assert_eq!(manager.stats().resurrected_total, 1);
}

#[test]
fn test_at_most_one_generation_in_flight() {
    let generator = Arc::new(GatedGenerator::default());
    let mut manager = ChunkLifecycleManager::new(config(0, 1), generator.clone()).unwrap();
    let home = ChunkCoord::new(0, 0);

    manager.on_viewpoint_moved(home);
    manager.on_viewpoint_moved(ChunkCoord::new(1, 0));
    manager.on_viewpoint_moved(home);

    assert!(manager.pool().is_in_flight(home));
    assert!(!manager.pool().dispatch(home).unwrap(), "second dispatch must be refused");
    assert_eq!(manager.stats().admitted_total, 2);

    generator.open();
    assert!(manager.pool().wait_idle(SETTLE_TIMEOUT));
    assert_eq!(generator.counting.generations(home), 1);
    assert_eq!(manager.stats().generated_total, 2);
}

#[test]
fn test_no_lost_deletes() {
    let mut manager =
        ChunkLifecycleManager::new(config(1, 2), Arc::new(CountingGenerator::default())).unwrap();
    let mut apply = manager.apply_loop();
    let mut surface = RecordingSurface::default();

    manager.on_viewpoint_moved(ChunkCoord::new(0, 0));
    settle(&manager, &mut apply, &mut surface);
    assert_eq!(manager.stats().loaded, 9);

    manager.on_viewpoint_moved(ChunkCoord::new(10, 0));
    let report = apply.run_quantum(&mut surface);
    assert_eq!(report.reclaimed, 9);

    for old in ChunkCoord::new(0, 0).neighborhood(1) {
        assert!(!manager.registry().contains(old), "{old} still resident");
        for pos in old.footprint(CHUNK_SIZE) {
            assert_eq!(surface.erases.get(&pos), Some(&1), "cell {pos:?} not erased exactly once");
        }
    }
}

#[test]
fn test_write_back_after_removal_is_discarded() {
    let generator = Arc::new(GatedGenerator::default());
    let manager = ChunkLifecycleManager::new(config(0, 1), generator.clone()).unwrap();
    let coord = ChunkCoord::new(2, 2);
    let before = manager.registry().len();

    manager.admit_neighborhood(coord, 0);
    assert!(manager.pool().is_in_flight(coord));
    assert!(manager.registry().remove(coord).is_some());

    generator.open();
    assert!(manager.pool().wait_idle(SETTLE_TIMEOUT));

    assert_eq!(manager.registry().len(), before);
    assert!(!manager.registry().contains(coord));
    let stats = manager.stats();
    assert_eq!(stats.discarded_total, 1);
    assert_eq!(stats.generated_total, 0);
}

#[test]
fn test_readmission_before_stale_task_retires() {
    let generator = Arc::new(GatedGenerator::default());
    let manager = ChunkLifecycleManager::new(config(0, 1), generator.clone()).unwrap();
    let mut apply = manager.apply_loop();
    let mut surface = MemorySurface::new();
    let coord = ChunkCoord::new(2, 2);

    // The first task is stuck in the generator while its chunk is removed
    // and admitted again.
    assert_eq!(manager.admit_neighborhood(coord, 0).admitted, 1);
    assert!(manager.registry().remove(coord).is_some());
    assert_eq!(manager.admit_neighborhood(coord, 0).admitted, 1);
    assert!(manager.pool().is_in_flight(coord), "re-admitted chunk has no task");

    generator.open();
    settle(&manager, &mut apply, &mut surface);

    assert_eq!(manager.registry().phase(coord), Some(ChunkPhase::Loaded));
    assert_eq!(surface.drawn_cells(), 16);
    assert_eq!(generator.counting.generations(coord), 2);
    let stats = manager.stats();
    assert_eq!(stats.generated_total, 1);
    assert_eq!(stats.discarded_total, 1);
}

/// Panics on its first call only.
#[derive(Default)]
struct FlakyGenerator {
    failed: AtomicBool,
}

impl ContentGenerator for FlakyGenerator {
    fn generate(&self, _x: i32, _y: i32) -> ContentTag {
        assert!(self.failed.swap(true, Ordering::SeqCst), "transient generator failure");
        ContentTag::Mountain
    }
}

#[test]
fn test_failed_generation_is_regenerated() {
    let streaming = StreamingConfig {
        regenerate_after_quanta: Some(2),
        ..config(0, 1)
    };
    let mut manager =
        ChunkLifecycleManager::new(streaming, Arc::new(FlakyGenerator::default())).unwrap();
    let mut apply = manager.apply_loop();
    let mut surface = MemorySurface::new();
    let home = ChunkCoord::new(0, 0);

    manager.on_viewpoint_moved(home);
    assert!(manager.pool().wait_idle(SETTLE_TIMEOUT));
    assert_eq!(manager.stats().failed_total, 1);
    assert!(manager.registry().content(home).is_none());

    assert_eq!(apply.run_quantum(&mut surface).regenerated, 0);
    assert_eq!(apply.run_quantum(&mut surface).regenerated, 1);

    assert!(manager.pool().wait_idle(SETTLE_TIMEOUT));
    assert_eq!(apply.run_quantum(&mut surface).materialized, 1);
    assert_eq!(manager.registry().phase(home), Some(ChunkPhase::Loaded));
    assert_eq!(manager.stats().regenerated_total, 1);
}

#[test]
fn test_failed_generation_stays_queued_without_policy() {
    let mut manager =
        ChunkLifecycleManager::new(config(0, 1), Arc::new(FlakyGenerator::default())).unwrap();
    let mut apply = manager.apply_loop();
    let mut surface = MemorySurface::new();

    manager.on_viewpoint_moved(ChunkCoord::new(0, 0));
    assert!(manager.pool().wait_idle(SETTLE_TIMEOUT));

    for _ in 0..10 {
        assert!(apply.run_quantum(&mut surface).is_idle());
    }
    assert_eq!(
        manager.registry().phase(ChunkCoord::new(0, 0)),
        Some(ChunkPhase::QueuedForLoad)
    );
    assert_eq!(manager.stats().regenerated_total, 0);
}

#[test]
fn test_shutdown_stops_generation_but_not_apply() {
    let mut manager =
        ChunkLifecycleManager::new(config(0, 1), Arc::new(CountingGenerator::default())).unwrap();
    let mut apply = manager.apply_loop();
    let mut surface = MemorySurface::new();

    manager.on_viewpoint_moved(ChunkCoord::new(0, 0));
    settle(&manager, &mut apply, &mut surface);

    manager.shutdown();
    assert!(manager.pool().is_shut_down());
    assert!(matches!(
        manager.pool().dispatch(ChunkCoord::new(1, 1)),
        Err(StreamingError::ShutDown)
    ));

    manager.on_viewpoint_moved(ChunkCoord::new(3, 3));
    assert!(!manager.registry().contains(ChunkCoord::new(3, 3)));

    let report = apply.run_quantum(&mut surface);
    assert_eq!(report.reclaimed, 1);
    assert!(manager.registry().is_empty());
    assert_eq!(surface.drawn_cells(), 0);
}

#[test]
fn test_random_walk_keeps_surface_consistent() {
    let mut manager =
        ChunkLifecycleManager::new(config(2, 4), Arc::new(CountingGenerator::default())).unwrap();
    let mut apply = manager.apply_loop();
    let mut surface = MemorySurface::new();

    // Deterministic wander with backtracking, one quantum per step.
    let steps = [(1, 0), (1, 0), (0, 1), (-1, 0), (-1, -1), (3, 0), (-2, 2), (0, -1), (5, 5)];
    let mut center = ChunkCoord::new(0, 0);
    manager.on_viewpoint_moved(center);
    for (dx, dy) in steps.iter().cycle().take(60) {
        center = ChunkCoord::new(center.x + dx, center.y + dy);
        manager.on_viewpoint_moved(center);
        apply.run_quantum(&mut surface);
    }
    settle(&manager, &mut apply, &mut surface);

    let snapshot = manager.registry().snapshot();
    assert!(snapshot.iter().all(|(_, phase)| *phase == ChunkPhase::Loaded));
    for coord in center.neighborhood(2) {
        assert_eq!(manager.registry().phase(coord), Some(ChunkPhase::Loaded));
    }
    assert_eq!(surface.drawn_cells(), snapshot.len() * 16);
    for (coord, _) in &snapshot {
        for pos in coord.footprint(CHUNK_SIZE) {
            assert!(surface.get(pos).is_some(), "loaded chunk {coord} missing cell {pos:?}");
        }
    }

    let stats = manager.stats();
    assert_eq!(stats.failed_total, 0);
    assert_eq!(stats.resident_chunks, snapshot.len());
    assert!(stats.cells_drawn_total >= surface.drawn_cells() as u64);
    assert_eq!(stats.cells_erased_total, stats.reclaimed_total * 16);
}
