//! # Walk Integration Tests
//!
//! Drives the full control loop with the default banded generator and
//! checks the viewpoint never stands on an undrawn cell once streaming
//! catches up.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tilestream::prelude::*;

const CHUNK_SIZE: u32 = 8;

fn control_at(seed: u64, x: f32, y: f32) -> ControlLoop<WorldViewpoint> {
    let streaming = StreamingConfig {
        chunk_size: CHUNK_SIZE,
        render_distance: 2,
        worker_threads: 2,
        ..StreamingConfig::default()
    };
    let generator = Arc::new(BandedGenerator::with_seed(NoiseSeed::new(seed)));
    let manager = ChunkLifecycleManager::new(streaming, generator).unwrap();
    ControlLoop::new(
        manager,
        WorldViewpoint::new(x, y, CHUNK_SIZE),
        ControlLoopConfig {
            target_fps: 0,
            log_every_quanta: 0,
            enable_timing_logs: false,
        },
    )
}

/// Ticks until generation is idle and a frame changes nothing.
fn catch_up(control: &mut ControlLoop<WorldViewpoint>, surface: &mut MemorySurface) {
    for _ in 0..100 {
        assert!(control.manager().pool().wait_idle(Duration::from_secs(10)));
        let frame = control.tick(surface);
        if frame.quantum.is_idle() && control.manager().pool().in_flight_count() == 0 {
            return;
        }
    }
    panic!("streaming did not catch up");
}

#[allow(clippy::cast_possible_truncation)]
fn cell_under(viewpoint: &WorldViewpoint) -> CellPos {
    CellPos::new(viewpoint.x.floor() as i32, viewpoint.y.floor() as i32)
}

#[test]
fn test_walk_east_never_hits_void() {
    let mut control = control_at(42, 0.5, 0.5);
    let mut surface = MemorySurface::new();
    catch_up(&mut control, &mut surface);

    let start = Instant::now();
    for step in 1..=2_000 {
        control.viewpoint_mut().translate(1.0, 0.0);
        control.tick(&mut surface);

        if step % 100 == 0 {
            catch_up(&mut control, &mut surface);
            let pos = cell_under(control.viewpoint());
            assert!(surface.get(pos).is_some(), "VOID DETECTED at {pos:?}");
        }
    }
    catch_up(&mut control, &mut surface);

    let stats = control.streaming_stats();
    println!("Walked 2,000 cells in {:?}", start.elapsed());
    println!("Resident chunks: {}", stats.resident_chunks);
    println!("Generated total: {}", stats.generated_total);
    println!("Reclaimed total: {}", stats.reclaimed_total);

    assert!(stats.reclaimed_total > 0, "walking must reclaim chunks behind");
    assert_eq!(stats.queued_for_unload, 0);
    assert!(surface.get(cell_under(control.viewpoint())).is_some());
}

#[test]
fn test_spiral_walk_coverage() {
    let mut control = control_at(12345, 0.5, 0.5);
    let mut surface = MemorySurface::new();

    let mut direction = 0; // 0=E, 1=S, 2=W, 3=N
    let mut leg_length = 1;
    let mut steps_in_leg = 0;
    let mut legs_completed = 0;

    for step in 0..3_000 {
        let (dx, dy) = match direction {
            0 => (1.0, 0.0),
            1 => (0.0, 1.0),
            2 => (-1.0, 0.0),
            _ => (0.0, -1.0),
        };
        control.viewpoint_mut().translate(dx, dy);

        steps_in_leg += 1;
        if steps_in_leg >= leg_length {
            steps_in_leg = 0;
            direction = (direction + 1) % 4;
            legs_completed += 1;
            if legs_completed % 2 == 0 {
                leg_length += 1;
            }
        }

        control.tick(&mut surface);
        if step % 500 == 0 {
            catch_up(&mut control, &mut surface);
            let pos = cell_under(control.viewpoint());
            assert!(surface.get(pos).is_some(), "VOID at step {step} {pos:?}");
        }
    }
    catch_up(&mut control, &mut surface);

    assert!(surface.get(cell_under(control.viewpoint())).is_some());
    assert!(control.streaming_stats().reclaimed_total > 0, "spiral swings past the window");
}

#[test]
fn test_teleport_stress() {
    let mut control = control_at(99_999, 0.0, 0.0);
    let mut surface = MemorySurface::new();

    let teleport_points = [
        (0.0, 0.0),
        (1000.0, 0.0),
        (-1000.0, 500.0),
        (500.0, -1000.0),
        (2000.0, 2000.0),
        (-2000.0, -2000.0),
        (0.0, 0.0),
    ];

    for (x, y) in teleport_points {
        control.viewpoint_mut().set(x, y);
        catch_up(&mut control, &mut surface);

        let stats = control.streaming_stats();
        assert!(
            surface.get(cell_under(control.viewpoint())).is_some(),
            "no content at teleport destination ({x}, {y})"
        );
        assert_eq!(stats.loaded, 25, "exactly one window resident after a jump");
        assert_eq!(surface.drawn_cells(), 25 * 64);
    }
}

#[test]
fn test_deterministic_content() {
    let run = || {
        let mut control = control_at(42, 100.0, 100.0);
        let mut surface = MemorySurface::new();
        catch_up(&mut control, &mut surface);
        surface
    };

    let first = run();
    let second = run();

    for (x, y) in [(100, 100), (105, 110), (90, 119), (119, 81)] {
        let pos = CellPos::new(x, y);
        assert!(first.get(pos).is_some());
        assert_eq!(first.get(pos), second.get(pos), "content not deterministic at {pos:?}");
    }
}

#[test]
fn test_threaded_run_with_shared_viewpoint() {
    let streaming = StreamingConfig {
        chunk_size: CHUNK_SIZE,
        render_distance: 1,
        worker_threads: 2,
        ..StreamingConfig::default()
    };
    let manager =
        ChunkLifecycleManager::new(streaming, Arc::new(BandedGenerator::default())).unwrap();
    let viewpoint = SharedViewpoint::new(0.0, 0.0, CHUNK_SIZE);
    let mut control = ControlLoop::new(
        manager,
        viewpoint.clone(),
        ControlLoopConfig {
            target_fps: 240,
            log_every_quanta: 0,
            enable_timing_logs: false,
        },
    );
    let running = control.running_flag();

    let walker = thread::spawn(move || {
        for _ in 0..50 {
            viewpoint.translate(2.0, 1.0);
            thread::sleep(Duration::from_millis(2));
        }
        running.stop();
    });

    let mut surface = MemorySurface::new();
    let frames = control.run(&mut surface);
    walker.join().unwrap();

    assert!(frames > 0);
    assert!(control.manager().pool().is_shut_down());
    assert!(control.frame_stats().frames_moved > 1);
    assert!(control.streaming_stats().admitted_total >= 9);
}
