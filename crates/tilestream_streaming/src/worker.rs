//! # Generation Worker Pool
//!
//! Runs content generation off the control loop and writes results back
//! into the registry.
//!
//! ## Architecture
//!
//! ```text
//!   dispatch(coord) ──> [ticket into in-flight map] ──> [unbounded job queue]
//!                                                              │
//!                              ┌───────────────┬───────────────┘
//!                              ▼               ▼
//!                         worker 0   ...   worker N-1
//!                              │  generate_chunk_cells (no locks held)
//!                              ▼
//!                  registry lock: write back if still resident
//!                              │
//!                              ▼
//!                  in-flight map: retire ticket, signal idle
//! ```
//!
//! One job per dispatch, no retries inside the pool. The control loop never
//! waits on a worker; it sees results by polling chunk state.
//!
//! ## Tickets
//!
//! Every dispatch gets a `GenerationTicket` keyed by coordinate. A ticket
//! can be cancelled cooperatively: a worker skips a cancelled job, and drops
//! the result of a job cancelled mid-generation. Cancellation is an
//! optimization only; the existence check under the registry lock is what
//! keeps stale results out.
//!
//! A chunk inserted fresh supersedes any live ticket for its coordinate.
//! The old task may already have found the previous chunk missing, so it
//! cannot be relied on to fill the new one.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tilestream_procedural::{generate_chunk_cells, CellOrder, ChunkCoord, ContentGenerator};
use tracing::{debug, info, trace, warn};

use crate::config::StreamingConfig;
use crate::error::{StreamingError, StreamingResult};
use crate::registry::{ChunkRegistry, WriteBack};
use crate::stats::StreamingCounters;

/// Handle to one dispatched generation task.
#[derive(Clone, Debug)]
struct GenerationTicket {
    /// Dispatch sequence number, unique per pool.
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl GenerationTicket {
    fn new(id: u64) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

struct GenerationJob {
    coord: ChunkCoord,
    ticket: GenerationTicket,
}

/// State shared by the pool handle and every worker thread.
struct WorkerShared {
    registry: Arc<ChunkRegistry>,
    generator: Arc<dyn ContentGenerator>,
    chunk_size: u32,
    cell_order: CellOrder,
    counters: Arc<StreamingCounters>,
    in_flight: Mutex<HashMap<ChunkCoord, GenerationTicket>>,
    /// Signalled whenever the in-flight map becomes empty.
    idle: Condvar,
}

impl WorkerShared {
    fn run(&self, job: &GenerationJob) {
        let coord = job.coord;

        if job.ticket.is_cancelled() {
            trace!(chunk = %coord, "skipping cancelled generation");
            self.retire(job);
            return;
        }

        let generated = panic::catch_unwind(AssertUnwindSafe(|| {
            generate_chunk_cells(&*self.generator, coord, self.chunk_size, self.cell_order)
        }));

        match generated {
            Err(payload) => {
                self.counters.record_failed(1);
                warn!(
                    chunk = %coord,
                    "content generation panicked, chunk stays queued: {}",
                    panic_message(payload.as_ref())
                );
            }
            Ok(_) if job.ticket.is_cancelled() => {
                self.counters.record_discarded(1);
                debug!(chunk = %coord, "generation cancelled mid-flight, result dropped");
            }
            Ok(cells) => match self.registry.write_back(coord, cells.into()) {
                WriteBack::Stored => {
                    self.counters.record_generated(1);
                    trace!(chunk = %coord, "content written back");
                }
                WriteBack::Missing | WriteBack::Rejected => {
                    self.counters.record_discarded(1);
                    debug!(chunk = %coord, "chunk left the registry while generating, result dropped");
                }
            },
        }

        self.retire(job);
    }

    /// Removes the job's ticket unless a newer dispatch replaced it.
    fn retire(&self, job: &GenerationJob) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.get(&job.coord).is_some_and(|t| t.id == job.ticket.id) {
            in_flight.remove(&job.coord);
        }
        if in_flight.is_empty() {
            self.idle.notify_all();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

fn worker_loop(index: usize, jobs: &Receiver<GenerationJob>, shared: &WorkerShared) {
    trace!(worker = index, "generation worker started");
    // Ends once every sender is gone and the queue is drained.
    for job in jobs.iter() {
        shared.run(&job);
    }
    trace!(worker = index, "generation worker stopped");
}

/// Pool of generation worker threads fed by an unbounded job queue.
pub struct GenerationWorkerPool {
    /// `None` once shut down.
    jobs: Mutex<Option<Sender<GenerationJob>>>,
    shared: Arc<WorkerShared>,
    /// Detached, never joined: in-flight work may outlive shutdown.
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_ticket: AtomicU64,
}

impl GenerationWorkerPool {
    /// Starts `config.worker_threads` workers writing into `registry`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a bad config and `WorkerSpawn` if a
    /// thread cannot be started.
    pub fn new(
        config: &StreamingConfig,
        registry: Arc<ChunkRegistry>,
        generator: Arc<dyn ContentGenerator>,
        counters: Arc<StreamingCounters>,
    ) -> StreamingResult<Self> {
        config.validate()?;

        let shared = Arc::new(WorkerShared {
            registry,
            generator,
            chunk_size: config.chunk_size,
            cell_order: config.cell_order,
            counters,
            in_flight: Mutex::new(HashMap::new()),
            idle: Condvar::new(),
        });

        let (sender, receiver) = crossbeam_channel::unbounded::<GenerationJob>();
        let mut workers = Vec::with_capacity(config.worker_threads);
        for index in 0..config.worker_threads {
            let receiver = receiver.clone();
            let worker_shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("tilestream-gen-{index}"))
                .spawn(move || worker_loop(index, &receiver, &worker_shared))
                .map_err(StreamingError::WorkerSpawn)?;
            workers.push(handle);
        }

        info!(
            workers = config.worker_threads,
            chunk_size = config.chunk_size,
            "generation worker pool started"
        );

        Ok(Self {
            jobs: Mutex::new(Some(sender)),
            shared,
            workers: Mutex::new(workers),
            next_ticket: AtomicU64::new(0),
        })
    }

    /// Schedules one generation task for `coord`.
    ///
    /// Returns `Ok(false)` without scheduling if a live task for the
    /// coordinate already exists, so at most one is ever in flight.
    ///
    /// # Errors
    ///
    /// Returns `ShutDown` after `shutdown`.
    pub fn dispatch(&self, coord: ChunkCoord) -> StreamingResult<bool> {
        self.enqueue(coord, false)
    }

    /// Schedules a generation task for `coord`, cancelling any live one.
    ///
    /// Used when a chunk is inserted fresh: a task left over from an earlier
    /// incarnation of the coordinate may already have seen the chunk missing
    /// and will never write back. The replaced task's result is dropped.
    ///
    /// # Errors
    ///
    /// Returns `ShutDown` after `shutdown`.
    pub fn dispatch_superseding(&self, coord: ChunkCoord) -> StreamingResult<()> {
        self.enqueue(coord, true).map(|_| ())
    }

    fn enqueue(&self, coord: ChunkCoord, supersede: bool) -> StreamingResult<bool> {
        let jobs = self.jobs.lock();
        let Some(sender) = jobs.as_ref() else {
            return Err(StreamingError::ShutDown);
        };

        let ticket = {
            let mut in_flight = self.shared.in_flight.lock();
            if let Some(live) = in_flight.get(&coord).filter(|t| !t.is_cancelled()) {
                if !supersede {
                    return Ok(false);
                }
                live.cancel();
                trace!(chunk = %coord, ticket = live.id, "generation superseded");
            }
            let ticket = GenerationTicket::new(self.next_ticket.fetch_add(1, Ordering::Relaxed));
            in_flight.insert(coord, ticket.clone());
            ticket
        };

        let id = ticket.id;
        if sender.send(GenerationJob { coord, ticket }).is_err() {
            let mut in_flight = self.shared.in_flight.lock();
            if in_flight.get(&coord).is_some_and(|t| t.id == id) {
                in_flight.remove(&coord);
            }
            return Err(StreamingError::ShutDown);
        }

        trace!(chunk = %coord, ticket = id, "generation dispatched");
        Ok(true)
    }

    /// Cancels the live task for `coord`, if any. Returns true if one was
    /// cancelled.
    pub fn cancel(&self, coord: ChunkCoord) -> bool {
        let in_flight = self.shared.in_flight.lock();
        match in_flight.get(&coord) {
            Some(ticket) if !ticket.is_cancelled() => {
                ticket.cancel();
                trace!(chunk = %coord, ticket = ticket.id, "generation cancelled");
                true
            }
            _ => false,
        }
    }

    /// True if a live (not cancelled) task exists for `coord`.
    #[must_use]
    pub fn is_in_flight(&self, coord: ChunkCoord) -> bool {
        self.shared
            .in_flight
            .lock()
            .get(&coord)
            .is_some_and(|t| !t.is_cancelled())
    }

    /// Number of live (not cancelled) tasks.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.shared
            .in_flight
            .lock()
            .values()
            .filter(|t| !t.is_cancelled())
            .count()
    }

    /// Blocks until every dispatched task, cancelled or not, has finished,
    /// or the timeout passes. Returns true if the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut in_flight = self.shared.in_flight.lock();
        while !in_flight.is_empty() {
            if self.shared.idle.wait_until(&mut in_flight, deadline).timed_out() {
                return in_flight.is_empty();
            }
        }
        true
    }

    /// True once `shutdown` has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.jobs.lock().is_none()
    }

    /// Stops accepting work and cancels every pending task.
    ///
    /// Workers finish the job they are on, skip the cancelled rest of the
    /// queue and exit. They are not joined.
    pub fn shutdown(&self) {
        let Some(sender) = self.jobs.lock().take() else {
            return;
        };
        drop(sender);

        let cancelled = {
            let in_flight = self.shared.in_flight.lock();
            for ticket in in_flight.values() {
                ticket.cancel();
            }
            in_flight.len()
        };

        let workers = std::mem::take(&mut *self.workers.lock());
        info!(
            workers = workers.len(),
            cancelled,
            "generation worker pool shut down"
        );
    }
}

impl Drop for GenerationWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for GenerationWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationWorkerPool")
            .field("chunk_size", &self.shared.chunk_size)
            .field("in_flight", &self.in_flight_count())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
