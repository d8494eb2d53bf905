//! Bounded, LOD-prioritized queue of mesh generation jobs.
//!
//! The scheduler is owned by the main thread. `pending` and `in_flight` are
//! only touched there; workers see a job's [`NodeGeometry`] and its
//! [`CancelToken`] and hand results back over a channel. Every request gets
//! a ticket, and a result is only delivered if its ticket still matches the
//! in-flight entry for that node.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use planeta_terrain::HeightField;
use tracing::{debug, trace};

use crate::geometry::NodeGeometry;
use crate::mesh::{CancelToken, GenerationOutcome, MeshData, generate_mesh};
use crate::node_id::NodeKey;
use crate::settings::{SchedulerSettings, SettingsError};

/// Identifies one generation request.
pub type Ticket = u64;

/// A finished job, ready to be attached to its node.
#[derive(Debug)]
pub struct Completion {
    pub key: NodeKey,
    pub ticket: Ticket,
    pub mesh: MeshData,
}

struct PendingEntry {
    key: NodeKey,
    ticket: Ticket,
    geometry: NodeGeometry,
}

struct InFlight {
    ticket: Ticket,
    cancel: CancelToken,
}

struct Job {
    key: NodeKey,
    ticket: Ticket,
    geometry: NodeGeometry,
    cancel: CancelToken,
}

struct JobResult {
    key: NodeKey,
    ticket: Ticket,
    mesh: MeshData,
}

/// Where dispatched jobs run.
enum Executor {
    /// Jobs run to completion inside `dispatch`.
    Inline { finished: Vec<JobResult> },
    Pool(WorkerPool),
}

/// Mesh generation thread pool.
///
/// Workers exit when the job sender is dropped; `Drop` joins them.
struct WorkerPool {
    job_sender: Option<Sender<Job>>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn new(
        thread_count: usize,
        queue_capacity: usize,
        field: Arc<dyn HeightField>,
        ocean_level: Option<f64>,
    ) -> Self {
        let (job_sender, job_receiver) = bounded::<Job>(queue_capacity);
        let (result_sender, result_receiver) = unbounded::<JobResult>();

        let workers = (0..thread_count)
            .map(|i| {
                let receiver = job_receiver.clone();
                let sender = result_sender.clone();
                let field = Arc::clone(&field);
                std::thread::Builder::new()
                    .name(format!("planeta-mesh-{i}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            if job.cancel.is_cancelled() {
                                continue;
                            }
                            let start = std::time::Instant::now();
                            let outcome = generate_mesh(
                                &job.geometry,
                                field.as_ref(),
                                ocean_level,
                                &job.cancel,
                            );
                            match outcome {
                                GenerationOutcome::Completed(mesh) => {
                                    trace!(
                                        node = ?job.key,
                                        elapsed_us = start.elapsed().as_micros() as u64,
                                        "mesh generated"
                                    );
                                    let result = JobResult {
                                        key: job.key,
                                        ticket: job.ticket,
                                        mesh,
                                    };
                                    if sender.send(result).is_err() {
                                        break;
                                    }
                                }
                                GenerationOutcome::Cancelled => {
                                    trace!(node = ?job.key, "generation cancelled");
                                }
                            }
                        }
                    })
                    .expect("failed to spawn mesh generation worker thread")
            })
            .collect();

        Self {
            job_sender: Some(job_sender),
            result_receiver,
            workers,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.job_sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for GenerationScheduler {
    fn drop(&mut self) {
        // Runs before the pool joins: queued jobs are skipped, running ones
        // stop at the next row.
        for entry in self.in_flight.values() {
            entry.cancel.cancel();
        }
    }
}

/// Bounded-concurrency generation queue, prioritized by LOD depth.
pub struct GenerationScheduler {
    settings: SchedulerSettings,
    field: Arc<dyn HeightField>,
    ocean_level: Option<f64>,
    pending: Vec<PendingEntry>,
    in_flight: HashMap<NodeKey, InFlight>,
    next_ticket: Ticket,
    executor: Executor,
}

impl GenerationScheduler {
    /// Create a scheduler. `worker_threads == 0` selects inline execution.
    pub fn new(
        settings: SchedulerSettings,
        field: Arc<dyn HeightField>,
        ocean_level: Option<f64>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let executor = if settings.worker_threads == 0 {
            Executor::Inline {
                finished: Vec::new(),
            }
        } else {
            Executor::Pool(WorkerPool::new(
                settings.worker_threads,
                settings.max_in_flight * 2,
                Arc::clone(&field),
                ocean_level,
            ))
        };
        debug!(
            workers = settings.worker_threads,
            capacity = settings.max_in_flight,
            "generation scheduler started"
        );
        Ok(Self {
            settings,
            field,
            ocean_level,
            pending: Vec::new(),
            in_flight: HashMap::new(),
            next_ticket: 1,
            executor,
        })
    }

    /// Queue `geometry` for generation.
    ///
    /// Idempotent: a node that is already pending or in flight keeps its
    /// existing request, whose ticket is returned.
    pub fn enqueue(&mut self, geometry: NodeGeometry) -> Ticket {
        let key = geometry.key;
        if let Some(ticket) = self.ticket_for(key) {
            return ticket;
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending.push(PendingEntry {
            key,
            ticket,
            geometry,
        });
        ticket
    }

    /// Drop any request for `key`. An in-flight job is told to stop and its
    /// slot is freed immediately; whatever it produces is discarded.
    pub fn cancel(&mut self, key: NodeKey) {
        self.pending.retain(|entry| entry.key != key);
        if let Some(job) = self.in_flight.remove(&key) {
            job.cancel.cancel();
            trace!(node = ?key, ticket = job.ticket, "in-flight generation cancelled");
        }
    }

    /// Ticket of the live request for `key`, if any.
    pub fn ticket_for(&self, key: NodeKey) -> Option<Ticket> {
        self.in_flight.get(&key).map(|job| job.ticket).or_else(|| {
            self.pending
                .iter()
                .find(|entry| entry.key == key)
                .map(|entry| entry.ticket)
        })
    }

    pub fn is_scheduled(&self, key: NodeKey) -> bool {
        self.ticket_for(key).is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn capacity(&self) -> usize {
        self.settings.max_in_flight
    }

    /// Advance the queue by one frame.
    ///
    /// Dispatches the deepest pending nodes into free in-flight slots, then
    /// collects every result that arrived. Results whose request was
    /// cancelled or superseded are dropped.
    pub fn tick(&mut self) -> Vec<Completion> {
        self.dispatch();
        self.collect()
    }

    fn dispatch(&mut self) {
        // Ascending by depth, newest first within a depth, so `pop` yields the
        // deepest and oldest request.
        self.pending.sort_by(|a, b| {
            a.key
                .depth()
                .cmp(&b.key.depth())
                .then(b.ticket.cmp(&a.ticket))
        });

        while self.in_flight.len() < self.settings.max_in_flight {
            let Some(entry) = self.pending.pop() else {
                break;
            };
            let cancel = CancelToken::new();
            let job = Job {
                key: entry.key,
                ticket: entry.ticket,
                geometry: entry.geometry,
                cancel: cancel.clone(),
            };

            match &mut self.executor {
                Executor::Inline { finished } => {
                    if let GenerationOutcome::Completed(mesh) = generate_mesh(
                        &job.geometry,
                        self.field.as_ref(),
                        self.ocean_level,
                        &job.cancel,
                    ) {
                        finished.push(JobResult {
                            key: job.key,
                            ticket: job.ticket,
                            mesh,
                        });
                    }
                }
                Executor::Pool(pool) => {
                    let Some(sender) = &pool.job_sender else {
                        break;
                    };
                    if let Err(err) = sender.try_send(job) {
                        let job = match err {
                            TrySendError::Full(job) | TrySendError::Disconnected(job) => job,
                        };
                        self.pending.push(PendingEntry {
                            key: job.key,
                            ticket: job.ticket,
                            geometry: job.geometry,
                        });
                        break;
                    }
                }
            }

            trace!(node = ?entry.key, ticket = entry.ticket, "generation dispatched");
            self.in_flight.insert(
                entry.key,
                InFlight {
                    ticket: entry.ticket,
                    cancel,
                },
            );
        }
    }

    fn collect(&mut self) -> Vec<Completion> {
        let results: Vec<JobResult> = match &mut self.executor {
            Executor::Inline { finished } => std::mem::take(finished),
            Executor::Pool(pool) => pool.result_receiver.try_iter().collect(),
        };

        let mut completions = Vec::with_capacity(results.len());
        for result in results {
            match self.in_flight.get(&result.key) {
                Some(job) if job.ticket == result.ticket => {
                    self.in_flight.remove(&result.key);
                    completions.push(Completion {
                        key: result.key,
                        ticket: result.ticket,
                        mesh: result.mesh,
                    });
                }
                _ => trace!(node = ?result.key, ticket = result.ticket, "stale result dropped"),
            }
        }
        completions
    }
}
