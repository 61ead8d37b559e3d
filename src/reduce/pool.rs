//! Fixed-size pool of reducer workers.
//!
//! # Architecture
//!
//! ```text
//!                 submit(tile, pixels)
//!                         │  correlation id k+1, worker k mod N
//!                         ▼
//!  ┌───────────────┐   ┌──────────┐ ┌──────────┐     ┌──────────┐
//!  │ pending table │   │ worker 0 │ │ worker 1 │ ... │ worker N │
//!  │  id → job     │   └────┬─────┘ └────┬─────┘     └────┬─────┘
//!  └───────▲───────┘        └────────────┴──────┬─────────┘
//!          │                                    ▼
//!          └──────────────── router ◄──── responses (any order)
//! ```
//!
//! Workers are OS threads spawned once per pool and reused for every job.
//! They own nothing but their request queue and a clone of the reducer, and
//! talk to the pool only through channels. Job `k` (0-based submission order)
//! goes to worker `k mod N` and is tagged with correlation id `k + 1`. Ids are
//! never reused, so a response routes to exactly the job that issued it no
//! matter which order workers finish in.
//!
//! A failed or panicking reduction fails only its own job; the worker keeps
//! serving the rest of its queue.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::ReductionError;

use super::color::ColorReducer;
use super::protocol::{ReducedColor, ReductionRequest, ReductionResponse};

/// Default number of reducer workers.
pub const DEFAULT_POOL_SIZE: usize = 4;

type ReductionResult = Result<ReducedColor, ReductionError>;

/// A job awaiting its worker's response.
struct PendingJob {
    tile_index: usize,
    reply: oneshot::Sender<ReductionResult>,
}

type PendingTable = Arc<Mutex<HashMap<u64, PendingJob>>>;

/// One persistent worker.
struct WorkerHandle {
    id: usize,
    requests: mpsc::UnboundedSender<ReductionRequest>,
    thread: thread::JoinHandle<()>,
}

// =============================================================================
// Pending Reduction
// =============================================================================

/// Handle to an in-flight reduction.
#[derive(Debug)]
pub struct PendingReduction {
    correlation_id: u64,
    tile_index: usize,
    receiver: oneshot::Receiver<ReductionResult>,
}

impl PendingReduction {
    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    pub fn tile_index(&self) -> usize {
        self.tile_index
    }

    /// Wait for the worker's response.
    ///
    /// Resolves with the worker's error if it reported one, or
    /// [`ReductionError::PoolClosed`] if the pool went away first.
    pub async fn wait(self) -> ReductionResult {
        self.receiver
            .await
            .unwrap_or(Err(ReductionError::PoolClosed))
    }
}

// =============================================================================
// Reducer Pool
// =============================================================================

/// Round-robin pool of persistent reducer workers.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use photo_mosaic::reduce::{ReducerPool, SampledAverage};
///
/// let pool = ReducerPool::spawn(4, Arc::new(SampledAverage::default()))?;
/// let color = pool.reduce(0, vec![255, 0, 0, 255]).await?;
/// assert_eq!(color.hex, "#ff0000");
/// pool.shutdown().await;
/// ```
pub struct ReducerPool {
    workers: Vec<WorkerHandle>,
    next_correlation_id: AtomicU64,
    pending: PendingTable,
    router: JoinHandle<()>,
}

impl ReducerPool {
    /// Start `size` workers running `reducer`.
    ///
    /// Must be called from within a Tokio runtime; the response router runs
    /// as a task on it.
    pub fn spawn(size: usize, reducer: Arc<dyn ColorReducer>) -> Result<Self, ReductionError> {
        if size == 0 {
            return Err(ReductionError::Spawn {
                message: "pool size must be at least 1".to_string(),
            });
        }

        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            let (request_tx, request_rx) = mpsc::unbounded_channel();
            let responses = response_tx.clone();
            let reducer = Arc::clone(&reducer);

            let thread = thread::Builder::new()
                .name(format!("mosaic-reducer-{}", id))
                .spawn(move || run_worker(id, request_rx, responses, reducer))
                .map_err(|e| ReductionError::Spawn {
                    message: e.to_string(),
                })?;

            workers.push(WorkerHandle {
                id,
                requests: request_tx,
                thread,
            });
        }

        // The router stops once every worker has dropped its sender
        drop(response_tx);

        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let router = tokio::spawn(route_responses(response_rx, Arc::clone(&pending)));

        debug!(workers = size, "Reducer pool started");

        Ok(Self {
            workers,
            next_correlation_id: AtomicU64::new(1),
            pending,
            router,
        })
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Number of jobs still waiting for a response.
    pub async fn pending_jobs(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Queue a tile's pixels on the next worker in rotation.
    pub async fn submit(
        &self,
        tile_index: usize,
        pixels: Vec<u8>,
    ) -> Result<PendingReduction, ReductionError> {
        let correlation_id = self.next_correlation_id.fetch_add(1, Ordering::Relaxed);
        let slot = ((correlation_id - 1) % self.workers.len() as u64) as usize;
        let worker = &self.workers[slot];

        let (reply, receiver) = oneshot::channel();

        // Register before sending so a fast worker cannot answer an unknown id
        self.pending
            .lock()
            .await
            .insert(correlation_id, PendingJob { tile_index, reply });

        let request = ReductionRequest {
            correlation_id,
            tile_index,
            pixels,
        };

        if worker.requests.send(request).is_err() {
            self.pending.lock().await.remove(&correlation_id);
            return Err(ReductionError::PoolClosed);
        }

        trace!(
            correlation_id,
            tile_index,
            worker = worker.id,
            "Submitted reduction"
        );

        Ok(PendingReduction {
            correlation_id,
            tile_index,
            receiver,
        })
    }

    /// Submit a tile and wait for its color.
    pub async fn reduce(
        &self,
        tile_index: usize,
        pixels: Vec<u8>,
    ) -> Result<ReducedColor, ReductionError> {
        self.submit(tile_index, pixels).await?.wait().await
    }

    /// Close the request queues and wait for every worker to drain and exit.
    pub async fn shutdown(self) {
        let Self {
            workers, router, ..
        } = self;

        let threads: Vec<_> = workers
            .into_iter()
            .map(|worker| {
                drop(worker.requests);
                (worker.id, worker.thread)
            })
            .collect();

        let joined = tokio::task::spawn_blocking(move || {
            for (id, thread) in threads {
                if thread.join().is_err() {
                    warn!(worker = id, "Reducer worker exited abnormally");
                }
            }
        })
        .await;

        if joined.is_err() {
            warn!("Failed to join reducer workers");
        }

        if router.await.is_err() {
            warn!("Reducer response router exited abnormally");
        }

        debug!("Reducer pool shut down");
    }
}

// =============================================================================
// Worker and Router
// =============================================================================

/// Worker loop: reduce each request in arrival order until the queue closes.
fn run_worker(
    id: usize,
    mut requests: mpsc::UnboundedReceiver<ReductionRequest>,
    responses: mpsc::UnboundedSender<ReductionResponse>,
    reducer: Arc<dyn ColorReducer>,
) {
    while let Some(request) = requests.blocking_recv() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| reducer.reduce(&request.pixels)))
            .unwrap_or_else(|payload| {
                Err(ReductionError::WorkerPanicked {
                    worker: id,
                    message: panic_message(payload.as_ref()),
                })
            })
            .map(|rgb| ReducedColor::new(rgb, id));

        let response = ReductionResponse {
            correlation_id: request.correlation_id,
            tile_index: request.tile_index,
            worker: id,
            result,
        };

        if responses.send(response).is_err() {
            break;
        }
    }
}

/// Route worker responses to their pending jobs by correlation id.
async fn route_responses(
    mut responses: mpsc::UnboundedReceiver<ReductionResponse>,
    pending: PendingTable,
) {
    while let Some(response) = responses.recv().await {
        let job = pending.lock().await.remove(&response.correlation_id);

        let Some(job) = job else {
            warn!(
                correlation_id = response.correlation_id,
                tile_index = response.tile_index,
                "Dropping response for unknown reduction"
            );
            continue;
        };

        let result = if job.tile_index == response.tile_index {
            response.result
        } else {
            Err(ReductionError::Misrouted {
                expected: job.tile_index,
                actual: response.tile_index,
            })
        };

        if job.reply.send(result).is_err() {
            // Waiter gave up (e.g. the run already failed)
            trace!(
                correlation_id = response.correlation_id,
                "Discarding reduction result"
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
