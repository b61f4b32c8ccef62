//! Background compute worker.
//!
//! A [`ComputeWorker`] owns one OS thread that runs a handler over requests
//! sent to it by value. Requests are tagged with a [`TaskId`] and queued in
//! one of three [`Lane`]s; the thread always takes the oldest request from the
//! highest non-empty lane. Responses travel back over a channel and are
//! matched to the waiting caller by id.
//!
//! Callers never wait indefinitely: every request is bounded by a timeout,
//! and when the thread is gone the handler runs inline on the caller.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{AuditError, Result};

/// Identifier of one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Request priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Someone is waiting on the result.
    Interactive,
    /// Useful soon, not blocking anyone.
    Background,
    /// Run when there is nothing else to do.
    Deferred,
}

impl Lane {
    fn index(self) -> usize {
        match self {
            Lane::Interactive => 0,
            Lane::Background => 1,
            Lane::Deferred => 2,
        }
    }
}

struct Job<Req> {
    id: TaskId,
    lane: Lane,
    request: Req,
}

type Handler<Req, Resp> = Arc<dyn Fn(Req) -> Resp + Send + Sync>;
type Pending<Resp> = Arc<Mutex<HashMap<TaskId, oneshot::Sender<Resp>>>>;

/// A single background thread with prioritized, id-tagged requests.
pub struct ComputeWorker<Req, Resp> {
    name: String,
    handler: Handler<Req, Resp>,
    jobs: Mutex<Option<std_mpsc::Sender<Job<Req>>>>,
    pending: Pending<Resp>,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
}

impl<Req, Resp> ComputeWorker<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Start the worker thread.
    ///
    /// Must be called from within a Tokio runtime, which hosts the task that
    /// routes responses back to callers. Outside a runtime, or if the thread
    /// cannot be spawned, the worker runs every request inline.
    pub fn spawn<F>(name: &str, handler: F) -> Self
    where
        F: Fn(Req) -> Resp + Send + Sync + 'static,
    {
        let worker = Self::inline(name, handler);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(worker = %worker.name, "no async runtime, compute worker runs inline");
                return worker;
            }
        };

        let (job_tx, job_rx) = std_mpsc::channel::<Job<Req>>();
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(TaskId, Resp)>();

        let handler = worker.handler.clone();
        let spawned = thread::Builder::new()
            .name(worker.name.clone())
            .spawn(move || worker_loop(job_rx, result_tx, handler));
        if let Err(e) = spawned {
            warn!(worker = %worker.name, error = %e, "failed to spawn compute thread, running inline");
            return worker;
        }

        let pending = worker.pending.clone();
        let closed = worker.closed.clone();
        let name = worker.name.clone();
        runtime.spawn(async move {
            while let Some((id, response)) = result_rx.recv().await {
                match pending.lock().remove(&id) {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => debug!(worker = %name, task_id = %id, "dropping late result"),
                }
            }
            closed.store(true, Ordering::SeqCst);
            // Waiting callers see their sender dropped.
            pending.lock().clear();
            debug!(worker = %name, "compute worker stopped");
        });

        *worker.jobs.lock() = Some(job_tx);
        worker
    }

    /// A worker without a thread: every request runs on the caller.
    pub fn inline<F>(name: &str, handler: F) -> Self
    where
        F: Fn(Req) -> Resp + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            handler: Arc::new(handler),
            jobs: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Whether requests are currently sent to the background thread.
    pub fn is_available(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.jobs.lock().is_some()
    }

    /// Number of requests waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Run `request` on the worker thread and wait at most `timeout`.
    ///
    /// Fails with [`AuditError::Timeout`] when the deadline passes, and with
    /// [`AuditError::WorkerUnavailable`] when the thread dies while the
    /// request is queued. If the thread was already gone the request runs
    /// inline instead.
    pub async fn run(&self, lane: Lane, request: Req, timeout: Duration) -> Result<Resp> {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let job_tx = if self.closed.load(Ordering::SeqCst) {
            None
        } else {
            self.jobs.lock().clone()
        };
        let Some(job_tx) = job_tx else {
            debug!(worker = %self.name, task_id = %id, "running inline");
            return Ok((self.handler)(request));
        };

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if let Err(std_mpsc::SendError(job)) = job_tx.send(Job { id, lane, request }) {
            self.pending.lock().remove(&id);
            self.jobs.lock().take();
            warn!(worker = %self.name, task_id = %id, "compute worker unavailable, running inline");
            return Ok((self.handler)(job.request));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                warn!(worker = %self.name, task_id = %id, "compute worker stopped before answering");
                Err(AuditError::WorkerUnavailable)
            }
            Err(_) => {
                self.pending.lock().remove(&id);
                warn!(worker = %self.name, task_id = %id, ?timeout, "compute task timed out");
                Err(AuditError::Timeout {
                    task_id: id,
                    after: timeout,
                })
            }
        }
    }

    /// Stop accepting background requests. Queued requests still complete.
    pub fn shutdown(&self) {
        if self.jobs.lock().take().is_some() {
            debug!(worker = %self.name, "compute worker shutting down");
        }
    }
}

impl<Req, Resp> Drop for ComputeWorker<Req, Resp> {
    fn drop(&mut self) {
        self.jobs.lock().take();
    }
}

fn worker_loop<Req, Resp>(
    jobs: std_mpsc::Receiver<Job<Req>>,
    results: mpsc::UnboundedSender<(TaskId, Resp)>,
    handler: Handler<Req, Resp>,
) {
    let mut lanes: [VecDeque<Job<Req>>; 3] = [VecDeque::new(), VecDeque::new(), VecDeque::new()];

    loop {
        if lanes.iter().all(VecDeque::is_empty) {
            match jobs.recv() {
                Ok(job) => lanes[job.lane.index()].push_back(job),
                Err(_) => break,
            }
        }
        while let Ok(job) = jobs.try_recv() {
            lanes[job.lane.index()].push_back(job);
        }

        let Some(job) = lanes.iter_mut().find_map(VecDeque::pop_front) else {
            continue;
        };
        let response = handler(job.request);
        if results.send((job.id, response)).is_err() {
            break;
        }
    }
}
