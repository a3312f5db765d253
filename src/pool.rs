use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::source::{task_label, CandidateSource};
use crate::types::{ImportCandidate, ImportTask};
use crate::{log_debug, log_error, log_warn};

/// Output of the worker pool.
#[derive(Debug)]
pub enum WorkerMessage {
    /// One task and the candidates found for it.
    Looked {
        task: ImportTask,
        candidates: Vec<ImportCandidate>,
    },
    /// Sent once by each worker after it has taken its end-of-input sentinel.
    Finished { worker: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub workers: usize,
    /// Bound of both the task queue and the result queue.
    pub capacity: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            capacity: 64,
        }
    }
}

/// Consumer side of a running pool.
///
/// Dropping the pool stops the producer. Workers already looking up a task
/// are left to finish on their own; their results are discarded.
pub struct WorkerPool {
    results: mpsc::Receiver<WorkerMessage>,
    workers: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Next message, blocking the current thread.
    ///
    /// Must not be called from inside the runtime's async context.
    pub fn recv_blocking(&mut self) -> Option<WorkerMessage> {
        self.results.blocking_recv()
    }

    pub async fn recv(&mut self) -> Option<WorkerMessage> {
        self.results.recv().await
    }

    /// Stop feeding tasks and stop listening for results.
    pub fn abandon(self) {
        log_debug!("Abandoning worker pool ({} workers)", self.workers);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

type TaskQueue = Arc<Mutex<mpsc::Receiver<Option<ImportTask>>>>;

/// Start a producer and `settings.workers` lookup workers on `handle`.
///
/// The producer queues every task, then one `None` sentinel per worker. Each
/// worker forwards a `Looked` message per task and a final `Finished` message,
/// so a consumer sees exactly one `Looked` per task and one `Finished` per
/// worker. Results arrive in completion order, not task order.
pub fn spawn_pool<I>(
    handle: &Handle,
    tasks: I,
    source: Arc<dyn CandidateSource>,
    settings: PoolSettings,
) -> WorkerPool
where
    I: IntoIterator<Item = ImportTask>,
    I::IntoIter: Send + 'static,
{
    let workers = settings.workers.max(1);
    let capacity = settings.capacity.max(1);
    let cancel = CancellationToken::new();

    let (task_tx, task_rx) = mpsc::channel::<Option<ImportTask>>(capacity);
    let (result_tx, result_rx) = mpsc::channel::<WorkerMessage>(capacity);

    handle.spawn(produce(tasks.into_iter(), task_tx, workers, cancel.clone()));

    let queue: TaskQueue = Arc::new(Mutex::new(task_rx));
    for worker in 0..workers {
        handle.spawn(run_worker(
            worker,
            Arc::clone(&queue),
            result_tx.clone(),
            Arc::clone(&source),
        ));
    }

    WorkerPool {
        results: result_rx,
        workers,
        cancel,
    }
}

async fn produce<T>(
    tasks: T,
    queue: mpsc::Sender<Option<ImportTask>>,
    workers: usize,
    cancel: CancellationToken,
) where
    T: Iterator<Item = ImportTask>,
{
    let mut queued = 0usize;
    for task in tasks {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log_debug!("Producer cancelled after queueing {} task(s)", queued);
                return;
            }
            sent = queue.send(Some(task)) => {
                if sent.is_err() {
                    return;
                }
                queued += 1;
            }
        }
    }

    for _ in 0..workers {
        if queue.send(None).await.is_err() {
            return;
        }
    }
    log_debug!("Producer queued {} task(s) and {} sentinel(s)", queued, workers);
}

async fn run_worker(
    worker: usize,
    queue: TaskQueue,
    results: mpsc::Sender<WorkerMessage>,
    source: Arc<dyn CandidateSource>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let task = match next {
            Some(Some(task)) => task,
            Some(None) => {
                log_debug!("Worker {} reached end of input", worker);
                break;
            }
            // Producer was cancelled; nobody is listening any more.
            None => return,
        };

        let candidates = lookup_isolated(&source, &task).await;
        if results
            .send(WorkerMessage::Looked { task, candidates })
            .await
            .is_err()
        {
            return;
        }
    }

    let _ = results.send(WorkerMessage::Finished { worker }).await;
}

/// Run one lookup in its own task so that an error or a panic costs only this task.
async fn lookup_isolated(source: &Arc<dyn CandidateSource>, task: &ImportTask) -> Vec<ImportCandidate> {
    let lookup_source = Arc::clone(source);
    let lookup_task = task.clone();
    let joined = tokio::spawn(async move { lookup_source.lookup(&lookup_task).await }).await;

    match joined {
        Ok(Ok(candidates)) => candidates,
        Ok(Err(e)) => {
            log_warn!("Lookup failed for {}: {}", task_label(task), e);
            Vec::new()
        }
        Err(e) => {
            log_error!("Lookup for {} panicked: {}", task_label(task), e);
            Vec::new()
        }
    }
}
