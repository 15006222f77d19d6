//! Single-worker job queue.
//!
//! One worker owns the receiver and runs jobs strictly one at a time, so
//! reconciliation tasks and synchronous publications never interleave their
//! writes. Handles are cheap to clone.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::engine::{Engine, TaskOutcome};
use crate::error::{Error, Result};
use crate::models::{BaseLocale, BaseLocaleId};
use crate::tasks::TaskKind;

const QUEUE_CAPACITY: usize = 64;

/// A queued job and, for explicit requests, where to send its result
enum Job {
    /// Pushed by a timer; counted in `pending`
    Scheduled(TaskKind),
    Run(TaskKind, oneshot::Sender<Result<TaskOutcome>>),
    Publish(BaseLocaleId, oneshot::Sender<Result<BaseLocale>>),
}

#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Job>,
    pending: Arc<Mutex<HashSet<TaskKind>>>,
}

impl TaskQueue {
    /// Spawn the worker; it stops on shutdown or when every handle is dropped
    pub fn start(engine: Engine, shutdown: broadcast::Receiver<()>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let pending = Arc::new(Mutex::new(HashSet::new()));

        let worker = tokio::spawn(worker_task(engine, rx, pending.clone(), shutdown));
        (Self { tx, pending }, worker)
    }

    /// Enqueue a periodic task without waiting for it.
    ///
    /// Returns false when the same task is already waiting or the queue is
    /// full.
    pub fn push(&self, kind: TaskKind) -> bool {
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if !pending.insert(kind) {
                tracing::debug!(task = %kind, "Task already queued, skipping");
                return false;
            }
        }

        if let Err(error) = self.tx.try_send(Job::Scheduled(kind)) {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&kind);
            tracing::warn!(task = %kind, "Could not enqueue task: {}", error);
            return false;
        }
        true
    }

    /// Run a task through the queue and wait for its outcome
    pub async fn run(&self, kind: TaskKind) -> Result<TaskOutcome> {
        let (respond_to, response) = oneshot::channel();
        self.submit(Job::Run(kind, respond_to)).await?;
        response.await.map_err(|_| Error::QueueClosed)?
    }

    /// Publish a BaseLocale through the queue and wait for the result
    pub async fn publish(&self, id: BaseLocaleId) -> Result<BaseLocale> {
        let (respond_to, response) = oneshot::channel();
        self.submit(Job::Publish(id, respond_to)).await?;
        response.await.map_err(|_| Error::QueueClosed)?
    }

    async fn submit(&self, job: Job) -> Result<()> {
        self.tx.send(job).await.map_err(|_| Error::QueueClosed)
    }
}

async fn worker_task(
    engine: Engine,
    mut rx: mpsc::Receiver<Job>,
    pending: Arc<Mutex<HashSet<TaskKind>>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            maybe_job = rx.recv() => {
                let Some(job) = maybe_job else { break };
                run_job(&engine, &pending, job).await;
            }
        }
    }

    tracing::debug!("Task queue worker stopped");
}

async fn run_job(engine: &Engine, pending: &Mutex<HashSet<TaskKind>>, job: Job) {
    match job {
        Job::Scheduled(kind) => {
            pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&kind);
            if let Err(error) = engine.run_task(kind).await {
                tracing::error!(task = %kind, "Queued task failed: {}", error);
            }
        }
        Job::Run(kind, respond_to) => {
            let _ = respond_to.send(engine.run_task(kind).await);
        }
        Job::Publish(id, respond_to) => {
            let _ = respond_to.send(engine.exec(&id).await);
        }
    }
}
