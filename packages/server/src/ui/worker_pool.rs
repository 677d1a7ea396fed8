//! Bounded worker pool with per-connection sequential queues.
//!
//! Every connection gets its own queue task that pulls payloads in submission
//! order. A payload is only processed while the task holds one of the pool's
//! permits, so at most `size` payloads are in flight across all connections
//! while a slow payload on one connection never delays another connection's
//! queue beyond permit availability.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinHandle,
};

/// Whether a queue keeps accepting payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueControl {
    Continue,
    Stop,
}

/// Consumer driven by one sequential queue
#[async_trait]
pub trait SequentialWorker: Send + 'static {
    /// Process one payload. Called in submission order, never concurrently.
    async fn process(&mut self, payload: String) -> QueueControl;

    /// Called exactly once after the last payload.
    async fn finish(&mut self);
}

/// Worker pool shared by all connections
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool running at most `size` payloads at once (`size` is clamped to 1).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running payload
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Start a sequential queue feeding `worker`.
    pub fn spawn_queue<W: SequentialWorker>(&self, mut worker: W) -> QueueHandle {
        let (payloads, mut rx) = mpsc::unbounded_channel::<String>();
        let permits = self.permits.clone();

        let task = tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                let Ok(_permit) = permits.acquire().await else {
                    break;
                };
                if worker.process(payload).await == QueueControl::Stop {
                    break;
                }
            }
            rx.close();

            let _permit = permits.acquire().await.ok();
            worker.finish().await;
        });

        QueueHandle { payloads, task }
    }
}

/// Submission side of one sequential queue
#[derive(Debug)]
pub struct QueueHandle {
    payloads: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl QueueHandle {
    /// Enqueue a payload. Returns `false` once the queue has stopped.
    pub fn submit(&self, payload: String) -> bool {
        self.payloads.send(payload).is_ok()
    }

    /// Stop accepting payloads, drain the queue and wait for `finish`.
    pub async fn shutdown(self) {
        let Self { payloads, task } = self;
        drop(payloads);
        if let Err(e) = task.await {
            tracing::error!("Sequential queue task failed: {}", e);
        }
    }
}
