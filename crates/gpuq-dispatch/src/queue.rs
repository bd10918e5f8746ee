//! FIFO job queue with a shutdown sentinel

use tokio::sync::{mpsc, Mutex};

use gpuq_core::JobSpec;

/// Item pulled from the queue by a worker
#[derive(Debug)]
pub enum QueueItem {
    /// A job to dispatch
    Job(JobSpec),
    /// Terminal sentinel: no further work, terminate
    Shutdown,
}

/// Ordered backlog of pending jobs, shared by any number of workers.
///
/// Insertion order is submission order and items are dequeued strictly
/// in that order across all consumers. Shutdown is signaled by pushing
/// one `Shutdown` sentinel per draining worker; a worker that dequeues
/// the sentinel terminates and does not re-queue it.
pub struct JobQueue {
    tx: mpsc::UnboundedSender<QueueItem>,
    rx: Mutex<mpsc::UnboundedReceiver<QueueItem>>,
}

impl JobQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Enqueue a job at the tail
    pub fn push(&self, job: JobSpec) {
        let _ = self.tx.send(QueueItem::Job(job));
    }

    /// Enqueue one shutdown sentinel at the tail
    pub fn push_shutdown(&self) {
        let _ = self.tx.send(QueueItem::Shutdown);
    }

    /// Dequeue the next item, suspending the caller until one is
    /// available
    pub async fn pop(&self) -> QueueItem {
        // The sender half lives as long as the queue itself, so recv()
        // only suspends; it never observes a closed channel while the
        // queue is alive.
        match self.rx.lock().await.recv().await {
            Some(item) => item,
            None => QueueItem::Shutdown,
        }
    }

    /// Drain everything currently queued without blocking
    pub async fn drain(&self) -> Vec<QueueItem> {
        let mut rx = self.rx.lock().await;
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
