// src/ratelimit.rs
// Admission controller for one upstream client: at most `limit` task
// executions per trailing 60-second window. Queued tasks are admitted
// FIFO by a drain task that owns the window state outright; callers only
// talk to it over a channel. Admission is serialized, execution is not:
// an admitted task is spawned so sibling upstream calls still overlap.
//
// There is deliberately no load shedding: every submitted task runs
// eventually, with no bound on queue wait.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);
const DRAIN_BACKOFF: Duration = Duration::from_secs(1);

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    queue: mpsc::UnboundedSender<Job>,
}

impl RateLimiter {
    /// Spawn the drain task and return a handle to its queue.
    pub fn new(limit: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(rx, limit.max(1)));
        Self { queue: tx }
    }

    /// Queue `task` and wait for its outcome. The task only starts once
    /// a window slot is free; its result (or error) comes back unchanged.
    pub async fn submit<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = tx.send(task.await);
        });
        // The drain task outlives every sender, so this cannot fail while
        // a caller still holds the limiter.
        self.queue.send(job).expect("admission queue closed");
        rx.await.expect("admitted task dropped before completion")
    }
}

async fn drain(mut queue: mpsc::UnboundedReceiver<Job>, limit: usize) {
    let mut window: VecDeque<Instant> = VecDeque::new();

    while let Some(job) = queue.recv().await {
        loop {
            let now = Instant::now();
            while window
                .front()
                .is_some_and(|t| now.duration_since(*t) >= WINDOW)
            {
                window.pop_front();
            }
            if window.len() < limit {
                break;
            }
            tracing::debug!(queued = queue.len(), occupied = window.len(), "rate window full, backing off");
            tokio::time::sleep(DRAIN_BACKOFF).await;
        }
        window.push_back(Instant::now());
        tokio::spawn(job);
    }
}
