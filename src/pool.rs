//! Elastic worker pool for the TCP collector.
//!
//! Keeps `baseline` permanent workers popping tasks from an internal queue.
//! When the queue's observed depth exceeds `spawn_threshold * baseline` and
//! the pool has room under `cap` (`0` = unbounded), one temporary worker is
//! spawned; it exits as soon as the queue drains. Shaped after the
//! teacher's `WorkerManager`/`Workers` lifecycle (`Arc<AtomicBool>` running
//! flag, `Vec<JoinHandle<()>>`, bounded `join_all`), generalized from a
//! fixed-size pool to an elastic one per spec §4.5.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, ShutdownTimeoutError};

type Task = Pin<Box<dyn Future<Output = ()> + Send>>;

const DEFAULT_SPAWN_THRESHOLD: f64 = 0.5;

struct Shared {
    running: AtomicBool,
    depth: AtomicUsize,
    worker_count: AtomicUsize,
}

/// A bounded-elastic pool of task runners.
pub struct ElasticWorkerPool {
    shared: Arc<Shared>,
    task_tx: mpsc::UnboundedSender<Task>,
    task_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Task>>>,
    baseline: usize,
    cap: usize,
    spawn_threshold: f64,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ElasticWorkerPool {
    /// `baseline` permanent workers, `cap == 0` meaning unbounded.
    pub fn new(baseline: usize, cap: usize) -> Arc<Self> {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let pool = Arc::new(ElasticWorkerPool {
            shared: Arc::new(Shared {
                running: AtomicBool::new(true),
                depth: AtomicUsize::new(0),
                worker_count: AtomicUsize::new(0),
            }),
            task_tx,
            task_rx: Arc::new(tokio::sync::Mutex::new(task_rx)),
            baseline: baseline.max(1),
            cap,
            spawn_threshold: DEFAULT_SPAWN_THRESHOLD,
            handles: std::sync::Mutex::new(Vec::new()),
        });
        for _ in 0..pool.baseline {
            pool.spawn_permanent_worker();
        }
        pool
    }

    fn spawn_permanent_worker(self: &Arc<Self>) {
        let pool = self.clone();
        pool.shared.worker_count.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            pool.worker_loop(false).await;
        });
        self.handles.lock().unwrap_or_else(|e| e.into_inner()).push(handle);
    }

    fn spawn_temporary_worker(self: &Arc<Self>) {
        let pool = self.clone();
        pool.shared.worker_count.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            pool.worker_loop(true).await;
        });
    }

    async fn worker_loop(self: Arc<Self>, temporary: bool) {
        loop {
            if !self.shared.running.load(Ordering::SeqCst) {
                break;
            }
            let task = {
                let mut rx = self.task_rx.lock().await;
                tokio::time::timeout(Duration::from_millis(500), rx.recv()).await
            };
            match task {
                Ok(Some(task)) => {
                    self.shared.depth.fetch_sub(1, Ordering::SeqCst);
                    task.await;
                    if temporary && self.shared.depth.load(Ordering::SeqCst) == 0 {
                        break;
                    }
                }
                Ok(None) => break, // channel closed
                Err(_elapsed) => {
                    if temporary {
                        break;
                    }
                    // permanent workers just poll again and re-check `running`
                }
            }
        }
        self.shared.worker_count.fetch_sub(1, Ordering::SeqCst);
    }

    /// Enqueue one task, spawning a temporary worker if the queue is deep
    /// relative to the baseline and there is room under `cap`.
    pub fn submit<F>(self: &Arc<Self>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let depth = self.shared.depth.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.task_tx.send(Box::pin(task));

        let workers = self.shared.worker_count.load(Ordering::SeqCst);
        let under_cap = self.cap == 0 || workers < self.cap;
        if depth as f64 > self.spawn_threshold * self.baseline as f64 && under_cap {
            self.spawn_temporary_worker();
        }
    }

    pub fn worker_count(&self) -> usize {
        self.shared.worker_count.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Signal all workers to stop once their current task and queue poll
    /// complete, then wait up to `timeout` for them to exit.
    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        self.shared.running.store(false, Ordering::SeqCst);
        let deadline = tokio::time::Instant::now() + timeout;
        while self.shared.worker_count.load(Ordering::SeqCst) > 0 {
            if tokio::time::Instant::now() >= deadline {
                return Err(ShutdownTimeoutError::Exceeded {
                    component: "tcp worker pool".into(),
                    budget_ms: timeout.as_millis() as u64,
                }
                .into());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Ok(())
    }
}
