//! The queue processor: drains the ingress queue, parses and aggregates
//! samples into the shelf, and fans out periodic flush snapshots to sinks.
//!
//! Grounded on `navdoon.processor.QueueProcessor`: a single loop owning a
//! `flush_interval`/`last_flush_timestamp` pair, a bounded-wait queue pop,
//! and a `flush()` that snapshots the shelf and hands the result to every
//! destination. Here destinations are fan-out tasks, one per sink, each
//! with its own unbounded queue so a stalled sink cannot block another.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{Result, ShutdownTimeoutError};
use crate::queue::{fanout_channel, recv_timeout, FanoutSender, IngressReceiver};
use crate::shelf::Shelf;
use crate::sink::Sink;
use crate::wire::parse_line;

/// Processor lifecycle: `Idle -> Processing -> Draining -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Processing,
    Draining,
}

struct FanoutWorker {
    should_stop: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

pub struct QueueProcessor {
    shelf: Arc<Shelf>,
    flush_interval: Duration,
    should_stop: Arc<AtomicBool>,
    processing: Arc<Notify>,
    state: std::sync::Mutex<ProcessorState>,
    fanout_senders: std::sync::Mutex<Vec<FanoutSender>>,
    fanout_workers: std::sync::Mutex<Vec<FanoutWorker>>,
}

impl QueueProcessor {
    pub fn new(shelf: Arc<Shelf>, flush_interval: Duration) -> Arc<Self> {
        Arc::new(QueueProcessor {
            shelf,
            flush_interval,
            should_stop: Arc::new(AtomicBool::new(false)),
            processing: Arc::new(Notify::new()),
            state: std::sync::Mutex::new(ProcessorState::Idle),
            fanout_senders: std::sync::Mutex::new(Vec::new()),
            fanout_workers: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn state(&self) -> ProcessorState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the current sink set. Signals existing fan-out workers to
    /// stop, joins them, then starts new workers for `sinks`. The shelf is
    /// untouched; the ingress queue is untouched.
    pub async fn set_sinks(self: &Arc<Self>, sinks: Vec<Box<dyn Sink>>) {
        self.stop_fanout_workers(Duration::from_secs(5)).await;

        let mut senders = self.fanout_senders.lock().unwrap_or_else(|e| e.into_inner());
        let mut workers = self.fanout_workers.lock().unwrap_or_else(|e| e.into_inner());
        senders.clear();
        workers.clear();

        for sink in sinks {
            let (tx, rx) = fanout_channel();
            let worker_stop = Arc::new(AtomicBool::new(false));
            let handle = tokio::spawn(Self::fanout_loop(sink, rx, worker_stop.clone()));
            senders.push(tx);
            workers.push(FanoutWorker {
                should_stop: worker_stop,
                handle,
            });
        }
    }

    async fn stop_fanout_workers(&self, grace: Duration) {
        let workers = {
            let mut workers = self.fanout_workers.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *workers)
        };
        for worker in &workers {
            worker.should_stop.store(true, Ordering::SeqCst);
        }
        for worker in workers {
            if tokio::time::timeout(grace, worker.handle).await.is_err() {
                tracing::warn!("fan-out worker did not exit within grace period");
            }
        }
    }

    async fn fanout_loop(
        mut sink: Box<dyn Sink>,
        mut rx: crate::queue::FanoutReceiver,
        should_stop: Arc<AtomicBool>,
    ) {
        let name = sink.name().to_string();
        loop {
            match recv_timeout(&mut rx).await {
                Ok(Some(batch)) => {
                    if let Err(e) = sink.flush(&batch).await {
                        tracing::error!(sink = %name, error = %e, "sink flush failed, batch dropped");
                    }
                }
                Ok(None) => {
                    if should_stop.load(Ordering::SeqCst) {
                        break;
                    }
                }
                Err(()) => break, // channel closed: no more snapshots will arrive
            }
        }
        // best-effort drain of whatever was already queued
        while let Ok(batch) = rx.try_recv() {
            if let Err(e) = sink.flush(&batch).await {
                tracing::error!(sink = %name, error = %e, "sink flush failed during drain");
            }
        }
    }

    /// Run the main loop until shutdown. Intended to be spawned as a
    /// background task by the server supervisor.
    ///
    /// Returns the ingress receiver back to the caller once the loop exits,
    /// so the same queue (and anything still sitting in it) can be handed
    /// to the next `QueueProcessor` instance across a reload, per SPEC_FULL.md
    /// §4.6's "the ingress queue is NOT drained on reload".
    pub async fn run(
        self: Arc<Self>,
        mut ingress: IngressReceiver,
        sentinel: &'static str,
    ) -> IngressReceiver {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ProcessorState::Processing;
        let mut last_flush = tokio::time::Instant::now();
        self.processing.notify_one();

        loop {
            if self.should_stop.load(Ordering::SeqCst) {
                break;
            }
            if last_flush.elapsed() >= self.flush_interval {
                self.flush().await;
                last_flush = tokio::time::Instant::now();
            }

            match recv_timeout(&mut ingress).await {
                Ok(Some(request)) => {
                    if request == sentinel {
                        tracing::info!("queue processor received stop sentinel");
                        break;
                    }
                    self.process_request(&request);
                }
                Ok(None) => {
                    // timeout: loop back to re-check flush interval / stop flag
                }
                Err(()) => break, // ingress queue closed
            }
        }

        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ProcessorState::Draining;
        self.flush().await;
        self.stop_fanout_workers(Duration::from_secs(5)).await;
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ProcessorState::Idle;
        ingress
    }

    fn process_request(&self, request: &str) {
        for line in request.split('\n') {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Ok(sample) => self.shelf.add(sample),
                Err(e) => tracing::error!(line = %line, error = %e, "failed to parse metric"),
            }
        }
    }

    async fn flush(&self) {
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        let snapshot = self.shelf.snapshot_and_clear().into_snapshot(now);
        let senders = self.fanout_senders.lock().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(records = snapshot.records.len(), sinks = senders.len(), "flushing");
        for sender in senders.iter() {
            let _ = sender.send(snapshot.clone());
        }
    }

    pub fn shutdown(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }

    pub async fn wait_until_processing(self: &Arc<Self>, timeout: Duration) -> Result<()> {
        if self.state() == ProcessorState::Processing {
            return Ok(());
        }
        match tokio::time::timeout(timeout, self.processing.notified()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(ShutdownTimeoutError::Exceeded {
                component: "queue processor start".into(),
                budget_ms: timeout.as_millis() as u64,
            }
            .into()),
        }
    }
}
