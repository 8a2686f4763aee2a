//! The server supervisor: owns the ingress queue, collectors, and
//! processor; drives start/shutdown/reload lifecycle.
//!
//! Grounded on `navdoon.server.Server`, restructured so the shelf survives
//! reload (kept in an `Arc` owned by the supervisor rather than created
//! fresh by each processor instance — see SPEC_FULL.md §9 open question).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::collector::{CollectorHandle, TcpCollector, UdpCollector};
use crate::error::{Result, ShutdownTimeoutError};
use crate::processor::QueueProcessor;
use crate::queue::ingress_channel;
use crate::shelf::Shelf;
use crate::sink::Sink;

/// Sentinel request string the processor treats as "stop" when it pops it
/// from the ingress queue, mirroring `navdoon`'s `stop_process_token`.
pub const STOP_SENTINEL: &str = "\0__navdoon_stop__\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Reloading,
    Stopping,
}

/// Static description of one UDP collector to start.
#[derive(Clone)]
pub struct UdpCollectorConfig {
    pub addr: SocketAddr,
    pub buffer_size: usize,
}

/// Static description of one TCP collector to start.
#[derive(Clone)]
pub struct TcpCollectorConfig {
    pub addr: SocketAddr,
    pub chunk_size: usize,
    pub read_timeout: Duration,
    pub initial_workers: usize,
    pub worker_cap: usize,
}

/// Everything the supervisor needs to (re)build collectors, the processor,
/// and the sink set. A fresh one is supplied on every `reload`.
pub struct ServerConfig {
    pub udp_collectors: Vec<UdpCollectorConfig>,
    pub tcp_collectors: Vec<TcpCollectorConfig>,
    pub flush_interval: Duration,
    pub sink_factory: Box<dyn Fn() -> Vec<Box<dyn Sink>> + Send + Sync>,
}

pub struct Server {
    shelf: Arc<Shelf>,
    state: std::sync::Mutex<ServerState>,
    pause: Arc<Notify>,
    should_pause: Arc<AtomicBool>,
    reload_requested: Arc<AtomicBool>,
    pending_reload: std::sync::Mutex<Option<ServerConfig>>,
    stopped: Arc<Notify>,
    shutdown_budget: Duration,
}

impl Server {
    pub fn new(shutdown_budget: Duration) -> Self {
        Server {
            shelf: Arc::new(Shelf::new()),
            state: std::sync::Mutex::new(ServerState::Stopped),
            pause: Arc::new(Notify::new()),
            should_pause: Arc::new(AtomicBool::new(false)),
            reload_requested: Arc::new(AtomicBool::new(false)),
            pending_reload: std::sync::Mutex::new(None),
            stopped: Arc::new(Notify::new()),
            shutdown_budget,
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ServerState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Run the supervisor loop: start collectors + processor, block until
    /// paused (by [`Self::shutdown`] or [`Self::reload`]), tear down, and
    /// either loop back with the new config (reload) or return (shutdown).
    ///
    /// The ingress queue is created once, before the loop, and owned across
    /// reloads: each `QueueProcessor::run` hands its receiver half back when
    /// it exits, and the next iteration wires the *same* queue into the new
    /// processor and collectors instead of a fresh one, per SPEC_FULL.md
    /// §4.7 step 1 ("create the ingress queue if absent") and §4.6's "the
    /// ingress queue is NOT drained on reload".
    pub async fn run(&self, mut config: ServerConfig) -> Result<()> {
        let (mut ingress_tx, mut ingress_rx) = ingress_channel();

        loop {
            self.set_state(ServerState::Starting);
            self.should_pause.store(false, Ordering::SeqCst);

            let processor = QueueProcessor::new(self.shelf.clone(), config.flush_interval);
            processor.set_sinks((config.sink_factory)()).await;

            let processor_for_task = processor.clone();
            let rx_for_task = ingress_rx;
            let processor_task = tokio::spawn(async move {
                processor_for_task.run(rx_for_task, STOP_SENTINEL).await
            });
            if let Err(e) = processor.wait_until_processing(Duration::from_secs(30)).await {
                processor.shutdown();
                let _ = ingress_tx.send(STOP_SENTINEL.to_string());
                let _ = processor_task.await;
                self.set_state(ServerState::Stopped);
                return Err(e);
            }

            let mut collectors: Vec<CollectorHandle> = Vec::new();
            let start_failure = 'start: {
                for udp in &config.udp_collectors {
                    match UdpCollector::start(udp.addr, udp.buffer_size, ingress_tx.clone()).await
                    {
                        Ok(handle) => {
                            handle.wait_accepting().await;
                            collectors.push(handle);
                        }
                        Err(e) => break 'start Some(e),
                    }
                }
                for tcp in &config.tcp_collectors {
                    match TcpCollector::start(
                        tcp.addr,
                        tcp.chunk_size,
                        tcp.read_timeout,
                        tcp.initial_workers,
                        tcp.worker_cap,
                        ingress_tx.clone(),
                    )
                    .await
                    {
                        Ok(handle) => {
                            handle.wait_accepting().await;
                            collectors.push(handle);
                        }
                        Err(e) => break 'start Some(e),
                    }
                }
                None
            };

            if let Some(e) = start_failure {
                tracing::error!(error = %e, "collector bind failed, aborting startup");
                for handle in collectors {
                    let _ = handle.shutdown(Duration::from_secs(5)).await;
                }
                processor.shutdown();
                let _ = ingress_tx.send(STOP_SENTINEL.to_string());
                let _ = processor_task.await;
                self.set_state(ServerState::Stopped);
                return Err(e);
            }

            self.set_state(ServerState::Running);
            tracing::info!("server running");
            while !self.should_pause.load(Ordering::SeqCst) {
                self.pause.notified().await;
            }

            self.set_state(ServerState::Stopping);
            tracing::info!("server shutting down collectors and processor");

            let collector_budget = if collectors.is_empty() {
                self.shutdown_budget
            } else {
                self.shutdown_budget / collectors.len() as u32
            };
            let mut remaining = self.shutdown_budget;
            let mut timed_out = false;
            for handle in collectors {
                let start = tokio::time::Instant::now();
                if handle.shutdown(collector_budget.min(remaining)).await.is_err() {
                    timed_out = true;
                }
                remaining = remaining.saturating_sub(start.elapsed());
            }

            processor.shutdown();
            let _ = ingress_tx.send(STOP_SENTINEL.to_string());
            match tokio::time::timeout(remaining.max(Duration::from_millis(100)), processor_task)
                .await
            {
                Ok(Ok(rx)) => ingress_rx = rx,
                Ok(Err(join_err)) => {
                    tracing::error!(error = %join_err, "queue processor task panicked; rebuilding ingress queue");
                    let (tx, rx) = ingress_channel();
                    ingress_tx = tx;
                    ingress_rx = rx;
                }
                Err(_) => {
                    timed_out = true;
                    tracing::warn!(
                        "queue processor did not exit within its shutdown budget; rebuilding ingress queue"
                    );
                    let (tx, rx) = ingress_channel();
                    ingress_tx = tx;
                    ingress_rx = rx;
                }
            }

            self.set_state(ServerState::Stopped);
            self.stopped.notify_one();

            if timed_out {
                tracing::warn!("shutdown exceeded its time budget; resources released anyway");
            }

            if self.reload_requested.swap(false, Ordering::SeqCst) {
                self.set_state(ServerState::Reloading);
                if let Some(next) = self.take_reload_config() {
                    config = next;
                    continue;
                }
                continue;
            }

            if timed_out {
                return Err(ShutdownTimeoutError::Exceeded {
                    component: "server shutdown".into(),
                    budget_ms: self.shutdown_budget.as_millis() as u64,
                }
                .into());
            }
            return Ok(());
        }
    }

    /// Request graceful shutdown; returns once the supervisor reports
    /// `Stopped`, or an error if `timeout` elapses first.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.should_pause.store(true, Ordering::SeqCst);
        self.pause.notify_one();
        match tokio::time::timeout(timeout, self.stopped.notified()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(ShutdownTimeoutError::Exceeded {
                component: "server".into(),
                budget_ms: timeout.as_millis() as u64,
            }
            .into()),
        }
    }

    /// Request a reload with a new configuration. The shelf is preserved
    /// across the swap because it lives on `self`, not inside the
    /// recreated processor.
    pub fn reload(&self, next_config: ServerConfig) {
        *self
            .pending_reload
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(next_config);
        self.reload_requested.store(true, Ordering::SeqCst);
        self.should_pause.store(true, Ordering::SeqCst);
        self.pause.notify_one();
    }

    fn take_reload_config(&self) -> Option<ServerConfig> {
        self.pending_reload
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    pub fn shelf(&self) -> Arc<Shelf> {
        self.shelf.clone()
    }
}
