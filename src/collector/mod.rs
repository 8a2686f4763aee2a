//! Ingress collectors: UDP and TCP front-ends that turn socket bytes into
//! request strings on the shared ingress queue.

mod tcp;
mod udp;

pub use tcp::{TcpCollector, DEFAULT_CHUNK_SIZE, DEFAULT_READ_TIMEOUT};
pub use udp::{UdpCollector, DEFAULT_BUFFER_SIZE};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::Result;

/// Shared lifecycle surface every collector exposes to the [`crate::server::Server`]
/// supervisor: a readiness signal raised right after bind, and a single
/// boolean shutdown flag polled at every bounded wait.
pub struct CollectorHandle {
    pub(crate) accepting: Arc<Notify>,
    pub(crate) should_stop: Arc<std::sync::atomic::AtomicBool>,
    pub(crate) task: tokio::task::JoinHandle<()>,
}

impl CollectorHandle {
    /// Wait for the collector to report that it has bound its socket and
    /// begun accepting traffic.
    pub async fn wait_accepting(&self) {
        self.accepting.notified().await;
    }

    /// Signal the collector to stop, then wait up to `timeout` for its task
    /// to finish.
    pub async fn shutdown(self, timeout: Duration) -> Result<()> {
        self.should_stop.store(true, std::sync::atomic::Ordering::SeqCst);
        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "collector task panicked");
                Ok(())
            }
            Err(_elapsed) => Err(crate::error::ShutdownTimeoutError::Exceeded {
                component: "collector".into(),
                budget_ms: timeout.as_millis() as u64,
            }
            .into()),
        }
    }
}

pub(crate) fn spawn_notify_ready() -> Arc<Notify> {
    Arc::new(Notify::new())
}
