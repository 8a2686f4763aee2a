//! UDP collector.
//!
//! One datagram in, one request string out. A short recv timeout (~1s)
//! keeps the shutdown flag responsive even when no traffic arrives.
//! Grounded on `navdoon.collector.SocketServer` generalized from its
//! blocking-socket loop to a `tokio::net::UdpSocket` + timeout loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::error::{CollectorIoError, Result};
use crate::queue::IngressSender;

use super::{spawn_notify_ready, CollectorHandle};

pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;
const RECV_TIMEOUT: Duration = Duration::from_secs(1);

pub struct UdpCollector;

impl UdpCollector {
    /// Bind `addr` and start the receive loop on a background task.
    /// Returns once the socket is bound; the caller should still await
    /// [`CollectorHandle::wait_accepting`] per the supervisor's start
    /// sequencing, though by construction it will resolve immediately.
    pub async fn start(
        addr: SocketAddr,
        buffer_size: usize,
        queue: IngressSender,
    ) -> Result<CollectorHandle> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| CollectorIoError::BindFailed {
            kind: "udp",
            addr: addr.to_string(),
            source: e,
        })?;

        let accepting = spawn_notify_ready();
        let should_stop = Arc::new(AtomicBool::new(false));

        accepting.notify_one();

        let task_stop = should_stop.clone();
        let task = tokio::spawn(async move {
            Self::recv_loop(socket, addr, buffer_size, queue, task_stop).await;
        });

        Ok(CollectorHandle {
            accepting,
            should_stop,
            task,
        })
    }

    async fn recv_loop(
        socket: UdpSocket,
        addr: SocketAddr,
        buffer_size: usize,
        queue: IngressSender,
        should_stop: Arc<AtomicBool>,
    ) {
        let mut buf = vec![0u8; buffer_size];
        loop {
            if should_stop.load(Ordering::SeqCst) {
                break;
            }
            match tokio::time::timeout(RECV_TIMEOUT, socket.recv(&mut buf)).await {
                Ok(Ok(n)) => {
                    let request = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if queue.send(request).is_err() {
                        // processor has shut down; nothing more to do
                        break;
                    }
                }
                Ok(Err(e)) => {
                    let err = CollectorIoError::Transient {
                        kind: "udp",
                        addr: addr.to_string(),
                        source: e,
                    };
                    tracing::warn!(addr = %addr, error = %err, "udp collector io error");
                }
                Err(_elapsed) => {
                    // timeout: loop back around to re-check should_stop
                }
            }
        }
        tracing::info!(addr = %addr, "udp collector stopped");
    }
}
