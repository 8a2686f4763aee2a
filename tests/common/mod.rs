//! Shared helpers for integration tests: spin up a `Server` bound to
//! fixed loopback ports with a capturing sink, and poll for flushed
//! snapshots.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use navdoon::collector::{DEFAULT_BUFFER_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_READ_TIMEOUT};
use navdoon::error::SinkError;
use navdoon::server::{Server, ServerConfig, TcpCollectorConfig, UdpCollectorConfig};
use navdoon::shelf::Snapshot;
use navdoon::sink::Sink;

/// A sink that appends every flushed batch to a shared buffer instead of
/// writing anywhere, so tests can inspect what the processor produced.
pub struct CapturingSink {
    batches: Arc<Mutex<Vec<Snapshot>>>,
}

#[async_trait]
impl Sink for CapturingSink {
    fn name(&self) -> &str {
        "capture"
    }

    async fn flush(&mut self, batch: &Snapshot) -> Result<(), SinkError> {
        self.batches.lock().unwrap().push(batch.clone());
        Ok(())
    }
}

pub fn loopback(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}

/// Start a server bound to the given UDP/TCP ports with one capturing
/// sink. Returns the server, its supervisor task handle, and the shared
/// batch buffer.
pub async fn start_server(
    udp_ports: &[u16],
    tcp_ports: &[u16],
    flush_interval: Duration,
) -> (
    Arc<Server>,
    tokio::task::JoinHandle<navdoon::Result<()>>,
    Arc<Mutex<Vec<Snapshot>>>,
) {
    let server = Arc::new(Server::new(Duration::from_secs(10)));
    let batches: Arc<Mutex<Vec<Snapshot>>> = Arc::new(Mutex::new(Vec::new()));

    let udp_collectors = udp_ports
        .iter()
        .map(|&port| UdpCollectorConfig {
            addr: loopback(port),
            buffer_size: DEFAULT_BUFFER_SIZE,
        })
        .collect();
    let tcp_collectors = tcp_ports
        .iter()
        .map(|&port| TcpCollectorConfig {
            addr: loopback(port),
            chunk_size: DEFAULT_CHUNK_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            initial_workers: 2,
            worker_cap: 4,
        })
        .collect();

    let factory_batches = batches.clone();
    let config = ServerConfig {
        udp_collectors,
        tcp_collectors,
        flush_interval,
        sink_factory: Box::new(move || -> Vec<Box<dyn Sink>> {
            vec![Box::new(CapturingSink {
                batches: factory_batches.clone(),
            })]
        }),
    };

    let run_server = server.clone();
    let handle = tokio::spawn(async move { run_server.run(config).await });

    // give the collectors time to bind before the test starts sending
    tokio::time::sleep(Duration::from_millis(100)).await;

    (server, handle, batches)
}

pub async fn send_udp(port: u16, payload: &str) {
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(payload.as_bytes(), loopback(port)).await.unwrap();
}

pub async fn send_tcp(port: u16, payload: &str) {
    use tokio::io::AsyncWriteExt;
    let mut stream = tokio::net::TcpStream::connect(loopback(port)).await.unwrap();
    stream.write_all(payload.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
}

/// Wait until at least one batch has been captured, or `timeout` elapses.
pub async fn wait_for_batch(
    batches: &Arc<Mutex<Vec<Snapshot>>>,
    timeout: Duration,
) -> Option<Snapshot> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(batch) = batches
            .lock()
            .unwrap()
            .iter()
            .find(|b| !b.records.is_empty())
            .cloned()
        {
            return Some(batch);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub fn value_of<'a>(snapshot: &'a Snapshot, name: &str) -> Option<f64> {
    snapshot.records.iter().find(|r| r.name == name).map(|r| r.value)
}
