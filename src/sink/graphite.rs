//! Graphite line-protocol sink.
//!
//! Serializes each record as `<name> <value> <timestamp>\n` over a
//! persistent TCP connection, reconnecting up to a configured retry cap on
//! I/O error before giving up on the current batch. Grounded on
//! `navdoon.destination.graphite.Graphite`: lazy connect, drop and
//! reconnect on send failure, bounded retries.

use std::io;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::error::SinkError;
use crate::shelf::Snapshot;

use super::Sink;

/// `None` means unlimited retries, matching the teacher's `max_retry: None`
/// default; callers should normally pass a finite cap (the binary crate
/// always does, see `main::build_server_config`).
pub struct GraphiteSink {
    host: String,
    port: u16,
    max_retries: Option<u32>,
    conn: Option<TcpStream>,
    label: String,
}

impl GraphiteSink {
    pub fn new(host: impl Into<String>, port: u16, max_retries: Option<u32>) -> Self {
        let host = host.into();
        let label = format!("graphite:{host}:{port}");
        GraphiteSink {
            host,
            port,
            max_retries,
            conn: None,
            label,
        }
    }

    async fn connect(&mut self) -> Result<(), io::Error> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        self.conn = Some(stream);
        Ok(())
    }

    fn render(batch: &Snapshot) -> String {
        let mut out = String::new();
        for record in &batch.records {
            out.push_str(&format!("{} {} {}\n", record.name, record.value, record.timestamp));
        }
        out
    }
}

#[async_trait]
impl Sink for GraphiteSink {
    fn name(&self) -> &str {
        &self.label
    }

    async fn flush(&mut self, batch: &Snapshot) -> Result<(), SinkError> {
        if batch.records.is_empty() {
            return Ok(());
        }
        let payload = Self::render(batch);
        let mut attempts = 0u32;
        loop {
            if self.conn.is_none() {
                if let Err(e) = self.connect().await {
                    tracing::warn!(sink = %self.label, attempt = attempts, error = %e, "graphite connect failed");
                }
            }
            if let Some(conn) = self.conn.as_mut() {
                match conn.write_all(payload.as_bytes()).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        tracing::warn!(sink = %self.label, error = %e, "graphite write failed, reconnecting");
                        self.conn = None;
                    }
                }
            }
            attempts += 1;
            if let Some(max) = self.max_retries {
                if attempts >= max {
                    return Err(SinkError::RetriesExhausted {
                        sink: self.label.clone(),
                        retries: max,
                    });
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shelf::Record;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn flush_sends_graphite_line_format_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            conn.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let mut sink = GraphiteSink::new(addr.ip().to_string(), addr.port(), Some(3));
        let batch = Snapshot {
            records: vec![Record {
                name: "event".into(),
                value: 3.0,
                timestamp: 1700000000.0,
            }],
        };
        sink.flush(&batch).await.unwrap();
        drop(sink); // closes the connection so the server's read_to_end completes

        let received = server.await.unwrap();
        assert_eq!(received, b"event 3 1700000000\n");
    }

    #[tokio::test]
    async fn flush_of_empty_batch_is_a_no_op() {
        let mut sink = GraphiteSink::new("127.0.0.1", 1, Some(1));
        let batch = Snapshot::default();
        // No connection is ever attempted for an empty batch, so this must
        // not try (and fail) to dial the bogus port.
        sink.flush(&batch).await.unwrap();
    }
}
