//! Stdout sink: writes the Graphite line format to standard output.
//!
//! Grounded on `navdoon.destination.stream.Stdout`, which is a thin
//! specialization of `Stream` over `sys.stdout`.

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};

use crate::error::SinkError;
use crate::shelf::Snapshot;

use super::Sink;

pub struct StdoutSink {
    out: Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        StdoutSink {
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn flush(&mut self, batch: &Snapshot) -> Result<(), SinkError> {
        for record in &batch.records {
            let line = format!("{} {} {}\n", record.name, record.value, record.timestamp);
            self.out
                .write_all(line.as_bytes())
                .await
                .map_err(|e| SinkError::Io {
                    sink: "stdout".into(),
                    source: e,
                })?;
        }
        self.out.flush().await.map_err(|e| SinkError::Io {
            sink: "stdout".into(),
            source: e,
        })
    }
}
