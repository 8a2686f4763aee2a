//! The sink contract and built-in sink implementations.
//!
//! A sink is anything that can receive one flush batch at a time. Sinks are
//! independent: a slow or failing sink must never block another sink or the
//! ingress path. The processor enforces that by giving each sink its own
//! fan-out task and queue (see [`crate::processor`]).

mod file;
mod graphite;
mod stdout;

pub use file::{FileCsvSink, FileSink};
pub use graphite::GraphiteSink;
pub use stdout::StdoutSink;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::shelf::Snapshot;

/// `Flush(batch) -> ok|err`. Implementors own whatever connection or file
/// handle they need for the lifetime of one `flush` call; the processor
/// guarantees exclusive access (one fan-out task per sink).
#[async_trait]
pub trait Sink: Send + Sync {
    /// A short, stable name used in log messages.
    fn name(&self) -> &str;

    async fn flush(&mut self, batch: &Snapshot) -> Result<(), SinkError>;
}
