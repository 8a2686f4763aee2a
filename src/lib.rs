//! navdoon-rs: a StatsD-compatible metrics aggregation server.
//!
//! Accepts StatsD-formatted samples over UDP and/or TCP, aggregates
//! counters, gauges, sets, and timers in memory, and periodically flushes
//! snapshots to one or more sinks (stdout, a file, a CSV file, or
//! Graphite).
//!
//! # Example
//!
//! ```no_run
//! use navdoon::server::{Server, ServerConfig, UdpCollectorConfig};
//! use navdoon::sink::{Sink, StdoutSink};
//! use std::time::Duration;
//!
//! # async fn example() -> navdoon::Result<()> {
//! let server = Server::new(Duration::from_secs(30));
//! let config = ServerConfig {
//!     udp_collectors: vec![UdpCollectorConfig {
//!         addr: "127.0.0.1:8125".parse().unwrap(),
//!         buffer_size: 8 * 1024,
//!     }],
//!     tcp_collectors: vec![],
//!     flush_interval: Duration::from_secs(10),
//!     sink_factory: Box::new(|| -> Vec<Box<dyn Sink>> { vec![Box::new(StdoutSink::new())] }),
//! };
//! server.run(config).await?;
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod logging;
pub mod pool;
pub mod processor;
pub mod queue;
pub mod server;
pub mod shelf;
pub mod sink;
pub mod wire;

pub use error::{Error, Result};
pub use server::{Server, ServerConfig};
pub use shelf::Shelf;
pub use sink::Sink;

use std::sync::Arc;

/// Shared reference to the in-memory aggregation shelf.
pub type ShelfRef = Arc<Shelf>;
