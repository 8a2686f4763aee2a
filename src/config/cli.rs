//! Command-line surface, mirroring the teacher's `cli::cli` builder style
//! (ported to `clap::Parser` derive) and the flag names confirmed against
//! `navdoon.app`'s argument parser.

use std::time::Duration;

use clap::Parser;

use super::{Config, LoggingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "navdoon",
    version,
    about = "StatsD-compatible metrics aggregation server",
    long_about = "Collects StatsD-formatted metrics over UDP and/or TCP, \
                   aggregates counters, gauges, sets, and timers in memory, \
                   and periodically flushes snapshots to one or more sinks \
                   (stdout, a file, a CSV file, or Graphite)."
)]
pub struct Cli {
    /// Path to a YAML configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Comma-separated `host:port` list of UDP collectors to bind.
    #[arg(long = "collect-udp")]
    pub collect_udp: Option<String>,

    /// Comma-separated `host:port` list of TCP collectors to bind.
    #[arg(long = "collect-tcp")]
    pub collect_tcp: Option<String>,

    /// Initial worker count per TCP collector.
    #[arg(long = "collector-threads")]
    pub collector_threads: Option<usize>,

    /// Maximum worker count per TCP collector; 0 means unbounded.
    #[arg(long = "collector-threads-limit")]
    pub collector_threads_limit: Option<usize>,

    /// Seconds between flushes of the in-memory shelf to sinks.
    #[arg(long = "flush-interval")]
    pub flush_interval: Option<f64>,

    /// Comma-separated `host[:port]` list of Graphite sinks to flush to.
    #[arg(long = "flush-graphite")]
    pub flush_graphite: Option<String>,

    /// Flush aggregated metrics to stdout.
    #[arg(long = "flush-stdout")]
    pub flush_stdout: bool,

    /// Comma-separated list of file paths to flush to (Graphite line format).
    #[arg(long = "flush-file")]
    pub flush_file: Option<String>,

    /// Comma-separated list of CSV file paths to flush to.
    #[arg(long = "flush-file-csv")]
    pub flush_file_csv: Option<String>,

    /// Log level: TRACE, DEBUG, INFO, WARN, or ERROR.
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Path to a log file. If set, logs are appended there in addition to
    /// any other configured sinks.
    #[arg(long = "log-file")]
    pub log_file: Option<String>,

    /// Log to stderr.
    #[arg(long = "log-stderr")]
    pub log_stderr: bool,

    /// Log to syslog. Currently unsupported; logged as a warning at startup.
    #[arg(long = "log-syslog")]
    pub log_syslog: bool,

    /// Syslog socket path, used only if `--log-syslog` is set.
    #[arg(long = "syslog-socket")]
    pub syslog_socket: Option<String>,
}

impl Cli {
    /// Apply CLI overrides onto a file-or-default `Config`, field by field.
    /// Anything left unset on the command line falls through to `base`.
    pub fn merge_into(&self, mut base: Config) -> Config {
        if let Some(udp) = &self.collect_udp {
            base.collectors.udp = split_csv(udp);
        }
        if let Some(tcp) = &self.collect_tcp {
            base.collectors.tcp = split_csv(tcp);
        }
        if let Some(threads) = self.collector_threads {
            base.collectors.threads = threads;
        }
        if let Some(limit) = self.collector_threads_limit {
            base.collectors.threads_limit = limit;
        }
        if let Some(interval) = self.flush_interval {
            base.flush.interval_seconds = interval;
        }
        if let Some(graphite) = &self.flush_graphite {
            base.sinks.graphite = split_csv(graphite);
        }
        if self.flush_stdout {
            base.sinks.stdout = true;
        }
        if let Some(file) = &self.flush_file {
            base.sinks.file = split_csv(file);
        }
        if let Some(file_csv) = &self.flush_file_csv {
            base.sinks.file_csv = split_csv(file_csv);
        }

        let logging = LoggingConfig {
            level: self.log_level.clone().unwrap_or(base.logging.level),
            file: self.log_file.clone().or(base.logging.file),
            stderr: self.log_stderr || base.logging.stderr,
            syslog: self.log_syslog || base.logging.syslog,
            syslog_socket: self.syslog_socket.clone().or(base.logging.syslog_socket),
        };
        base.logging = logging;

        base
    }

    pub fn flush_interval_duration(config: &Config) -> Duration {
        Duration::from_secs_f64(config.flush.interval_seconds)
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
