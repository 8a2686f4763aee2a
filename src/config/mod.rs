//! Configuration: structures, file loading, validation, and address
//! parsing. Grounded on the teacher's `config/mod.rs` shape
//! (`Config`/`load_config`/`default_config`/`validate_config`), adapted
//! from YAML attack parameters to the collector/flush/sink sections of
//! spec §4.8, and on `navdoon.app`'s flag surface for what belongs where.

pub mod cli;

use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub const DEFAULT_STATSD_PORT: u16 = 8125;
pub const DEFAULT_GRAPHITE_PORT: u16 = 2003;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub collectors: CollectorsConfig,
    pub flush: FlushConfig,
    pub sinks: SinksConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CollectorsConfig {
    /// `host:port` pairs for UDP collectors.
    pub udp: Vec<String>,
    /// `host:port` pairs for TCP collectors.
    pub tcp: Vec<String>,
    /// Initial TCP worker count per collector.
    pub threads: usize,
    /// TCP worker cap per collector; 0 = unbounded.
    pub threads_limit: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct FlushConfig {
    pub interval_seconds: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct SinksConfig {
    /// `host[:port]` pairs for Graphite sinks.
    pub graphite: Vec<String>,
    pub stdout: bool,
    pub file: Vec<String>,
    pub file_csv: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub stderr: bool,
    pub syslog: bool,
    pub syslog_socket: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        default_config()
    }
}

/// A single default UDP collector on `127.0.0.1:8125`, flush every 10s, no
/// sinks, log level INFO — matches spec §6's "if no collector flag is
/// given" default.
pub fn default_config() -> Config {
    Config {
        collectors: CollectorsConfig {
            udp: vec![format!("127.0.0.1:{DEFAULT_STATSD_PORT}")],
            tcp: vec![],
            threads: num_cpus::get(),
            threads_limit: 0,
        },
        flush: FlushConfig {
            interval_seconds: 10.0,
        },
        sinks: SinksConfig::default(),
        logging: LoggingConfig {
            level: "INFO".to_string(),
            file: None,
            stderr: true,
            syslog: false,
            syslog_socket: None,
        },
    }
}

/// Load configuration from a YAML file; a missing file falls back to
/// defaults (mirrors `navdoon.app`'s tolerant config-file handling).
pub fn load_config(path: Option<&str>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(default_config());
    };
    if !Path::new(path).exists() {
        tracing::info!(path, "config file not found, using defaults");
        return Ok(default_config());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_string(),
        source: e,
    })?;
    let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseFailed {
        path: path.to_string(),
        source: e,
    })?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.flush.interval_seconds <= 0.0 {
        return Err(ConfigError::InvalidFlushInterval(config.flush.interval_seconds).into());
    }
    if config.collectors.threads == 0 {
        return Err(ConfigError::InvalidWorkerCount(config.collectors.threads).into());
    }
    if config.collectors.threads_limit != 0 && config.collectors.threads_limit < config.collectors.threads {
        return Err(ConfigError::InvalidWorkerLimit {
            threads: config.collectors.threads,
            limit: config.collectors.threads_limit,
        }
        .into());
    }
    for spec in config.collectors.udp.iter().chain(config.collectors.tcp.iter()) {
        parse_address_list(spec, DEFAULT_STATSD_PORT)?;
    }
    for spec in &config.sinks.graphite {
        parse_address_list(spec, DEFAULT_GRAPHITE_PORT)?;
    }
    Ok(())
}

/// Parse a comma-separated list of `host[:port]` entries. Host defaults to
/// `127.0.0.1`; port defaults to `default_port`. All ports across the list
/// must be unique and within `[1, 65535]`.
pub fn parse_address_list(spec: &str, default_port: u16) -> Result<Vec<SocketAddr>> {
    let mut seen_ports = std::collections::HashSet::new();
    let mut addrs = Vec::new();

    for entry in spec.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (host, port) = split_host_port(entry, default_port, spec)?;
        let ip: IpAddr = host.parse().map_err(|_| {
            ConfigError::InvalidAddress(spec.to_string(), format!("invalid host '{host}'"))
        })?;
        if !seen_ports.insert(port) {
            return Err(ConfigError::DuplicatePort {
                spec: spec.to_string(),
                port,
            }
            .into());
        }
        addrs.push(SocketAddr::new(ip, port));
    }

    if addrs.is_empty() {
        return Err(ConfigError::InvalidAddress(spec.to_string(), "empty address list".into()).into());
    }
    Ok(addrs)
}

fn split_host_port(entry: &str, default_port: u16, spec: &str) -> Result<(String, u16)> {
    let (host, port_str) = match entry.rsplit_once(':') {
        Some((h, p)) => (if h.is_empty() { "127.0.0.1" } else { h }, Some(p)),
        None => (entry, None),
    };

    let port = match port_str {
        None => default_port,
        Some(p) => {
            let parsed: i64 = p.parse().map_err(|_| {
                ConfigError::InvalidAddress(spec.to_string(), format!("invalid port '{p}'"))
            })?;
            if parsed < 1 || parsed > 65535 {
                return Err(ConfigError::PortOutOfRange {
                    spec: spec.to_string(),
                    port: parsed,
                }
                .into());
            }
            parsed as u16
        }
    };

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_host_and_port() {
        let addrs = parse_address_list("", DEFAULT_STATSD_PORT);
        assert!(addrs.is_err());
        let addrs = parse_address_list("9125", DEFAULT_STATSD_PORT).unwrap();
        assert_eq!(addrs[0].to_string(), "127.0.0.1:9125");
    }

    #[test]
    fn explicit_host_and_port() {
        let addrs = parse_address_list("0.0.0.0:9000", DEFAULT_STATSD_PORT).unwrap();
        assert_eq!(addrs[0].to_string(), "0.0.0.0:9000");
    }

    #[test]
    fn multiple_unique_ports() {
        let addrs = parse_address_list("127.0.0.1:9000,127.0.0.1:9001", DEFAULT_STATSD_PORT).unwrap();
        assert_eq!(addrs.len(), 2);
    }

    #[test]
    fn rejects_duplicate_ports() {
        assert!(parse_address_list("127.0.0.1:9000,127.0.0.1:9000", DEFAULT_STATSD_PORT).is_err());
    }

    #[test]
    fn rejects_out_of_range_ports() {
        assert!(parse_address_list("127.0.0.1:0", DEFAULT_STATSD_PORT).is_err());
        assert!(parse_address_list("127.0.0.1:65536", DEFAULT_STATSD_PORT).is_err());
        assert!(parse_address_list("127.0.0.1:-1", DEFAULT_STATSD_PORT).is_err());
    }

    #[test]
    fn default_config_has_one_udp_collector() {
        let config = default_config();
        assert_eq!(config.collectors.udp, vec!["127.0.0.1:8125".to_string()]);
        validate_config(&config).unwrap();
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = load_config(Some("/nonexistent/path/to/config.yaml")).unwrap();
        assert_eq!(config, default_config());
    }

    #[test]
    fn rejects_zero_flush_interval() {
        let mut config = default_config();
        config.flush.interval_seconds = 0.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_worker_limit_below_worker_count() {
        let mut config = default_config();
        config.collectors.threads = 4;
        config.collectors.threads_limit = 2;
        assert!(validate_config(&config).is_err());
    }
}
