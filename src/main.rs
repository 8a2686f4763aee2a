//! navdoon binary: parses the CLI, loads configuration, wires up the
//! server supervisor, and drives its lifecycle from OS signals.

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use navdoon::collector::{DEFAULT_BUFFER_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_READ_TIMEOUT};
use navdoon::config::cli::Cli;
use navdoon::config::{load_config, parse_address_list, Config, DEFAULT_GRAPHITE_PORT, DEFAULT_STATSD_PORT};
use navdoon::error::Result;
use navdoon::server::{Server, ServerConfig, TcpCollectorConfig, UdpCollectorConfig};
use navdoon::sink::{FileCsvSink, FileSink, GraphiteSink, Sink, StdoutSink};

const SHUTDOWN_BUDGET: Duration = Duration::from_secs(30);

fn build_server_config(config: &Config) -> Result<ServerConfig> {
    let mut udp_collectors = Vec::new();
    for spec in &config.collectors.udp {
        for addr in parse_address_list(spec, DEFAULT_STATSD_PORT)? {
            udp_collectors.push(UdpCollectorConfig {
                addr,
                buffer_size: DEFAULT_BUFFER_SIZE,
            });
        }
    }

    let mut tcp_collectors = Vec::new();
    for spec in &config.collectors.tcp {
        for addr in parse_address_list(spec, DEFAULT_STATSD_PORT)? {
            tcp_collectors.push(TcpCollectorConfig {
                addr,
                chunk_size: DEFAULT_CHUNK_SIZE,
                read_timeout: DEFAULT_READ_TIMEOUT,
                initial_workers: config.collectors.threads,
                worker_cap: config.collectors.threads_limit,
            });
        }
    }

    let sinks_config = config.sinks.clone();
    let sink_factory = move || -> Vec<Box<dyn Sink>> {
        let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
        if sinks_config.stdout {
            sinks.push(Box::new(StdoutSink::new()));
        }
        for path in &sinks_config.file {
            sinks.push(Box::new(FileSink::new(path.clone())));
        }
        for path in &sinks_config.file_csv {
            sinks.push(Box::new(FileCsvSink::new(path.clone())));
        }
        for spec in &sinks_config.graphite {
            match parse_address_list(spec, DEFAULT_GRAPHITE_PORT) {
                Ok(addrs) => {
                    for addr in addrs {
                        sinks.push(Box::new(GraphiteSink::new(addr.ip().to_string(), addr.port(), Some(5))));
                    }
                }
                Err(e) => tracing::error!(spec, error = %e, "skipping invalid graphite sink"),
            }
        }
        sinks
    };

    Ok(ServerConfig {
        udp_collectors,
        tcp_collectors,
        flush_interval: Duration::from_secs_f64(config.flush.interval_seconds),
        sink_factory: Box::new(sink_factory),
    })
}

async fn run_application() -> Result<()> {
    let cli = Cli::parse();
    let base_config = load_config(cli.config.as_deref())?;
    let config = cli.merge_into(base_config);
    navdoon::config::validate_config(&config)?;

    let _logging_guard = navdoon::logging::init(&config.logging);
    tracing::info!(udp = ?config.collectors.udp, tcp = ?config.collectors.tcp, "starting navdoon");

    let server = Arc::new(Server::new(SHUTDOWN_BUDGET));
    let server_config = build_server_config(&config)?;

    let run_handle = {
        let server = server.clone();
        tokio::spawn(async move { server.run(server_config).await })
    };

    loop {
        match wait_for_signal().await {
            Signal::Shutdown => {
                tracing::info!("shutdown signal received");
                server.shutdown(SHUTDOWN_BUDGET).await?;
                break;
            }
            Signal::Reload => {
                tracing::info!("reload signal received");
                match load_config(cli.config.as_deref()) {
                    Ok(base) => {
                        let reloaded = cli.merge_into(base);
                        if let Err(e) = navdoon::config::validate_config(&reloaded) {
                            tracing::error!(error = %e, "reload aborted: invalid config");
                            continue;
                        }
                        match build_server_config(&reloaded) {
                            Ok(new_server_config) => server.reload(new_server_config),
                            Err(e) => tracing::error!(error = %e, "reload aborted: invalid config"),
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "reload aborted: failed to reload config"),
                }
            }
        }
    }

    run_handle.await.map_err(|e| {
        tracing::error!(error = %e, "server task panicked");
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })??;

    Ok(())
}

/// What an incoming OS signal means for the supervisor loop above.
enum Signal {
    Shutdown,
    Reload,
}

#[cfg(unix)]
async fn wait_for_signal() -> Signal {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

    tokio::select! {
        _ = sigint.recv() => Signal::Shutdown,
        _ = sigterm.recv() => Signal::Shutdown,
        _ = sighup.recv() => Signal::Reload,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Signal {
    let _ = tokio::signal::ctrl_c().await;
    Signal::Shutdown
}

#[tokio::main]
async fn main() {
    if let Err(e) = run_application().await {
        eprintln!("navdoon: {e}");
        tracing::error!(error = %e, "fatal error");
        process::exit(1);
    }
}
