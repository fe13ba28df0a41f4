//! readoutd - digitizer readout daemon
//!
//! Reads events from the configured digitizers (simulated by a pulser
//! when no hardware is attached), packs them into sealed batches, and
//! fans them out to the configured sinks.
//!
//! # Usage
//!
//! ```bash
//! readoutd
//! readoutd --config configs/readout.toml
//! readoutd --run-id 42 --log-level debug
//! ```

mod pulser;

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use readout_config::{Config, LogFormat, SinkConfig};
use readout_format::{net_payload_budget, Header};
use readout_pipeline::{Dispatcher, Producer, ProducerConfig, SinkHandle, SinkId};
use readout_sinks::{drive, ColumnarConfig, ColumnarSink, NullSink, TextSink, UdpSink};

use pulser::Pulser;

/// Batches buffered per sink channel
const SINK_QUEUE_DEPTH: usize = 1024;

/// Simulated trigger period per digitizer
const TRIGGER_PERIOD: Duration = Duration::from_micros(500);

/// Grace period for tasks to drain at shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Config used when no file is found: one pulser into a text file.
const FALLBACK_CONFIG: &str = r#"
[[acquisition.digitizers]]
id = 1

[sinks.text]
type = "text"
"#;

/// readoutd - digitizer readout daemon
#[derive(Parser, Debug)]
#[command(name = "readoutd")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Run id override
    #[arg(short, long)]
    run_id: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or_else(|| config.log.level.as_str());
    init_logging(level, config.log.format)?;

    let run_id = cli
        .run_id
        .or(config.acquisition.run_id)
        .unwrap_or_else(epoch_run_id);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        run_id,
        digitizers = config.acquisition.enabled_digitizers().count(),
        sinks = config.enabled_sinks().len(),
        "readout starting"
    );

    if let Err(e) = run_daemon(config, run_id).await {
        error!(error = %e, "daemon error");
        return Err(e);
    }

    info!(run_id, "readout shutdown complete");
    Ok(())
}

/// Load configuration from the CLI path, a default location, or the
/// built-in fallback
fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Config::from_file(path).context("failed to load configuration");
    }

    for candidate in [
        Path::new("configs/readout.toml"),
        Path::new("readout.toml"),
    ] {
        if candidate.exists() {
            return Config::from_file(candidate).context("failed to load configuration");
        }
    }

    use std::str::FromStr;
    Config::from_str(FALLBACK_CONFIG).context("failed to build fallback configuration")
}

/// Initialize the tracing subscriber
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Console => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }

    Ok(())
}

/// Run id derived from the wall clock, matching how runs are usually
/// numbered when the operator does not pick one
fn epoch_run_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Main daemon run loop: sinks, dispatcher, producers, shutdown drain
async fn run_daemon(config: Config, run_id: u64) -> Result<()> {
    let cancel = CancellationToken::new();

    // Build sinks and register a handle per sink with the dispatcher.
    let mut dispatcher = Dispatcher::new();
    let sink_tasks = create_and_register_sinks(&mut dispatcher, &config, run_id)?;

    info!(sink_count = dispatcher.sink_count(), "sinks registered");

    // Producers feed the dispatcher over one shared channel.
    let (batch_tx, batch_rx) = mpsc::channel(SINK_QUEUE_DEPTH);
    let dispatcher_metrics = dispatcher.metrics_handle();
    let dispatcher_task = tokio::spawn(dispatcher.run_blocking(batch_rx));

    // Element-byte budget: with a network sink attached the batch must
    // fit one datagram alongside the 32-byte header; storage-only runs
    // flush on count and time boundaries alone.
    let byte_budget = if config.has_network_sink() {
        net_payload_budget(config.acquisition.payload_ceiling) - Header::SIZE
    } else {
        usize::MAX
    };

    let mut producer_tasks = Vec::new();
    for digitizer in config.acquisition.enabled_digitizers() {
        let producer = Producer::new(
            ProducerConfig {
                run_id,
                digitizer_id: digitizer.id,
                kind: digitizer.kind.element_kind(),
                byte_budget,
                max_elements: usize::from(config.acquisition.max_elements),
            },
            batch_tx.clone(),
        );
        let pulser = Pulser::new(digitizer.id, digitizer.kind.element_kind());

        info!(
            digitizer_id = digitizer.id,
            kind = %digitizer.kind.element_kind(),
            channel_groups = digitizer.channel_groups,
            byte_budget,
            "starting producer"
        );

        producer_tasks.push(tokio::spawn(acquire(
            producer,
            pulser,
            digitizer.channel_groups,
            config.acquisition.flush_interval,
            cancel.clone(),
        )));
    }
    // Producers hold the only remaining senders; the dispatcher stops
    // once they all drain.
    drop(batch_tx);

    info!(producer_count = producer_tasks.len(), "readout running");

    wait_for_shutdown().await;
    info!("shutdown signal received, draining...");
    cancel.cancel();

    for task in producer_tasks {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "producer task panicked during shutdown"),
            Err(_) => warn!("producer did not drain within timeout"),
        }
    }

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, dispatcher_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "dispatcher task panicked"),
        Err(_) => warn!("dispatcher did not finish within timeout"),
    }

    for task in sink_tasks {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "sink task panicked"),
            Err(_) => warn!("sink did not flush within timeout"),
        }
    }

    let snapshot = dispatcher_metrics.snapshot();
    info!(
        batches = snapshot.batches_received,
        dispatched = snapshot.batches_dispatched,
        dropped = snapshot.batches_dropped,
        "run complete"
    );

    Ok(())
}

/// Build each enabled sink, register its handle, and spawn its drive
/// loop
fn create_and_register_sinks(
    dispatcher: &mut Dispatcher,
    config: &Config,
    run_id: u64,
) -> Result<Vec<JoinHandle<()>>> {
    let mut tasks = Vec::new();
    let mut next_id = 0u16;

    for (name, sink_config) in config.sinks.iter() {
        if !sink_config.is_enabled() {
            info!(sink = %name, "sink disabled, skipping");
            continue;
        }

        let (tx, rx) = mpsc::channel(SINK_QUEUE_DEPTH);
        let sink_name = name.clone();

        match sink_config {
            SinkConfig::Null(_) => {
                let sink = NullSink::new(name.clone());
                tasks.push(tokio::spawn(async move {
                    let snapshot = drive(sink, rx).await;
                    info!(
                        sink = %sink_name,
                        batches = snapshot.batches_written,
                        elements = snapshot.elements_written,
                        "null sink finished"
                    );
                }));
            }

            SinkConfig::Text(text_config) => {
                let sink = TextSink::new(name.clone(), &text_config.path, run_id)
                    .with_context(|| format!("failed to open text sink '{name}'"))?;
                let path = text_config.path.clone();
                tasks.push(tokio::spawn(async move {
                    let snapshot = drive(sink, rx).await;
                    info!(
                        sink = %sink_name,
                        path = %path,
                        batches = snapshot.batches_written,
                        bytes = snapshot.bytes_written,
                        "text sink finished"
                    );
                }));
            }

            SinkConfig::Udp(udp_config) => {
                let sink = UdpSink::new(
                    name.clone(),
                    udp_config.endpoint(),
                    config.acquisition.payload_ceiling,
                )
                .with_context(|| format!("failed to connect udp sink '{name}'"))?;
                let target = udp_config.endpoint();
                tasks.push(tokio::spawn(async move {
                    let snapshot = drive(sink, rx).await;
                    info!(
                        sink = %sink_name,
                        target = %target,
                        batches = snapshot.batches_written,
                        bytes = snapshot.bytes_written,
                        errors = snapshot.write_errors,
                        "udp sink finished"
                    );
                }));
            }

            SinkConfig::Columnar(col_config) => {
                let columnar_config = ColumnarConfig {
                    dir: col_config.path.clone().into(),
                    compress: matches!(col_config.compression, readout_config::Compression::Lz4),
                };
                let sink = ColumnarSink::new(name.clone(), &columnar_config, run_id)
                    .with_context(|| format!("failed to open columnar sink '{name}'"))?;
                let path = sink.path().display().to_string();
                tasks.push(tokio::spawn(async move {
                    let snapshot = drive(sink, rx).await;
                    info!(
                        sink = %sink_name,
                        path = %path,
                        batches = snapshot.batches_written,
                        bytes = snapshot.bytes_written,
                        "columnar sink finished"
                    );
                }));
            }
        }

        dispatcher.register_sink(SinkHandle::new(SinkId::new(next_id), name.clone(), tx));
        next_id += 1;
    }

    Ok(tasks)
}

/// Acquisition loop for one digitizer: generate events, pack, flush on
/// the time boundary, drain on cancel
async fn acquire(
    mut producer: Producer,
    mut pulser: Pulser,
    channel_groups: u16,
    flush_interval: Duration,
    cancel: CancellationToken,
) {
    let digitizer_id = pulser.digitizer_id();
    let mut flush_ticker = tokio::time::interval(flush_interval);
    flush_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut trigger = tokio::time::interval(TRIGGER_PERIOD);
    trigger.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            _ = flush_ticker.tick() => {
                if let Err(e) = producer.flush().await {
                    error!(digitizer_id, error = %e, "flush failed, stopping producer");
                    return;
                }
            }

            _ = trigger.tick() => {
                // One event per channel group per trigger, like a
                // grouped readout would deliver.
                for group in 0..channel_groups.max(1) {
                    let event = pulser.next_event();
                    if let Err(e) = producer.push(&event, group).await {
                        error!(digitizer_id, error = %e, "push failed, stopping producer");
                        return;
                    }
                }
            }
        }
    }

    match producer.close().await {
        Ok(stats) => info!(
            digitizer_id,
            events = stats.events,
            batches = stats.batches,
            budget_flushes = stats.budget_flushes,
            "producer drained"
        ),
        Err(e) => warn!(digitizer_id, error = %e, "producer failed to drain"),
    }
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
