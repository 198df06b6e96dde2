//! Matching Worker
//!
//! Reads newline-delimited JSON order intents from stdin, routes each one to
//! the worker owning its symbol and writes every resulting matching event to
//! stdout as one JSON line.

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use order_matching_engine::config::{AppConfig, LogFormat};
use order_matching_engine::metrics::MetricsReporter;
use order_matching_engine::{EngineRouter, MatchingEvent, OrderIntent, RouteError};

#[derive(Parser)]
#[command(name = "matching_worker", about = "Price-time priority matching worker")]
struct Cli {
    #[arg(short, long, default_value = "matching.toml")]
    config_path: PathBuf,
}

fn init_logging(cfg: &AppConfig) {
    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::from(cfg.logger.level).into())
        .from_env_lossy();

    // Logs go to stderr; stdout carries events.
    match cfg.logger.format {
        LogFormat::JSON => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_current_span(true)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::COMPACT => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config_path)?;

    init_logging(&config);
    info!("Starting matching worker for {:?}", config.engine.symbols);

    if config.metrics.enabled {
        PrometheusBuilder::new()
            .with_http_listener(config.metrics.listen)
            .install()?;
        info!("Prometheus metrics on http://{}/metrics", config.metrics.listen);
    }

    let (events_tx, events_rx) = mpsc::channel(config.engine.channel_capacity);
    let router = EngineRouter::new(
        config.engine.tick_num,
        config.engine.channel_capacity,
        events_tx,
    );
    for symbol in &config.engine.symbols {
        router.add_symbol(symbol.clone());
    }

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(
            router.metrics(),
            Duration::from_secs(config.metrics.report_interval_secs),
        );
        tokio::spawn(async move {
            reporter.run().await;
        });
    }

    let writer = tokio::spawn(write_events(events_rx));

    tokio::select! {
        result = read_intents(&router) => {
            if let Err(e) = result {
                error!("Failed to read intents: {}", e);
            }
            info!("Input closed, draining workers...");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down matching worker...");
        }
    }

    // Dropping the router's event sender lets the writer finish once every
    // worker has drained.
    router.shutdown().await;
    writer.await??;

    info!("Matching worker stopped");
    Ok(())
}

async fn read_intents(router: &EngineRouter) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let intent = match OrderIntent::decode(line.as_bytes()) {
            Ok(intent) => intent,
            Err(e) => {
                warn!("Skipping intent: {}", e);
                continue;
            }
        };

        match router.route(intent).await {
            Ok(()) => {}
            Err(e @ RouteError::UnknownSymbol(_)) => warn!("Skipping intent: {}", e),
            Err(e @ RouteError::WorkerClosed(_)) => {
                error!("{}", e);
                break;
            }
        }
    }
    Ok(())
}

async fn write_events(mut events: mpsc::Receiver<MatchingEvent>) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();

    while let Some(event) = events.recv().await {
        let mut line = match event.encode() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode event for {}: {}", event.order.id, e);
                continue;
            }
        };
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
    }
    Ok(())
}
