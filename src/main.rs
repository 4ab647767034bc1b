//! Document Store Probe
//!
//! Periodically exercises a document store and exports the outcome as
//! Prometheus metrics.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Document Store Probe                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │     Task     │───▶│    Probe     │───▶│    Store     │       │
//! │  │  Scheduler   │    │  Operation   │    │    Client    │       │
//! │  └──────────────┘    └──────┬───────┘    └──────────────┘       │
//! │                             ▼                                    │
//! │                      ┌──────────────┐     /metrics  /readyz      │
//! │                      │ Metric Sink  │───▶ (hyper servers)        │
//! │                      └──────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mongo_probe::adapters::InMemoryStore;
#[cfg(feature = "mongo")]
use mongo_probe::adapters::{MongoConfig, MongoStore};
use mongo_probe::config::{parse_duration, parse_percentiles, ProbeSettings, StoreBackend};
#[cfg(not(feature = "mongo"))]
use mongo_probe::error::Error;
use mongo_probe::error::Result;
use mongo_probe::health::HealthMonitor;
use mongo_probe::metrics::PrometheusMetricSink;
use mongo_probe::server;
use mongo_probe::{ProbeOperation, StoreClient, TaskScheduler};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Document store probe - periodic count + insert with Prometheus metrics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Fixed-rate probe period (e.g. 5s, 500ms, 1m)
    #[arg(long, env = "PROBE_PERIOD", default_value = "5s")]
    period: String,

    /// Deadline for each store call; must be shorter than the period
    #[arg(long, env = "STORE_TIMEOUT", default_value = "3s")]
    store_timeout: String,

    /// Store backend to probe
    #[arg(long, env = "PROBE_STORE", value_enum, default_value = "mongo")]
    store: StoreBackend,

    /// MongoDB connection string
    #[arg(long, env = "MONGO_URI", default_value = "mongodb://mongo:27017")]
    mongo_uri: String,

    /// Database holding the probe collection
    #[arg(long, env = "MONGO_DATABASE", default_value = "monitoring")]
    database: String,

    /// Collection counted and written to
    #[arg(long, env = "PROBE_COLLECTION", default_value = "events")]
    collection: String,

    /// Source tag written into every probe event
    #[arg(long, env = "PROBE_SOURCE", default_value = "mongo-probe")]
    source: String,

    /// Message written into every probe event
    #[arg(long, env = "PROBE_MESSAGE", default_value = "Periodic event")]
    message: String,

    /// Latency percentiles to publish, comma separated
    #[arg(long, env = "PROBE_PERCENTILES", default_value = "0.95,0.99")]
    percentiles: String,

    /// Rolling window the percentiles are computed over
    #[arg(long, env = "PERCENTILE_WINDOW", default_value = "2m")]
    percentile_window: String,

    /// Consecutive failures before readiness reports unhealthy
    #[arg(long, env = "FAILURE_THRESHOLD", default_value = "3")]
    failure_threshold: u64,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: SocketAddr,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn settings(&self) -> Result<ProbeSettings> {
        Ok(ProbeSettings {
            period: parse_duration(&self.period)?,
            store_timeout: parse_duration(&self.store_timeout)?,
            store: self.store,
            mongo_uri: self.mongo_uri.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
            source: self.source.clone(),
            message: self.message.clone(),
            percentiles: parse_percentiles(&self.percentiles)?,
            percentile_window: parse_duration(&self.percentile_window)?,
            failure_threshold: self.failure_threshold,
            metrics_addr: self.metrics_addr,
            health_addr: self.health_addr,
        })
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let settings = args.settings()?;
    settings.validate()?;

    info!("Starting document store probe");
    info!("  Store: {:?}", settings.store);
    info!("  Period: {:?}", settings.period);
    info!("  Store call timeout: {:?}", settings.store_timeout);
    info!("  Collection: {}.{}", settings.database, settings.collection);
    info!("  Percentiles: {:?}", settings.percentiles);

    let store = connect_store(&settings).await?;

    let sink = Arc::new(PrometheusMetricSink::new(settings.sink_config())?);
    let probe = ProbeOperation::new(settings.probe_config(), store, sink.clone());
    let scheduler = TaskScheduler::new(settings.scheduler_config())?;
    let health = HealthMonitor::new(scheduler.stats(), settings.failure_threshold);

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // Start metrics server
    let metrics_listener = TcpListener::bind(settings.metrics_addr).await?;
    let metrics_server = tokio::spawn(server::serve(
        "Metrics",
        metrics_listener,
        move |path: &str| server::metrics_routes(&sink, path),
        shutdown.clone(),
    ));

    // Start health server
    let health_listener = TcpListener::bind(settings.health_addr).await?;
    let health_server = tokio::spawn(server::serve(
        "Health",
        health_listener,
        move |path: &str| server::health_routes(&health, path),
        shutdown.clone(),
    ));

    // Run the probe until a shutdown signal arrives
    let stats = scheduler.run(&probe, shutdown.clone()).await;
    shutdown.cancel();
    let stats = stats?;

    for (name, handle) in [("Metrics", metrics_server), ("Health", health_server)] {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("{} server error: {}", name, e),
            Err(e) => error!("{} server task failed: {}", name, e),
        }
    }

    info!(
        cycles = stats.cycles,
        successes = stats.successes,
        failures = stats.failures,
        "Probe shutdown complete"
    );
    Ok(())
}

// =============================================================================
// Store Wiring
// =============================================================================

async fn connect_store(settings: &ProbeSettings) -> Result<Arc<dyn StoreClient>> {
    match settings.store {
        StoreBackend::Memory => {
            warn!("Using in-memory store - probe events are not persisted");
            Ok(Arc::new(InMemoryStore::new()))
        }
        #[cfg(feature = "mongo")]
        StoreBackend::Mongo => {
            let config = MongoConfig {
                uri: settings.mongo_uri.clone(),
                database: settings.database.clone(),
                server_selection_timeout: settings.store_timeout,
                ..Default::default()
            };
            let store = MongoStore::connect(&config).await?;

            match tokio::time::timeout(config.connect_timeout, store.ping()).await {
                Ok(Ok(())) => info!("Connected to MongoDB"),
                Ok(Err(e)) => {
                    error!("MongoDB ping failed: {}", e);
                    error!("Continuing anyway - probe cycles will fail until the store is reachable");
                }
                Err(_) => {
                    error!("MongoDB ping timed out after {:?}", config.connect_timeout);
                    error!("Continuing anyway - probe cycles will fail until the store is reachable");
                }
            }

            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "mongo"))]
        StoreBackend::Mongo => Err(Error::Config(
            "built without the 'mongo' feature; use --store memory".into(),
        )),
    }
}

// =============================================================================
// Shutdown
// =============================================================================

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, finishing in-flight probe"),
        _ = terminate => info!("Received SIGTERM, finishing in-flight probe"),
    }
    shutdown.cancel();
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},hyper=warn,hyper_util=warn,mongodb=warn",
            level
        ))
    });

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
