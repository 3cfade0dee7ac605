//! Upload notification relay worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vbridge_queue::NotificationQueue;
use vbridge_worker::{http, metrics, BatchExecutor, RelayContext, RelaySettings, WorkerConfig};

#[tokio::main]
async fn main() {
    // TLS requires a process-wide rustls crypto provider
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // ANSI output for dev, JSON lines when LOG_FORMAT=json
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vbridge=info".parse().unwrap())
        .add_directive("hyper=warn".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vbridge-worker");

    // Validate required configuration before joining the consumer group. A
    // worker missing any key must not consume: the backlog stays queued
    // until the deployment is fixed.
    let settings = match RelaySettings::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!(
                "Configuration incomplete, leaving notifications queued for redelivery: {}",
                e
            );
            std::process::exit(1);
        }
    };

    // Load tuning configuration
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    // Create queue client
    let queue = match NotificationQueue::from_env() {
        Ok(q) => Arc::new(q),
        Err(e) => {
            error!("Failed to create notification queue: {}", e);
            std::process::exit(1);
        }
    };

    // Create relay clients
    let context = match RelayContext::new(&settings).await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create relay clients: {}", e);
            std::process::exit(1);
        }
    };

    // Metrics exporter, on unless disabled
    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or(true);
    let metrics_handle = metrics_enabled.then(metrics::init_metrics);

    // HTTP surface: greeting, probes, metrics
    let addr: SocketAddr = match format!("{}:{}", config.http_host, config.http_port).parse() {
        Ok(a) => a,
        Err(e) => {
            error!("Invalid HTTP bind address: {}", e);
            std::process::exit(1);
        }
    };
    let app = http::router(context.clone(), Arc::clone(&queue), metrics_handle);
    tokio::spawn(async move {
        info!("HTTP surface listening on {}", addr);
        if let Err(e) = http::serve(addr, app).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Create executor
    let executor = Arc::new(BatchExecutor::new(
        config,
        Arc::clone(&queue),
        context.processor(),
    ));

    // Setup signal handlers
    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    // Run executor
    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
