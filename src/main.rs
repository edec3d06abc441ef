//! Weather Streamer - synthetic weather readings for an Azure Event Hub
//!
//! Generates one fake weather reading per interval, publishes it as a
//! single-event batch and prints `Sent: <json>`. Runs until Ctrl+C (or
//! SIGTERM on Unix) or the first failure.
//!
//! ## Configuration
//!
//! - `EVENT_HUB_CONNECTION_STRING`: Event Hubs connection string (required)
//! - `EVENT_HUB_NAME`: Event Hub to publish to (default: eh-streaming)
//! - `WEATHER_SEND_INTERVAL_SECS`: Seconds between readings (default: 10)
//! - `RUST_LOG`: Logging level filter (default: info)

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use weather_streamer::config::Config;
use weather_streamer::producer::EventHubProducerClient;
use weather_streamer::publisher::Publisher;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                event_hub = %config.event_hub_name,
                send_interval_secs = config.send_interval.as_secs(),
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let producer = match EventHubProducerClient::from_connection_string(
        &config.connection_string,
        &config.event_hub_name,
    ) {
        Ok(producer) => producer,
        Err(e) => {
            error!(error = %e, "Failed to create Event Hub producer");
            std::process::exit(1);
        }
    };

    let summary = Publisher::new(producer, config.send_interval)
        .run(shutdown_signal())
        .await;

    info!(sent = summary.sent, "Weather streamer stopped");

    if !summary.is_cancelled() {
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
///
/// Diagnostics go to stderr; stdout carries the `Sent:` lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Resolve on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received"),
        _ = terminate => info!("SIGTERM received"),
    }
}
