//! Weather Streamer Library
//!
//! Fabricates fake weather readings and publishes them to an Azure Event Hub
//! at a fixed interval:
//!
//! - **config**: Environment-based configuration
//! - **weather**: Weather sample generation and JSON serialization
//! - **credential**: Connection string parsing and SAS token signing
//! - **producer**: Event Hub producer client and batches
//! - **publisher**: The generate/send/sleep loop
//!
//! # Example
//!
//! ```no_run
//! use weather_streamer::config::Config;
//! use weather_streamer::producer::EventHubProducerClient;
//! use weather_streamer::publisher::Publisher;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let producer = EventHubProducerClient::from_connection_string(
//!         &config.connection_string,
//!         &config.event_hub_name,
//!     )
//!     .expect("Failed to create producer");
//!
//!     let summary = Publisher::new(producer, config.send_interval)
//!         .run(async {
//!             tokio::signal::ctrl_c().await.ok();
//!         })
//!         .await;
//!     println!("published {} samples", summary.sent);
//! }
//! ```

pub mod config;
pub mod credential;
pub mod producer;
pub mod publisher;
pub mod weather;

pub use config::{Config, ConfigError};
pub use credential::{ConnectionString, Credential};
pub use producer::{
    EventData, EventDataBatch, EventHubProducerClient, EventProducer, ProducerError,
};
pub use publisher::{
    Delay, PublishError, PublishState, Publisher, RunSummary, StopReason, TokioDelay,
};
pub use weather::{Conditions, WeatherSample, WindDirection};
