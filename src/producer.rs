//! Event Hub producer client.
//!
//! `EventProducer` is the narrow surface the publish loop depends on: create a
//! batch, send it, close. `EventHubProducerClient` implements it over the
//! Event Hubs HTTPS send API, reusing one pooled `reqwest::Client`.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::credential::{generate_sas_token, ConnectionString, Credential};

/// Largest request body the hub accepts for one batch (1 MiB).
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1_048_576;

/// Lifetime of locally signed SAS tokens, in seconds.
const TOKEN_TTL_SECS: i64 = 3600;

/// Server-side timeout passed on the query string, in seconds.
const SERVER_TIMEOUT_SECS: u32 = 60;

const API_VERSION: &str = "2014-01";

const BATCH_CONTENT_TYPE: &str = "application/vnd.microsoft.servicebus.json";

/// Errors raised by the producer client.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// Connection string could not be used
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Underlying HTTP client could not be built or a request could not be prepared
    #[error("Client configuration error: {0}")]
    Client(String),

    /// Endpoint could not be reached
    #[error("Failed to connect to Event Hub: {0}")]
    Connection(#[source] reqwest::Error),

    /// Network failure after the connection was established
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The hub rejected the request
    #[error("Event Hub returned {code}: {message}")]
    Status { code: StatusCode, message: String },

    /// Event does not fit into the batch
    #[error("Event of {event_size} bytes does not fit into batch ({size} of {max_size} bytes used)")]
    Capacity {
        event_size: usize,
        size: usize,
        max_size: usize,
    },

    /// Event body could not be encoded
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// Producer already closed
    #[error("Producer client is closed")]
    Closed,
}

impl From<reqwest::Error> for ProducerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            ProducerError::Connection(err)
        } else {
            ProducerError::Transport(err)
        }
    }
}

/// One outgoing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventData {
    body: String,
}

impl EventData {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

// Element of the JSON array the batch endpoint accepts.
#[derive(Serialize)]
struct WireEvent<'a> {
    #[serde(rename = "Body")]
    body: &'a str,
}

/// Events sent together in one request.
///
/// Size is tracked on the encoded request body; `add` refuses events that
/// would push it past `max_size`.
#[derive(Debug, Clone)]
pub struct EventDataBatch {
    events: Vec<EventData>,
    size: usize,
    max_size: usize,
}

impl EventDataBatch {
    /// Create an empty batch bounded to `max_size` encoded bytes.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            events: Vec::new(),
            // "[]"
            size: 2,
            max_size,
        }
    }

    /// Append an event.
    ///
    /// # Errors
    ///
    /// Returns `ProducerError::Capacity` if the event does not fit.
    pub fn add(&mut self, event: EventData) -> Result<(), ProducerError> {
        let encoded = serde_json::to_vec(&WireEvent { body: &event.body })?.len();
        // Separating comma after the first element
        let event_size = if self.events.is_empty() { encoded } else { encoded + 1 };

        if self.size + event_size > self.max_size {
            return Err(ProducerError::Capacity {
                event_size,
                size: self.size,
                max_size: self.max_size,
            });
        }

        self.size += event_size;
        self.events.push(event);
        Ok(())
    }

    pub fn events(&self) -> &[EventData] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Encoded size in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.size
    }

    pub fn max_size_in_bytes(&self) -> usize {
        self.max_size
    }

    fn to_body(&self) -> Result<Vec<u8>, ProducerError> {
        let wire: Vec<WireEvent<'_>> = self
            .events
            .iter()
            .map(|event| WireEvent { body: &event.body })
            .collect();
        Ok(serde_json::to_vec(&wire)?)
    }
}

/// Operations the publish loop needs from a producer.
#[async_trait]
pub trait EventProducer: Send + Sync {
    /// Allocate an empty batch.
    async fn create_batch(&self) -> Result<EventDataBatch, ProducerError>;

    /// Transmit a batch.
    async fn send_batch(&self, batch: EventDataBatch) -> Result<(), ProducerError>;

    /// Release the connection.
    async fn close(&mut self) -> Result<(), ProducerError>;
}

/// Producer for a single Event Hub over HTTPS.
pub struct EventHubProducerClient {
    /// Pooled HTTP client; `None` once closed
    client: Option<Client>,

    /// `<scheme>://<host>/<hub>/messages?...`
    send_url: Url,

    /// Audience the SAS token is scoped to
    resource_uri: String,

    credential: Credential,

    event_hub_name: String,

    max_batch_size: usize,
}

impl EventHubProducerClient {
    /// Build a producer from a connection string and hub name.
    ///
    /// # Errors
    ///
    /// Returns `ProducerError::InvalidConnectionString` if the connection
    /// string is malformed or names a different hub, and
    /// `ProducerError::Client` if the HTTP client cannot be built.
    pub fn from_connection_string(
        connection_string: &str,
        event_hub_name: &str,
    ) -> Result<Self, ProducerError> {
        let parsed = ConnectionString::parse(connection_string)?;
        let event_hub_name = parsed.resolve_event_hub(event_hub_name)?.to_string();

        let mut send_url = Url::parse(&format!("{}://{}/", parsed.scheme(), parsed.host))
            .map_err(|e| {
                ProducerError::InvalidConnectionString(format!(
                    "invalid endpoint '{}': {}",
                    parsed.host, e
                ))
            })?;
        send_url
            .path_segments_mut()
            .map_err(|_| ProducerError::Client("endpoint cannot carry a path".to_string()))?
            .clear()
            .push(&event_hub_name)
            .push("messages");
        send_url
            .query_pairs_mut()
            .append_pair("timeout", &SERVER_TIMEOUT_SECS.to_string())
            .append_pair("api-version", API_VERSION);

        let resource_uri = format!("https://{}/{}", parsed.host, event_hub_name);

        // No request timeout: a send blocks until the hub answers or the
        // connection fails.
        let client = Client::builder()
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| ProducerError::Client(e.to_string()))?;

        info!(
            host = %parsed.host,
            event_hub = %event_hub_name,
            "Event Hub producer created"
        );

        Ok(Self {
            client: Some(client),
            send_url,
            resource_uri,
            credential: parsed.credential,
            event_hub_name,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        })
    }

    /// Override the maximum encoded batch size.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn event_hub_name(&self) -> &str {
        &self.event_hub_name
    }

    pub fn send_url(&self) -> &Url {
        &self.send_url
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_none()
    }

    fn authorization(&self) -> Result<String, ProducerError> {
        match &self.credential {
            Credential::SharedAccessSignature(token) => Ok(token.clone()),
            Credential::SharedKey { key_name, key } => {
                let expiry = Utc::now().timestamp() + TOKEN_TTL_SECS;
                generate_sas_token(&self.resource_uri, key_name, key, expiry)
            }
        }
    }
}

#[async_trait]
impl EventProducer for EventHubProducerClient {
    async fn create_batch(&self) -> Result<EventDataBatch, ProducerError> {
        if self.is_closed() {
            return Err(ProducerError::Closed);
        }
        Ok(EventDataBatch::with_max_size(self.max_batch_size))
    }

    async fn send_batch(&self, batch: EventDataBatch) -> Result<(), ProducerError> {
        let client = self.client.as_ref().ok_or(ProducerError::Closed)?;

        if batch.is_empty() {
            debug!("Skipping empty batch");
            return Ok(());
        }

        let body = batch.to_body()?;
        debug!(
            events = batch.len(),
            bytes = body.len(),
            event_hub = %self.event_hub_name,
            "Sending event batch"
        );

        let response = client
            .post(self.send_url.clone())
            .header(AUTHORIZATION, self.authorization()?)
            .header(CONTENT_TYPE, BATCH_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response
            .text()
            .await
            .ok()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });

        Err(ProducerError::Status {
            code: status,
            message,
        })
    }

    async fn close(&mut self) -> Result<(), ProducerError> {
        if self.client.take().is_some() {
            info!(event_hub = %self.event_hub_name, "Event Hub producer closed");
        }
        Ok(())
    }
}
