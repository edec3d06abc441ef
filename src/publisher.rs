//! Publish loop.
//!
//! Each iteration creates a batch, generates one weather sample, serializes
//! it, sends it as a single-event batch, writes `Sent: <json>` to the console
//! and sleeps. The loop stops when the shutdown future resolves or any step
//! fails; in both cases the producer is closed exactly once.

use std::future::Future;
use std::io::{self, Write};
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::producer::{EventData, EventProducer, ProducerError};
use crate::weather;

/// Default pause between publishes
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(10);

/// Console line written when the user stops the loop
pub const STOPPED_MESSAGE: &str = "Stopped by the user";

/// Suspends the loop between iterations.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Any failure inside an iteration.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Producer(#[from] ProducerError),

    #[error("Failed to serialize weather sample: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write to console: {0}")]
    Console(#[from] io::Error),
}

/// Why the loop stopped.
#[derive(Debug)]
pub enum StopReason {
    /// Shutdown signal received
    Cancelled,

    /// An iteration failed
    Failed(PublishError),
}

/// Loop state.
#[derive(Debug)]
pub enum PublishState {
    Running,
    Stopped(StopReason),
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    pub reason: StopReason,

    /// Samples sent successfully
    pub sent: u64,
}

impl RunSummary {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.reason, StopReason::Cancelled)
    }
}

/// Drives the generate/publish loop over an owned producer.
pub struct Publisher<P, D = TokioDelay, W = io::Stdout> {
    producer: P,
    delay: D,
    interval: Duration,
    console: W,
    sent: u64,
}

impl<P: EventProducer> Publisher<P> {
    /// Create a publisher writing to stdout and sleeping on the tokio timer.
    pub fn new(producer: P, interval: Duration) -> Self {
        Self::with_parts(producer, TokioDelay, interval, io::stdout())
    }
}

impl<P, D, W> Publisher<P, D, W>
where
    P: EventProducer,
    D: Delay,
    W: Write + Send,
{
    /// Create a publisher with an explicit delay and console sink.
    pub fn with_parts(producer: P, delay: D, interval: Duration, console: W) -> Self {
        Self {
            producer,
            delay,
            interval,
            console,
            sent: 0,
        }
    }

    /// Run until `shutdown` resolves or an iteration fails.
    ///
    /// Consumes the publisher; the producer is closed before returning.
    pub async fn run<F>(mut self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = std::pin::pin!(shutdown);
        let mut state = PublishState::Running;

        info!(
            interval_secs = self.interval.as_secs(),
            "Publishing weather samples"
        );

        loop {
            state = match state {
                PublishState::Running => self.step(shutdown.as_mut()).await,
                PublishState::Stopped(reason) => return self.stop(reason).await,
            };
        }
    }

    /// Run one iteration, racing it against the shutdown signal.
    async fn step<F>(&mut self, shutdown: Pin<&mut F>) -> PublishState
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;

            _ = shutdown => PublishState::Stopped(StopReason::Cancelled),

            result = self.iterate() => match result {
                Ok(()) => PublishState::Running,
                Err(e) => PublishState::Stopped(StopReason::Failed(e)),
            },
        }
    }

    async fn iterate(&mut self) -> Result<(), PublishError> {
        let mut batch = self.producer.create_batch().await?;

        let sample = weather::generate_sample();
        let message = weather::to_json(&sample)?;

        batch.add(EventData::new(message.as_str()))?;
        self.producer.send_batch(batch).await?;
        self.sent += 1;

        writeln!(self.console, "Sent: {}", message)?;
        self.console.flush()?;
        debug!(
            sent = self.sent,
            conditions = %sample.conditions,
            wind_direction = %sample.wind_direction,
            "Weather sample published"
        );

        self.delay.sleep(self.interval).await;
        Ok(())
    }

    async fn stop(mut self, reason: StopReason) -> RunSummary {
        let line = match &reason {
            StopReason::Cancelled => {
                info!(sent = self.sent, "Shutdown requested");
                STOPPED_MESSAGE.to_string()
            }
            StopReason::Failed(e) => {
                error!(error = %e, sent = self.sent, "Publishing failed");
                format!("Error: {}", e)
            }
        };

        if let Err(e) = writeln!(self.console, "{}", line).and_then(|_| self.console.flush()) {
            warn!(error = %e, "Failed to write stop message");
        }

        if let Err(e) = self.producer.close().await {
            warn!(error = %e, "Failed to close producer");
        }

        RunSummary {
            reason,
            sent: self.sent,
        }
    }
}
