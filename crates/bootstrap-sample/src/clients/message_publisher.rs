//! # Message Publisher
//!
//! Publishes [`MessageEnvelope`]s as JSON, keyed by envelope id, and waits for
//! the broker's acknowledgement for at most the configured delivery timeout.
//!
//! | Delivery result | Error |
//! |-----------------|-------|
//! | no ack in time, or librdkafka `MessageTimedOut` | [`PublishError::DeliveryTimeout`] |
//! | transport-class failure | [`PublishError::Unavailable`], handle invalidated |
//! | anything else | [`PublishError::Delivery`] |
use crate::broker::{BrokerBackend, BrokerError};
use crate::model::{DeliveryReceipt, MessageEnvelope};
use bootstrap_framework::{ConnectionGate, ErrorKind, GateError};
use chrono::Utc;
use rdkafka::error::KafkaError;
use rdkafka::producer::FutureRecord;
use rdkafka::types::RDKafkaErrorCode;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("message broker unavailable")]
    Unavailable,
    #[error("no delivery acknowledgement within {0:?}")]
    DeliveryTimeout(Duration),
    #[error("delivery failed: {0}")]
    Delivery(KafkaError),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Gate(GateError),
}

impl From<GateError> for PublishError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Unavailable => PublishError::Unavailable,
            other => PublishError::Gate(other),
        }
    }
}

#[derive(Clone)]
pub struct MessagePublisher {
    gate: ConnectionGate<BrokerBackend>,
    topic: String,
    delivery_timeout: Duration,
}

impl MessagePublisher {
    pub fn new(
        gate: ConnectionGate<BrokerBackend>,
        topic: impl Into<String>,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            gate,
            topic: topic.into(),
            delivery_timeout,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[instrument(skip(self))]
    pub async fn publish(&self, message: &str) -> Result<DeliveryReceipt, PublishError> {
        let handle = self.gate.acquire().await.inspect_err(|e| {
            warn!(error = %e, "Message broker not available");
        })?;

        let envelope = MessageEnvelope::new(message, Utc::now());
        let payload = serde_json::to_string(&envelope)?;
        let record = FutureRecord::to(&self.topic)
            .key(&envelope.id)
            .payload(&payload);

        let delivery = tokio::time::timeout(
            self.delivery_timeout,
            handle.producer().send(record, self.delivery_timeout),
        )
        .await
        .map_err(|_| PublishError::DeliveryTimeout(self.delivery_timeout))?;

        match delivery_result(delivery.map_err(|(e, _)| e), self.delivery_timeout) {
            Ok((partition, offset)) => {
                info!(id = %envelope.id, topic = %self.topic, partition, offset, "Message delivered");
                Ok(DeliveryReceipt {
                    id: envelope.id,
                    partition,
                    offset,
                })
            }
            Err(PublishError::Unavailable) => {
                self.gate.invalidate(&handle).await?;
                Err(PublishError::Unavailable)
            }
            Err(e) => Err(e),
        }
    }
}

/// Maps a delivery report onto `(partition, offset)` or a [`PublishError`].
fn delivery_result(
    result: Result<(i32, i64), KafkaError>,
    timeout: Duration,
) -> Result<(i32, i64), PublishError> {
    match result {
        Ok(position) => Ok(position),
        Err(KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut)) => {
            Err(PublishError::DeliveryTimeout(timeout))
        }
        Err(e) => {
            if BrokerError::Client(e.clone()).kind() == ErrorKind::Transport {
                warn!(error = %e, "Message broker unreachable, invalidating handle");
                Err(PublishError::Unavailable)
            } else {
                Err(PublishError::Delivery(e))
            }
        }
    }
}
