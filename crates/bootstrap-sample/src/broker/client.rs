//! # Broker Backend
//!
//! [`BrokerBackend`] builds one librdkafka configuration per endpoint and
//! derives both a [`FutureProducer`] and an [`AdminClient`] from it. Creating
//! either client never touches the network, so `connect` follows up with a
//! metadata request to prove that a broker actually answers.
//!
//! | Credentials | TLS | `security.protocol` |
//! |-------------|-----|---------------------|
//! | set | yes | `SASL_SSL` |
//! | set | no | `SASL_PLAINTEXT` |
//! | none | yes | `SSL` |
//! | none | no | librdkafka default |

use super::error::BrokerError;
use crate::config::BrokerSettings;
use async_trait::async_trait;
use bootstrap_framework::{BackendClient, Endpoint, ErrorKind};
use rdkafka::admin::AdminClient;
use rdkafka::client::DefaultClientContext;
use rdkafka::producer::{FutureProducer, Producer};
use rdkafka::ClientConfig;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct BrokerBackend {
    sasl_mechanism: String,
    delivery_timeout: Duration,
    operation_timeout: Duration,
}

impl Default for BrokerBackend {
    fn default() -> Self {
        Self {
            sasl_mechanism: "SCRAM-SHA-256".into(),
            delivery_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(5),
        }
    }
}

impl BrokerBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &BrokerSettings) -> Self {
        Self::new()
            .with_sasl_mechanism(&settings.sasl_mechanism)
            .with_delivery_timeout(settings.delivery_timeout())
    }

    pub fn with_sasl_mechanism(mut self, mechanism: &str) -> Self {
        self.sasl_mechanism = mechanism.to_string();
        self
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Bounds metadata requests and admin operations.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn client_config(&self, endpoint: &Endpoint) -> Result<ClientConfig, BrokerError> {
        let servers = endpoint
            .address
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        if servers.is_empty() {
            return Err(BrokerError::InvalidAddress(endpoint.address.clone()));
        }

        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &servers)
            .set(
                "message.timeout.ms",
                self.delivery_timeout.as_millis().to_string(),
            );

        if let Some(credentials) = &endpoint.credentials {
            let protocol = if endpoint.tls {
                "SASL_SSL"
            } else {
                "SASL_PLAINTEXT"
            };
            config
                .set("security.protocol", protocol)
                .set("sasl.mechanism", &self.sasl_mechanism)
                .set("sasl.username", &credentials.username)
                .set("sasl.password", &credentials.password);
        } else if endpoint.tls {
            config.set("security.protocol", "SSL");
        }
        Ok(config)
    }
}

#[async_trait]
impl BackendClient for BrokerBackend {
    type Handle = BrokerHandle;
    type Error = BrokerError;

    fn kind(&self) -> &'static str {
        "broker"
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<BrokerHandle, BrokerError> {
        let config = self.client_config(endpoint)?;
        let producer: FutureProducer = config.create()?;
        let admin: AdminClient<DefaultClientContext> = config.create()?;
        let handle = BrokerHandle {
            producer,
            admin: Arc::new(admin),
            operation_timeout: self.operation_timeout,
        };

        let brokers = handle.broker_count().await?;
        debug!(brokers, "Broker metadata received");
        Ok(handle)
    }

    async fn verify_live(&self, handle: &BrokerHandle) -> Result<(), BrokerError> {
        match handle.broker_count().await? {
            0 => Err(BrokerError::NotReady("metadata lists no brokers".into())),
            _ => Ok(()),
        }
    }

    async fn close(&self, handle: &BrokerHandle) {
        let producer = handle.producer.clone();
        let timeout = self.delivery_timeout;
        match tokio::task::spawn_blocking(move || producer.flush(timeout)).await {
            Ok(Ok(())) => debug!("Producer flushed"),
            Ok(Err(e)) => warn!(error = %e, "Producer flush failed"),
            Err(e) => warn!(error = %e, "Producer flush task failed"),
        }
    }

    fn error_kind(&self, error: &BrokerError) -> ErrorKind {
        error.kind()
    }
}

/// Producer and admin client sharing one configuration.
#[derive(Clone)]
pub struct BrokerHandle {
    producer: FutureProducer,
    pub(crate) admin: Arc<AdminClient<DefaultClientContext>>,
    pub(crate) operation_timeout: Duration,
}

impl BrokerHandle {
    pub fn producer(&self) -> &FutureProducer {
        &self.producer
    }

    /// Fetches cluster metadata and returns the number of brokers it lists.
    pub async fn broker_count(&self) -> Result<usize, BrokerError> {
        let producer = self.producer.clone();
        let timeout = self.operation_timeout;
        let metadata = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| BrokerError::Task(e.to_string()))??;
        Ok(metadata)
    }
}

impl fmt::Debug for BrokerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerHandle")
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootstrap_framework::Credentials;

    #[test]
    fn test_sasl_over_tls() {
        let endpoint = Endpoint::new("redpanda-0:9092, redpanda-1:9092")
            .with_credentials(Credentials::new("svc", "secret"))
            .with_tls(true);
        let config = BrokerBackend::new()
            .with_sasl_mechanism("SCRAM-SHA-512")
            .client_config(&endpoint)
            .unwrap();

        assert_eq!(
            config.get("bootstrap.servers"),
            Some("redpanda-0:9092,redpanda-1:9092")
        );
        assert_eq!(config.get("security.protocol"), Some("SASL_SSL"));
        assert_eq!(config.get("sasl.mechanism"), Some("SCRAM-SHA-512"));
        assert_eq!(config.get("sasl.username"), Some("svc"));
    }

    #[test]
    fn test_plain_endpoint_sets_no_security() {
        let config = BrokerBackend::new()
            .with_delivery_timeout(Duration::from_secs(3))
            .client_config(&Endpoint::new("redpanda:9092"))
            .unwrap();
        assert_eq!(config.get("security.protocol"), None);
        assert_eq!(config.get("message.timeout.ms"), Some("3000"));
    }

    #[test]
    fn test_tls_without_credentials() {
        let config = BrokerBackend::new()
            .client_config(&Endpoint::new("redpanda:9093").with_tls(true))
            .unwrap();
        assert_eq!(config.get("security.protocol"), Some("SSL"));
    }

    #[test]
    fn test_empty_address_rejected() {
        let err = BrokerBackend::new()
            .client_config(&Endpoint::new(" , "))
            .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidAddress(_)));
    }
}
