use bootstrap_framework::ErrorKind;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("no broker endpoints in {0:?}")]
    InvalidAddress(String),

    #[error("kafka client error: {0}")]
    Client(#[from] KafkaError),

    #[error("failed to create topic {topic}: {code}")]
    TopicCreation {
        topic: String,
        code: RDKafkaErrorCode,
    },

    #[error("cluster not ready: {0}")]
    NotReady(String),

    /// A blocking client call panicked or was cancelled.
    #[error("blocking broker call failed: {0}")]
    Task(String),
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::Client(e) => e.rdkafka_error_code().map_or(ErrorKind::Other, classify),
            BrokerError::TopicCreation { code, .. } => classify(*code),
            BrokerError::NotReady(_) => ErrorKind::NotReady,
            BrokerError::InvalidAddress(_) | BrokerError::Task(_) => ErrorKind::Other,
        }
    }
}

fn classify(code: RDKafkaErrorCode) -> ErrorKind {
    use RDKafkaErrorCode::*;

    match code {
        AllBrokersDown | BrokerTransportFailure | Resolve | OperationTimedOut
        | RequestTimedOut | MessageTimedOut => ErrorKind::Transport,
        Authentication
        | SaslAuthenticationFailed
        | TopicAuthorizationFailed
        | ClusterAuthorizationFailed => ErrorKind::Auth,
        LeaderNotAvailable | BrokerNotAvailable | NotController => ErrorKind::NotReady,
        _ => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_codes_map_to_kinds() {
        let kind = |code| BrokerError::TopicCreation {
            topic: "users".into(),
            code,
        }
        .kind();
        assert_eq!(kind(RDKafkaErrorCode::AllBrokersDown), ErrorKind::Transport);
        assert_eq!(kind(RDKafkaErrorCode::SaslAuthenticationFailed), ErrorKind::Auth);
        assert_eq!(kind(RDKafkaErrorCode::LeaderNotAvailable), ErrorKind::NotReady);
        assert_eq!(kind(RDKafkaErrorCode::InvalidReplicationFactor), ErrorKind::Other);
    }
}
