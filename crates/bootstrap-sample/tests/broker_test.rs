use bootstrap_framework::{
    BackendClient, ConnectionActor, ConnectionGate, ConnectionSupervisor, Endpoint, ErrorKind,
    HealthStatus, RetryPolicy,
};
use bootstrap_sample::broker::BrokerBackend;
use bootstrap_sample::clients::{MessagePublisher, PublishError};
use std::time::{Duration, Instant};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// An address nothing listens on.
fn unreachable_endpoint() -> Endpoint {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Endpoint::new(format!("127.0.0.1:{port}"))
}

fn unreachable_backend() -> BrokerBackend {
    BrokerBackend::new()
        .with_delivery_timeout(DELIVERY_TIMEOUT)
        .with_operation_timeout(Duration::from_millis(300))
}

fn gate_for(backend: BrokerBackend) -> ConnectionGate<BrokerBackend> {
    let supervisor = ConnectionSupervisor::new(backend, unreachable_endpoint());
    let (actor, gate) = ConnectionActor::new(supervisor, 8);
    tokio::spawn(
        actor
            .with_lazy_policy(RetryPolicy::fixed(2, Duration::from_millis(50)))
            .run(),
    );
    gate
}

#[tokio::test]
async fn test_connect_fails_without_broker() {
    let backend = unreachable_backend();

    let err = backend.connect(&unreachable_endpoint()).await.unwrap_err();

    assert_ne!(backend.error_kind(&err), ErrorKind::Auth);
}

#[tokio::test]
async fn test_publish_unavailable_without_broker() {
    let gate = gate_for(unreachable_backend());
    let publisher = MessagePublisher::new(gate.clone(), "messages", DELIVERY_TIMEOUT);

    let started = Instant::now();
    let err = publisher.publish("hello").await.unwrap_err();

    assert!(matches!(err, PublishError::Unavailable));
    assert_eq!(gate.status(), HealthStatus::Failed);
    // Bounded by the lazy retry policy, not by the delivery timeout.
    assert!(started.elapsed() < DELIVERY_TIMEOUT);
}

#[tokio::test]
async fn test_publisher_retries_on_next_call() {
    let gate = gate_for(unreachable_backend());
    let publisher = MessagePublisher::new(gate.clone(), "messages", DELIVERY_TIMEOUT);

    for _ in 0..2 {
        let err = publisher.publish("hello").await.unwrap_err();
        assert!(matches!(err, PublishError::Unavailable));
    }
    assert!(gate.current().is_none());
    assert_eq!(publisher.topic(), "messages");
}
