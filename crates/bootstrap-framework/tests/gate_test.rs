use bootstrap_framework::mock::MockBackend;
use bootstrap_framework::{
    BootstrapError, ConnectionActor, ConnectionGate, ConnectionState, ConnectionSupervisor,
    Endpoint, ErrorKind, GateError, HealthStatus, RetryPolicy,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn spawn_gate(backend: &MockBackend) -> (ConnectionGate<MockBackend>, JoinHandle<()>) {
    let supervisor = ConnectionSupervisor::new(backend.clone(), Endpoint::new("mock://cluster"));
    let (actor, gate) = ConnectionActor::new(supervisor, 32);
    let actor = actor.with_lazy_policy(RetryPolicy::fixed(2, Duration::from_millis(100)));
    (gate, tokio::spawn(actor.run()))
}

#[tokio::test]
async fn test_fast_path_makes_no_further_attempts() {
    let backend = MockBackend::new();
    let (gate, _actor) = spawn_gate(&backend);

    gate.bootstrap(RetryPolicy::startup()).await.unwrap();
    assert_eq!(backend.connect_calls(), 1);

    for _ in 0..10 {
        assert!(gate.ensure().await);
    }
    let handle = gate.acquire().await.unwrap();

    assert_eq!(handle.id, 1);
    assert_eq!(backend.connect_calls(), 1);
    assert_eq!(backend.verify_calls(), 1);
    assert_eq!(gate.status(), HealthStatus::Connected);
}

#[tokio::test]
async fn test_first_use_connects_lazily() {
    let backend = MockBackend::new();
    let (gate, _actor) = spawn_gate(&backend);

    assert!(gate.current().is_none());
    assert_eq!(gate.status(), HealthStatus::Disconnected);

    let handle = gate.acquire().await.unwrap();

    assert_eq!(handle.id, 1);
    assert_eq!(gate.status(), HealthStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_retry_sequence() {
    let backend = MockBackend::new().with_connect_delay(Duration::from_secs(1));
    let (gate, _actor) = spawn_gate(&backend);

    let callers: Vec<_> = (0..8)
        .map(|_| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.ensure().await })
        })
        .collect();

    for caller in callers {
        assert!(caller.await.unwrap());
    }
    assert_eq!(backend.connect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_then_recovers_on_next_use() {
    let backend = MockBackend::new();
    backend
        .expect_connect()
        .times(2)
        .return_err(ErrorKind::Transport, "connection refused");
    let (gate, _actor) = spawn_gate(&backend);

    let err = gate.acquire().await.unwrap_err();
    assert_eq!(err, GateError::Unavailable);
    assert_eq!(backend.connect_calls(), 2);
    assert_eq!(gate.status(), HealthStatus::Failed);

    assert!(gate.ensure().await);
    assert_eq!(backend.connect_calls(), 3);
    assert_eq!(gate.status(), HealthStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_callers_fail_fast_while_startup_is_running() {
    let backend = MockBackend::new();
    backend
        .expect_connect()
        .always()
        .return_err(ErrorKind::NotReady, "cluster initializing");
    let (gate, _actor) = spawn_gate(&backend);

    gate.start_bootstrap(RetryPolicy::unbounded(Duration::from_secs(2)))
        .await
        .unwrap();

    assert_eq!(gate.acquire().await.unwrap_err(), GateError::Unavailable);
    assert!(!gate.ensure().await);
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_failure_is_reported() {
    let backend = MockBackend::new();
    backend
        .expect_connect()
        .always()
        .return_err(ErrorKind::Transport, "connection refused");
    let (gate, _actor) = spawn_gate(&backend);

    let err = gate
        .bootstrap(RetryPolicy::fixed(3, Duration::from_secs(2)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GateError::Bootstrap(BootstrapError::Exhausted { attempts: 3, .. })
    ));
    assert_eq!(gate.status(), HealthStatus::Failed);
}

#[tokio::test]
async fn test_reconnect_releases_then_reacquires() {
    let backend = MockBackend::new();
    let (gate, _actor) = spawn_gate(&backend);
    gate.bootstrap(RetryPolicy::startup()).await.unwrap();
    let old = gate.acquire().await.unwrap();

    assert!(gate.reconnect().await.unwrap());

    let new = gate.acquire().await.unwrap();
    assert_eq!(old.id, 1);
    assert_eq!(new.id, 2);
    assert_eq!(backend.closed(), vec![1]);
    assert_eq!(gate.status(), HealthStatus::Connected);
}

#[tokio::test]
async fn test_dropping_gates_closes_handle_once() {
    let backend = MockBackend::new();
    let (gate, actor) = spawn_gate(&backend);
    gate.bootstrap(RetryPolicy::startup()).await.unwrap();
    let other = gate.clone();

    drop(gate);
    drop(other);
    actor.await.unwrap();

    assert_eq!(backend.closed(), vec![1]);
}

#[tokio::test]
async fn test_cancellation_stops_actor() {
    let backend = MockBackend::new();
    let supervisor = ConnectionSupervisor::new(backend.clone(), Endpoint::new("mock://cluster"));
    let cancel = CancellationToken::new();
    let (actor, gate) = ConnectionActor::new(supervisor, 8);
    let actor = tokio::spawn(actor.with_cancellation(cancel.clone()).run());
    gate.bootstrap(RetryPolicy::startup()).await.unwrap();

    cancel.cancel();
    actor.await.unwrap();

    assert_eq!(backend.closed(), vec![1]);
    assert_eq!(gate.acquire().await.unwrap_err(), GateError::GateClosed);
}

#[tokio::test]
async fn test_invalidated_handle_is_withdrawn_and_replaced() {
    let backend = MockBackend::new();
    let (gate, _actor) = spawn_gate(&backend);
    gate.bootstrap(RetryPolicy::startup()).await.unwrap();
    let stale = gate.acquire().await.unwrap();

    assert!(gate.invalidate(&stale).await.unwrap());

    assert!(gate.current().is_none());
    assert_eq!(backend.closed(), vec![1]);
    assert_eq!(gate.state(), ConnectionState::Uninitialized);
    assert_eq!(gate.status(), HealthStatus::Disconnected);

    let fresh = gate.acquire().await.unwrap();
    assert_eq!(fresh.id, 2);
    assert_eq!(backend.connect_calls(), 2);
    assert_eq!(gate.status(), HealthStatus::Connected);
}

#[tokio::test]
async fn test_invalidating_a_replaced_handle_is_ignored() {
    let backend = MockBackend::new();
    let (gate, _actor) = spawn_gate(&backend);
    gate.bootstrap(RetryPolicy::startup()).await.unwrap();
    let stale = gate.acquire().await.unwrap();
    assert!(gate.invalidate(&stale).await.unwrap());
    let fresh = gate.acquire().await.unwrap();

    assert!(!gate.invalidate(&stale).await.unwrap());

    let current = gate.current().unwrap();
    assert_eq!(current.id, fresh.id);
    assert_eq!(backend.closed(), vec![1]);
    assert_eq!(gate.status(), HealthStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_invalidation_after_backend_loss_reports_failure() {
    let backend = MockBackend::new();
    let (gate, _actor) = spawn_gate(&backend);
    gate.bootstrap(RetryPolicy::startup()).await.unwrap();
    let handle = gate.acquire().await.unwrap();

    backend
        .expect_connect()
        .always()
        .return_err(ErrorKind::Transport, "connection refused");
    gate.invalidate(&handle).await.unwrap();

    assert_eq!(gate.acquire().await.unwrap_err(), GateError::Unavailable);
    assert_eq!(gate.status(), HealthStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_retry_sequence_leaves_failed_state() {
    let backend = MockBackend::new().with_connect_delay(Duration::from_secs(60));
    let supervisor = ConnectionSupervisor::new(backend.clone(), Endpoint::new("mock://cluster"));
    let cancel = CancellationToken::new();
    let (actor, gate) = ConnectionActor::new(supervisor, 8);
    let actor = tokio::spawn(actor.with_cancellation(cancel.clone()).run());

    gate.start_bootstrap(RetryPolicy::startup()).await.unwrap();
    while gate.state() != ConnectionState::Connecting {
        tokio::task::yield_now().await;
    }

    cancel.cancel();
    actor.await.unwrap();

    assert_eq!(gate.state(), ConnectionState::Failed);
    assert_eq!(gate.status(), HealthStatus::Failed);
}
