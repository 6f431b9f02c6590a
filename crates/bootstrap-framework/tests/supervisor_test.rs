use bootstrap_framework::mock::MockBackend;
use bootstrap_framework::{
    AttemptError, BootstrapError, ConnectionState, ConnectionSupervisor, Endpoint, ErrorKind,
    HealthStatus, RetryPolicy,
};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn supervisor(backend: &MockBackend) -> ConnectionSupervisor<MockBackend> {
    ConnectionSupervisor::new(backend.clone(), Endpoint::new("mock://cluster"))
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_on_last_permitted_attempt() {
    let backend = MockBackend::new();
    backend
        .expect_connect()
        .times(4)
        .return_err(ErrorKind::Transport, "connection refused");
    let supervisor = supervisor(&backend);
    let policy = RetryPolicy::fixed(5, Duration::from_secs(2));
    let start = Instant::now();

    let handle = supervisor
        .establish(&policy, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handle.id, 5);
    assert_eq!(backend.connect_calls(), 5);
    // Four sleeps between five attempts; nothing after the success.
    assert_eq!(start.elapsed(), Duration::from_secs(8));
    assert_eq!(supervisor.state(), ConnectionState::Connected);
    assert_eq!(supervisor.status(), HealthStatus::Connected);
    backend.verify();
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_backend_exhausts_budget() {
    let backend = MockBackend::new();
    backend
        .expect_connect()
        .always()
        .return_err(ErrorKind::Transport, "connection refused");
    let supervisor = supervisor(&backend);
    let policy = RetryPolicy::fixed(4, Duration::from_secs(2));

    let err = supervisor
        .establish(&policy, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BootstrapError::Exhausted {
            attempts: 4,
            last: AttemptError::Connect {
                kind: ErrorKind::Transport,
                message: "connection refused".into(),
            },
        }
    );
    assert_eq!(backend.connect_calls(), 4);
    assert_eq!(supervisor.state(), ConnectionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_within_larger_budget() {
    let backend = MockBackend::new();
    backend
        .expect_connect()
        .times(4)
        .return_err(ErrorKind::NotReady, "cluster initializing");
    let supervisor = supervisor(&backend);
    let policy = RetryPolicy::fixed(10, Duration::from_secs(2));

    supervisor
        .establish(&policy, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(backend.connect_calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_failed_verification_closes_handle_and_retries() {
    let backend = MockBackend::new();
    backend
        .expect_verify()
        .times(2)
        .return_err(ErrorKind::NotReady, "no healthy nodes");
    let supervisor = supervisor(&backend);

    let handle = supervisor
        .establish(&RetryPolicy::startup(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handle.id, 3);
    assert_eq!(backend.verify_calls(), 3);
    assert_eq!(backend.closed(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_establish_again_after_exhaustion() {
    let backend = MockBackend::new();
    backend
        .expect_connect()
        .times(3)
        .return_err(ErrorKind::Transport, "connection refused");
    let supervisor = supervisor(&backend);
    let policy = RetryPolicy::fixed(3, Duration::from_millis(500));
    let cancel = CancellationToken::new();

    assert!(supervisor.establish(&policy, &cancel).await.is_err());
    assert_eq!(supervisor.state(), ConnectionState::Failed);

    let handle = supervisor.establish(&policy, &cancel).await.unwrap();
    assert_eq!(handle.id, 4);
    assert_eq!(supervisor.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_auth_errors_are_retried_by_default() {
    let backend = MockBackend::new();
    backend
        .expect_connect()
        .always()
        .return_err(ErrorKind::Auth, "invalid credentials");
    let supervisor = supervisor(&backend);

    let err = supervisor
        .establish(
            &RetryPolicy::fixed(3, Duration::from_secs(1)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::Exhausted { attempts: 3, .. }));
    assert_eq!(backend.connect_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_fail_fast_on_auth_is_opt_in() {
    let backend = MockBackend::new();
    backend
        .expect_connect()
        .always()
        .return_err(ErrorKind::Auth, "invalid credentials");
    let supervisor = supervisor(&backend);
    let policy = RetryPolicy::fixed(30, Duration::from_secs(2)).fail_fast_on_auth();

    let err = supervisor
        .establish(&policy, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::Fatal { attempt: 1, .. }));
    assert_eq!(backend.connect_calls(), 1);
    assert_eq!(supervisor.state(), ConnectionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_unbounded_loop() {
    let backend = MockBackend::new();
    backend
        .expect_connect()
        .always()
        .return_err(ErrorKind::Transport, "connection refused");
    let supervisor = supervisor(&backend);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(4500)).await;
        trigger.cancel();
    });

    let err = supervisor
        .establish(&RetryPolicy::unbounded(Duration::from_secs(1)), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, BootstrapError::Cancelled { attempts: 5 });
    assert_eq!(supervisor.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_teardown_returns_to_uninitialized() {
    let backend = MockBackend::new();
    let supervisor = supervisor(&backend);
    let mut states = supervisor.subscribe();

    let handle = supervisor
        .establish(&RetryPolicy::lazy(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);

    supervisor.teardown(&handle).await;

    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), ConnectionState::Uninitialized);
    assert_eq!(supervisor.status(), HealthStatus::Disconnected);
    assert_eq!(backend.closed(), vec![1]);
}
