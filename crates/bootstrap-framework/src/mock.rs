//! # Mock Backends & Testing Guide
//!
//! In-memory doubles for the two seams of the framework, so supervisor, gate and
//! provisioner logic can be tested without a cluster:
//!
//! - [`MockBackend`] implements [`BackendClient`] with scripted connect/verify
//!   outcomes and call counters.
//! - [`MockCluster`] implements [`ResourceAdmin`] with an in-memory set of
//!   existing resources, readiness countdowns, failure injection and an event log.
//!
//! ## When to use Mocks vs Real Backends
//!
//! | Feature | Mocks | Real Backend |
//! |---------|-------|--------------|
//! | **Speed** | Instant (works with a paused clock) | Network round trips |
//! | **Determinism** | Scripted outcomes | Subject to cluster start-up |
//! | **Error Injection** | `return_err`, `fail`, `not_found_for` | Stop the container |
//! | **Use Case** | Retry, gate and provisioning logic | End-to-end deployment checks |
//!
//! ## Scripting Connection Attempts
//!
//! Expectations are consumed in order. Once the script is exhausted every call
//! succeeds.
//!
//! ```rust
//! use bootstrap_framework::mock::MockBackend;
//! use bootstrap_framework::{ConnectionSupervisor, Endpoint, ErrorKind, RetryPolicy};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MockBackend::new();
//!     backend
//!         .expect_connect()
//!         .times(2)
//!         .return_err(ErrorKind::Transport, "connection refused");
//!
//!     let supervisor = ConnectionSupervisor::new(backend.clone(), Endpoint::new("mock://"));
//!     let policy = RetryPolicy::fixed(5, Duration::from_millis(1));
//!     let handle = supervisor.establish(&policy, &CancellationToken::new()).await.unwrap();
//!
//!     assert_eq!(backend.connect_calls(), 3);
//!     assert_eq!(handle.id, 3);
//!     backend.verify();
//! }
//! ```
//!
//! ## Simulating a Cluster
//!
//! ```rust
//! use bootstrap_framework::mock::MockCluster;
//! use bootstrap_framework::{FailurePolicy, ProvisionOutcome, Provisioner, TopicsSpec};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cluster = MockCluster::new().with_existing(["users"]);
//!     let spec = TopicsSpec::new(["orders", "users"]);
//!
//!     let provisioner = Provisioner::new(FailurePolicy::BestEffort { require_full_success: true });
//!     let report = provisioner.provision(&cluster, &spec.resources()).await.unwrap();
//!
//!     assert_eq!(report.outcome("orders"), Some(&ProvisionOutcome::Created));
//!     assert_eq!(report.outcome("users"), Some(&ProvisionOutcome::AlreadyExisted));
//! }
//! ```

use crate::backend::{BackendClient, Endpoint, ErrorKind};
use crate::provision::{CreateOutcome, ProvisionTarget, ResourceAdmin};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Error produced by the mocks, carrying its own classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct MockError {
    pub kind: ErrorKind,
    pub message: String,
}

impl MockError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Handle returned by [`MockBackend::connect`]; ids count connect calls from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockHandle {
    pub id: u64,
}

// =============================================================================
// MOCK BACKEND
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Step {
    Connect,
    Verify,
}

struct Expectation {
    /// `None` repeats forever.
    remaining: Option<u32>,
    response: Result<(), MockError>,
}

#[derive(Default)]
struct BackendState {
    connect: VecDeque<Expectation>,
    verify: VecDeque<Expectation>,
    connect_delay: Duration,
    connect_calls: u32,
    verify_calls: u32,
    closed: Vec<u64>,
}

impl BackendState {
    fn script(&mut self, step: Step) -> &mut VecDeque<Expectation> {
        match step {
            Step::Connect => &mut self.connect,
            Step::Verify => &mut self.verify,
        }
    }

    fn next_response(&mut self, step: Step) -> Result<(), MockError> {
        let script = self.script(step);
        let Some(front) = script.front_mut() else {
            return Ok(());
        };
        let response = front.response.clone();
        let used_up = match front.remaining.as_mut() {
            Some(remaining) if *remaining <= 1 => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        };
        if used_up {
            script.pop_front();
        }
        response
    }
}

/// A scripted [`BackendClient`]. Clones share their script and counters.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next `connect` outcome(s).
    pub fn expect_connect(&self) -> ExpectationBuilder {
        ExpectationBuilder::new(Arc::clone(&self.state), Step::Connect)
    }

    /// Scripts the next `verify_live` outcome(s).
    pub fn expect_verify(&self) -> ExpectationBuilder {
        ExpectationBuilder::new(Arc::clone(&self.state), Step::Verify)
    }

    /// Makes every `connect` take `delay` before answering.
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        lock(&self.state).connect_delay = delay;
        self
    }

    pub fn connect_calls(&self) -> u32 {
        lock(&self.state).connect_calls
    }

    pub fn verify_calls(&self) -> u32 {
        lock(&self.state).verify_calls
    }

    /// Ids of the handles closed so far, in order.
    pub fn closed(&self) -> Vec<u64> {
        lock(&self.state).closed.clone()
    }

    /// Panics if a bounded expectation was not consumed.
    pub fn verify(&self) {
        let state = lock(&self.state);
        let pending = state
            .connect
            .iter()
            .chain(state.verify.iter())
            .filter(|e| e.remaining.is_some())
            .count();
        if pending > 0 {
            panic!("Not all expectations were met. {pending} remaining");
        }
    }
}

#[async_trait]
impl BackendClient for MockBackend {
    type Handle = MockHandle;
    type Error = MockError;

    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self, _endpoint: &Endpoint) -> Result<MockHandle, MockError> {
        let (id, delay, response) = {
            let mut state = lock(&self.state);
            state.connect_calls += 1;
            let response = state.next_response(Step::Connect);
            (u64::from(state.connect_calls), state.connect_delay, response)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response.map(|_| MockHandle { id })
    }

    async fn verify_live(&self, _handle: &MockHandle) -> Result<(), MockError> {
        let mut state = lock(&self.state);
        state.verify_calls += 1;
        state.next_response(Step::Verify)
    }

    async fn close(&self, handle: &MockHandle) {
        lock(&self.state).closed.push(handle.id);
    }

    fn error_kind(&self, error: &MockError) -> ErrorKind {
        error.kind
    }
}

/// Builder for [`MockBackend`] expectations.
pub struct ExpectationBuilder {
    state: Arc<Mutex<BackendState>>,
    step: Step,
    remaining: Option<u32>,
}

impl ExpectationBuilder {
    fn new(state: Arc<Mutex<BackendState>>, step: Step) -> Self {
        Self {
            state,
            step,
            remaining: Some(1),
        }
    }

    /// Applies the outcome to the next `n` calls.
    pub fn times(mut self, n: u32) -> Self {
        self.remaining = Some(n);
        self
    }

    /// Applies the outcome to every remaining call.
    pub fn always(mut self) -> Self {
        self.remaining = None;
        self
    }

    pub fn return_ok(self) {
        self.push(Ok(()));
    }

    pub fn return_err(self, kind: ErrorKind, message: &str) {
        self.push(Err(MockError::new(kind, message)));
    }

    fn push(self, response: Result<(), MockError>) {
        if self.remaining == Some(0) {
            return;
        }
        lock(&self.state).script(self.step).push_back(Expectation {
            remaining: self.remaining,
            response,
        });
    }
}

// =============================================================================
// MOCK CLUSTER
// =============================================================================

/// What a [`MockCluster`] was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterEvent {
    Create(String),
    Poll { resource: String, ready: bool },
}

#[derive(Default)]
struct ClusterState {
    existing: HashSet<String>,
    creates: HashMap<String, u32>,
    not_found: HashMap<String, u32>,
    not_ready: HashMap<String, u32>,
    failures: HashMap<String, String>,
    events: Vec<ClusterEvent>,
}

/// An in-memory [`ResourceAdmin`]. Clones share the same cluster.
pub struct MockCluster<R> {
    state: Arc<Mutex<ClusterState>>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for MockCluster<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            _resource: PhantomData,
        }
    }
}

impl<R> Default for MockCluster<R> {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            _resource: PhantomData,
        }
    }
}

impl<R> MockCluster<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resources that exist before provisioning starts.
    pub fn with_existing<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.state)
            .existing
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// `name` reports not ready until readiness poll number `poll`.
    pub fn ready_after(self, name: &str, poll: u32) -> Self {
        lock(&self.state)
            .not_ready
            .insert(name.to_string(), poll.saturating_sub(1));
        self
    }

    /// The first `polls` readiness polls of `name` fail with "not found".
    pub fn not_found_for(self, name: &str, polls: u32) -> Self {
        lock(&self.state).not_found.insert(name.to_string(), polls);
        self
    }

    /// Creating `name` fails with `reason`.
    pub fn fail(self, name: &str, reason: &str) -> Self {
        lock(&self.state)
            .failures
            .insert(name.to_string(), reason.to_string());
        self
    }

    pub fn exists(&self, name: &str) -> bool {
        lock(&self.state).existing.contains(name)
    }

    /// How many times `name` was actually created (not counting "already exists").
    pub fn create_count(&self, name: &str) -> u32 {
        lock(&self.state).creates.get(name).copied().unwrap_or(0)
    }

    pub fn poll_count(&self, name: &str) -> usize {
        lock(&self.state)
            .events
            .iter()
            .filter(|e| matches!(e, ClusterEvent::Poll { resource, .. } if resource == name))
            .count()
    }

    pub fn events(&self) -> Vec<ClusterEvent> {
        lock(&self.state).events.clone()
    }
}

#[async_trait]
impl<R: ProvisionTarget> ResourceAdmin for MockCluster<R> {
    type Resource = R;
    type Error = MockError;

    async fn create(&self, resource: &R) -> Result<CreateOutcome, MockError> {
        let name = resource.name();
        let mut state = lock(&self.state);
        state.events.push(ClusterEvent::Create(name.clone()));
        if let Some(reason) = state.failures.get(&name) {
            return Err(MockError::new(ErrorKind::Other, reason.clone()));
        }
        if !state.existing.insert(name.clone()) {
            return Ok(CreateOutcome::AlreadyExisted);
        }
        *state.creates.entry(name).or_default() += 1;
        Ok(CreateOutcome::Created)
    }

    async fn is_ready(&self, resource: &R) -> Result<bool, MockError> {
        let name = resource.name();
        let mut guard = lock(&self.state);
        let state = &mut *guard;

        if let Some(left) = state.not_found.get_mut(&name).filter(|left| **left > 0) {
            *left -= 1;
            state.events.push(ClusterEvent::Poll {
                resource: name.clone(),
                ready: false,
            });
            return Err(MockError::new(
                ErrorKind::NotReady,
                format!("{name} not found"),
            ));
        }

        let ready = match state.not_ready.get_mut(&name).filter(|left| **left > 0) {
            Some(left) => {
                *left -= 1;
                false
            }
            None => true,
        };
        state.events.push(ClusterEvent::Poll {
            resource: name,
            ready,
        });
        Ok(ready)
    }
}
