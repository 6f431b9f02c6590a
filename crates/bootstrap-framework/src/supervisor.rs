//! # Connection Supervisor
//!
//! The `ConnectionSupervisor` owns the retry loop that turns a [`BackendClient`]
//! plus an [`Endpoint`] into a live, verified handle, and it owns the
//! [`ConnectionState`] describing where that loop is.
//!
//! # Architecture Note
//! The supervisor is generic over the backend, so the document store and the
//! broker share one retry implementation. It holds no handle itself: every call
//! to [`establish`](ConnectionSupervisor::establish) is independent, starts its
//! own attempt counter and hands the handle to the caller (normally the
//! [`ConnectionActor`](crate::gate::ConnectionActor)). Calling it again after an
//! exhausted run is always safe.
//!
//! State is published through a `tokio::sync::watch` channel so health checks
//! read it without locks and without waiting for the retry loop.

use crate::backend::{BackendClient, Endpoint};
use crate::error::{AttemptError, BootstrapError};
use crate::policy::{retry, RetryPolicy};
use crate::state::{ConnectionState, HealthStatus};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct ConnectionSupervisor<B: BackendClient> {
    backend: Arc<B>,
    endpoint: Endpoint,
    state: watch::Sender<ConnectionState>,
}

impl<B: BackendClient> ConnectionSupervisor<B> {
    pub fn new(backend: B, endpoint: Endpoint) -> Self {
        let (state, _) = watch::channel(ConnectionState::Uninitialized);
        Self {
            backend: Arc::new(backend),
            endpoint,
            state,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn status(&self) -> HealthStatus {
        self.state().health()
    }

    /// Watches every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Obtains a live handle, retrying under `policy`.
    ///
    /// # Algorithm
    /// 1. `connect`, then `verify_live`. Both succeeding returns the handle at once.
    /// 2. A failure is classified and logged with its attempt number. A handle
    ///    that connected but failed verification is closed before moving on.
    /// 3. The last permitted attempt failing yields [`BootstrapError::Exhausted`];
    ///    otherwise the loop sleeps per the policy's backoff and tries again.
    ///
    /// The cancellation token is checked between attempts and during sleeps.
    pub async fn establish(
        &self,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<B::Handle, BootstrapError> {
        let kind = self.backend.kind();
        self.transition(ConnectionState::Connecting);
        info!(
            backend = kind,
            address = %self.endpoint.address,
            max_attempts = %policy.max_attempts,
            "Establishing connection"
        );

        let outcome = retry(policy, cancel, kind, |attempt| self.attempt(attempt)).await;

        match outcome {
            Ok((handle, attempts)) => {
                self.transition(ConnectionState::Connected);
                info!(backend = kind, attempts, "Connected");
                Ok(handle)
            }
            Err(e) => {
                self.transition(ConnectionState::Failed);
                error!(backend = kind, error = %e, "Bootstrap failed");
                Err(e)
            }
        }
    }

    /// Closes `handle` and returns to `Uninitialized` (explicit teardown).
    pub async fn teardown(&self, handle: &B::Handle) {
        self.backend.close(handle).await;
        self.transition(ConnectionState::Uninitialized);
        info!(backend = self.backend.kind(), "Connection torn down");
    }

    /// Marks a retry sequence that was stopped from outside as failed.
    ///
    /// Used when the task running [`establish`](Self::establish) is aborted
    /// and never reaches its own final transition.
    pub(crate) fn abandon(&self) {
        if self.state() == ConnectionState::Connecting {
            self.transition(ConnectionState::Failed);
            warn!(backend = self.backend.kind(), "Retry sequence abandoned");
        }
    }

    async fn attempt(&self, attempt: u32) -> Result<B::Handle, AttemptError> {
        debug!(backend = self.backend.kind(), attempt, "Connecting");
        let handle = self
            .backend
            .connect(&self.endpoint)
            .await
            .map_err(|e| AttemptError::Connect {
                kind: self.backend.error_kind(&e),
                message: e.to_string(),
            })?;

        if let Err(e) = self.backend.verify_live(&handle).await {
            self.backend.close(&handle).await;
            return Err(AttemptError::Verify {
                kind: self.backend.error_kind(&e),
                message: e.to_string(),
            });
        }
        Ok(handle)
    }

    fn transition(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if !current.can_transition_to(next) {
                // Connected -> Connecting happens when a caller re-establishes
                // without tearing down first; the new state still wins.
                warn!(from = %current, to = %next, "Unexpected state transition");
            }
            *current = next;
            true
        });
    }
}
