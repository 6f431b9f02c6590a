//! Composition root for one backend inside a serving process.

use bootstrap_framework::{
    BackendClient, ConnectionActor, ConnectionGate, ConnectionSupervisor, Endpoint, GateError,
    HealthStatus, RetryPolicy,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Background startup sequence; `None` leaves the first connection to the
    /// first dependent call.
    pub startup: Option<RetryPolicy>,
    pub lazy: RetryPolicy,
    pub buffer_size: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            startup: Some(RetryPolicy::startup()),
            lazy: RetryPolicy::lazy(),
            buffer_size: 32,
        }
    }
}

/// Point-in-time health of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub backend: &'static str,
    pub status: HealthStatus,
}

/// Owns a gate actor and its cancellation token.
///
/// `start` never waits for the backend: a failed startup sequence leaves the
/// runtime up and dependents see [`GateError::Unavailable`] until a lazy
/// attempt succeeds.
pub struct BackendRuntime<B: BackendClient> {
    kind: &'static str,
    gate: ConnectionGate<B>,
    cancel: CancellationToken,
    actor: JoinHandle<()>,
}

impl<B: BackendClient> BackendRuntime<B> {
    pub async fn start(backend: B, endpoint: Endpoint, options: RuntimeOptions) -> Self {
        let kind = backend.kind();
        let cancel = CancellationToken::new();
        let supervisor = ConnectionSupervisor::new(backend, endpoint);
        let (actor, gate) = ConnectionActor::new(supervisor, options.buffer_size);
        let actor = actor
            .with_lazy_policy(options.lazy)
            .with_cancellation(cancel.clone());
        let actor = tokio::spawn(actor.run());

        if let Some(policy) = options.startup {
            if let Err(e) = gate.start_bootstrap(policy).await {
                warn!(backend = kind, error = %e, "Could not start bootstrap");
            }
        }
        info!(backend = kind, "Runtime started");

        Self {
            kind,
            gate,
            cancel,
            actor,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn gate(&self) -> &ConnectionGate<B> {
        &self.gate
    }

    pub fn status(&self) -> HealthStatus {
        self.gate.status()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            backend: self.kind,
            status: self.status(),
        }
    }

    pub async fn reconnect(&self) -> Result<bool, GateError> {
        info!(backend = self.kind, "Reconnect requested");
        self.gate.reconnect().await
    }

    /// Stops the actor, which closes the live handle, and waits for it.
    pub async fn shutdown(self) {
        info!(backend = self.kind, "Shutting down runtime");
        self.cancel.cancel();
        drop(self.gate);
        if let Err(e) = self.actor.await {
            error!(backend = self.kind, error = %e, "Gate actor task failed");
        }
    }
}
