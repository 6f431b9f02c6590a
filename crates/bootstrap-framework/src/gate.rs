//! # Lazy Reconnection Gate
//!
//! The gate is the only way dependent operations reach a backend handle. It is
//! split the same way as every actor in this framework:
//!
//! - [`ConnectionActor`] (server half) owns the handle and the
//!   [`ConnectionSupervisor`], and processes requests one at a time.
//! - [`ConnectionGate`] (client half) is cheap to clone and is handed to every
//!   request handler.
//!
//! # Fast Path
//! The actor publishes the current handle on a `watch` channel. When a handle is
//! present, [`ConnectionGate::acquire`] returns it without sending a message and
//! without any I/O.
//!
//! # Slow Path
//! Without a handle, `acquire` asks the actor to repair the connection. The actor
//! runs at most one retry sequence at a time in a spawned task and fans its
//! result out to every caller that asked while it was running:
//!
//! | In flight | `Ensure` | `Bootstrap` |
//! |-----------|----------|-------------|
//! | nothing | start a lazy sequence, wait | start a startup sequence, wait |
//! | lazy sequence | wait for it | wait for it |
//! | startup sequence | answer "unavailable" at once | wait for it |
//!
//! Answering immediately during the startup sequence keeps dependent operations
//! from hanging for the whole startup budget.
//!
//! # Handle Replacement
//! Only the actor replaces the handle, release-then-acquire: it publishes "no
//! handle", closes the old one, then establishes a new one. On shutdown the
//! actor closes its handle exactly once.
//!
//! Callers that already hold an `Arc` of the old handle keep it until they
//! drop it. Closing does not invalidate those clones; see
//! [`BackendClient`] for what `close` is allowed to do.
//!
//! # Invalidation
//! A published handle says nothing about whether the backend is still there.
//! A dependent operation that fails with a transport error hands the handle
//! back through [`ConnectionGate::invalidate`]. If it is still the current
//! handle, the actor withdraws and closes it and the state returns to
//! `Uninitialized`, so the next `acquire` takes the slow path. A handle that
//! was already replaced is ignored, so concurrent failures on the same handle
//! cost one teardown.

use crate::backend::BackendClient;
use crate::error::{BootstrapError, GateError};
use crate::policy::RetryPolicy;
use crate::state::{ConnectionState, HealthStatus};
use crate::supervisor::ConnectionSupervisor;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Published<H> = Option<Arc<H>>;

enum GateRequest<B: BackendClient> {
    Ensure {
        respond_to: oneshot::Sender<Published<B::Handle>>,
    },
    Bootstrap {
        policy: RetryPolicy,
        respond_to: Option<oneshot::Sender<Result<(), BootstrapError>>>,
    },
    Reconnect {
        respond_to: oneshot::Sender<Published<B::Handle>>,
    },
    Invalidate {
        handle: Arc<B::Handle>,
        respond_to: oneshot::Sender<bool>,
    },
}

enum Waiter<H> {
    Handle(oneshot::Sender<Published<H>>),
    Bootstrap(oneshot::Sender<Result<(), BootstrapError>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SequenceKind {
    Startup,
    Lazy,
}

struct InFlight {
    kind: SequenceKind,
    task: JoinHandle<()>,
}

enum Event<B: BackendClient> {
    Request(GateRequest<B>),
    Completed(Result<B::Handle, BootstrapError>),
}

/// Server half of the gate.
pub struct ConnectionActor<B: BackendClient> {
    supervisor: Arc<ConnectionSupervisor<B>>,
    receiver: mpsc::Receiver<GateRequest<B>>,
    handle: watch::Sender<Published<B::Handle>>,
    completion_tx: mpsc::UnboundedSender<Result<B::Handle, BootstrapError>>,
    completions: mpsc::UnboundedReceiver<Result<B::Handle, BootstrapError>>,
    in_flight: Option<InFlight>,
    waiters: Vec<Waiter<B::Handle>>,
    lazy_policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<B: BackendClient> ConnectionActor<B> {
    /// Creates the actor and its gate.
    ///
    /// `buffer_size` bounds the request channel; callers wait for space when it
    /// is full.
    pub fn new(supervisor: ConnectionSupervisor<B>, buffer_size: usize) -> (Self, ConnectionGate<B>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let (handle, handle_rx) = watch::channel(None);
        let (completion_tx, completions) = mpsc::unbounded_channel();
        let state = supervisor.subscribe();

        let actor = Self {
            supervisor: Arc::new(supervisor),
            receiver,
            handle,
            completion_tx,
            completions,
            in_flight: None,
            waiters: Vec::new(),
            lazy_policy: RetryPolicy::lazy(),
            cancel: CancellationToken::new(),
        };
        let gate = ConnectionGate {
            sender,
            handle: handle_rx,
            state,
        };
        (actor, gate)
    }

    /// Policy for on-demand repairs. Defaults to [`RetryPolicy::lazy`].
    pub fn with_lazy_policy(mut self, policy: RetryPolicy) -> Self {
        self.lazy_policy = policy;
        self
    }

    /// Stops the actor (and any retry sequence) when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Processes requests until every gate is dropped or the token is cancelled.
    pub async fn run(mut self) {
        let backend = self.supervisor.backend().kind();
        info!(backend, "Gate started");

        loop {
            let event = tokio::select! {
                request = self.receiver.recv() => match request {
                    Some(request) => Event::Request(request),
                    None => break,
                },
                Some(result) = self.completions.recv() => Event::Completed(result),
                _ = self.cancel.cancelled() => break,
            };

            match event {
                Event::Request(request) => self.handle_request(request).await,
                Event::Completed(result) => self.complete(result),
            }
        }

        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
            let _ = in_flight.task.await;
            self.supervisor.abandon();
        }
        // A sequence can finish between the last event and the abort.
        while let Ok(result) = self.completions.try_recv() {
            if let Ok(handle) = result {
                self.supervisor.teardown(&handle).await;
            }
        }
        for waiter in self.waiters.drain(..) {
            match waiter {
                Waiter::Handle(tx) => {
                    let _ = tx.send(None);
                }
                Waiter::Bootstrap(tx) => {
                    let _ = tx.send(Err(BootstrapError::Cancelled { attempts: 0 }));
                }
            }
        }
        if let Some(handle) = self.handle.send_replace(None) {
            self.supervisor.teardown(&handle).await;
        }
        info!(backend, "Gate shutdown");
    }

    async fn handle_request(&mut self, request: GateRequest<B>) {
        let current = self.handle.borrow().clone();
        match request {
            GateRequest::Ensure { respond_to } => {
                if current.is_some() {
                    let _ = respond_to.send(current);
                    return;
                }
                match self.in_flight.as_ref().map(|f| f.kind) {
                    Some(SequenceKind::Startup) => {
                        debug!("Startup bootstrap in flight, reporting unavailable");
                        let _ = respond_to.send(None);
                    }
                    Some(SequenceKind::Lazy) => self.waiters.push(Waiter::Handle(respond_to)),
                    None => {
                        self.waiters.push(Waiter::Handle(respond_to));
                        self.start(SequenceKind::Lazy, self.lazy_policy.clone());
                    }
                }
            }
            GateRequest::Bootstrap { policy, respond_to } => {
                if current.is_some() {
                    if let Some(tx) = respond_to {
                        let _ = tx.send(Ok(()));
                    }
                    return;
                }
                if let Some(tx) = respond_to {
                    self.waiters.push(Waiter::Bootstrap(tx));
                }
                if self.in_flight.is_none() {
                    self.start(SequenceKind::Startup, policy);
                }
            }
            GateRequest::Reconnect { respond_to } => {
                self.waiters.push(Waiter::Handle(respond_to));
                if self.in_flight.is_some() {
                    return;
                }
                if let Some(old) = self.handle.send_replace(None) {
                    info!(backend = self.supervisor.backend().kind(), "Reconnect requested");
                    self.supervisor.teardown(&old).await;
                }
                self.start(SequenceKind::Lazy, self.lazy_policy.clone());
            }
            GateRequest::Invalidate { handle, respond_to } => {
                let is_current = current.is_some_and(|c| Arc::ptr_eq(&c, &handle));
                if is_current {
                    warn!(backend = self.supervisor.backend().kind(), "Handle invalidated");
                    self.handle.send_replace(None);
                    self.supervisor.teardown(&handle).await;
                } else {
                    debug!("Ignoring invalidation of a replaced handle");
                }
                let _ = respond_to.send(is_current);
            }
        }
    }

    fn start(&mut self, kind: SequenceKind, policy: RetryPolicy) {
        debug!(backend = self.supervisor.backend().kind(), ?kind, "Starting retry sequence");
        let supervisor = Arc::clone(&self.supervisor);
        let completions = self.completion_tx.clone();
        let cancel = self.cancel.child_token();
        let task = tokio::spawn(async move {
            let result = supervisor.establish(&policy, &cancel).await;
            let _ = completions.send(result);
        });
        self.in_flight = Some(InFlight { kind, task });
    }

    fn complete(&mut self, result: Result<B::Handle, BootstrapError>) {
        self.in_flight = None;
        let published = match result {
            Ok(handle) => {
                let handle = Arc::new(handle);
                self.handle.send_replace(Some(Arc::clone(&handle)));
                Ok(handle)
            }
            Err(e) => {
                warn!(
                    backend = self.supervisor.backend().kind(),
                    waiters = self.waiters.len(),
                    error = %e,
                    "Retry sequence failed"
                );
                Err(e)
            }
        };

        for waiter in self.waiters.drain(..) {
            match waiter {
                Waiter::Handle(tx) => {
                    let _ = tx.send(published.as_ref().ok().cloned());
                }
                Waiter::Bootstrap(tx) => {
                    let _ = tx.send(published.as_ref().map(|_| ()).map_err(Clone::clone));
                }
            }
        }
    }
}

/// Client half of the gate.
pub struct ConnectionGate<B: BackendClient> {
    sender: mpsc::Sender<GateRequest<B>>,
    handle: watch::Receiver<Published<B::Handle>>,
    state: watch::Receiver<ConnectionState>,
}

impl<B: BackendClient> Clone for ConnectionGate<B> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            handle: self.handle.clone(),
            state: self.state.clone(),
        }
    }
}

impl<B: BackendClient> ConnectionGate<B> {
    /// Whether a live handle is available, repairing the connection if needed.
    pub async fn ensure(&self) -> bool {
        self.acquire().await.is_ok()
    }

    /// A live handle, or [`GateError::Unavailable`].
    pub async fn acquire(&self) -> Result<Arc<B::Handle>, GateError> {
        if let Some(handle) = self.current() {
            debug!("Gate fast path");
            return Ok(handle);
        }
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(GateRequest::Ensure { respond_to })
            .await
            .map_err(|_| GateError::GateClosed)?;
        response
            .await
            .map_err(|_| GateError::GateDropped)?
            .ok_or(GateError::Unavailable)
    }

    /// The published handle, without contacting the actor.
    pub fn current(&self) -> Option<Arc<B::Handle>> {
        self.handle.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn status(&self) -> HealthStatus {
        self.state().health()
    }

    /// Runs the startup sequence under `policy` and waits for it.
    pub async fn bootstrap(&self, policy: RetryPolicy) -> Result<(), GateError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(GateRequest::Bootstrap {
                policy,
                respond_to: Some(respond_to),
            })
            .await
            .map_err(|_| GateError::GateClosed)?;
        response.await.map_err(|_| GateError::GateDropped)??;
        Ok(())
    }

    /// Starts the startup sequence without waiting for it.
    pub async fn start_bootstrap(&self, policy: RetryPolicy) -> Result<(), GateError> {
        self.sender
            .send(GateRequest::Bootstrap {
                policy,
                respond_to: None,
            })
            .await
            .map_err(|_| GateError::GateClosed)
    }

    /// Tears the handle down and re-establishes it with the lazy policy.
    /// Returns whether a handle is available afterwards.
    pub async fn reconnect(&self) -> Result<bool, GateError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(GateRequest::Reconnect { respond_to })
            .await
            .map_err(|_| GateError::GateClosed)?;
        Ok(response.await.map_err(|_| GateError::GateDropped)?.is_some())
    }

    /// Withdraws `handle` after a transport failure.
    ///
    /// Returns `true` when it was still the current handle and has been closed,
    /// `false` when the gate had already moved on from it. Nothing is
    /// re-established here; the next [`acquire`](Self::acquire) does that.
    pub async fn invalidate(&self, handle: &Arc<B::Handle>) -> Result<bool, GateError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(GateRequest::Invalidate {
                handle: Arc::clone(handle),
                respond_to,
            })
            .await
            .map_err(|_| GateError::GateClosed)?;
        response.await.map_err(|_| GateError::GateDropped)
    }
}
