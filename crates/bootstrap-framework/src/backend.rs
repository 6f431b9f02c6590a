//! # BackendClient Trait
//!
//! The `BackendClient` trait is the contract every external clustered service
//! (document store, message broker, ...) implements so the generic
//! [`ConnectionSupervisor`](crate::supervisor::ConnectionSupervisor) can drive it.
//!
//! # Architecture Note
//! The supervisor's retry loop, the gate's reconnection logic and the health
//! reporting are written *once* against this trait. A backend only has to say how
//! to open a handle, how to prove the handle is live, and how to close it.
//!
//! A handle that type-checks but cannot serve a request is indistinguishable from
//! "not connected". Implementations must therefore complete at least one round
//! trip with the backend inside [`BackendClient::connect`] (a readiness probe, a
//! topic listing, ...) and fail otherwise.

use async_trait::async_trait;
use std::fmt;

/// Username/password pair presented to the backend.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how to reach a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Backend-specific address (`couchbase://host`, `broker1:9092,broker2:9092`, ...).
    pub address: String,
    pub credentials: Option<Credentials>,
    /// Use an encrypted transport when the address does not already say so.
    pub tls: bool,
}

impl Endpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            credentials: None,
            tls: false,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }
}

/// Coarse classification of a backend failure, used by retry classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection refused, DNS failure, timeout.
    Transport,
    /// Credentials rejected.
    Auth,
    /// Reachable, but the cluster is still initializing.
    NotReady,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Auth => "auth",
            ErrorKind::NotReady => "not-ready",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// A handle factory for one kind of clustered backend.
///
/// # Async & Ownership
/// The trait is `#[async_trait]` so implementations can perform network I/O.
/// Handles are owned by the gate actor and shared read-only with callers as
/// `Arc`s, so `close` takes `&Self::Handle`. The actor withdraws a handle
/// before closing it, which keeps new callers away from it, but a caller that
/// acquired it earlier may still be using its clone. `close` must therefore
/// only release what the backend holds open on the handle's behalf (flush
/// pending writes, log) and leave the handle able to finish calls already in
/// progress. Whatever the handle owns is freed when the last clone drops.
#[async_trait]
pub trait BackendClient: Send + Sync + 'static {
    /// The live connection/session object.
    type Handle: Send + Sync + 'static;

    /// The backend's own error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Short name used in logs (`"docstore"`, `"broker"`).
    fn kind(&self) -> &'static str;

    /// Opens a handle. Must not succeed without one acknowledged round trip.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Self::Handle, Self::Error>;

    /// Confirms the backend behind `handle` is serving requests.
    async fn verify_live(&self, handle: &Self::Handle) -> Result<(), Self::Error>;

    /// Releases the handle's resources.
    async fn close(&self, _handle: &Self::Handle) {}

    /// Maps a backend error onto the coarse [`ErrorKind`] seen by classifiers.
    fn error_kind(&self, _error: &Self::Error) -> ErrorKind {
        ErrorKind::Other
    }
}
