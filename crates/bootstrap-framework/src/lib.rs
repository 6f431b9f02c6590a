//! # Bootstrap Framework
//!
//! Building blocks for processes that depend on clustered external services
//! (a document store, a message broker) which may not be up yet when the process
//! starts. The crate answers two questions once, for every backend:
//!
//! 1. **How do I get a live handle?** Retry until the backend answers, then keep
//!    the handle healthy on demand.
//! 2. **How do I make sure my buckets and topics exist?** Create them from a static
//!    specification, idempotently.
//!
//! ## Architecture Overview
//!
//! Components, leaves first:
//!
//! 1. **Backend Layer** ([`BackendClient`]) - connect, prove liveness, close. One
//!    implementation per backend kind.
//! 2. **Supervisor Layer** ([`ConnectionSupervisor`]) - the retry loop and the
//!    [`ConnectionState`] machine.
//! 3. **Gate Layer** ([`ConnectionActor`] + [`ConnectionGate`]) - owns the handle,
//!    repairs it lazily, serves it to dependent operations and withdraws it
//!    when they report it stale.
//! 4. **Provisioning Layer** ([`Provisioner`] + [`ResourceAdmin`]) - creates the
//!    resources of a [`BucketSpec`] or [`TopicsSpec`].
//!
//! ```text
//! entry point ──▶ ConnectionGate ──▶ ConnectionActor ──▶ ConnectionSupervisor ──▶ BackendClient
//!                                                                                     │
//! init job ───────────────────────────────────────────▶ Provisioner ──▶ ResourceAdmin ◀┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use bootstrap_framework::mock::MockBackend;
//! use bootstrap_framework::{ConnectionActor, ConnectionSupervisor, Endpoint, HealthStatus, RetryPolicy};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let supervisor = ConnectionSupervisor::new(MockBackend::new(), Endpoint::new("mock://"));
//!     let (actor, gate) = ConnectionActor::new(supervisor, 16);
//!     tokio::spawn(actor.run());
//!
//!     gate.bootstrap(RetryPolicy::fixed(3, Duration::from_millis(10))).await.unwrap();
//!     assert_eq!(gate.status(), HealthStatus::Connected);
//!
//!     // Dependent operations go through the gate.
//!     let handle = gate.acquire().await.unwrap();
//!     assert_eq!(handle.id, 1);
//! }
//! ```
//!
//! ## Retry Defaults
//!
//! The defaults keep a fixed interval and treat every failure as transient,
//! authentication errors included. See [`policy`] for the opt-in alternatives.

pub mod backend;
pub mod error;
pub mod gate;
pub mod mock;
pub mod policy;
pub mod provision;
pub mod spec;
pub mod state;
pub mod supervisor;
pub mod tracing;

// Re-export core types for convenience
pub use backend::{BackendClient, Credentials, Endpoint, ErrorKind};
pub use error::{AttemptError, BootstrapError, GateError, ProvisionError, SpecError};
pub use gate::{ConnectionActor, ConnectionGate};
pub use policy::{retry, Attempts, Backoff, Classifier, ErrorClass, RetryPolicy};
pub use provision::{
    CreateOutcome, FailurePolicy, ProvisionOutcome, ProvisionReport, ProvisionTarget,
    Provisioner, ResourceAdmin,
};
pub use spec::{BucketSpec, DocumentResource, ScopeSpec, TopicSpec, TopicsSpec};
pub use state::{ConnectionState, HealthStatus};
pub use supervisor::ConnectionSupervisor;
