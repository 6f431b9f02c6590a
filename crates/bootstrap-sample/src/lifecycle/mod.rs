//! # Process Lifecycle
//!
//! The two ways a process holds a backend:
//!
//! | Process | Type | On connection failure |
//! |---------|------|-----------------------|
//! | serving (`bootstrap-sample`) | [`BackendRuntime`] | stays up, dependents get `Unavailable` |
//! | init job (`docstore-init`, `topic-init`) | [`InitJob`] | exits `1` |
//!
//! A serving process starts one [`BackendRuntime`] per backend, hands
//! [`ConnectionGate`](bootstrap_framework::ConnectionGate) clones to its domain
//! clients and calls [`BackendRuntime::shutdown`] on the way out:
//!
//! ```rust,ignore
//! let docstore = BackendRuntime::start(backend, endpoint, RuntimeOptions::default()).await;
//! let users = UserStore::new(docstore.gate().clone(), "main");
//! // ...
//! docstore.shutdown().await;
//! ```
//!
//! Tracing is installed with
//! [`setup_tracing`](bootstrap_framework::tracing::setup_tracing); `RUST_LOG`
//! selects the level.

mod init_job;
mod runtime;

pub use init_job::{exit_code, exit_status, InitJob, InitJobError};
pub use runtime::{BackendRuntime, HealthReport, RuntimeOptions};
