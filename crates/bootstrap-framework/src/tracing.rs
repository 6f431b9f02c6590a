//! # Observability & Tracing
//!
//! Structured logging for the services and init jobs built on this crate.
//!
//! ## Configuration
//!
//! [`setup_tracing`] installs a compact `fmt` subscriber filtered by `RUST_LOG`.
//! Module paths are hidden (`with_target(false)`); every event already carries a
//! `backend` or `resource` field saying where it came from.
//!
//! ## What Gets Traced
//!
//! - **Supervisor**: every failed attempt at `warn` with `attempt`, `max_attempts`
//!   and `class`; the final `Connected` or `Bootstrap failed`.
//! - **Gate**: actor start and shutdown, retry sequences, reconnect requests.
//!   Fast-path hits are `debug` only.
//! - **Provisioner**: one line per resource with its `outcome`.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Lifecycle and failures only
//! RUST_LOG=info topic-init
//!
//! # Include fast-path hits and readiness polls
//! RUST_LOG=debug docstore-init
//! ```
//!
//! A document-store init job against a cluster that is still starting looks like:
//!
//! ```text
//! INFO Establishing connection backend="couchbase" address=couchbase://db max_attempts=30
//! WARN Attempt failed label="couchbase" attempt=1 max_attempts=30 class=Transient error=connect failed (transport): ...
//! INFO Succeeded after retry label="couchbase" attempt=2
//! INFO Connected backend="couchbase" attempts=2
//! INFO Provisioned resource=main outcome=AlreadyExisted
//! INFO Provisioned resource=main._default.users outcome=Created
//! ```

/// Installs the global subscriber. Call once, at the top of `main`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
