//! # Bootstrap Sample
//!
//! Concrete backends and processes built on
//! [`bootstrap_framework`](bootstrap_framework).
//!
//! - **[docstore]**: Couchbase over its REST services, with bucket/scope/collection admin.
//! - **[broker]**: Kafka-compatible broker over `rdkafka`, with topic admin.
//! - **[clients]**: [`UserStore`](clients::UserStore) and
//!   [`MessagePublisher`](clients::MessagePublisher), which refuse to run while
//!   their backend is unavailable.
//! - **[lifecycle]**: serving runtime and one-shot init jobs.
//! - **[config]**: `clap` settings and YAML specification loading.
//!
//! ## Binaries
//!
//! | Binary | Purpose | Exit code |
//! |--------|---------|-----------|
//! | `docstore-init` | create the bucket, scopes and collections | `0` / `1` |
//! | `topic-init` | create the topics | `0` / `1` |
//! | `bootstrap-sample` | serving process with a stdin [`console`] | `0` |

pub mod broker;
pub mod clients;
pub mod config;
pub mod console;
pub mod docstore;
pub mod lifecycle;
pub mod model;
