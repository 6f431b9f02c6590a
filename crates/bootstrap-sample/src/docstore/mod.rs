//! Document store backend: REST client, liveness probe and resource admin.

mod admin;
pub mod client;
pub mod error;

pub use client::{ClusterAddress, DocStoreBackend, DocStoreHandle};
pub use error::DocStoreError;
