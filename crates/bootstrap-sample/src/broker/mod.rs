//! Message broker backend: producer, metadata probe and topic admin.

mod admin;
pub mod client;
pub mod error;

pub use client::{BrokerBackend, BrokerHandle};
pub use error::BrokerError;
