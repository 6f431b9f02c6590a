//! Documents and payloads exchanged with the backends.

mod message;
mod user;

pub use message::{DeliveryReceipt, MessageEnvelope};
pub use user::{User, UserCreate};
