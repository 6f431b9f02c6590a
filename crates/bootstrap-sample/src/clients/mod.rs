//! Domain clients that only run their operation when the backend is available.

pub mod message_publisher;
pub mod user_store;

pub use message_publisher::{MessagePublisher, PublishError};
pub use user_store::{UserStore, UserStoreError};
