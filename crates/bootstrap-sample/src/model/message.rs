use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope published for every accepted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl MessageEnvelope {
    pub const SOURCE: &'static str = "api";

    /// Wraps `message`, deriving the id from the timestamp (`msg_<unix millis>`).
    pub fn new(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: format!("msg_{}", timestamp.timestamp_millis()),
            message: message.into(),
            timestamp,
            source: Self::SOURCE.to_string(),
        }
    }
}

/// Where the broker stored a published message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub id: String,
    pub partition: i32,
    pub offset: i64,
}
