use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user as stored in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub doc_type: String,
}

/// Payload for creating a new user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserCreate {
    pub name: String,
    pub age: u32,
}

impl User {
    pub const DOC_TYPE: &'static str = "user";

    /// Builds a new document with a fresh v4 id, stamped now.
    pub fn new(params: UserCreate) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: params.name,
            age: params.age,
            created_at: Utc::now(),
            doc_type: Self::DOC_TYPE.to_string(),
        }
    }
}
