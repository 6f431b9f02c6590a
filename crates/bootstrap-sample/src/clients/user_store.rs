//! # User Store
//!
//! Writes user documents into `<bucket>._default.users` through the query
//! service. Every call goes through the [`ConnectionGate`] first, so a store
//! that is down answers [`UserStoreError::Unavailable`] instead of hanging.
//!
//! A query that fails at the transport level means the handle is stale: it is
//! handed back to the gate and the caller gets `Unavailable` as well.
use crate::docstore::{DocStoreBackend, DocStoreError};
use crate::model::{User, UserCreate};
use bootstrap_framework::{ConnectionGate, ErrorKind, GateError};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("document store unavailable")]
    Unavailable,
    #[error("failed to store user: {0}")]
    Storage(#[from] DocStoreError),
    #[error("failed to encode user document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Gate(GateError),
}

impl From<GateError> for UserStoreError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Unavailable => UserStoreError::Unavailable,
            other => UserStoreError::Gate(other),
        }
    }
}

#[derive(Clone)]
pub struct UserStore {
    gate: ConnectionGate<DocStoreBackend>,
    bucket: String,
}

impl UserStore {
    pub fn new(gate: ConnectionGate<DocStoreBackend>, bucket: impl Into<String>) -> Self {
        Self {
            gate,
            bucket: bucket.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn create_user(&self, params: UserCreate) -> Result<User, UserStoreError> {
        let handle = self.gate.acquire().await.inspect_err(|e| {
            warn!(error = %e, "Document store not available");
        })?;

        let user = User::new(params);
        let statement = format!(
            "INSERT INTO `{}`.`_default`.`users` (KEY, VALUE) VALUES ($1, $2)",
            self.bucket
        );
        debug!(user_id = %user.id, "Sending request");
        match handle
            .query(&statement, vec![json!(user.id), serde_json::to_value(&user)?])
            .await
        {
            Ok(_) => Ok(user),
            Err(e) if e.kind() == ErrorKind::Transport => {
                warn!(error = %e, "Document store unreachable, invalidating handle");
                self.gate.invalidate(&handle).await?;
                Err(UserStoreError::Unavailable)
            }
            Err(e) => Err(e.into()),
        }
    }
}
