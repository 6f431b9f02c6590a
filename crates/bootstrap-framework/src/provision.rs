//! # Declarative Resource Provisioner
//!
//! Creates every resource of a specification, in order, against a live backend.
//! "Already exists" is success: init jobs run on every deployment and must be
//! idempotent.
//!
//! # Failure Policies
//!
//! | Policy | On a hard error | Used for |
//! |--------|-----------------|----------|
//! | [`FailurePolicy::FailFast`] | abort, surface the first error | hierarchies (bucket → scope → collection) |
//! | [`FailurePolicy::BestEffort`] | keep going, collect every error | flat lists (topics) |
//!
//! # Readiness
//! Some resources are created asynchronously by the cluster (a bucket exists
//! before it can hold collections). Resources whose
//! [`ProvisionTarget::requires_readiness`] is true are polled with the
//! provisioner's readiness policy before anything after them is attempted, so a
//! child is never created before its parent reports ready.

use crate::backend::ErrorKind;
use crate::error::{AttemptError, ProvisionError};
use crate::policy::{retry, RetryPolicy};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt::{self, Debug};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Something the provisioner can create and report on.
pub trait ProvisionTarget: Debug + Send + Sync {
    /// Unique, fully qualified name (`main._default.users`, `orders`).
    fn name(&self) -> String;

    /// Name of the resource this one lives in, if any.
    fn parent(&self) -> Option<String> {
        None
    }

    /// Whether the cluster finishes creating this resource asynchronously.
    fn requires_readiness(&self) -> bool {
        false
    }
}

/// Result of a single create call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExisted,
}

/// Administrative operations a live handle offers to the provisioner.
#[async_trait]
pub trait ResourceAdmin: Send + Sync {
    type Resource: ProvisionTarget;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates `resource`, reporting [`CreateOutcome::AlreadyExisted`] instead of
    /// failing when the backend already has it.
    async fn create(&self, resource: &Self::Resource) -> Result<CreateOutcome, Self::Error>;

    /// Whether `resource` is ready to hold children. Errors count as "not yet".
    async fn is_ready(&self, _resource: &Self::Resource) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Per-resource outcome recorded in a [`ProvisionReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExisted,
    Failed(String),
}

impl From<CreateOutcome> for ProvisionOutcome {
    fn from(outcome: CreateOutcome) -> Self {
        match outcome {
            CreateOutcome::Created => ProvisionOutcome::Created,
            CreateOutcome::AlreadyExisted => ProvisionOutcome::AlreadyExisted,
        }
    }
}

impl fmt::Display for ProvisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionOutcome::Created => f.write_str("created"),
            ProvisionOutcome::AlreadyExisted => f.write_str("already existed"),
            ProvisionOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Ordered outcomes of one provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    entries: Vec<(String, ProvisionOutcome)>,
}

impl ProvisionReport {
    fn push(&mut self, name: String, outcome: ProvisionOutcome) {
        self.entries.push((name, outcome));
    }

    pub fn entries(&self) -> &[(String, ProvisionOutcome)] {
        &self.entries
    }

    pub fn outcome(&self, name: &str) -> Option<&ProvisionOutcome> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn created(&self) -> Vec<&str> {
        self.names_where(|o| *o == ProvisionOutcome::Created)
    }

    pub fn already_existed(&self) -> Vec<&str> {
        self.names_where(|o| *o == ProvisionOutcome::AlreadyExisted)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names_where(|o| matches!(o, ProvisionOutcome::Failed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failed().is_empty()
    }

    fn names_where(&self, pred: impl Fn(&ProvisionOutcome) -> bool) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, outcome)| pred(outcome))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// What to do when a resource fails for a reason other than "already exists".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    FailFast,
    BestEffort { require_full_success: bool },
}

pub struct Provisioner {
    failure_policy: FailurePolicy,
    readiness: RetryPolicy,
    cancel: CancellationToken,
}

impl Provisioner {
    pub fn new(failure_policy: FailurePolicy) -> Self {
        Self {
            failure_policy,
            readiness: RetryPolicy::readiness(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_readiness(mut self, readiness: RetryPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Creates `resources` in order through `admin`.
    pub async fn provision<A: ResourceAdmin>(
        &self,
        admin: &A,
        resources: &[A::Resource],
    ) -> Result<ProvisionReport, ProvisionError> {
        let mut report = ProvisionReport::default();
        let mut unavailable: HashSet<String> = HashSet::new();
        info!(resources = resources.len(), policy = ?self.failure_policy, "Provisioning");

        for resource in resources {
            let name = resource.name();

            if let Some(parent) = resource.parent() {
                if unavailable.contains(&parent) {
                    let reason = format!("parent {parent} not provisioned");
                    warn!(resource = %name, %reason, "Skipped");
                    unavailable.insert(name.clone());
                    report.push(name, ProvisionOutcome::Failed(reason));
                    continue;
                }
            }

            match self.provision_one(admin, resource, &name).await {
                Ok(outcome) => {
                    info!(resource = %name, outcome = ?outcome, "Provisioned");
                    report.push(name, outcome.into());
                }
                Err(reason) => {
                    error!(resource = %name, %reason, "Provisioning failed");
                    unavailable.insert(name.clone());
                    report.push(name.clone(), ProvisionOutcome::Failed(reason.clone()));
                    if self.failure_policy == FailurePolicy::FailFast {
                        return Err(ProvisionError::Aborted {
                            resource: name,
                            reason,
                            report,
                        });
                    }
                }
            }
        }

        if let FailurePolicy::BestEffort {
            require_full_success: true,
        } = self.failure_policy
        {
            if !report.is_success() {
                return Err(ProvisionError::Incomplete { report });
            }
        }
        Ok(report)
    }

    async fn provision_one<A: ResourceAdmin>(
        &self,
        admin: &A,
        resource: &A::Resource,
        name: &str,
    ) -> Result<CreateOutcome, String> {
        let outcome = admin.create(resource).await.map_err(|e| e.to_string())?;
        if resource.requires_readiness() {
            self.await_ready(admin, resource, name).await?;
        }
        Ok(outcome)
    }

    async fn await_ready<A: ResourceAdmin>(
        &self,
        admin: &A,
        resource: &A::Resource,
        name: &str,
    ) -> Result<(), String> {
        let (_, polls) = retry(&self.readiness, &self.cancel, name, |poll| async move {
            match admin.is_ready(resource).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(AttemptError::Verify {
                    kind: ErrorKind::NotReady,
                    message: format!("{name} not ready after poll {poll}"),
                }),
                Err(e) => Err(AttemptError::Verify {
                    kind: ErrorKind::NotReady,
                    message: e.to_string(),
                }),
            }
        })
        .await
        .map_err(|e| e.to_string())?;

        debug!(resource = %name, polls, "Ready");
        Ok(())
    }
}
