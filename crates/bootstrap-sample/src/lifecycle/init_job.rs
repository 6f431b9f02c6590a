//! One-shot provisioning jobs.
//!
//! An init job connects with the startup policy, provisions its resources once,
//! closes the handle and exits. Unlike a serving process, a connection that
//! never comes up is fatal here.

use crate::config::ConfigError;
use bootstrap_framework::{
    BackendClient, BootstrapError, ConnectionSupervisor, Endpoint, ProvisionError,
    ProvisionOutcome, ProvisionReport, Provisioner, ResourceAdmin, RetryPolicy,
};
use std::process::ExitCode;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum InitJobError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not connect: {0}")]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

pub struct InitJob<B: BackendClient> {
    name: &'static str,
    supervisor: ConnectionSupervisor<B>,
    policy: RetryPolicy,
    provisioner: Provisioner,
    cancel: CancellationToken,
}

impl<B: BackendClient> InitJob<B> {
    pub fn new(
        name: &'static str,
        backend: B,
        endpoint: Endpoint,
        policy: RetryPolicy,
        provisioner: Provisioner,
    ) -> Self {
        Self {
            name,
            supervisor: ConnectionSupervisor::new(backend, endpoint),
            policy,
            provisioner,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops connection retries and readiness polling when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.provisioner = self.provisioner.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor<B> {
        &self.supervisor
    }

    /// Provisions `resources` through the admin that `admin` builds from the
    /// live handle. The handle is torn down whatever the outcome.
    pub async fn run<A, F>(
        &self,
        resources: &[A::Resource],
        admin: F,
    ) -> Result<ProvisionReport, InitJobError>
    where
        A: ResourceAdmin,
        F: FnOnce(&B::Handle) -> A,
    {
        info!(job = self.name, resources = resources.len(), "Init job starting");
        let handle = self.supervisor.establish(&self.policy, &self.cancel).await?;

        let result = self.provisioner.provision(&admin(&handle), resources).await;
        self.supervisor.teardown(&handle).await;

        match &result {
            Ok(report) => log_report(self.name, report),
            Err(e) => {
                log_report(self.name, e.report());
                error!(job = self.name, error = %e, "Provisioning failed");
            }
        }
        result.map_err(Into::into)
    }
}

fn log_report(job: &str, report: &ProvisionReport) {
    for (resource, outcome) in report.entries() {
        match outcome {
            ProvisionOutcome::Failed(reason) => {
                warn!(job, %resource, %reason, "Resource failed")
            }
            outcome => info!(job, %resource, %outcome, "Resource ready"),
        }
    }
    info!(
        job,
        created = report.created().len(),
        already_existed = report.already_existed().len(),
        failed = report.failed().len(),
        "Provisioning summary"
    );
}

/// `0` on full success, `1` otherwise.
pub fn exit_status(result: &Result<ProvisionReport, InitJobError>) -> u8 {
    match result {
        Ok(report) if report.is_success() => 0,
        Ok(_) | Err(_) => 1,
    }
}

pub fn exit_code(result: &Result<ProvisionReport, InitJobError>) -> ExitCode {
    ExitCode::from(exit_status(result))
}
