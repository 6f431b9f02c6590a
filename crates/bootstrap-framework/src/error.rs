//! # Framework Errors
//!
//! This module defines the error types shared by every layer of the bootstrap
//! framework. Each component gets its own enum so callers can match on exactly
//! the failures that component can produce:
//!
//! - [`AttemptError`]: one failed connection attempt (connect or verify).
//! - [`BootstrapError`]: the supervisor gave up (budget, fatal error, cancellation).
//! - [`GateError`]: a dependent operation could not obtain a live handle.
//! - [`ProvisionError`]: resource creation failed hard.
//! - [`SpecError`]: a resource specification violates its invariants.
//!
//! Errors that travel through the gate actor's channels carry rendered messages
//! instead of boxed sources so they stay `Clone` and can be fanned out to every
//! waiting caller.

use crate::backend::ErrorKind;
use crate::provision::ProvisionReport;

/// A single failed attempt to obtain a live handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    /// Transport or authentication failure while reaching the backend.
    #[error("connect failed ({kind}): {message}")]
    Connect { kind: ErrorKind, message: String },
    /// A handle was obtained but the backend is not serving yet.
    #[error("backend not live ({kind}): {message}")]
    Verify { kind: ErrorKind, message: String },
}

impl AttemptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AttemptError::Connect { kind, .. } | AttemptError::Verify { kind, .. } => *kind,
        }
    }
}

/// The Connection Supervisor stopped trying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootstrapError {
    /// Every permitted attempt failed.
    #[error("bootstrap failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: AttemptError },
    /// The policy classified a failure as fatal and asked to stop early.
    #[error("bootstrap aborted on fatal error at attempt {attempt}: {source}")]
    Fatal { attempt: u32, source: AttemptError },
    /// The cancellation token fired between attempts.
    #[error("bootstrap cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

/// Errors surfaced to callers of the [`ConnectionGate`](crate::gate::ConnectionGate).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// No live handle could be obtained; the dependent operation must not run.
    #[error("service unavailable: backend connection is not established")]
    Unavailable,
    #[error("connection gate closed")]
    GateClosed,
    #[error("connection gate dropped response channel")]
    GateDropped,
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}

/// Resource provisioning failed for a reason other than "already exists".
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Fail-fast policy: the first hard error stopped the run.
    #[error("provisioning aborted at {resource}: {reason}")]
    Aborted {
        resource: String,
        reason: String,
        report: ProvisionReport,
    },
    /// Best-effort policy requiring full success: at least one resource failed.
    #[error("provisioning incomplete: {} of {} resource(s) failed", .report.failed().len(), .report.len())]
    Incomplete { report: ProvisionReport },
}

impl ProvisionError {
    /// The partial report collected before the error was raised.
    pub fn report(&self) -> &ProvisionReport {
        match self {
            ProvisionError::Aborted { report, .. } | ProvisionError::Incomplete { report } => {
                report
            }
        }
    }
}

/// A resource specification violates its invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    #[error("empty {0} name")]
    EmptyName(&'static str),
    #[error("duplicate {namespace} name: {name}")]
    Duplicate {
        namespace: &'static str,
        name: String,
    },
    #[error("invalid {field} for topic {topic}: must be at least 1")]
    InvalidTopicParameter { topic: String, field: &'static str },
}
