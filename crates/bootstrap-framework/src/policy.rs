//! # Retry Policy
//!
//! A [`RetryPolicy`] tells the supervisor how many attempts it may make, how long
//! to wait between them and which failures are worth retrying. The defaults
//! reproduce how the services have always behaved:
//!
//! - a **fixed** interval between attempts (no exponential growth);
//! - **every** failure is transient, authentication failures included.
//!
//! Both are explicit knobs ([`Backoff::Exponential`], [`Classifier::AuthFatal`] +
//! [`RetryPolicy::abort_on_fatal`]) so a stricter policy is opted into, never
//! assumed.
//!
//! The [`retry`] function is the single retry loop of the crate. The supervisor
//! uses it to obtain handles and the provisioner uses it to poll readiness.

use crate::backend::ErrorKind;
use crate::error::{AttemptError, BootstrapError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How many attempts a retry loop may make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempts {
    /// At most `n` attempts (values below 1 are treated as 1).
    Bounded(u32),
    /// Retry until success, a fatal abort or cancellation.
    Unbounded,
}

impl Attempts {
    /// Whether `attempt` (1-based) is the last one permitted.
    pub fn is_last(self, attempt: u32) -> bool {
        match self {
            Attempts::Bounded(max) => attempt >= max.max(1),
            Attempts::Unbounded => false,
        }
    }
}

impl fmt::Display for Attempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempts::Bounded(max) => write!(f, "{}", max.max(&1)),
            Attempts::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Delay between a failed attempt and the next one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// Opt-in growth: `initial * multiplier^(attempt - 1)`, capped at `max`.
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(interval) => interval,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exponent = attempt.saturating_sub(1).min(63) as i32;
                let secs = initial.as_secs_f64() * multiplier.max(1.0).powi(exponent);
                if secs.is_finite() && secs < max.as_secs_f64() {
                    Duration::from_secs_f64(secs)
                } else {
                    max
                }
            }
        }
    }
}

/// Outcome of classifying a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Fatal,
}

type ClassifyFn = dyn Fn(&AttemptError) -> ErrorClass + Send + Sync;

/// Decides whether a failed attempt is transient or fatal.
#[derive(Clone, Default)]
pub enum Classifier {
    /// Everything is transient.
    #[default]
    AllTransient,
    /// Authentication failures are fatal, everything else transient.
    AuthFatal,
    Custom(Arc<ClassifyFn>),
}

impl Classifier {
    pub fn custom(f: impl Fn(&AttemptError) -> ErrorClass + Send + Sync + 'static) -> Self {
        Classifier::Custom(Arc::new(f))
    }

    pub fn classify(&self, error: &AttemptError) -> ErrorClass {
        match self {
            Classifier::AllTransient => ErrorClass::Transient,
            Classifier::AuthFatal if error.kind() == ErrorKind::Auth => ErrorClass::Fatal,
            Classifier::AuthFatal => ErrorClass::Transient,
            Classifier::Custom(f) => f(error),
        }
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classifier::AllTransient => f.write_str("AllTransient"),
            Classifier::AuthFatal => f.write_str("AuthFatal"),
            Classifier::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Attempt budget, backoff and classification for one retry loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: Attempts,
    pub backoff: Backoff,
    pub classifier: Classifier,
    /// Stop at the first failure classified [`ErrorClass::Fatal`].
    pub abort_on_fatal: bool,
}

impl RetryPolicy {
    /// `max_attempts` attempts separated by a fixed `interval`.
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: Attempts::Bounded(max_attempts),
            backoff: Backoff::Fixed(interval),
            classifier: Classifier::AllTransient,
            abort_on_fatal: false,
        }
    }

    /// Retries forever with a fixed `interval`.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            max_attempts: Attempts::Unbounded,
            ..Self::fixed(1, interval)
        }
    }

    /// Process start and init jobs: 30 attempts, 2 seconds apart.
    pub fn startup() -> Self {
        Self::fixed(30, Duration::from_secs(2))
    }

    /// On-demand repair from the lazy gate: short and bounded.
    pub fn lazy() -> Self {
        Self::fixed(3, Duration::from_millis(500))
    }

    /// Polling a freshly created bucket until it reports healthy.
    pub fn readiness() -> Self {
        Self::fixed(60, Duration::from_secs(1))
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn abort_on_fatal(mut self, abort: bool) -> Self {
        self.abort_on_fatal = abort;
        self
    }

    /// Authentication failures stop the loop immediately.
    pub fn fail_fast_on_auth(self) -> Self {
        self.with_classifier(Classifier::AuthFatal).abort_on_fatal(true)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::startup()
    }
}

/// Runs `op` under `policy` until it succeeds.
///
/// `op` receives the 1-based attempt number. On success the value and the
/// number of attempts made are returned straight away; nothing sleeps after a
/// success. Every failure is logged with its attempt number and classification.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<(T, u32), BootstrapError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(BootstrapError::Cancelled { attempts: attempt });
        }
        attempt += 1;

        let error = match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(label, attempt, "Succeeded after retry");
                }
                return Ok((value, attempt));
            }
            Err(error) => error,
        };

        let class = policy.classifier.classify(&error);
        warn!(
            label,
            attempt,
            max_attempts = %policy.max_attempts,
            ?class,
            error = %error,
            "Attempt failed"
        );

        if class == ErrorClass::Fatal && policy.abort_on_fatal {
            return Err(BootstrapError::Fatal {
                attempt,
                source: error,
            });
        }
        if policy.max_attempts.is_last(attempt) {
            return Err(BootstrapError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(BootstrapError::Cancelled { attempts: attempt });
            }
            _ = tokio::time::sleep(policy.backoff.delay(attempt)) => {}
        }
    }
}
