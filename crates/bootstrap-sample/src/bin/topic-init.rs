//! Creates the broker topics, then exits.

use bootstrap_framework::tracing::setup_tracing;
use bootstrap_framework::{FailurePolicy, ProvisionReport, Provisioner};
use bootstrap_sample::broker::{BrokerBackend, BrokerHandle};
use bootstrap_sample::config::{load_topics_spec, TopicInitArgs};
use bootstrap_sample::lifecycle::{exit_code, InitJob, InitJobError};
use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    setup_tracing();
    let args = TopicInitArgs::parse();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted");
                cancel.cancel();
            }
        }
    });

    let result = run(&args, cancel).await;
    match &result {
        Ok(_) => info!("Topics initialized"),
        Err(e) => error!(error = %e, "Topic initialization failed"),
    }
    exit_code(&result)
}

async fn run(args: &TopicInitArgs, cancel: CancellationToken) -> Result<ProvisionReport, InitJobError> {
    let spec = load_topics_spec(&args.spec)?;
    let resources = spec.resources();

    // Every topic is attempted; any failure still fails the job.
    let provisioner = Provisioner::new(FailurePolicy::BestEffort {
        require_full_success: true,
    });
    let job = InitJob::new(
        "topic-init",
        BrokerBackend::from_settings(&args.broker),
        args.broker.endpoint(),
        args.retry.startup_policy(),
        provisioner,
    )
    .with_cancellation(cancel);
    job.run(resources.as_slice(), BrokerHandle::clone).await
}
