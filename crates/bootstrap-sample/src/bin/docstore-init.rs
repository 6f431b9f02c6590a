//! Creates the document store's bucket, scopes and collections, then exits.

use bootstrap_framework::tracing::setup_tracing;
use bootstrap_framework::{FailurePolicy, ProvisionReport, Provisioner};
use bootstrap_sample::config::{load_bucket_spec, Deployment, DocStoreInitArgs};
use bootstrap_sample::docstore::{DocStoreBackend, DocStoreHandle};
use bootstrap_sample::lifecycle::{exit_code, InitJob, InitJobError};
use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    setup_tracing();
    let args = DocStoreInitArgs::parse();

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
        Ok(_) => info!("Document store initialized"),
        Err(e) => error!(error = %e, "Document store initialization failed"),
    }
    exit_code(&result)
}

async fn run(
    args: &DocStoreInitArgs,
    cancel: CancellationToken,
) -> Result<ProvisionReport, InitJobError> {
    let spec = load_bucket_spec(&args.spec, &args.docstore.primary_resource_name)?;
    let resources = spec.resources();

    let mut backend = DocStoreBackend::from_settings(&args.docstore);
    if args.auto_initialize && args.docstore.deployment == Deployment::Server {
        backend = backend.with_auto_initialize(args.memory_quota_mb);
    }

    let job = InitJob::new(
        "docstore-init",
        backend,
        args.docstore.endpoint(),
        args.retry.startup_policy(),
        Provisioner::new(FailurePolicy::FailFast),
    )
    .with_cancellation(cancel);
    job.run(resources.as_slice(), DocStoreHandle::clone).await
}
