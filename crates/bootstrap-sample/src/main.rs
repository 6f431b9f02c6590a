//! Serving process: keeps both backends available on demand and runs
//! [`console`](bootstrap_sample::console) commands read from stdin.
//!
//! Neither backend has to be up at start. Commands against a missing backend
//! answer `unavailable` while the gates keep repairing the connection.

use bootstrap_framework::tracing::setup_tracing;
use bootstrap_sample::broker::BrokerBackend;
use bootstrap_sample::clients::{MessagePublisher, UserStore};
use bootstrap_sample::config::ApiArgs;
use bootstrap_sample::console::{Command, Target};
use bootstrap_sample::docstore::DocStoreBackend;
use bootstrap_sample::lifecycle::{BackendRuntime, RuntimeOptions};
use clap::Parser;
use serde_json::{json, Value};
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

struct App {
    docstore: BackendRuntime<DocStoreBackend>,
    broker: BackendRuntime<BrokerBackend>,
    users: UserStore,
    publisher: MessagePublisher,
}

impl App {
    fn health(&self) -> Value {
        json!([self.docstore.health(), self.broker.health()])
    }

    async fn handle(&self, command: Command) -> Value {
        match command {
            Command::CreateUser(params) => match self.users.create_user(params).await {
                Ok(user) => json!({ "status": "created", "user": user }),
                Err(e) => json!({ "status": "error", "error": e.to_string() }),
            },
            Command::Publish(message) => match self.publisher.publish(&message).await {
                Ok(receipt) => json!({ "status": "sent", "delivery": receipt }),
                Err(e) => json!({ "status": "error", "error": e.to_string() }),
            },
            Command::Reconnect(target) => {
                let mut result = serde_json::Map::new();
                if matches!(target, Target::DocStore | Target::All) {
                    result.insert("docstore".into(), reconnect_result(self.docstore.reconnect().await));
                }
                if matches!(target, Target::Broker | Target::All) {
                    result.insert("broker".into(), reconnect_result(self.broker.reconnect().await));
                }
                Value::Object(result)
            }
            Command::Health => self.health(),
        }
    }

    async fn shutdown(self) {
        drop(self.users);
        drop(self.publisher);
        self.docstore.shutdown().await;
        self.broker.shutdown().await;
    }
}

fn reconnect_result(result: Result<bool, bootstrap_framework::GateError>) -> Value {
    match result {
        Ok(true) => json!("connected"),
        Ok(false) => json!("unavailable"),
        Err(e) => json!(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_tracing();
    let args = ApiArgs::parse();

    let options = RuntimeOptions {
        startup: Some(args.retry.startup_policy()),
        lazy: args.retry.lazy_policy(),
        ..RuntimeOptions::default()
    };
    let docstore = BackendRuntime::start(
        DocStoreBackend::from_settings(&args.docstore),
        args.docstore.endpoint(),
        options.clone(),
    )
    .await;
    let broker = BackendRuntime::start(
        BrokerBackend::from_settings(&args.broker),
        args.broker.endpoint(),
        options,
    )
    .await;

    let app = App {
        users: UserStore::new(docstore.gate().clone(), &args.docstore.primary_resource_name),
        publisher: MessagePublisher::new(
            broker.gate().clone(),
            &args.broker.primary_resource_name,
            args.broker.delivery_timeout(),
        ),
        docstore,
        broker,
    };
    info!("Ready for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut health = tokio::time::interval(Duration::from_secs(args.health_interval_secs.max(1)));
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = health.tick() => {
                info!(health = %app.health(), "Health report");
            }
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    let reply = match line.parse::<Command>() {
                        Ok(command) => app.handle(command).await,
                        Err(e) => json!({ "status": "error", "error": e.to_string() }),
                    };
                    println!("{reply}");
                }
                // Keep serving without a console until interrupted.
                Ok(None) => {
                    info!("Input closed");
                    input_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read input");
                    input_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    app.shutdown().await;
    ExitCode::SUCCESS
}
