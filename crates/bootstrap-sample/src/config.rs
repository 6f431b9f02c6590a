//! # Process Configuration
//!
//! Environment-style settings for the serving process and the init jobs, parsed
//! with `clap` so every option can come from the environment (the way the
//! containers are deployed) or from a flag (the way they are debugged).
//!
//! | Group | Type | Used by |
//! |-------|------|---------|
//! | `COUCHBASE_*` | [`DocStoreSettings`] | `docstore-init`, api |
//! | `REDPANDA_*` | [`BrokerSettings`] | `topic-init`, api |
//! | `BOOTSTRAP_*` | [`RetrySettings`] | everything |
//!
//! Resource specifications are YAML documents, `/app/conf/data_structure.yml` by
//! default. See [`load_bucket_spec`] and [`load_topics_spec`].

use bootstrap_framework::{BucketSpec, Credentials, Endpoint, RetryPolicy, SpecError, TopicsSpec};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, ValueEnum};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_SPEC_PATH: &str = "/app/conf/data_structure.yml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("resource specification not found at {}", .0.display())]
    MissingSpec(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid resource specification: {0}")]
    InvalidSpec(#[from] SpecError),
}

/// Where the document store runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Deployment {
    /// Self-managed cluster; may need initializing on first start.
    #[default]
    Server,
    /// Managed service; never initialized by us.
    Capella,
}

/// Document store connection settings.
#[derive(Debug, Clone, Args)]
pub struct DocStoreSettings {
    /// Cluster host or connection string (`db`, `couchbase://db`, `couchbases://db`)
    #[arg(id = "couchbase_host", long = "couchbase-host", env = "COUCHBASE_HOST")]
    pub host: String,

    #[arg(id = "couchbase_username", long = "couchbase-username", env = "COUCHBASE_USERNAME")]
    pub username: String,

    #[arg(
        id = "couchbase_password",
        long = "couchbase-password",
        env = "COUCHBASE_PASSWORD",
        hide_env_values = true
    )]
    pub password: String,

    /// Use TLS when the host carries no scheme
    #[arg(
        id = "couchbase_tls",
        long = "couchbase-tls",
        env = "COUCHBASE_TLS",
        default_value = "false",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set
    )]
    pub tls_enabled: bool,

    /// Main bucket; also the default when the specification names none
    #[arg(
        id = "couchbase_bucket",
        long = "couchbase-bucket",
        env = "COUCHBASE_MAIN_BUCKET_NAME"
    )]
    pub primary_resource_name: String,

    #[arg(
        id = "couchbase_type",
        long = "couchbase-type",
        env = "COUCHBASE_TYPE",
        value_enum,
        ignore_case = true,
        default_value_t = Deployment::Server
    )]
    pub deployment: Deployment,

    /// Management REST port (default 8091, or 18091 with TLS)
    #[arg(
        id = "couchbase_management_port",
        long = "couchbase-management-port",
        env = "COUCHBASE_MANAGEMENT_PORT"
    )]
    pub management_port: Option<u16>,

    /// Query service port (default 8093, or 18093 with TLS)
    #[arg(
        id = "couchbase_query_port",
        long = "couchbase-query-port",
        env = "COUCHBASE_QUERY_PORT"
    )]
    pub query_port: Option<u16>,
}

impl DocStoreSettings {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.trim())
            .with_credentials(Credentials::new(&self.username, &self.password))
            .with_tls(self.tls_enabled)
    }
}

/// Message broker connection settings.
#[derive(Debug, Clone, Args)]
pub struct BrokerSettings {
    /// Comma-separated broker endpoints (`redpanda:9092,redpanda-1:9092`)
    #[arg(
        id = "redpanda_bootstrap_servers",
        long = "redpanda-bootstrap-servers",
        env = "REDPANDA_BOOTSTRAP_SERVERS"
    )]
    pub host: String,

    /// SASL username; SASL is only enabled when username and password are both set
    #[arg(id = "redpanda_username", long = "redpanda-username", env = "REDPANDA_USERNAME")]
    pub username: Option<String>,

    #[arg(
        id = "redpanda_password",
        long = "redpanda-password",
        env = "REDPANDA_PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    #[arg(
        id = "redpanda_sasl_mechanism",
        long = "redpanda-sasl-mechanism",
        env = "REDPANDA_SASL_MECHANISM",
        default_value = "SCRAM-SHA-256"
    )]
    pub sasl_mechanism: String,

    #[arg(
        id = "redpanda_tls",
        long = "redpanda-tls",
        env = "REDPANDA_TLS",
        default_value = "false",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set
    )]
    pub tls_enabled: bool,

    /// Topic the serving process publishes to
    #[arg(
        id = "redpanda_topic",
        long = "redpanda-topic",
        env = "REDPANDA_TOPIC",
        default_value = "messages"
    )]
    pub primary_resource_name: String,

    /// How long a publish waits for the broker's acknowledgement
    #[arg(
        id = "redpanda_delivery_timeout_ms",
        long = "redpanda-delivery-timeout-ms",
        env = "REDPANDA_DELIVERY_TIMEOUT_MS",
        default_value_t = 10_000
    )]
    pub delivery_timeout_ms: u64,
}

impl BrokerSettings {
    pub fn endpoint(&self) -> Endpoint {
        let endpoint = Endpoint::new(self.host.trim()).with_tls(self.tls_enabled);
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                endpoint.with_credentials(Credentials::new(username, password))
            }
            _ => endpoint,
        }
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

/// Retry budgets shared by every process.
#[derive(Debug, Clone, Args)]
pub struct RetrySettings {
    /// Startup attempts; 0 retries until cancelled
    #[arg(long, env = "BOOTSTRAP_MAX_ATTEMPTS", default_value_t = 30)]
    pub max_attempts: u32,

    #[arg(long, env = "BOOTSTRAP_RETRY_INTERVAL_MS", default_value_t = 2_000)]
    pub retry_interval_ms: u64,

    /// Stop retrying as soon as credentials are rejected
    #[arg(
        long,
        env = "BOOTSTRAP_FAIL_FAST_ON_AUTH",
        default_value = "false",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set
    )]
    pub fail_fast_on_auth: bool,

    /// Attempts made on demand by a serving process
    #[arg(long, env = "BOOTSTRAP_LAZY_MAX_ATTEMPTS", default_value_t = 3)]
    pub lazy_max_attempts: u32,

    #[arg(long, env = "BOOTSTRAP_LAZY_RETRY_INTERVAL_MS", default_value_t = 500)]
    pub lazy_retry_interval_ms: u64,
}

impl RetrySettings {
    pub fn startup_policy(&self) -> RetryPolicy {
        let interval = Duration::from_millis(self.retry_interval_ms);
        let policy = match self.max_attempts {
            0 => RetryPolicy::unbounded(interval),
            n => RetryPolicy::fixed(n, interval),
        };
        self.apply_auth(policy)
    }

    pub fn lazy_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::fixed(
            self.lazy_max_attempts.max(1),
            Duration::from_millis(self.lazy_retry_interval_ms),
        );
        self.apply_auth(policy)
    }

    fn apply_auth(&self, policy: RetryPolicy) -> RetryPolicy {
        if self.fail_fast_on_auth {
            policy.fail_fast_on_auth()
        } else {
            policy
        }
    }
}

/// Creates the document-store bucket, scopes and collections.
#[derive(Debug, Parser)]
#[command(name = "docstore-init", version, about, long_about = None)]
pub struct DocStoreInitArgs {
    #[command(flatten)]
    pub docstore: DocStoreSettings,

    #[command(flatten)]
    pub retry: RetrySettings,

    /// Resource specification document
    #[arg(long = "spec", env = "DATA_STRUCTURE_PATH", default_value = DEFAULT_SPEC_PATH)]
    pub spec: PathBuf,

    /// Initialize an unconfigured server cluster before connecting
    #[arg(
        long,
        env = "COUCHBASE_AUTO_INITIALIZE",
        default_value = "true",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set
    )]
    pub auto_initialize: bool,

    /// Data service memory quota used when initializing the cluster
    #[arg(long, env = "COUCHBASE_MEMORY_QUOTA_MB", default_value_t = 512)]
    pub memory_quota_mb: u64,
}

/// Creates the broker topics.
#[derive(Debug, Parser)]
#[command(name = "topic-init", version, about, long_about = None)]
pub struct TopicInitArgs {
    #[command(flatten)]
    pub broker: BrokerSettings,

    #[command(flatten)]
    pub retry: RetrySettings,

    /// Resource specification document; a missing file means `topics: [users]`
    #[arg(long = "spec", env = "DATA_STRUCTURE_PATH", default_value = DEFAULT_SPEC_PATH)]
    pub spec: PathBuf,
}

/// Serving process holding both backends.
#[derive(Debug, Parser)]
#[command(name = "bootstrap-sample", version, about, long_about = None)]
pub struct ApiArgs {
    #[command(flatten)]
    pub docstore: DocStoreSettings,

    #[command(flatten)]
    pub broker: BrokerSettings,

    #[command(flatten)]
    pub retry: RetrySettings,

    /// Seconds between health reports
    #[arg(long, env = "HEALTH_LOG_INTERVAL_SECS", default_value_t = 30)]
    pub health_interval_secs: u64,
}

/// Loads a document-store specification. A missing file is an error.
pub fn load_bucket_spec(path: &Path, default_bucket: &str) -> Result<BucketSpec, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::MissingSpec(path.to_path_buf()))
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let spec = serde_yaml::from_str::<BucketSpec>(&contents)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
        .with_default_bucket(default_bucket);
    spec.validate()?;
    Ok(spec)
}

/// Loads a broker specification, falling back to [`TopicsSpec::default`] when
/// the file does not exist.
pub fn load_topics_spec(path: &Path) -> Result<TopicsSpec, ConfigError> {
    let spec = match std::fs::read_to_string(path) {
        Ok(contents) => {
            serde_yaml::from_str::<TopicsSpec>(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Specification not found, using default topics");
            TopicsSpec::default()
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    spec.validate()?;
    Ok(spec)
}
