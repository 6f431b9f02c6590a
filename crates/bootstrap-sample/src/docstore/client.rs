//! # Document Store Backend
//!
//! [`DocStoreBackend`] implements [`BackendClient`] over the cluster's REST
//! services: the management API (`8091`, or `18091` with TLS) and the query
//! service (`8093` / `18093`).
//!
//! # Round Trip
//! `connect` never hands out a handle before `GET /pools/default` has answered.
//! An uninitialized self-managed node answers that probe with `404`; when
//! auto-initialization is enabled the backend runs `POST /clusterInit` once and
//! probes again.

use super::error::DocStoreError;
use crate::config::{Deployment, DocStoreSettings};
use async_trait::async_trait;
use bootstrap_framework::{BackendClient, Credentials, Endpoint, ErrorKind};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const HEALTHY: &str = "healthy";

/// Host and transport extracted from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAddress {
    pub host: String,
    pub tls: bool,
}

impl ClusterAddress {
    /// `couchbases://` forces TLS, `couchbase://` forces plaintext and a bare host
    /// follows `tls`. Only the first host of a list is used.
    pub fn parse(address: &str, tls: bool) -> Result<Self, DocStoreError> {
        let (rest, tls) = if let Some(rest) = address.strip_prefix("couchbases://") {
            (rest, true)
        } else if let Some(rest) = address.strip_prefix("couchbase://") {
            (rest, false)
        } else {
            (address, tls)
        };
        let host = rest
            .split([',', '/', '?'])
            .next()
            .unwrap_or_default()
            .trim();
        if host.is_empty() || host.contains("://") {
            return Err(DocStoreError::InvalidAddress(address.to_string()));
        }
        Ok(Self {
            host: host.to_string(),
            tls,
        })
    }

    pub fn base_url(&self, port: u16) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}:{port}", self.host)
    }

    pub fn management_port(&self) -> u16 {
        if self.tls {
            18091
        } else {
            8091
        }
    }

    pub fn query_port(&self) -> u16 {
        if self.tls {
            18093
        } else {
            8093
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocStoreBackend {
    deployment: Deployment,
    auto_initialize: bool,
    memory_quota_mb: u64,
    management_port: Option<u16>,
    query_port: Option<u16>,
    request_timeout: Duration,
}

impl DocStoreBackend {
    pub fn new(deployment: Deployment) -> Self {
        Self {
            deployment,
            auto_initialize: false,
            memory_quota_mb: 512,
            management_port: None,
            query_port: None,
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_settings(settings: &DocStoreSettings) -> Self {
        Self::new(settings.deployment).with_ports(settings.management_port, settings.query_port)
    }

    /// Lets `connect` initialize a self-managed cluster that has never been set up.
    pub fn with_auto_initialize(mut self, memory_quota_mb: u64) -> Self {
        self.auto_initialize = true;
        self.memory_quota_mb = memory_quota_mb;
        self
    }

    /// Overrides the scheme's default service ports.
    pub fn with_ports(mut self, management: Option<u16>, query: Option<u16>) -> Self {
        self.management_port = management;
        self.query_port = query;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait]
impl BackendClient for DocStoreBackend {
    type Handle = DocStoreHandle;
    type Error = DocStoreError;

    fn kind(&self) -> &'static str {
        "docstore"
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<DocStoreHandle, DocStoreError> {
        let credentials = endpoint
            .credentials
            .clone()
            .ok_or(DocStoreError::MissingCredentials)?;
        let address = ClusterAddress::parse(&endpoint.address, endpoint.tls)?;
        let management_url =
            address.base_url(self.management_port.unwrap_or(address.management_port()));
        let query_url = address.base_url(self.query_port.unwrap_or(address.query_port()));

        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|source| DocStoreError::Transport {
                url: management_url.clone(),
                source,
            })?;
        let handle = DocStoreHandle {
            http,
            management_url,
            query_url,
            credentials,
        };

        match handle.pool_details().await {
            Err(DocStoreError::NotInitialized)
                if self.deployment == Deployment::Server && self.auto_initialize =>
            {
                handle.initialize_cluster(self.memory_quota_mb).await?;
                handle.pool_details().await?;
            }
            result => {
                result?;
            }
        }
        Ok(handle)
    }

    async fn verify_live(&self, handle: &DocStoreHandle) -> Result<(), DocStoreError> {
        let pool = handle.pool_details().await?;
        if pool.nodes.iter().any(|node| node.status == HEALTHY) {
            Ok(())
        } else {
            Err(DocStoreError::NotReady(format!(
                "none of {} node(s) is healthy",
                pool.nodes.len()
            )))
        }
    }

    async fn close(&self, handle: &DocStoreHandle) {
        debug!(url = %handle.management_url, "Releasing document store handle");
    }

    fn error_kind(&self, error: &DocStoreError) -> ErrorKind {
        error.kind()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PoolDetails {
    #[serde(default)]
    pub nodes: Vec<NodeStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NodeStatus {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    errors: Vec<QueryErrorBody>,
}

#[derive(Debug, Deserialize)]
struct QueryErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

/// A verified session with the cluster's REST services.
#[derive(Debug, Clone)]
pub struct DocStoreHandle {
    http: reqwest::Client,
    management_url: String,
    query_url: String,
    credentials: Credentials,
}

impl DocStoreHandle {
    pub fn management_url(&self) -> &str {
        &self.management_url
    }

    /// Runs a parameterized statement on the query service.
    pub async fn query(&self, statement: &str, args: Vec<Value>) -> Result<Vec<Value>, DocStoreError> {
        let url = format!("{}/query/service", self.query_url);
        let request = self
            .authed(self.http.post(&url))
            .json(&json!({ "statement": statement, "args": args }));
        let (status, body) = self.execute(request, &url).await?;

        let response: QueryResponse =
            serde_json::from_str(&body).map_err(|e| DocStoreError::InvalidResponse {
                url: url.clone(),
                reason: format!("status {status}: {e}"),
            })?;
        if response.status != "success" {
            let (code, message) = response
                .errors
                .into_iter()
                .next()
                .map(|e| (e.code, e.msg))
                .unwrap_or((0, format!("query status {}", response.status)));
            return Err(DocStoreError::Query { code, message });
        }
        Ok(response.results)
    }

    pub(crate) async fn pool_details(&self) -> Result<PoolDetails, DocStoreError> {
        let (status, body) = self.get("/pools/default").await?;
        match status {
            StatusCode::NOT_FOUND => Err(DocStoreError::NotInitialized),
            s if s.is_success() => {
                serde_json::from_str(&body).map_err(|e| DocStoreError::InvalidResponse {
                    url: format!("{}/pools/default", self.management_url),
                    reason: e.to_string(),
                })
            }
            s => Err(DocStoreError::Status {
                operation: "pool status".into(),
                status: s.as_u16(),
                body,
            }),
        }
    }

    async fn initialize_cluster(&self, memory_quota_mb: u64) -> Result<(), DocStoreError> {
        info!(url = %self.management_url, memory_quota_mb, "Initializing cluster");
        let url = format!("{}/clusterInit", self.management_url);
        let form = [
            ("hostname", "127.0.0.1".to_string()),
            ("username", self.credentials.username.clone()),
            ("password", self.credentials.password.clone()),
            ("port", "SAME".to_string()),
            ("services", "kv,n1ql,index".to_string()),
            ("memoryQuota", memory_quota_mb.to_string()),
        ];
        let (status, body) = self.execute(self.http.post(&url).form(&form), &url).await?;
        if status.is_success() || body.contains("already initialized") {
            Ok(())
        } else {
            Err(DocStoreError::Status {
                operation: "cluster initialization".into(),
                status: status.as_u16(),
                body,
            })
        }
    }

    pub(crate) async fn get(&self, path: &str) -> Result<(StatusCode, String), DocStoreError> {
        let url = format!("{}{path}", self.management_url);
        self.execute(self.authed(self.http.get(&url)), &url).await
    }

    pub(crate) async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<(StatusCode, String), DocStoreError> {
        let url = format!("{}{path}", self.management_url);
        self.execute(self.authed(self.http.post(&url)).form(form), &url)
            .await
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.credentials.username, Some(&self.credentials.password))
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<(StatusCode, String), DocStoreError> {
        let transport = |source| DocStoreError::Transport {
            url: url.to_string(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DocStoreError::Auth {
                url: url.to_string(),
            });
        }
        let body = response.text().await.map_err(transport)?;
        Ok((status, body))
    }
}
