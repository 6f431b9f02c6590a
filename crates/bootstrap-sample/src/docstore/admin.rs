//! Bucket, scope and collection management over the cluster REST API.

use super::client::{DocStoreHandle, PoolDetails};
use super::error::DocStoreError;
use async_trait::async_trait;
use bootstrap_framework::{CreateOutcome, DocumentResource, ResourceAdmin};
use reqwest::StatusCode;
use tracing::debug;

const DEFAULT_SCOPE: &str = "_default";

#[async_trait]
impl ResourceAdmin for DocStoreHandle {
    type Resource = DocumentResource;
    type Error = DocStoreError;

    async fn create(&self, resource: &DocumentResource) -> Result<CreateOutcome, DocStoreError> {
        match resource {
            DocumentResource::Bucket { name, ram_quota_mb } => {
                let quota = ram_quota_mb.to_string();
                let form = [
                    ("name", name.as_str()),
                    ("ramQuotaMB", quota.as_str()),
                    ("bucketType", "couchbase"),
                ];
                let response = self.post_form("/pools/default/buckets", &form).await?;
                creation_outcome("bucket creation", response)
            }
            // Every bucket is born with its default scope.
            DocumentResource::Scope { scope, .. } if scope == DEFAULT_SCOPE => {
                Ok(CreateOutcome::AlreadyExisted)
            }
            DocumentResource::Scope { bucket, scope } => {
                let path = format!("/pools/default/buckets/{bucket}/scopes");
                let response = self.post_form(&path, &[("name", scope.as_str())]).await?;
                creation_outcome("scope creation", response)
            }
            DocumentResource::Collection {
                bucket,
                scope,
                collection,
            } => {
                let path = format!("/pools/default/buckets/{bucket}/scopes/{scope}/collections");
                let response = self
                    .post_form(&path, &[("name", collection.as_str())])
                    .await?;
                creation_outcome("collection creation", response)
            }
        }
    }

    async fn is_ready(&self, resource: &DocumentResource) -> Result<bool, DocStoreError> {
        let DocumentResource::Bucket { name, .. } = resource else {
            return Ok(true);
        };
        let (status, body) = self.get(&format!("/pools/default/buckets/{name}")).await?;
        match status {
            StatusCode::NOT_FOUND => Err(DocStoreError::NotReady(format!(
                "bucket {name} not visible yet"
            ))),
            s if s.is_success() => {
                let details: PoolDetails =
                    serde_json::from_str(&body).map_err(|e| DocStoreError::InvalidResponse {
                        url: format!("{}/pools/default/buckets/{name}", self.management_url()),
                        reason: e.to_string(),
                    })?;
                let healthy = details.nodes.iter().filter(|n| n.status == "healthy").count();
                debug!(bucket = %name, healthy, nodes = details.nodes.len(), "Bucket health");
                Ok(!details.nodes.is_empty() && healthy == details.nodes.len())
            }
            s => Err(DocStoreError::Status {
                operation: "bucket status".into(),
                status: s.as_u16(),
                body,
            }),
        }
    }
}

fn creation_outcome(
    operation: &str,
    (status, body): (StatusCode, String),
) -> Result<CreateOutcome, DocStoreError> {
    if status.is_success() {
        Ok(CreateOutcome::Created)
    } else if status == StatusCode::BAD_REQUEST && body.to_ascii_lowercase().contains("already exists")
    {
        Ok(CreateOutcome::AlreadyExisted)
    } else {
        Err(DocStoreError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_body_means_already_existed() {
        let body = r#"{"errors":{"name":"Bucket with given name already exists"}}"#;
        let outcome = creation_outcome("bucket creation", (StatusCode::BAD_REQUEST, body.into()));
        assert_eq!(outcome.unwrap(), CreateOutcome::AlreadyExisted);
    }

    #[test]
    fn test_other_rejections_fail() {
        let err = creation_outcome(
            "bucket creation",
            (StatusCode::BAD_REQUEST, "RAM quota cannot be less than 100 MiB".into()),
        )
        .unwrap_err();
        assert!(matches!(err, DocStoreError::Status { status: 400, .. }));
    }
}
