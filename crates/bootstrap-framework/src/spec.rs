//! # Resource Specifications
//!
//! Static descriptions of what an init job must provision, deserialised from the
//! `data_structure.yml` document shipped with each job.
//!
//! - [`BucketSpec`]: one document-store bucket with its scopes and collections.
//! - [`TopicsSpec`]: a flat list of broker topics.
//!
//! Both flatten into the ordered resource lists the
//! [`Provisioner`](crate::provision::Provisioner) consumes.

use crate::error::SpecError;
use crate::provision::ProvisionTarget;
use serde::Deserialize;
use std::collections::HashSet;

fn default_ram_quota_mb() -> u64 {
    256
}

fn default_one() -> i32 {
    1
}

/// Document-store layout: a bucket and the scope/collection pairs inside it.
///
/// ```yaml
/// bucket: main
/// scopes:
///   - scope: _default
///     collections: [users]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BucketSpec {
    /// Empty when the document leaves the choice to configuration.
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_ram_quota_mb")]
    pub ram_quota_mb: u64,
    #[serde(default)]
    pub scopes: Vec<ScopeSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScopeSpec {
    #[serde(alias = "name")]
    pub scope: String,
    #[serde(default)]
    pub collections: Vec<String>,
}

impl BucketSpec {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ram_quota_mb: default_ram_quota_mb(),
            scopes: Vec::new(),
        }
    }

    pub fn with_scope<I, S>(mut self, scope: impl Into<String>, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.push(ScopeSpec {
            scope: scope.into(),
            collections: collections.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Uses `bucket` when the document did not name one.
    pub fn with_default_bucket(mut self, bucket: &str) -> Self {
        if self.bucket.trim().is_empty() {
            self.bucket = bucket.to_string();
        }
        self
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        if self.bucket.trim().is_empty() {
            return Err(SpecError::EmptyName("bucket"));
        }
        let mut scopes = HashSet::new();
        for scope in &self.scopes {
            if scope.scope.trim().is_empty() {
                return Err(SpecError::EmptyName("scope"));
            }
            if !scopes.insert(scope.scope.as_str()) {
                return Err(SpecError::Duplicate {
                    namespace: "scope",
                    name: scope.scope.clone(),
                });
            }
            let mut collections = HashSet::new();
            for collection in &scope.collections {
                if collection.trim().is_empty() {
                    return Err(SpecError::EmptyName("collection"));
                }
                if !collections.insert(collection.as_str()) {
                    return Err(SpecError::Duplicate {
                        namespace: "collection",
                        name: format!("{}.{}", scope.scope, collection),
                    });
                }
            }
        }
        Ok(())
    }

    /// Bucket first, then each scope followed by its collections.
    pub fn resources(&self) -> Vec<DocumentResource> {
        let mut resources = vec![DocumentResource::Bucket {
            name: self.bucket.clone(),
            ram_quota_mb: self.ram_quota_mb,
        }];
        for scope in &self.scopes {
            resources.push(DocumentResource::Scope {
                bucket: self.bucket.clone(),
                scope: scope.scope.clone(),
            });
            for collection in &scope.collections {
                resources.push(DocumentResource::Collection {
                    bucket: self.bucket.clone(),
                    scope: scope.scope.clone(),
                    collection: collection.clone(),
                });
            }
        }
        resources
    }
}

/// One node of the document-store hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentResource {
    Bucket {
        name: String,
        ram_quota_mb: u64,
    },
    Scope {
        bucket: String,
        scope: String,
    },
    Collection {
        bucket: String,
        scope: String,
        collection: String,
    },
}

impl ProvisionTarget for DocumentResource {
    fn name(&self) -> String {
        match self {
            DocumentResource::Bucket { name, .. } => name.clone(),
            DocumentResource::Scope { bucket, scope } => format!("{bucket}.{scope}"),
            DocumentResource::Collection {
                bucket,
                scope,
                collection,
            } => format!("{bucket}.{scope}.{collection}"),
        }
    }

    fn parent(&self) -> Option<String> {
        match self {
            DocumentResource::Bucket { .. } => None,
            DocumentResource::Scope { bucket, .. } => Some(bucket.clone()),
            DocumentResource::Collection { bucket, scope, .. } => {
                Some(format!("{bucket}.{scope}"))
            }
        }
    }

    fn requires_readiness(&self) -> bool {
        matches!(self, DocumentResource::Bucket { .. })
    }
}

/// Broker layout: independent topics.
///
/// ```yaml
/// topics:
///   - users
///   - { name: orders, partitions: 3 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopicsSpec {
    #[serde(default)]
    pub topics: Vec<TopicSpec>,
}

impl Default for TopicsSpec {
    /// The topic list used when no specification document is deployed.
    fn default() -> Self {
        Self {
            topics: vec![TopicSpec::new("users")],
        }
    }
}

impl TopicsSpec {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: names.into_iter().map(TopicSpec::new).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        let mut names = HashSet::new();
        for topic in &self.topics {
            if topic.name.trim().is_empty() {
                return Err(SpecError::EmptyName("topic"));
            }
            if !names.insert(topic.name.as_str()) {
                return Err(SpecError::Duplicate {
                    namespace: "topic",
                    name: topic.name.clone(),
                });
            }
            if topic.partitions < 1 {
                return Err(SpecError::InvalidTopicParameter {
                    topic: topic.name.clone(),
                    field: "partitions",
                });
            }
            if topic.replication_factor < 1 {
                return Err(SpecError::InvalidTopicParameter {
                    topic: topic.name.clone(),
                    field: "replication_factor",
                });
            }
        }
        Ok(())
    }

    pub fn resources(&self) -> Vec<TopicSpec> {
        self.topics.clone()
    }
}

/// A topic with its partition count and replication factor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "TopicEntry")]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: 1,
            replication_factor: 1,
        }
    }

    pub fn with_partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_replication_factor(mut self, replication_factor: i32) -> Self {
        self.replication_factor = replication_factor;
        self
    }
}

impl ProvisionTarget for TopicSpec {
    fn name(&self) -> String {
        self.name.clone()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TopicEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default = "default_one")]
        partitions: i32,
        #[serde(default = "default_one", alias = "replication")]
        replication_factor: i32,
    },
}

impl From<TopicEntry> for TopicSpec {
    fn from(entry: TopicEntry) -> Self {
        match entry {
            TopicEntry::Name(name) => TopicSpec::new(name),
            TopicEntry::Detailed {
                name,
                partitions,
                replication_factor,
            } => TopicSpec {
                name,
                partitions,
                replication_factor,
            },
        }
    }
}
