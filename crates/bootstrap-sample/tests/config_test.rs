use bootstrap_framework::{Attempts, SpecError, TopicSpec};
use bootstrap_sample::config::{
    load_bucket_spec, load_topics_spec, ApiArgs, ConfigError, Deployment, DocStoreInitArgs,
    TopicInitArgs, DEFAULT_SPEC_PATH,
};
use clap::Parser;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const DOCSTORE_FLAGS: [&str; 8] = [
    "--couchbase-host",
    "couchbase://db",
    "--couchbase-username",
    "admin",
    "--couchbase-password",
    "secret",
    "--couchbase-bucket",
    "main",
];

fn spec_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_docstore_init_defaults() {
    let args = DocStoreInitArgs::try_parse_from(
        std::iter::once("docstore-init").chain(DOCSTORE_FLAGS),
    )
    .unwrap();

    assert_eq!(args.spec, Path::new(DEFAULT_SPEC_PATH));
    assert!(args.auto_initialize);
    assert_eq!(args.memory_quota_mb, 512);
    assert_eq!(args.docstore.deployment, Deployment::Server);
    assert!(!args.docstore.tls_enabled);
    assert_eq!(
        args.retry.startup_policy().max_attempts,
        Attempts::Bounded(30)
    );
}

#[test]
fn test_docstore_flags_override_defaults() {
    let args = DocStoreInitArgs::try_parse_from(
        std::iter::once("docstore-init")
            .chain(DOCSTORE_FLAGS)
            .chain([
                "--couchbase-type",
                "CAPELLA",
                "--couchbase-tls",
                "yes",
                "--auto-initialize",
                "false",
                "--spec",
                "/tmp/layout.yml",
            ]),
    )
    .unwrap();

    assert_eq!(args.docstore.deployment, Deployment::Capella);
    assert!(args.docstore.tls_enabled);
    assert!(!args.auto_initialize);
    assert_eq!(args.spec, Path::new("/tmp/layout.yml"));
    assert!(args.docstore.endpoint().tls);
}

#[test]
fn test_topic_init_requires_bootstrap_servers() {
    assert!(TopicInitArgs::try_parse_from(["topic-init"]).is_err());

    let args =
        TopicInitArgs::try_parse_from(["topic-init", "--redpanda-bootstrap-servers", "redpanda:9092"])
            .unwrap();
    assert_eq!(args.broker.primary_resource_name, "messages");
    assert_eq!(args.broker.delivery_timeout_ms, 10_000);
    assert!(args.broker.endpoint().credentials.is_none());
}

#[test]
fn test_api_args_combine_both_backends() {
    let args = ApiArgs::try_parse_from(
        std::iter::once("bootstrap-sample")
            .chain(DOCSTORE_FLAGS)
            .chain(["--redpanda-bootstrap-servers", "redpanda:9092", "--max-attempts", "0"]),
    )
    .unwrap();

    assert_eq!(args.docstore.primary_resource_name, "main");
    assert_eq!(args.broker.host, "redpanda:9092");
    assert_eq!(args.retry.startup_policy().max_attempts, Attempts::Unbounded);
    assert_eq!(args.health_interval_secs, 30);
}

#[test]
fn test_bucket_spec_falls_back_to_configured_bucket() {
    let file = spec_file("scopes:\n  - scope: _default\n    collections: [users]\n");
    let spec = load_bucket_spec(file.path(), "main").unwrap();

    assert_eq!(spec.bucket, "main");
    assert_eq!(spec.resources().len(), 3);
}

#[test]
fn test_missing_bucket_spec_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_bucket_spec(&dir.path().join("absent.yml"), "main").unwrap_err();
    assert!(matches!(err, ConfigError::MissingSpec(_)));
}

#[test]
fn test_malformed_bucket_spec_is_rejected() {
    let file = spec_file("scopes: [[[\n");
    assert!(matches!(
        load_bucket_spec(file.path(), "main"),
        Err(ConfigError::Parse { .. })
    ));

    let duplicate = spec_file("bucket: main\nscopes:\n  - scope: a\n  - scope: a\n");
    assert!(matches!(
        load_bucket_spec(duplicate.path(), "main"),
        Err(ConfigError::InvalidSpec(SpecError::Duplicate { .. }))
    ));
}

#[test]
fn test_missing_topics_spec_uses_default() {
    let dir = tempfile::tempdir().unwrap();
    let spec = load_topics_spec(&dir.path().join("absent.yml")).unwrap();
    assert_eq!(spec.topics, vec![TopicSpec::new("users")]);
}

#[test]
fn test_topics_spec_from_file() {
    let file = spec_file("topics:\n  - orders\n  - name: users\n    partitions: 6\n");
    let spec = load_topics_spec(file.path()).unwrap();
    assert_eq!(
        spec.topics,
        vec![TopicSpec::new("orders"), TopicSpec::new("users").with_partitions(6)]
    );
}
