use bootstrap_framework::{
    BackendClient, BucketSpec, ConnectionActor, ConnectionGate, ConnectionSupervisor,
    CreateOutcome, Credentials, DocumentResource, Endpoint, ErrorKind, FailurePolicy,
    HealthStatus, ProvisionOutcome, Provisioner, ResourceAdmin, RetryPolicy,
};
use bootstrap_sample::clients::{UserStore, UserStoreError};
use bootstrap_sample::config::Deployment;
use bootstrap_sample::docstore::{DocStoreBackend, DocStoreError};
use bootstrap_sample::model::UserCreate;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{basic_auth, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> DocStoreBackend {
    let port = server.address().port();
    DocStoreBackend::new(Deployment::Server).with_ports(Some(port), Some(port))
}

fn endpoint() -> Endpoint {
    Endpoint::new("couchbase://127.0.0.1").with_credentials(Credentials::new("admin", "secret"))
}

fn healthy() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "nodes": [{ "status": "healthy" }] }))
}

async fn mount_healthy_pool(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/pools/default"))
        .and(basic_auth("admin", "secret"))
        .respond_with(healthy())
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_connect_requires_answering_cluster() {
    let server = MockServer::start().await;
    mount_healthy_pool(&server).await;
    let backend = backend_for(&server);

    let handle = backend.connect(&endpoint()).await.unwrap();
    backend.verify_live(&handle).await.unwrap();
    assert!(handle.management_url().starts_with("http://127.0.0.1:"));
}

#[tokio::test]
async fn test_rejected_credentials_classified_as_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pools/default"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let backend = backend_for(&server);

    let err = backend.connect(&endpoint()).await.unwrap_err();
    assert!(matches!(err, DocStoreError::Auth { .. }));
    assert_eq!(backend.error_kind(&err), ErrorKind::Auth);
}

#[tokio::test]
async fn test_unhealthy_nodes_fail_verification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pools/default"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "nodes": [{ "status": "warmup" }] })),
        )
        .mount(&server)
        .await;
    let backend = backend_for(&server);

    let handle = backend.connect(&endpoint()).await.unwrap();
    let err = backend.verify_live(&handle).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotReady);
}

#[tokio::test]
async fn test_uninitialized_cluster_is_initialized_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pools/default"))
        .respond_with(ResponseTemplate::new(404).set_body_string("\"unknown pool\""))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_healthy_pool(&server).await;
    Mock::given(method("POST"))
        .and(path("/clusterInit"))
        .and(body_string_contains("memoryQuota=1024"))
        .and(body_string_contains("port=SAME"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server).with_auto_initialize(1024);
    backend.connect(&endpoint()).await.unwrap();
}

#[tokio::test]
async fn test_uninitialized_cluster_left_alone_without_auto_initialize() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pools/default"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/clusterInit"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = backend_for(&server).connect(&endpoint()).await.unwrap_err();
    assert!(matches!(err, DocStoreError::NotInitialized));
    assert_eq!(err.kind(), ErrorKind::NotReady);
}

#[tokio::test]
async fn test_provisioning_waits_for_bucket_before_collection() {
    let server = MockServer::start().await;
    mount_healthy_pool(&server).await;
    Mock::given(method("POST"))
        .and(path("/pools/default/buckets"))
        .and(body_string_contains("name=main"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pools/default/buckets/main"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pools/default/buckets/main"))
        .respond_with(healthy())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/pools/default/buckets/main/scopes/_default/collections"))
        .and(body_string_contains("name=users"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let handle = backend_for(&server).connect(&endpoint()).await.unwrap();
    let spec = BucketSpec::new("main").with_scope("_default", ["users"]);
    let report = Provisioner::new(FailurePolicy::FailFast)
        .with_readiness(RetryPolicy::fixed(5, Duration::from_millis(10)))
        .provision(&handle, &spec.resources())
        .await
        .unwrap();

    assert_eq!(report.created(), vec!["main", "main._default.users"]);
    assert_eq!(
        report.outcome("main._default"),
        Some(&ProvisionOutcome::AlreadyExisted)
    );
}

#[tokio::test]
async fn test_existing_bucket_reported_as_already_existed() {
    let server = MockServer::start().await;
    mount_healthy_pool(&server).await;
    Mock::given(method("POST"))
        .and(path("/pools/default/buckets"))
        .respond_with(ResponseTemplate::new(400).set_body_json(
            json!({ "errors": { "name": "Bucket with given name already exists" } }),
        ))
        .mount(&server)
        .await;

    let handle = backend_for(&server).connect(&endpoint()).await.unwrap();
    let outcome = handle
        .create(&DocumentResource::Bucket {
            name: "main".into(),
            ram_quota_mb: 256,
        })
        .await
        .unwrap();
    assert_eq!(outcome, CreateOutcome::AlreadyExisted);
}

fn gate_for(backend: DocStoreBackend) -> ConnectionGate<DocStoreBackend> {
    let supervisor = ConnectionSupervisor::new(backend, endpoint());
    let (actor, gate) = ConnectionActor::new(supervisor, 8);
    tokio::spawn(
        actor
            .with_lazy_policy(RetryPolicy::fixed(1, Duration::from_millis(10)))
            .run(),
    );
    gate
}

async fn user_store_for(backend: DocStoreBackend) -> UserStore {
    UserStore::new(gate_for(backend), "main")
}

#[tokio::test]
async fn test_user_inserted_through_query_service() {
    let server = MockServer::start().await;
    mount_healthy_pool(&server).await;
    Mock::given(method("POST"))
        .and(path("/query/service"))
        .and(basic_auth("admin", "secret"))
        .and(body_string_contains("INSERT INTO `main`.`_default`.`users`"))
        .and(body_string_contains("\"type\":\"user\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "success", "results": [] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let users = user_store_for(backend_for(&server)).await;
    let user = users
        .create_user(UserCreate {
            name: "Alice".into(),
            age: 30,
        })
        .await
        .unwrap();

    assert_eq!(user.name, "Alice");
    assert_eq!(user.doc_type, "user");
}

#[tokio::test]
async fn test_query_errors_surface_code_and_message() {
    let server = MockServer::start().await;
    mount_healthy_pool(&server).await;
    Mock::given(method("POST"))
        .and(path("/query/service"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "status": "fatal",
            "errors": [{ "code": 12003, "msg": "Keyspace not found" }]
        })))
        .mount(&server)
        .await;

    let users = user_store_for(backend_for(&server)).await;
    let err = users
        .create_user(UserCreate {
            name: "Bob".into(),
            age: 41,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        UserStoreError::Storage(DocStoreError::Query { code: 12003, .. })
    ));
}

#[tokio::test]
async fn test_user_store_unavailable_when_cluster_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let backend = DocStoreBackend::new(Deployment::Server)
        .with_ports(Some(port), Some(port))
        .with_request_timeout(Duration::from_secs(1));
    let users = user_store_for(backend).await;

    let err = users
        .create_user(UserCreate {
            name: "Carol".into(),
            age: 25,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, UserStoreError::Unavailable));
}

#[tokio::test]
async fn test_lost_cluster_invalidates_handle() {
    let server = MockServer::start().await;
    mount_healthy_pool(&server).await;
    let gate = gate_for(backend_for(&server));
    gate.bootstrap(RetryPolicy::fixed(1, Duration::from_millis(10)))
        .await
        .unwrap();
    assert_eq!(gate.status(), HealthStatus::Connected);
    let users = UserStore::new(gate.clone(), "main");

    drop(server);

    let err = users
        .create_user(UserCreate {
            name: "Carol".into(),
            age: 52,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, UserStoreError::Unavailable));
    assert!(gate.current().is_none());
    assert_ne!(gate.status(), HealthStatus::Connected);

    let err = users
        .create_user(UserCreate {
            name: "Carol".into(),
            age: 52,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, UserStoreError::Unavailable));
    assert_eq!(gate.status(), HealthStatus::Failed);
}
