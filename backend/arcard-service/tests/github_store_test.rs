/// GitHub contents API client tests against a mock server
use arcard_service::services::{GithubContentsStore, RemoteStore, StoreError};
use bytes::Bytes;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILE_PATH: &str = "/repos/acme/cards/contents/clients/client1-0/qr.png";

fn store(server: &MockServer, branch: Option<&str>) -> GithubContentsStore {
    GithubContentsStore::new(
        &server.uri(),
        "acme",
        "cards",
        branch.map(str::to_string),
        Some("secret-token".into()),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_new_file_is_created_without_sha() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(FILE_PATH))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_partial_json(json!({
            "message": "Add files for client1-0",
            "content": "cG5n",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"content": {}})))
        .expect(1)
        .mount(&server)
        .await;

    store(&server, None)
        .put_file(
            "clients/client1-0/qr.png",
            Bytes::from_static(b"png"),
            "Add files for client1-0",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_existing_file_is_updated_with_sha_on_branch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .and(query_param("ref", "pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "3d21ec53a331a6f037a91c368710b99387d012c1",
            "path": "clients/client1-0/qr.png",
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(FILE_PATH))
        .and(body_partial_json(json!({
            "branch": "pages",
            "sha": "3d21ec53a331a6f037a91c368710b99387d012c1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": {}})))
        .expect(1)
        .mount(&server)
        .await;

    store(&server, Some("pages"))
        .put_file("clients/client1-0/qr.png", Bytes::from_static(b"png"), "update")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = store(&server, None)
        .put_file("clients/client1-0/qr.png", Bytes::from_static(b"png"), "msg")
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Status { status: 502, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_conflict_is_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(FILE_PATH))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "sha does not match"})),
        )
        .mount(&server)
        .await;

    let err = store(&server, None)
        .put_file("clients/client1-0/qr.png", Bytes::from_static(b"png"), "msg")
        .await
        .unwrap_err();

    match &err {
        StoreError::Status { status, body } => {
            assert_eq!(*status, 409);
            assert!(body.contains("sha does not match"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_lookup_failure_surfaces() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = store(&server, None)
        .put_file("clients/client1-0/qr.png", Bytes::from_static(b"png"), "msg")
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Status { status: 401, .. }));
}
