//! HTTP asset transfer against a local mock server.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use article_harvest::AssetTransfer;
use article_harvest_cli::HttpAssetTransfer;

fn transfer() -> HttpAssetTransfer {
    HttpAssetTransfer::new(Duration::from_secs(5))
}

#[tokio::test]
async fn test_download_creates_directories() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/story.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg bytes".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("run/images/story.jpg");
    transfer()
        .download(&format!("{}/images/story.jpg", server.uri()), &destination)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), b"jpeg bytes");
}

#[tokio::test]
async fn test_not_found_fails_without_writing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("missing.jpg");
    let err = transfer()
        .download(&format!("{}/missing.jpg", server.uri()), &destination)
        .await
        .unwrap_err();

    assert_eq!(err.operation, "download");
    assert!(err.message.contains("404"));
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("retried.jpg");
    transfer()
        .download(&format!("{}/retried.jpg", server.uri()), &destination)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), b"ok");
}
