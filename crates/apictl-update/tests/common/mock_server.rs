//! Mock server helpers
//!
//! Wiremock covers the happy paths and HTTP errors. Mid-body behaviour
//! (stalls, truncation) needs a raw socket, so those helpers speak just
//! enough HTTP/1.1 by hand.

use std::time::Duration;

use apictl_update::oracle::GET_NEXT_UPDATE_PATH;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::constants::*;

/// Serve `content` at ARTIFACT_PATH
pub async fn mock_artifact(server: &MockServer, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(ARTIFACT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content))
        .mount(server)
        .await;
}

/// ARTIFACT_PATH always answers with `status`
pub async fn mock_failing_artifact(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path(ARTIFACT_PATH))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// First `fail_count` requests return `status`, later ones the content
pub async fn mock_flaky_artifact(server: &MockServer, fail_count: u64, status: u16, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(ARTIFACT_PATH))
        .respond_with(ResponseTemplate::new(status))
        .up_to_n_times(fail_count)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(ARTIFACT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content))
        .mount(server)
        .await;
}

/// Artifact whose response is held back by `delay`
pub async fn mock_slow_artifact(server: &MockServer, content: &[u8], delay: Duration) {
    Mock::given(method("GET"))
        .and(path(ARTIFACT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// GetNextUpdate answers 200 with `body`
pub async fn mock_next_update(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path(GET_NEXT_UPDATE_PATH))
        .and(header("Connect-Protocol-Version", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// GetNextUpdate answers with a Connect error
pub async fn mock_next_update_error(server: &MockServer, status: u16, code: &str, message: &str) {
    Mock::given(method("POST"))
        .and(path(GET_NEXT_UPDATE_PATH))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_json(serde_json::json!({ "code": code, "message": message })),
        )
        .mount(server)
        .await;
}

/// How the raw server ends the body after the first bytes
#[derive(Debug, Clone, Copy)]
pub enum BodyEnd {
    /// Keep the connection open without sending more
    Stall,
    /// Close the connection early
    Close,
}

/// Advertise `content_length` bytes, send `sent`, then stall or close
///
/// Returns the artifact URL and the server task.
pub async fn partial_body_server(
    content_length: usize,
    sent: &'static [u8],
    end: BodyEnd,
) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {content_length}\r\n\r\n"
        );
        let _ = socket.write_all(head.as_bytes()).await;
        let _ = socket.write_all(sent).await;
        let _ = socket.flush().await;

        match end {
            BodyEnd::Stall => tokio::time::sleep(Duration::from_secs(30)).await,
            BodyEnd::Close => {
                let _ = socket.shutdown().await;
            }
        }
    });

    (format!("http://{addr}{ARTIFACT_PATH}"), handle)
}
