//! Wiremock helpers for artifact downloads

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serve `content` at `route`, ignoring any Range header
pub async fn mock_artifact(server: &MockServer, route: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content))
        .mount(server)
        .await;
}

/// Serve `content` at `route` and honour `Range: bytes=<from>-`
pub async fn mock_ranged_artifact(server: &MockServer, route: &str, content: &[u8], from: usize) {
    let tail = content[from..].to_vec();
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("Range", format!("bytes={}-", from).as_str()))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header(
                    "Content-Range",
                    format!("bytes {}-{}/{}", from, content.len() - 1, content.len()).as_str(),
                )
                .set_body_bytes(tail),
        )
        .with_priority(1)
        .mount(server)
        .await;

    mock_artifact(server, route, content).await;
}

/// Answer every request at `route` with `status`
pub async fn mock_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Fail `fail_count` times with 500, then serve `content`
pub async fn mock_flaky_artifact(server: &MockServer, route: &str, fail_count: u64, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(fail_count)
        .with_priority(1)
        .mount(server)
        .await;

    mock_artifact(server, route, content).await;
}

/// Serve `content` and require exactly `times` requests by the end of the test
pub async fn mock_artifact_expecting(server: &MockServer, route: &str, content: &[u8], times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content))
        .expect(times)
        .mount(server)
        .await;
}

/// Requests that carried a Range header
pub async fn ranged_requests(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|r| r.headers.get("range"))
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

pub async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}
