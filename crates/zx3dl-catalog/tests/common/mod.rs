//! Shared fixtures for catalog integration tests
#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;
use zx3dl_catalog::MetadataStore;
use zx3dl_core::types::{ChecksumAlgorithm, ChecksumHasher, RetryPolicy};
use zx3dl_fetch::DownloadEngine;

/// A store over a fresh temporary cache, single attempt per transfer
pub fn test_store() -> (Arc<MetadataStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let engine = DownloadEngine::with_client(reqwest::Client::new(), RetryPolicy::immediate(1));
    (Arc::new(MetadataStore::new(dir.path(), engine)), dir)
}

/// `<name>.zip` containing `<name>` with `json`
pub fn zipped(name: &str, json: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer.start_file(name, SimpleFileOptions::default()).unwrap();
    writer.write_all(json.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn md5_hex(bytes: &[u8]) -> String {
    let mut hasher = ChecksumHasher::new(ChecksumAlgorithm::Md5);
    hasher.update(bytes);
    hasher.finalize_hex()
}

/// Serve `json` zipped at `/<base>/<name>.zip`; returns the archive bytes
pub async fn serve_document(server: &MockServer, base: &str, name: &str, json: &str) -> Vec<u8> {
    let bytes = zipped(name, json);
    Mock::given(method("GET"))
        .and(path(format!("{}/{}.zip", base.trim_end_matches('/'), name)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.clone()))
        .mount(server)
        .await;
    bytes
}

/// Serve raw bytes at `route`
pub async fn serve_bytes(server: &MockServer, route: &str, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.to_vec()))
        .mount(server)
        .await;
}

pub async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}
