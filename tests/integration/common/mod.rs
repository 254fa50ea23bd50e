//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use pubmed_batch::{ClientConfig, Result, RetrievalError, RetrieveOptions, Retriever, Transport};
use wiremock::MockServer;

/// Config with every service routed to the mock server
pub fn mock_config(server: &MockServer) -> ClientConfig {
    ClientConfig::new()
        .with_base_url(&server.uri())
        .with_email("tests@example.org")
}

pub fn mock_retriever(server: &MockServer) -> Retriever {
    Retriever::with_config(mock_config(server)).expect("client should build")
}

/// No pacing, so tests do not sleep between batches or retries
pub fn fast_options() -> RetrieveOptions {
    RetrieveOptions::new().with_pacing_delay(Duration::ZERO)
}

/// Gzipped tar holding `(path, content)` members
pub fn build_package(members: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    let tar_bytes = builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

/// Transport answering from a closure and counting every request
pub struct StubTransport<F> {
    respond: F,
    calls: AtomicUsize,
    urls: std::sync::Mutex<Vec<String>>,
}

impl<F> StubTransport<F>
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    pub fn new(respond: F) -> Arc<Self> {
        Arc::new(Self {
            respond,
            calls: AtomicUsize::new(0),
            urls: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl<F> Transport for StubTransport<F>
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        (self.respond)(url)
    }
}

/// Upstream failure as the HTTP transport reports a 503
pub fn unavailable() -> RetrievalError {
    RetrievalError::ApiError {
        status: 503,
        message: "Service Unavailable".to_string(),
    }
}

/// Retriever over a stub transport, with local placeholder URLs
pub fn stub_retriever(transport: Arc<dyn Transport>) -> Retriever {
    let config = ClientConfig::new().with_base_url("http://stub.invalid");
    Retriever::with_transport(config, transport)
}
