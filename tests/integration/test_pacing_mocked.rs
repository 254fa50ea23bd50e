//! Pacing between upstream calls and between retry attempts

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{StubTransport, stub_retriever, unavailable};
use pubmed_batch::{ClientConfig, RetrieveOptions, Retriever, RetryConfig};
use tokio::time::Instant;

const EMPTY_SET: &str = "<PubmedArticleSet></PubmedArticleSet>";

#[tokio::test]
async fn test_sequential_batches_are_paced() {
    let transport = StubTransport::new(|_: &str| Ok(EMPTY_SET.as_bytes().to_vec()));
    let retriever = stub_retriever(transport.clone());
    let options = RetrieveOptions::new()
        .with_pacing_delay(Duration::from_millis(100))
        .with_batch_size(1);

    let start = Instant::now();
    let table = retriever
        .abstracts(&["1", "2", "3"], &options)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(table.is_empty());
    assert_eq!(transport.calls(), 3);
    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn test_retries_wait_for_pacing_delay_by_default() {
    let attempts = AtomicUsize::new(0);
    let transport = StubTransport::new(move |_: &str| {
        if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(unavailable())
        } else {
            Ok(EMPTY_SET.as_bytes().to_vec())
        }
    });
    let retriever = stub_retriever(transport.clone());
    let options = RetrieveOptions::new().with_pacing_delay(Duration::from_millis(60));

    let start = Instant::now();
    retriever.abstracts(&["1"], &options).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(transport.calls(), 3);
    // two retry waits plus the pacing sleep after the batch
    assert!(elapsed >= Duration::from_millis(180), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn test_configured_retry_delay_overrides_pacing() {
    let attempts = AtomicUsize::new(0);
    let transport = StubTransport::new(move |_: &str| {
        if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(unavailable())
        } else {
            Ok(EMPTY_SET.as_bytes().to_vec())
        }
    });
    let config = ClientConfig::new()
        .with_base_url("http://stub.invalid")
        .with_retry_config(RetryConfig::new().with_delay(Duration::from_millis(80)));
    let retriever = Retriever::with_transport(config, transport.clone());
    let options = RetrieveOptions::new().with_pacing_delay(Duration::ZERO);

    let start = Instant::now();
    retriever.abstracts(&["1"], &options).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(transport.calls(), 3);
    assert!(elapsed >= Duration::from_millis(160), "elapsed {elapsed:?}");
}
