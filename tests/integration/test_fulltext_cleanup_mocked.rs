//! Package scratch directories are removed whether or not extraction succeeds
//!
//! Kept in its own test binary: it points `TMPDIR` at a private directory.

mod common;

use common::{build_package, fast_options, mock_retriever};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE_NXML: &str = r#"<article><front><article-meta><article-id pub-id-type="pmid">23193287</article-id></article-meta></front>
<body><sec><title>Methods</title><p>Counted.</p></sec></body></article>"#;

#[tokio::test]
async fn test_scratch_files_removed_on_every_exit_path() {
    let scratch = tempfile::tempdir().unwrap();
    // SAFETY: only test in this binary, on a current-thread runtime
    unsafe { std::env::set_var("TMPDIR", scratch.path()) };

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images.tar.gz"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(build_package(&[("i/fig.jpg", "jpeg")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/good.tar.gz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(build_package(&[("g/g.nxml", ARTICLE_NXML)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.tar.gz"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let retriever = mock_retriever(&server);
    let urls = vec![
        format!("{}/images.tar.gz", server.uri()),
        format!("{}/missing.tar.gz", server.uri()),
        format!("{}/good.tar.gz", server.uri()),
    ];

    let table = retriever
        .full_text(&urls, &fast_options().with_batch_size(1))
        .await
        .unwrap();

    assert_eq!(table.len(), 1);
    let leftovers: Vec<_> = std::fs::read_dir(scratch.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
}
