//! Full-text sections from mocked PMC Open Access packages

mod common;

use common::{build_package, fast_options, mock_retriever};
use tracing_test::traced_test;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE_NXML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE article PUBLIC "-//NLM//DTD JATS (Z39.96) Journal Archiving and Interchange DTD v1.3 20210610//EN" "JATS-archivearticle1-3.dtd">
<article xmlns:xlink="http://www.w3.org/1999/xlink" article-type="research-article">
  <front>
    <article-meta>
      <article-id pub-id-type="pmc">PMC3531190</article-id>
      <article-id pub-id-type="pmid">23193287</article-id>
    </article-meta>
  </front>
  <body>
    <sec id="s1">
      <title>Introduction</title>
      <p>Databases grow.</p>
    </sec>
    <sec id="s2">
      <title>Results</title>
      <sec><title>Growth</title><p>Records doubled.</p></sec>
    </sec>
  </body>
</article>"#;

const NO_BODY_NXML: &str = r#"<article><front><article-meta><article-id pub-id-type="pmid">1</article-id></article-meta></front></article>"#;

async fn mount_package(server: &MockServer, package_path: &str, bytes: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(package_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(bytes)
                .insert_header("content-type", "application/x-gzip"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
#[traced_test]
async fn test_sections_from_package() {
    let server = MockServer::start().await;
    mount_package(
        &server,
        "/pub/pmc/oa_package/8e/71/PMC3531190.tar.gz",
        build_package(&[
            ("PMC3531190/gks1195fig1.jpg", "jpeg bytes"),
            ("PMC3531190/gks1195.nxml", ARTICLE_NXML),
        ]),
    )
    .await;
    let retriever = mock_retriever(&server);
    let url = format!("{}/pub/pmc/oa_package/8e/71/PMC3531190.tar.gz", server.uri());

    let table = retriever.full_text(&[url], &fast_options()).await.unwrap();

    assert_eq!(table.columns(), &["pmid", "section", "text"]);
    let rows: Vec<(Option<&str>, Option<&str>, Option<&str>)> = table
        .iter()
        .map(|r| (r.pmid.as_deref(), r.section.as_deref(), r.text.as_deref()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (
                Some("23193287"),
                Some("Introduction"),
                Some("Introduction\nDatabases grow.")
            ),
            (
                Some("23193287"),
                Some("Results"),
                Some("Results\nGrowth\nRecords doubled.")
            ),
        ]
    );
}

#[tokio::test]
async fn test_article_without_body_contributes_no_rows() {
    let server = MockServer::start().await;
    mount_package(&server, "/a.tar.gz", build_package(&[("a/a.nxml", NO_BODY_NXML)])).await;
    mount_package(&server, "/b.tar.gz", build_package(&[("b/b.nxml", ARTICLE_NXML)])).await;
    let retriever = mock_retriever(&server);
    let urls = vec![
        format!("{}/a.tar.gz", server.uri()),
        format!("{}/b.tar.gz", server.uri()),
    ];

    let table = retriever.full_text(&urls, &fast_options()).await.unwrap();

    assert_eq!(table.len(), 2);
    assert!(table.iter().all(|r| r.pmid.as_deref() == Some("23193287")));
}

#[tokio::test]
#[traced_test]
async fn test_bad_package_only_loses_its_batch() {
    let server = MockServer::start().await;
    mount_package(&server, "/good.tar.gz", build_package(&[("g/g.nxml", ARTICLE_NXML)])).await;
    mount_package(&server, "/images.tar.gz", build_package(&[("i/fig.jpg", "jpeg")])).await;
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

    assert_eq!(table.len(), 2);
    assert!(logs_contain("No XML member"));
}
