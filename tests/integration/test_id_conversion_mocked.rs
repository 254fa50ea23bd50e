//! PMID to PMCID conversion and package URL resolution against mocked PMC utilities

mod common;

use common::{build_package, fast_options, mock_retriever};
use tracing_test::traced_test;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IDCONV_PATH: &str = "/pmc/utils/idconv/v1.0/";
const OA_PATH: &str = "/pmc/utils/oa/oa.fcgi";

const IDCONV_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<pmcids status="ok">
  <request idtype="pmid" dbfrom="pubmed" format="xml" ids="30000000,23193287,9,25000000">
    <echo>ids=30000000%2C23193287%2C9%2C25000000;idtype=pmid;format=xml</echo>
  </request>
  <record requested-id="30000000" pmcid="PMC6000000" pmid="30000000" doi="10.1/c"/>
  <record requested-id="23193287" pmcid="PMC3531190" pmid="23193287" doi="10.1093/nar/gks1195"/>
  <record requested-id="9" pmid="9" status="error" errmsg="Identifier not found in PMC"/>
  <record requested-id="25000000" pmcid="PMC4000000" pmid="25000000"/>
</pmcids>"#;

fn oa_record(pmcid: &str, href: &str) -> String {
    format!(
        r#"<OA><responseDate>2025-07-14 01:46:30</responseDate>
<request id="{pmcid}">oa.fcgi?id={pmcid}</request>
<records returned-count="1" total-count="1">
  <record id="{pmcid}" citation="x" license="CC BY" retracted="no">
    <link format="pdf" updated="2020-01-01" href="{href}.pdf"/>
    <link format="tgz" updated="2020-01-01" href="{href}.tar.gz"/>
  </record>
</records></OA>"#
    )
}

fn oa_not_open_access(pmcid: &str) -> String {
    format!(
        r#"<OA><responseDate>2025-07-14 01:46:30</responseDate>
<request id="{pmcid}">oa.fcgi?id={pmcid}</request>
<error code="idIsNotOpenAccess">identifier '{pmcid}' is not Open Access</error></OA>"#
    )
}

async fn mount_idconv(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(IDCONV_PATH))
        .and(query_param("idtype", "pmid"))
        .and(query_param("format", "xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(IDCONV_RESPONSE))
        .mount(server)
        .await;
}

async fn mount_oa(server: &MockServer, pmcid: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(OA_PATH))
        .and(query_param("id", pmcid))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

const INPUT: [&str; 4] = ["30000000", "23193287", "9", "25000000"];

#[tokio::test]
#[traced_test]
async fn test_pmid_to_pmcid_keeps_all_rows_in_pmid_order() {
    let server = MockServer::start().await;
    mount_idconv(&server).await;
    let retriever = mock_retriever(&server);

    let table = retriever.pmid_to_pmcid(&INPUT, &fast_options()).await.unwrap();

    let rows: Vec<(&str, Option<&str>)> = table
        .iter()
        .map(|m| (m.pmid.as_str(), m.pmcid.as_deref()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("9", None),
            ("23193287", Some("PMC3531190")),
            ("25000000", Some("PMC4000000")),
            ("30000000", Some("PMC6000000")),
        ]
    );
    assert_eq!(table.rows()[1].doi.as_deref(), Some("10.1093/nar/gks1195"));
    assert!(table.iter().all(|m| m.url.is_none()));
}

#[tokio::test]
#[traced_test]
async fn test_pmid_to_ftp_excludes_unresolved_ids() {
    let server = MockServer::start().await;
    mount_idconv(&server).await;
    mount_oa(
        &server,
        "PMC3531190",
        oa_record("PMC3531190", "ftp://ftp.ncbi.nlm.nih.gov/pub/pmc/oa_package/8e/71/PMC3531190"),
    )
    .await;
    mount_oa(
        &server,
        "PMC6000000",
        oa_record("PMC6000000", "ftp://ftp.ncbi.nlm.nih.gov/pub/pmc/oa_package/00/00/PMC6000000"),
    )
    .await;
    mount_oa(&server, "PMC4000000", oa_not_open_access("PMC4000000")).await;
    let retriever = mock_retriever(&server);

    let table = retriever
        .pmid_to_ftp(&INPUT, &fast_options().with_worker_count(2))
        .await
        .unwrap();

    let rows: Vec<(&str, Option<&str>)> = table
        .iter()
        .map(|m| (m.pmid.as_str(), m.url.as_deref()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (
                "23193287",
                Some("https://ftp.ncbi.nlm.nih.gov/pub/pmc/oa_package/8e/71/PMC3531190.tar.gz")
            ),
            (
                "30000000",
                Some("https://ftp.ncbi.nlm.nih.gov/pub/pmc/oa_package/00/00/PMC6000000.tar.gz")
            ),
        ]
    );
}

#[tokio::test]
async fn test_pmid_to_ftp_without_pmcids_makes_no_oa_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(IDCONV_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<pmcids status="ok"><record requested-id="9" status="error" errmsg="not found"/></pmcids>"#,
        ))
        .mount(&server)
        .await;
    let retriever = mock_retriever(&server);

    let table = retriever.pmid_to_ftp(&["9"], &fast_options()).await.unwrap();

    assert!(table.is_empty());
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() == IDCONV_PATH));
}

#[tokio::test]
async fn test_full_text_for_pmids_follows_resolved_urls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(IDCONV_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<pmcids status="ok"><record requested-id="23193287" pmcid="PMC3531190" pmid="23193287"/></pmcids>"#,
        ))
        .mount(&server)
        .await;
    mount_oa(
        &server,
        "PMC3531190",
        oa_record("PMC3531190", &format!("{}/packages/PMC3531190", server.uri())),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/packages/PMC3531190.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(build_package(&[(
            "PMC3531190/article.nxml",
            r#"<article><front><article-meta><article-id pub-id-type="pmid">23193287</article-id></article-meta></front>
<body><sec><title>Abstract</title><p>Short.</p></sec></body></article>"#,
        )])))
        .mount(&server)
        .await;
    let retriever = mock_retriever(&server);

    let table = retriever
        .full_text_for_pmids(&["23193287"], &fast_options())
        .await
        .unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.rows()[0].pmid.as_deref(), Some("23193287"));
    assert_eq!(table.rows()[0].section.as_deref(), Some("Abstract"));
}
