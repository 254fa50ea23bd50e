//! Abstract, affiliation and search retrieval against a mocked E-utilities server

mod common;

use common::{fast_options, mock_config, mock_retriever};
use pubmed_batch::{AnnotationType, RetryConfig, Retriever};
use tracing_test::traced_test;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EFETCH_PATH: &str = "/entrez/eutils/efetch.fcgi";
const ESEARCH_PATH: &str = "/entrez/eutils/esearch.fcgi";

const EFETCH_RESPONSE: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">11250746</PMID>
      <Article PubModel="Print">
        <Journal>
          <JournalIssue CitedMedium="Print">
            <PubDate><Year>2001</Year><Month>Mar</Month></PubDate>
          </JournalIssue>
          <Title>Nature genetics</Title>
        </Journal>
        <ArticleTitle>Positional cloning of a <i>novel</i> gene.</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">Little is known.</AbstractText>
          <AbstractText Label="RESULTS">We cloned it. Main Findings: it works.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y">
            <LastName>Smith</LastName>
            <ForeName>Jane</ForeName>
            <AffiliationInfo><Affiliation>Dept of Genetics, Univ A.</Affiliation></AffiliationInfo>
          </Author>
          <Author ValidYN="Y">
            <ForeName>Kim</ForeName>
          </Author>
          <Author ValidYN="Y">
            <CollectiveName>Consortium</CollectiveName>
          </Author>
        </AuthorList>
      </Article>
      <ChemicalList>
        <Chemical><NameOfSubstance UI="D014867">Water</NameOfSubstance></Chemical>
      </ChemicalList>
      <MeshHeadingList>
        <MeshHeading><DescriptorName UI="D005796">Genes</DescriptorName></MeshHeading>
        <MeshHeading><DescriptorName UI="D006801">Humans</DescriptorName></MeshHeading>
      </MeshHeadingList>
    </MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">22222222</PMID>
      <Article PubModel="Print">
        <Journal>
          <JournalIssue CitedMedium="Print">
            <PubDate><MedlineDate>2020 Jan-Mar</MedlineDate></PubDate>
          </JournalIssue>
          <Title>Some journal</Title>
        </Journal>
        <ArticleTitle>Untitled work without authors</ArticleTitle>
      </Article>
      <KeywordList Owner="NOTNLM"><Keyword>screening</Keyword></KeywordList>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

async fn mount_efetch(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path(EFETCH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body.to_string())
                .insert_header("content-type", "application/xml"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
#[traced_test]
async fn test_abstracts_from_efetch() {
    let server = MockServer::start().await;
    mount_efetch(&server, EFETCH_RESPONSE).await;
    let retriever = mock_retriever(&server);

    let table = retriever
        .abstracts(&["11250746", "22222222"], &fast_options())
        .await
        .unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(
        table.columns(),
        &["pmid", "year", "journal", "articletitle", "abstract", "annotations"]
    );

    let first = &table.rows()[0];
    assert_eq!(first.pmid, "11250746");
    assert_eq!(first.year, Some(2001));
    assert_eq!(first.journal.as_deref(), Some("Nature genetics"));
    assert_eq!(
        first.articletitle.as_deref(),
        Some("Positional cloning of a novel gene.")
    );
    assert_eq!(
        first.abstract_text.as_deref(),
        Some("Little is known. We cloned it.\nMain Findings: it works.")
    );

    let kinds: Vec<AnnotationType> = first.annotations.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![AnnotationType::MeSH, AnnotationType::MeSH, AnnotationType::Chemical]
    );
    assert!(first.annotations.iter().all(|a| a.pmid == "11250746"));
}

#[tokio::test]
async fn test_year_falls_back_to_medline_date() {
    let server = MockServer::start().await;
    mount_efetch(&server, EFETCH_RESPONSE).await;
    let retriever = mock_retriever(&server);

    let table = retriever.abstracts(&["22222222"], &fast_options()).await.unwrap();
    let second = table.iter().find(|r| r.pmid == "22222222").unwrap();

    assert_eq!(second.year, Some(2020));
    assert_eq!(second.abstract_text, None);
    assert_eq!(second.annotations.len(), 1);
    assert_eq!(second.annotations[0].form, "screening");
}

#[tokio::test]
async fn test_affiliations_one_row_per_author() {
    let server = MockServer::start().await;
    mount_efetch(&server, EFETCH_RESPONSE).await;
    let retriever = mock_retriever(&server);

    let table = retriever
        .affiliations(&["11250746", "22222222"], &fast_options())
        .await
        .unwrap();

    let rows: Vec<(&str, Option<&str>, Option<&str>)> = table
        .iter()
        .map(|r| (r.pmid.as_str(), r.author.as_deref(), r.affiliation.as_deref()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("11250746", Some("Smith, Jane"), Some("Dept of Genetics, Univ A.")),
            ("11250746", Some("Kim"), None),
            ("11250746", None, None),
        ]
    );
}

#[tokio::test]
async fn test_per_call_api_key_reaches_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EFETCH_PATH))
        .and(query_param("api_key", "per-call-key"))
        .and(query_param("tool", "pubmed-batch"))
        .and(query_param("db", "pubmed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EFETCH_RESPONSE))
        .expect(2)
        .mount(&server)
        .await;

    let retriever =
        Retriever::with_config(mock_config(&server).with_api_key("configured-key")).unwrap();
    let table = retriever
        .abstracts(
            &["11250746", "22222222"],
            &fast_options().with_batch_size(1).with_api_key("per-call-key"),
        )
        .await
        .unwrap();

    // Each batch returns the full two-article document
    assert_eq!(table.len(), 4);
}

#[tokio::test]
#[traced_test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EFETCH_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_efetch(&server, EFETCH_RESPONSE).await;
    let retriever = mock_retriever(&server);

    let table = retriever
        .abstracts(&["11250746", "22222222"], &fast_options())
        .await
        .unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_unparseable_document_is_retried_then_dropped() {
    let server = MockServer::start().await;
    mount_efetch(&server, "<html><body>Backend down</body></html>").await;
    let config = mock_config(&server).with_retry_config(RetryConfig::new().with_max_attempts(3));
    let retriever = Retriever::with_config(config).unwrap();

    let table = retriever.abstracts(&["11250746"], &fast_options()).await.unwrap();

    assert!(table.is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_search_deduplicates_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ESEARCH_PATH))
        .and(query_param("term", "(crispr) AND (2015:2020[dp])"))
        .and(query_param("retmax", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"header":{"type":"esearch","version":"0.3"},
                "esearchresult":{"count":"4","retmax":"4","retstart":"0",
                "idlist":["33","11","33","22"]}}"#,
        ))
        .mount(&server)
        .await;
    let retriever = mock_retriever(&server);

    let ids = retriever
        .search("crispr", Some((2015, 2020)), 20)
        .await
        .unwrap();

    assert_eq!(ids, vec!["33", "11", "22"]);
}

#[tokio::test]
async fn test_search_rejects_bad_arguments_without_requests() {
    let server = MockServer::start().await;
    let retriever = mock_retriever(&server);

    assert!(retriever.search("", None, 10).await.unwrap_err().is_configuration());
    assert!(retriever.search("x", None, 0).await.unwrap_err().is_configuration());
    assert!(retriever
        .search("x", Some((2020, 2010)), 10)
        .await
        .unwrap_err()
        .is_configuration());
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}
