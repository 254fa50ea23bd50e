//! E-utilities efetch records shared by the abstract and affiliation adapters

use quick_xml::events::Event;
use tracing::{debug, instrument};

use crate::adapter::FetchContext;
use crate::batch::Batch;
use crate::config::{ClientConfig, append_params};
use crate::error::{Result, RetrievalError};
use crate::retry::with_retry;
use crate::text::strip_inline_html_tags;
use crate::transport::Transport;
use crate::xml::{make_reader, read_text_content};

const EFETCH_CONTEXT: &str = "PubMed efetch";

/// One `Author` element
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct AuthorEntry {
    pub last_name: Option<String>,
    pub fore_name: Option<String>,
    pub affiliations: Vec<String>,
}

/// The fields both PubMed adapters read from a `PubmedArticle`
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PubmedRecord {
    pub pmid: String,
    pub journal: Option<String>,
    pub article_title: Option<String>,
    pub year: Option<String>,
    pub medline_date: Option<String>,
    /// Text of each `AbstractText` element, in document order
    pub abstract_parts: Vec<String>,
    pub authors: Vec<AuthorEntry>,
    pub mesh_terms: Vec<String>,
    pub chemicals: Vec<String>,
    pub keywords: Vec<String>,
}

/// Efetch URL for one batch
pub(crate) fn efetch_url(config: &ClientConfig, batch: &Batch, ctx: &FetchContext) -> String {
    let mut url = format!(
        "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml",
        config.urls.eutils.trim_end_matches('/'),
        batch.join(",")
    );
    append_params(&mut url, &config.build_api_params(ctx.api_key.as_ref()));
    url
}

/// Fetch and parse the records for one batch, retrying transient failures
///
/// A body that is not a `PubmedArticleSet` counts as transient, so NCBI's
/// occasional error documents are retried like HTTP failures.
#[instrument(skip_all, fields(batch = batch.index(), size = batch.len()))]
pub(crate) async fn fetch_records(
    transport: &dyn Transport,
    config: &ClientConfig,
    batch: &Batch,
    ctx: &FetchContext,
) -> Result<Vec<PubmedRecord>> {
    let url = efetch_url(config, batch, ctx);

    let records = with_retry(
        || async {
            let body = transport.get(&url).await?;
            let xml = String::from_utf8_lossy(&body);
            parse_records(&xml)
        },
        &ctx.retry,
        ctx.retry_delay(),
        EFETCH_CONTEXT,
    )
    .await?;

    debug!(records = records.len(), "Parsed efetch response");
    Ok(records)
}

/// What to do with an element, decided before the event buffer is reused
enum Action {
    Read(Field),
    EnterAuthor,
    Enter,
}

/// Text-only elements captured into a record
#[derive(Clone, Copy)]
enum Field {
    Pmid,
    ArticleTitle,
    Journal,
    Year,
    MedlineDate,
    AbstractText,
    LastName,
    ForeName,
    Affiliation,
    MeshTerm,
    Chemical,
    Keyword,
}

impl Field {
    fn apply(
        self,
        record: &mut PubmedRecord,
        author: Option<&mut AuthorEntry>,
        text: String,
    ) {
        match self {
            Field::Pmid => {
                if record.pmid.is_empty() {
                    record.pmid = text;
                }
            }
            Field::ArticleTitle => record.article_title = Some(text),
            Field::Journal => record.journal = Some(text),
            Field::Year => record.year = Some(text),
            Field::MedlineDate => record.medline_date = Some(text),
            Field::AbstractText => record.abstract_parts.push(text),
            Field::MeshTerm => record.mesh_terms.push(text),
            Field::Chemical => record.chemicals.push(text),
            Field::Keyword => record.keywords.push(text),
            Field::LastName | Field::ForeName | Field::Affiliation => {
                let Some(author) = author else { return };
                match self {
                    Field::LastName => author.last_name = Some(text),
                    Field::ForeName => author.fore_name = Some(text),
                    _ => author.affiliations.push(text),
                }
            }
        }
    }
}

/// Parse an efetch `PubmedArticleSet` document
pub(crate) fn parse_records(xml: &str) -> Result<Vec<PubmedRecord>> {
    let cleaned = strip_inline_html_tags(xml);
    let mut reader = make_reader(&cleaned);
    let mut buf = Vec::new();

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut records = Vec::new();
    let mut current: Option<PubmedRecord> = None;
    let mut author: Option<AuthorEntry> = None;
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| RetrievalError::XmlError(e.to_string()))?;

        match event {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();

                if !seen_root {
                    if name.as_slice() != b"PubmedArticleSet" {
                        return Err(RetrievalError::XmlError(format!(
                            "expected PubmedArticleSet, found <{}>",
                            String::from_utf8_lossy(&name)
                        )));
                    }
                    seen_root = true;
                    stack.push(name);
                    buf.clear();
                    continue;
                }

                let parent = stack.last().map(Vec::as_slice).unwrap_or_default();
                buf.clear();

                let Some(record) = current.as_mut() else {
                    if name.as_slice() == b"PubmedArticle" {
                        current = Some(PubmedRecord::default());
                    }
                    stack.push(name);
                    continue;
                };

                let action = match (parent, name.as_slice()) {
                    (b"MedlineCitation", b"PMID") => Action::Read(Field::Pmid),
                    (b"Article", b"ArticleTitle") => Action::Read(Field::ArticleTitle),
                    (b"Journal", b"Title") => Action::Read(Field::Journal),
                    (b"PubDate", b"Year") => Action::Read(Field::Year),
                    (b"PubDate", b"MedlineDate") => Action::Read(Field::MedlineDate),
                    (b"Abstract", b"AbstractText") => Action::Read(Field::AbstractText),
                    (b"AuthorList", b"Author") => Action::EnterAuthor,
                    (b"Author", b"LastName") => Action::Read(Field::LastName),
                    (b"Author", b"ForeName") => Action::Read(Field::ForeName),
                    (b"AffiliationInfo", b"Affiliation") => Action::Read(Field::Affiliation),
                    (b"MeshHeading", b"DescriptorName") => Action::Read(Field::MeshTerm),
                    (b"Chemical", b"NameOfSubstance") => Action::Read(Field::Chemical),
                    (b"KeywordList", b"Keyword") => Action::Read(Field::Keyword),
                    _ => Action::Enter,
                };

                match action {
                    Action::Read(field) => {
                        let text = read_text_content(&mut reader, &name, &mut buf)?;
                        field.apply(record, author.as_mut(), text);
                    }
                    Action::EnterAuthor => {
                        author = Some(AuthorEntry::default());
                        stack.push(name);
                    }
                    Action::Enter => stack.push(name),
                }
            }
            Event::End(e) => {
                let name = e.name().as_ref().to_vec();
                buf.clear();
                stack.pop();

                match name.as_slice() {
                    b"Author" => {
                        if let (Some(record), Some(done)) = (current.as_mut(), author.take()) {
                            record.authors.push(done);
                        }
                    }
                    b"PubmedArticle" => {
                        if let Some(record) = current.take() {
                            if record.pmid.is_empty() {
                                debug!("Skipping PubmedArticle without PMID");
                            } else {
                                records.push(record);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => buf.clear(),
        }
    }

    if !seen_root {
        return Err(RetrievalError::XmlError(
            "empty efetch response".to_string(),
        ));
    }

    Ok(records)
}
