//! Abstract-metadata adapter

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;

use crate::adapter::{EndpointAdapter, FetchContext};
use crate::batch::Batch;
use crate::config::ClientConfig;
use crate::endpoint::{ColumnInfo, column_names};
use crate::error::Result;
use crate::table::Table;
use crate::text::{extract_year, insert_section_breaks, non_empty};
use crate::transport::Transport;

use super::records::{PubmedRecord, fetch_records};

pub const DEFAULT_BATCH_SIZE: usize = 199;

pub(crate) const COLUMNS: &[ColumnInfo] = &[
    ColumnInfo::new("pmid", "str", "PubMed identifier"),
    ColumnInfo::new("year", "int?", "Publication year, from Year or the leading year of MedlineDate"),
    ColumnInfo::new("journal", "str?", "Journal title"),
    ColumnInfo::new("articletitle", "str?", "Article title"),
    ColumnInfo::new("abstract", "str?", "Abstract text, labelled parts joined and broken at section titles"),
    ColumnInfo::new("annotations", "nested", "MeSH descriptors, chemicals and keywords for the article"),
];

/// Controlled vocabulary an annotation term comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnnotationType {
    MeSH,
    Chemical,
    Keyword,
}

/// One annotation term attached to an article
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationTerm {
    pub pmid: String,
    #[serde(rename = "type")]
    pub kind: AnnotationType,
    pub form: String,
}

/// One article's bibliographic metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbstractRecord {
    pub pmid: String,
    pub year: Option<i32>,
    pub journal: Option<String>,
    pub articletitle: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub annotations: Vec<AnnotationTerm>,
}

impl From<PubmedRecord> for AbstractRecord {
    fn from(record: PubmedRecord) -> Self {
        let abstract_text = join_abstract(&record);
        let year = extract_year(record.year.as_deref(), record.medline_date.as_deref());

        let pmid = record.pmid;
        let terms = [
            (AnnotationType::MeSH, record.mesh_terms),
            (AnnotationType::Chemical, record.chemicals),
            (AnnotationType::Keyword, record.keywords),
        ];
        let annotations = terms
            .into_iter()
            .flat_map(|(kind, forms)| {
                let pmid = pmid.clone();
                forms.into_iter().map(move |form| AnnotationTerm {
                    pmid: pmid.clone(),
                    kind,
                    form,
                })
            })
            .collect();

        Self {
            pmid,
            year,
            journal: non_empty(record.journal.as_deref()),
            articletitle: non_empty(record.article_title.as_deref()),
            abstract_text,
            annotations,
        }
    }
}

/// Parts are joined with a space and then broken before each section title
///
/// `Label` attributes are not copied into the text; only titles written
/// inline in the abstract produce breaks.
fn join_abstract(record: &PubmedRecord) -> Option<String> {
    let parts: Vec<&str> = record
        .abstract_parts
        .iter()
        .map(String::as_str)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(insert_section_breaks(&parts.join(" ")))
    }
}

/// Fetches article metadata from PubMed efetch
pub struct AbstractsAdapter {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl AbstractsAdapter {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }
}

#[async_trait]
impl EndpointAdapter for AbstractsAdapter {
    type Record = AbstractRecord;

    fn name(&self) -> &'static str {
        "pubmed_abstracts"
    }

    #[instrument(skip_all, fields(batch = batch.index()))]
    async fn fetch_table(&self, batch: &Batch, ctx: &FetchContext) -> Result<Table<AbstractRecord>> {
        let records = fetch_records(self.transport.as_ref(), &self.config, batch, ctx).await?;
        let rows = records.into_iter().map(AbstractRecord::from).collect();
        Ok(Table::new(column_names(COLUMNS), rows))
    }
}
