//! Author-affiliation adapter

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
use crate::text::non_empty;
use crate::transport::Transport;

use super::records::{AuthorEntry, PubmedRecord, fetch_records};

pub const DEFAULT_BATCH_SIZE: usize = 199;

pub(crate) const COLUMNS: &[ColumnInfo] = &[
    ColumnInfo::new("pmid", "str", "PubMed identifier"),
    ColumnInfo::new("author", "str?", "\"Last, First\" author name"),
    ColumnInfo::new("affiliation", "str?", "Author affiliations, several joined with \"; \""),
];

/// One author of one article
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffiliationRecord {
    pub pmid: String,
    pub author: Option<String>,
    pub affiliation: Option<String>,
}

fn author_name(author: &AuthorEntry) -> Option<String> {
    match (
        non_empty(author.last_name.as_deref()),
        non_empty(author.fore_name.as_deref()),
    ) {
        (Some(last), Some(first)) => Some(format!("{last}, {first}")),
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

fn author_affiliation(author: &AuthorEntry) -> Option<String> {
    let parts: Vec<&str> = author
        .affiliations
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

/// One row per author; an article without authors yields nothing
pub(crate) fn affiliation_rows(record: &PubmedRecord) -> Vec<AffiliationRecord> {
    record
        .authors
        .iter()
        .map(|author| AffiliationRecord {
            pmid: record.pmid.clone(),
            author: author_name(author),
            affiliation: author_affiliation(author),
        })
        .collect()
}

/// Fetches author affiliations from PubMed efetch
pub struct AffiliationsAdapter {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl AffiliationsAdapter {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }
}

#[async_trait]
impl EndpointAdapter for AffiliationsAdapter {
    type Record = AffiliationRecord;

    fn name(&self) -> &'static str {
        "pubmed_affiliations"
    }

    #[instrument(skip_all, fields(batch = batch.index()))]
    async fn fetch_table(
        &self,
        batch: &Batch,
        ctx: &FetchContext,
    ) -> Result<Table<AffiliationRecord>> {
        let records = fetch_records(self.transport.as_ref(), &self.config, batch, ctx).await?;
        let rows = records.iter().flat_map(affiliation_rows).collect();
        Ok(Table::new(column_names(COLUMNS), rows))
    }
}
