//! Full-text-sections adapter
//!
//! Input items are package download URLs, usually produced by
//! [`Retriever::pmid_to_ftp`](crate::Retriever::pmid_to_ftp). The archive
//! service takes one package per request, so items are fetched one at a time
//! with the pacing delay between them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::adapter::{EndpointAdapter, FetchContext};
use crate::batch::Batch;
use crate::endpoint::{ColumnInfo, column_names};
use crate::error::Result;
use crate::table::Table;
use crate::transport::Transport;

use super::sections::{ParsedArticle, parse_article};
use super::tar::fetch_article_xml;

pub const DEFAULT_BATCH_SIZE: usize = 5;

pub(crate) const COLUMNS: &[ColumnInfo] = &[
    ColumnInfo::new("pmid", "str?", "PubMed identifier from the article metadata"),
    ColumnInfo::new("section", "str?", "Section title"),
    ColumnInfo::new("text", "str?", "Section text, reflowed at lowercase-uppercase boundaries"),
];

/// One top-level body section of one article
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullTextSection {
    pub pmid: Option<String>,
    pub section: Option<String>,
    pub text: Option<String>,
}

pub(crate) fn section_rows(article: ParsedArticle) -> Vec<FullTextSection> {
    let pmid = article.pmid;
    article
        .sections
        .into_iter()
        .map(|section| FullTextSection {
            pmid: pmid.clone(),
            section: section.title,
            text: section.text,
        })
        .collect()
}

/// Downloads Open Access packages and splits their body into sections
pub struct FullTextAdapter {
    transport: Arc<dyn Transport>,
}

impl FullTextAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl EndpointAdapter for FullTextAdapter {
    type Record = FullTextSection;

    fn name(&self) -> &'static str {
        "pmc_fulltext"
    }

    /// Any item failing makes the whole batch unavailable
    #[instrument(skip_all, fields(batch = batch.index(), size = batch.len()))]
    async fn fetch_table(
        &self,
        batch: &Batch,
        ctx: &FetchContext,
    ) -> Result<Table<FullTextSection>> {
        let mut rows = Vec::new();

        for (i, url) in batch.items().iter().enumerate() {
            if i > 0 {
                ctx.pace().await;
            }
            let xml = fetch_article_xml(self.transport.as_ref(), url).await?;
            let article = parse_article(&xml)?;
            debug!(
                url = %url,
                pmid = ?article.pmid,
                sections = article.sections.len(),
                "Parsed article"
            );
            rows.extend(section_rows(article));
        }

        Ok(Table::new(column_names(COLUMNS), rows))
    }
}
