//! Retrieval facade: validate, partition, dispatch, assemble

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::adapter::{EndpointAdapter, FetchContext};
use crate::batch::partition;
use crate::config::{ApiKey, ClientConfig};
use crate::dispatch::dispatch;
use crate::endpoint::{Endpoint, column_names, ncbi_pacing};
use crate::error::{Result, RetrievalError};
use crate::icite::{CitationMetricsAdapter, CitationRecord};
use crate::pmc::idconv::CONVERSION_BATCH_SIZE;
use crate::pmc::{
    FullTextAdapter, FullTextSection, IdConversionAdapter, IdMapping, PackageLinkAdapter,
    fulltext,
};
use crate::pubmed::search::search_ids;
use crate::pubmed::{AbstractRecord, AbstractsAdapter, AffiliationRecord, AffiliationsAdapter};
use crate::pubtator::{AnnotationRecord, AnnotationsAdapter};
use crate::table::{Table, assemble};
use crate::text::compare_ids;
use crate::transport::{HttpTransport, Transport};

/// Per-call knobs for a retrieval
///
/// Unset values fall back to the endpoint's defaults.
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    /// Batches fetched concurrently; 1 runs them in order
    pub worker_count: usize,
    pub pacing_delay: Option<Duration>,
    pub batch_size: Option<usize>,
    /// Overrides the configured API key for this call
    pub api_key: Option<ApiKey>,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            worker_count: 1,
            pacing_delay: None,
            batch_size: None,
            api_key: None,
        }
    }
}

impl RetrieveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = Some(delay);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<ApiKey>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Result of [`Retriever::fetch`], one variant per endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "endpoint", content = "table")]
pub enum EndpointTable {
    #[serde(rename = "pubmed_abstracts")]
    Abstracts(Table<AbstractRecord>),
    #[serde(rename = "pubmed_affiliations")]
    Affiliations(Table<AffiliationRecord>),
    #[serde(rename = "icites")]
    CitationMetrics(Table<CitationRecord>),
    #[serde(rename = "pubtations")]
    EntityAnnotations(Table<AnnotationRecord>),
    #[serde(rename = "pmc_fulltext")]
    FullTextSections(Table<FullTextSection>),
}

impl EndpointTable {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            EndpointTable::Abstracts(_) => Endpoint::Abstracts,
            EndpointTable::Affiliations(_) => Endpoint::Affiliations,
            EndpointTable::CitationMetrics(_) => Endpoint::CitationMetrics,
            EndpointTable::EntityAnnotations(_) => Endpoint::EntityAnnotations,
            EndpointTable::FullTextSections(_) => Endpoint::FullTextSections,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EndpointTable::Abstracts(t) => t.len(),
            EndpointTable::Affiliations(t) => t.len(),
            EndpointTable::CitationMetrics(t) => t.len(),
            EndpointTable::EntityAnnotations(t) => t.len(),
            EndpointTable::FullTextSections(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &[&'static str] {
        match self {
            EndpointTable::Abstracts(t) => t.columns(),
            EndpointTable::Affiliations(t) => t.columns(),
            EndpointTable::CitationMetrics(t) => t.columns(),
            EndpointTable::EntityAnnotations(t) => t.columns(),
            EndpointTable::FullTextSections(t) => t.columns(),
        }
    }
}

/// Batched retrieval across PubMed, iCite, PubTator and PMC
///
/// Only invalid input fails a call. Network and parse failures cost the
/// affected batch its rows and are reported through `tracing`; a call where
/// every batch failed returns an empty table.
///
/// # Example
///
/// ```no_run
/// use pubmed_batch::{RetrieveOptions, Retriever};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let retriever = Retriever::new()?;
///     let table = retriever
///         .annotations(&["11250746"], &RetrieveOptions::new().with_worker_count(2))
///         .await?;
///
///     for row in table.iter() {
///         println!("{} {:?} {:?}", row.pmid, row.tiab, row.text);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Retriever {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl Retriever {
    /// Retriever with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::new())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Retriever over a caller-supplied transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn api_key(&self, options: &RetrieveOptions) -> Option<ApiKey> {
        options
            .api_key
            .clone()
            .or_else(|| self.config.api_key.clone())
    }

    /// Validate, partition, dispatch and assemble one call
    async fn retrieve<A, S>(
        &self,
        adapter: A,
        inputs: &[S],
        options: &RetrieveOptions,
        default_batch_size: usize,
        default_pacing: impl Fn(bool) -> Duration,
    ) -> Result<Table<A::Record>>
    where
        A: EndpointAdapter,
        S: AsRef<str> + Sync,
    {
        if inputs.is_empty() {
            return Err(RetrievalError::configuration(format!(
                "{}: identifier list is empty",
                adapter.name()
            )));
        }
        if let Some(position) = inputs.iter().position(|s| s.as_ref().trim().is_empty()) {
            return Err(RetrievalError::configuration(format!(
                "{}: blank identifier at position {position}",
                adapter.name()
            )));
        }
        if options.worker_count == 0 {
            return Err(RetrievalError::configuration(
                "worker_count must be at least 1",
            ));
        }

        let batch_size = options.batch_size.unwrap_or(default_batch_size);
        let batches = partition(inputs, batch_size)?;

        let api_key = self.api_key(options);
        let pacing = options
            .pacing_delay
            .unwrap_or_else(|| default_pacing(api_key.is_some()));
        let ctx = FetchContext::new(pacing)
            .with_api_key(api_key)
            .with_retry(self.config.retry_config.clone());

        info!(
            endpoint = adapter.name(),
            inputs = inputs.len(),
            batches = batches.len(),
            batch_size,
            workers = options.worker_count,
            pacing_ms = pacing.as_millis() as u64,
            "Starting retrieval"
        );

        let outcomes = dispatch(
            batches,
            Arc::new(adapter),
            Arc::new(ctx),
            options.worker_count,
        )
        .await;

        Ok(assemble(outcomes))
    }

    /// Abstract metadata, one row per article
    #[instrument(skip_all, fields(inputs = pmids.len()))]
    pub async fn abstracts<S: AsRef<str> + Sync>(
        &self,
        pmids: &[S],
        options: &RetrieveOptions,
    ) -> Result<Table<AbstractRecord>> {
        let endpoint = Endpoint::Abstracts;
        self.retrieve(
            AbstractsAdapter::new(Arc::clone(&self.transport), Arc::clone(&self.config)),
            pmids,
            options,
            endpoint.default_batch_size(),
            |key| endpoint.default_pacing(key),
        )
        .await
    }

    /// Author affiliations, one row per author
    #[instrument(skip_all, fields(inputs = pmids.len()))]
    pub async fn affiliations<S: AsRef<str> + Sync>(
        &self,
        pmids: &[S],
        options: &RetrieveOptions,
    ) -> Result<Table<AffiliationRecord>> {
        let endpoint = Endpoint::Affiliations;
        self.retrieve(
            AffiliationsAdapter::new(Arc::clone(&self.transport), Arc::clone(&self.config)),
            pmids,
            options,
            endpoint.default_batch_size(),
            |key| endpoint.default_pacing(key),
        )
        .await
    }

    /// iCite metrics and citation network, one row per article
    #[instrument(skip_all, fields(inputs = pmids.len()))]
    pub async fn citation_metrics<S: AsRef<str> + Sync>(
        &self,
        pmids: &[S],
        options: &RetrieveOptions,
    ) -> Result<Table<CitationRecord>> {
        let endpoint = Endpoint::CitationMetrics;
        self.retrieve(
            CitationMetricsAdapter::new(Arc::clone(&self.transport), Arc::clone(&self.config)),
            pmids,
            options,
            endpoint.default_batch_size(),
            |key| endpoint.default_pacing(key),
        )
        .await
    }

    /// PubTator annotations, rows per annotation and scope
    #[instrument(skip_all, fields(inputs = pmids.len()))]
    pub async fn annotations<S: AsRef<str> + Sync>(
        &self,
        pmids: &[S],
        options: &RetrieveOptions,
    ) -> Result<Table<AnnotationRecord>> {
        let endpoint = Endpoint::EntityAnnotations;
        self.retrieve(
            AnnotationsAdapter::new(Arc::clone(&self.transport), Arc::clone(&self.config)),
            pmids,
            options,
            endpoint.default_batch_size(),
            |key| endpoint.default_pacing(key),
        )
        .await
    }

    /// Full-text sections for package URLs from [`Retriever::pmid_to_ftp`]
    #[instrument(skip_all, fields(inputs = urls.len()))]
    pub async fn full_text<S: AsRef<str> + Sync>(
        &self,
        urls: &[S],
        options: &RetrieveOptions,
    ) -> Result<Table<FullTextSection>> {
        let endpoint = Endpoint::FullTextSections;
        self.retrieve(
            FullTextAdapter::new(Arc::clone(&self.transport)),
            urls,
            options,
            endpoint.default_batch_size(),
            |key| endpoint.default_pacing(key),
        )
        .await
    }

    /// Retrieve from an endpoint chosen at runtime
    pub async fn fetch<S: AsRef<str> + Sync>(
        &self,
        endpoint: Endpoint,
        inputs: &[S],
        options: &RetrieveOptions,
    ) -> Result<EndpointTable> {
        Ok(match endpoint {
            Endpoint::Abstracts => EndpointTable::Abstracts(self.abstracts(inputs, options).await?),
            Endpoint::Affiliations => {
                EndpointTable::Affiliations(self.affiliations(inputs, options).await?)
            }
            Endpoint::CitationMetrics => {
                EndpointTable::CitationMetrics(self.citation_metrics(inputs, options).await?)
            }
            Endpoint::EntityAnnotations => {
                EndpointTable::EntityAnnotations(self.annotations(inputs, options).await?)
            }
            Endpoint::FullTextSections => {
                EndpointTable::FullTextSections(self.full_text(inputs, options).await?)
            }
        })
    }

    /// [`Retriever::fetch`] with the endpoint given by name
    pub async fn fetch_by_name<S: AsRef<str> + Sync>(
        &self,
        endpoint: &str,
        inputs: &[S],
        options: &RetrieveOptions,
    ) -> Result<EndpointTable> {
        let endpoint: Endpoint = endpoint.parse()?;
        self.fetch(endpoint, inputs, options).await
    }

    /// PMCIDs and DOIs for PMIDs, ordered by PMID
    ///
    /// Every converted PMID is kept; `pmcid` is `None` for articles outside
    /// PMC and `url` is never set.
    #[instrument(skip_all, fields(inputs = pmids.len()))]
    pub async fn pmid_to_pmcid<S: AsRef<str> + Sync>(
        &self,
        pmids: &[S],
        options: &RetrieveOptions,
    ) -> Result<Table<IdMapping>> {
        let table = self
            .retrieve(
                IdConversionAdapter::new(Arc::clone(&self.transport), Arc::clone(&self.config)),
                pmids,
                options,
                CONVERSION_BATCH_SIZE,
                ncbi_pacing,
            )
            .await?;

        Ok(table.sort_by(by_pmid))
    }

    /// Open Access package URLs for PMIDs, ordered by PMID
    ///
    /// PMIDs without a PMCID or without an Open Access package are left out.
    /// `options.batch_size` applies to the conversion step; package lookups
    /// always go one PMCID per request.
    #[instrument(skip_all, fields(inputs = pmids.len()))]
    pub async fn pmid_to_ftp<S: AsRef<str> + Sync>(
        &self,
        pmids: &[S],
        options: &RetrieveOptions,
    ) -> Result<Table<IdMapping>> {
        let mut mappings = self.pmid_to_pmcid(pmids, options).await?;

        let pmcids: Vec<String> = mappings
            .iter()
            .filter_map(|m| m.pmcid.clone())
            .collect();
        if pmcids.is_empty() {
            debug!("No PMCIDs to resolve");
            return Ok(mappings.retain(|_| false));
        }

        let links = self
            .retrieve(
                PackageLinkAdapter::new(Arc::clone(&self.transport), Arc::clone(&self.config)),
                &pmcids,
                &RetrieveOptions {
                    batch_size: Some(1),
                    ..options.clone()
                },
                1,
                ncbi_pacing,
            )
            .await?;

        let urls: HashMap<String, String> = links
            .into_iter()
            .filter_map(|link| link.url.map(|url| (link.pmcid, url)))
            .collect();

        for mapping in mappings.rows_mut() {
            mapping.url = mapping
                .pmcid
                .as_ref()
                .and_then(|pmcid| urls.get(pmcid).cloned());
        }

        let resolved = mappings.retain(|m| m.url.is_some());
        info!(resolved = resolved.len(), requested = pmids.len(), "Resolved package URLs");
        Ok(resolved)
    }

    /// Resolve package URLs for PMIDs, then fetch their full-text sections
    ///
    /// Returns an empty table when no PMID has an Open Access package.
    pub async fn full_text_for_pmids<S: AsRef<str> + Sync>(
        &self,
        pmids: &[S],
        options: &RetrieveOptions,
    ) -> Result<Table<FullTextSection>> {
        let mappings = self
            .pmid_to_ftp(
                pmids,
                &RetrieveOptions {
                    batch_size: None,
                    ..options.clone()
                },
            )
            .await?;

        let urls: Vec<String> = mappings.into_iter().filter_map(|m| m.url).collect();
        if urls.is_empty() {
            return Ok(Table::empty(column_names(fulltext::COLUMNS)));
        }
        self.full_text(&urls, options).await
    }

    /// Deduplicated PMIDs matching `query`, optionally limited to a
    /// publication-year range
    ///
    /// Unlike batch retrieval, a failed search is returned as an error.
    pub async fn search(
        &self,
        query: &str,
        year_range: Option<(u16, u16)>,
        limit: usize,
    ) -> Result<Vec<String>> {
        let api_key = self.config.api_key.as_ref();
        search_ids(
            self.transport.as_ref(),
            &self.config,
            query,
            year_range,
            limit,
            api_key,
            ncbi_pacing(api_key.is_some()),
        )
        .await
    }
}

/// Order identifier mappings by PMID
pub(crate) fn by_pmid(a: &IdMapping, b: &IdMapping) -> Ordering {
    compare_ids(&a.pmid, &b.pmid)
}
