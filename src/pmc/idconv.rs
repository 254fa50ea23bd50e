//! PMID to PMCID conversion and Open Access package resolution
//!
//! Both steps run as ordinary adapters through the dispatcher: conversion is
//! batched, the OA lookup takes one PMCID per request.

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::adapter::{EndpointAdapter, FetchContext};
use crate::batch::Batch;
use crate::config::{ClientConfig, append_params};
use crate::error::{Result, RetrievalError};
use crate::retry::with_retry;
use crate::table::Table;
use crate::text::non_empty;
use crate::transport::Transport;

/// The converter accepts up to 200 identifiers per request
pub const CONVERSION_BATCH_SIZE: usize = 199;

const MAPPING_COLUMNS: &[&str] = &["pmid", "pmcid", "doi", "url"];
const LINK_COLUMNS: &[&str] = &["pmcid", "url"];

#[derive(Debug, Deserialize)]
struct IdConvResponse {
    #[serde(rename = "record", default)]
    records: Vec<IdConvRecord>,
}

#[derive(Debug, Deserialize)]
struct IdConvRecord {
    #[serde(rename = "@requested-id")]
    requested_id: Option<String>,
    #[serde(rename = "@pmid")]
    pmid: Option<String>,
    #[serde(rename = "@pmcid")]
    pmcid: Option<String>,
    #[serde(rename = "@doi")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OaResponse {
    error: Option<OaError>,
    records: Option<OaRecords>,
}

#[derive(Debug, Deserialize)]
struct OaError {
    #[serde(rename = "@code")]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OaRecords {
    #[serde(rename = "record", default)]
    record: Vec<OaRecord>,
}

#[derive(Debug, Deserialize)]
struct OaRecord {
    #[serde(rename = "link", default)]
    links: Vec<OaLink>,
}

#[derive(Debug, Deserialize)]
struct OaLink {
    #[serde(rename = "@format")]
    format: Option<String>,
    #[serde(rename = "@href")]
    href: Option<String>,
}

/// Identifier mapping for one article
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdMapping {
    pub pmid: String,
    pub pmcid: Option<String>,
    pub doi: Option<String>,
    /// Open Access package URL, set only by full resolution
    pub url: Option<String>,
}

/// Package URL for one PMCID
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageLink {
    pub pmcid: String,
    pub url: Option<String>,
}

/// `ftp://` links are served over `https://` as well
pub(crate) fn secure_url(href: &str) -> String {
    match href.strip_prefix("ftp://") {
        Some(rest) => format!("https://{rest}"),
        None => href.to_string(),
    }
}

pub(crate) fn parse_conversion(xml: &str) -> Result<Vec<IdMapping>> {
    if !xml.contains("<pmcids") {
        return Err(RetrievalError::MalformedResponse(
            "ID converter response has no <pmcids> root".to_string(),
        ));
    }
    let response: IdConvResponse = from_str(xml)?;

    Ok(response
        .records
        .into_iter()
        .filter_map(|record| {
            let pmid = non_empty(record.pmid.as_deref())
                .or_else(|| non_empty(record.requested_id.as_deref()))?;
            Some(IdMapping {
                pmid,
                pmcid: non_empty(record.pmcid.as_deref()),
                doi: non_empty(record.doi.as_deref()),
                url: None,
            })
        })
        .collect())
}

/// Package URL from an OA service response; `None` when the article is not
/// in the Open Access subset
pub(crate) fn parse_package_url(xml: &str) -> Result<Option<String>> {
    if !xml.contains("<OA") {
        return Err(RetrievalError::MalformedResponse(
            "OA service response has no <OA> root".to_string(),
        ));
    }
    let response: OaResponse = from_str(xml)?;

    if let Some(error) = response.error {
        debug!(code = ?error.code, "OA service reported no package");
        return Ok(None);
    }

    let links: Vec<OaLink> = response
        .records
        .into_iter()
        .flat_map(|r| r.record)
        .flat_map(|r| r.links)
        .filter(|l| l.href.is_some())
        .collect();

    let chosen = links
        .iter()
        .find(|l| l.format.as_deref() == Some("tgz"))
        .or_else(|| links.first());

    Ok(chosen
        .and_then(|l| l.href.as_deref())
        .map(secure_url))
}

/// Converts PMIDs to PMCIDs and DOIs
pub struct IdConversionAdapter {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl IdConversionAdapter {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }

    fn url(&self, batch: &Batch, ctx: &FetchContext) -> String {
        let mut url = format!(
            "{}?ids={}&idtype=pmid&format=xml",
            self.config.urls.idconv,
            batch.join(",")
        );
        append_params(&mut url, &self.config.build_api_params(ctx.api_key.as_ref()));
        url
    }
}

#[async_trait]
impl EndpointAdapter for IdConversionAdapter {
    type Record = IdMapping;

    fn name(&self) -> &'static str {
        "pmc_idconv"
    }

    #[instrument(skip_all, fields(batch = batch.index(), size = batch.len()))]
    async fn fetch_table(&self, batch: &Batch, ctx: &FetchContext) -> Result<Table<IdMapping>> {
        let url = self.url(batch, ctx);
        let rows = with_retry(
            || async {
                let body = self.transport.get(&url).await?;
                parse_conversion(&String::from_utf8_lossy(&body))
            },
            &ctx.retry,
            ctx.retry_delay(),
            "PMC ID conversion",
        )
        .await?;

        Ok(Table::new(MAPPING_COLUMNS.to_vec(), rows))
    }
}

/// Resolves a PMCID to its Open Access package URL
pub struct PackageLinkAdapter {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl PackageLinkAdapter {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }

    fn url(&self, pmcid: &str, ctx: &FetchContext) -> String {
        let mut url = format!("{}?id={}", self.config.urls.oa, urlencoding::encode(pmcid));
        append_params(&mut url, &self.config.build_api_params(ctx.api_key.as_ref()));
        url
    }
}

#[async_trait]
impl EndpointAdapter for PackageLinkAdapter {
    type Record = PackageLink;

    fn name(&self) -> &'static str {
        "pmc_oa"
    }

    #[instrument(skip_all, fields(batch = batch.index()))]
    async fn fetch_table(&self, batch: &Batch, ctx: &FetchContext) -> Result<Table<PackageLink>> {
        let mut rows = Vec::with_capacity(batch.len());

        for (i, pmcid) in batch.items().iter().enumerate() {
            if i > 0 {
                ctx.pace().await;
            }
            let url = self.url(pmcid, ctx);
            let package = with_retry(
                || async {
                    let body = self.transport.get(&url).await?;
                    parse_package_url(&String::from_utf8_lossy(&body))
                },
                &ctx.retry,
                ctx.retry_delay(),
                "PMC OA lookup",
            )
            .await?;

            rows.push(PackageLink {
                pmcid: pmcid.clone(),
                url: package,
            });
        }

        Ok(Table::new(LINK_COLUMNS.to_vec(), rows))
    }
}
