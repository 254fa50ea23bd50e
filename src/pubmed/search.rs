//! ESearch query to identifier list

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::{ApiKey, ClientConfig, append_params};
use crate::error::{Result, RetrievalError};
use crate::retry::with_retry;
use crate::transport::Transport;

/// ESearch cannot page past this many results
pub const MAX_RETRIEVABLE: usize = 9999;

#[derive(Debug, Deserialize)]
struct ESearchResult {
    esearchresult: ESearchData,
}

#[derive(Debug, Deserialize)]
struct ESearchData {
    #[serde(default, rename = "ERROR")]
    error: Option<String>,
    #[serde(default)]
    count: Option<String>,
    #[serde(default)]
    idlist: Vec<String>,
}

/// Search term with an optional `[dp]` publication-date range
pub(crate) fn build_term(query: &str, year_range: Option<(u16, u16)>) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(RetrievalError::configuration("search query must not be empty"));
    }

    match year_range {
        None => Ok(query.to_string()),
        Some((start, end)) if start > end => Err(RetrievalError::configuration(format!(
            "year range start {start} is after end {end}"
        ))),
        Some((start, end)) => Ok(format!("({query}) AND ({start}:{end}[dp])")),
    }
}

/// Keep the first occurrence of each identifier
pub(crate) fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[instrument(skip(transport, config, api_key))]
pub(crate) async fn search_ids(
    transport: &dyn Transport,
    config: &ClientConfig,
    query: &str,
    year_range: Option<(u16, u16)>,
    limit: usize,
    api_key: Option<&ApiKey>,
    pacing: Duration,
) -> Result<Vec<String>> {
    if limit == 0 || limit > MAX_RETRIEVABLE {
        return Err(RetrievalError::configuration(format!(
            "search limit must be between 1 and {MAX_RETRIEVABLE}, got {limit}"
        )));
    }
    let term = build_term(query, year_range)?;

    let mut url = format!(
        "{}/esearch.fcgi?db=pubmed&term={}&retmax={}&retstart=0&retmode=json",
        config.urls.eutils.trim_end_matches('/'),
        urlencoding::encode(&term),
        limit
    );
    append_params(&mut url, &config.build_api_params(api_key));

    debug!("Making ESearch API request");
    let result: ESearchResult = with_retry(
        || async {
            let body = transport.get(&url).await?;
            Ok(serde_json::from_slice::<ESearchResult>(&body)?)
        },
        &config.retry_config,
        config.retry_config.effective_delay(pacing),
        "PubMed esearch",
    )
    .await?;

    if let Some(error_msg) = result.esearchresult.error {
        return Err(RetrievalError::ApiError {
            status: 200,
            message: format!("NCBI ESearch API error: {error_msg}"),
        });
    }

    let total: usize = result
        .esearchresult
        .count
        .as_deref()
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);
    if total > limit {
        warn!(total, limit, "Search matched more articles than requested");
    }

    Ok(dedup_preserving_order(result.esearchresult.idlist))
}
