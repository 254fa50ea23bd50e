//! Endpoint selector and self-description
//!
//! Column tables and default constants live next to each adapter; everything
//! here reads them, so a description always matches what the adapter does.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Result, RetrievalError};
use crate::{icite, pmc, pubmed, pubtator};

/// NCBI allows 3 requests per second without a key
pub const NCBI_PACING: Duration = Duration::from_millis(340);
/// and 10 with one
pub const NCBI_PACING_WITH_KEY: Duration = Duration::from_millis(100);
/// Pacing for iCite, PubTator and PMC package downloads
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// Pacing for E-utilities and the PMC utility services
pub fn ncbi_pacing(has_api_key: bool) -> Duration {
    if has_api_key {
        NCBI_PACING_WITH_KEY
    } else {
        NCBI_PACING
    }
}

/// Name, type and meaning of one output column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub description: &'static str,
}

impl ColumnInfo {
    pub const fn new(name: &'static str, kind: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
        }
    }
}

pub(crate) fn column_names(columns: &[ColumnInfo]) -> Vec<&'static str> {
    columns.iter().map(|c| c.name).collect()
}

/// One caller-tunable parameter of a retrieval call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterInfo {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub default: String,
    pub description: &'static str,
}

/// Structured description of one endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointInfo {
    pub name: &'static str,
    pub source: &'static str,
    pub input: &'static str,
    pub columns: Vec<ColumnInfo>,
    pub parameters: Vec<ParameterInfo>,
    pub rate_limit: &'static str,
    pub notes: &'static str,
}

impl EndpointInfo {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of [`describe`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Description {
    Endpoints(Vec<&'static str>),
    Endpoint(Box<EndpointInfo>),
}

impl Description {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The five retrieval endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Abstracts,
    Affiliations,
    CitationMetrics,
    EntityAnnotations,
    FullTextSections,
}

impl Endpoint {
    pub fn all() -> &'static [Endpoint] {
        &[
            Endpoint::Abstracts,
            Endpoint::Affiliations,
            Endpoint::CitationMetrics,
            Endpoint::EntityAnnotations,
            Endpoint::FullTextSections,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Abstracts => "pubmed_abstracts",
            Endpoint::Affiliations => "pubmed_affiliations",
            Endpoint::CitationMetrics => "icites",
            Endpoint::EntityAnnotations => "pubtations",
            Endpoint::FullTextSections => "pmc_fulltext",
        }
    }

    pub fn default_batch_size(&self) -> usize {
        match self {
            Endpoint::Abstracts => pubmed::abstracts::DEFAULT_BATCH_SIZE,
            Endpoint::Affiliations => pubmed::affiliations::DEFAULT_BATCH_SIZE,
            Endpoint::CitationMetrics => icite::DEFAULT_BATCH_SIZE,
            Endpoint::EntityAnnotations => pubtator::DEFAULT_BATCH_SIZE,
            Endpoint::FullTextSections => pmc::fulltext::DEFAULT_BATCH_SIZE,
        }
    }

    pub fn default_pacing(&self, has_api_key: bool) -> Duration {
        match self {
            Endpoint::Abstracts | Endpoint::Affiliations => ncbi_pacing(has_api_key),
            Endpoint::CitationMetrics
            | Endpoint::EntityAnnotations
            | Endpoint::FullTextSections => DEFAULT_PACING,
        }
    }

    fn columns(&self) -> &'static [ColumnInfo] {
        match self {
            Endpoint::Abstracts => pubmed::abstracts::COLUMNS,
            Endpoint::Affiliations => pubmed::affiliations::COLUMNS,
            Endpoint::CitationMetrics => icite::COLUMNS,
            Endpoint::EntityAnnotations => pubtator::COLUMNS,
            Endpoint::FullTextSections => pmc::fulltext::COLUMNS,
        }
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        let mut parameters = vec![
            ParameterInfo {
                name: "batch_size",
                kind: "int",
                default: self.default_batch_size().to_string(),
                description: "Items per upstream request",
            },
            ParameterInfo {
                name: "pacing_delay",
                kind: "seconds",
                default: format!("{:.2}", self.default_pacing(false).as_secs_f64()),
                description: "Sleep after every upstream call",
            },
            ParameterInfo {
                name: "worker_count",
                kind: "int",
                default: "1".to_string(),
                description: "Batches fetched concurrently",
            },
        ];
        if matches!(self, Endpoint::Abstracts | Endpoint::Affiliations) {
            parameters.push(ParameterInfo {
                name: "api_key",
                kind: "str?",
                default: "NCBI_API_KEY".to_string(),
                description: "NCBI API key; lowers the default pacing delay to 0.10 s",
            });
        }
        parameters
    }

    pub fn info(&self) -> EndpointInfo {
        let (source, input, rate_limit, notes) = match self {
            Endpoint::Abstracts => (
                "NCBI E-utilities efetch (PubMed XML)",
                "PMID",
                "3 requests/s without an API key, 10 requests/s with one",
                "One row per article. Year falls back to the leading year of MedlineDate. \
                 Abstract parts are joined with a space and broken before inline section titles. \
                 MeSH descriptors, chemicals and keywords are nested per article.",
            ),
            Endpoint::Affiliations => (
                "NCBI E-utilities efetch (PubMed XML)",
                "PMID",
                "3 requests/s without an API key, 10 requests/s with one",
                "One row per author. Articles without authors contribute no rows. \
                 Multiple affiliations of one author are joined with \"; \".",
            ),
            Endpoint::CitationMetrics => (
                "NIH iCite (CSV)",
                "PMID",
                "No published limit; paced at 2 requests/s",
                "Metric columns missing from the response are omitted. citation_net \
                 holds reference and cited-by edges for the article.",
            ),
            Endpoint::EntityAnnotations => (
                "PubTator3 BioC JSON export",
                "PMID",
                "3 requests/s; paced at 2 requests/s",
                "Rows per annotation and scope. A scope without annotations yields one \
                 placeholder row. end is start plus length.",
            ),
            Endpoint::FullTextSections => (
                "PMC Open Access packages (tar.gz holding JATS XML)",
                "package URL (see pmid_to_ftp)",
                "One package per request; paced at 2 requests/s",
                "One row per top-level body section. Text is reflowed at \
                 lowercase-uppercase boundaries, a best-effort cosmetic transform.",
            ),
        };

        EndpointInfo {
            name: self.as_str(),
            source,
            input,
            columns: self.columns().to_vec(),
            parameters: self.parameters(),
            rate_limit,
            notes,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pubmed_abstracts" | "abstracts" => Ok(Endpoint::Abstracts),
            "pubmed_affiliations" | "affiliations" => Ok(Endpoint::Affiliations),
            "icites" | "citations" => Ok(Endpoint::CitationMetrics),
            "pubtations" | "annotations" => Ok(Endpoint::EntityAnnotations),
            "pmc_fulltext" | "fulltext" => Ok(Endpoint::FullTextSections),
            other => Err(RetrievalError::configuration(format!(
                "unknown endpoint '{other}'; expected one of {}",
                Endpoint::all()
                    .iter()
                    .map(Endpoint::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

/// List endpoint names, or describe one endpoint
pub fn describe(name: Option<&str>) -> Result<Description> {
    match name {
        None => Ok(Description::Endpoints(
            Endpoint::all().iter().map(Endpoint::as_str).collect(),
        )),
        Some(name) => Ok(Description::Endpoint(Box::new(
            name.parse::<Endpoint>()?.info(),
        ))),
    }
}
