//! Citation-metrics adapter backed by the NIH iCite API
//!
//! iCite answers a comma-joined `pmids` query with one CSV row per article.
//! The reference and cited-by identifier lists have been published under two
//! header spellings; [`CitationFieldNaming`] maps either onto canonical names
//! once, when the header row is read.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::adapter::{EndpointAdapter, FetchContext};
use crate::batch::Batch;
use crate::config::ClientConfig;
use crate::endpoint::ColumnInfo;
use crate::error::{Result, RetrievalError};
use crate::table::Table;
use crate::text::split_tokens;
use crate::transport::Transport;

pub const DEFAULT_BATCH_SIZE: usize = 199;

pub(crate) const COLUMNS: &[ColumnInfo] = &[
    ColumnInfo::new("pmid", "str", "PubMed identifier"),
    ColumnInfo::new("citation_count", "int?", "Number of citing articles"),
    ColumnInfo::new("relative_citation_ratio", "float?", "Field-normalized citation rate"),
    ColumnInfo::new("nih_percentile", "float?", "RCR percentile among NIH-funded papers"),
    ColumnInfo::new("field_citation_rate", "float?", "Citation rate of the co-citation network"),
    ColumnInfo::new("is_research_article", "bool?", "Primary research article flag"),
    ColumnInfo::new("is_clinical", "bool?", "Clinical article flag"),
    ColumnInfo::new("provisional", "bool?", "RCR is provisional (article under two years old)"),
    ColumnInfo::new("citation_net", "nested", "Reference and citing edges (from, to) touching the article"),
    ColumnInfo::new("ref_count", "int", "Number of identifiers in the reference list"),
];

/// Metric columns kept from the upstream CSV, in output order
const METRIC_COLUMNS: &[&str] = &[
    "pmid",
    "citation_count",
    "relative_citation_ratio",
    "nih_percentile",
    "field_citation_rate",
    "is_research_article",
    "is_clinical",
    "provisional",
];

const REFERENCES: &str = "references";
const CITED_BY: &str = "cited_by";

/// Header spelling used for the identifier-list fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationFieldNaming {
    /// `references` / `cited_by`
    SnakeCase,
    /// `citedPmids` / `citedByPmids`
    CamelCase,
}

impl CitationFieldNaming {
    /// Pick the convention from a header row
    pub fn detect<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let camel = headers
            .into_iter()
            .any(|h| matches!(h.trim(), "citedPmids" | "citedByPmids"));
        if camel {
            CitationFieldNaming::CamelCase
        } else {
            CitationFieldNaming::SnakeCase
        }
    }

    /// Upstream header to canonical name, for the fields this convention renames
    fn renames(self) -> &'static [(&'static str, &'static str)] {
        match self {
            CitationFieldNaming::SnakeCase => &[],
            CitationFieldNaming::CamelCase => {
                &[("citedPmids", REFERENCES), ("citedByPmids", CITED_BY)]
            }
        }
    }

    /// Canonical name for an upstream header
    pub fn canonical(self, header: &str) -> String {
        let header = header.trim();
        self.renames()
            .iter()
            .find(|(from, _)| *from == header)
            .map(|(_, to)| (*to).to_string())
            .unwrap_or_else(|| header.to_string())
    }
}

/// A directed citation edge: `from` cites `to`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CitationEdge {
    pub from: String,
    pub to: String,
}

/// One article's citation metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CitationRecord {
    pub pmid: String,
    pub citation_count: Option<i64>,
    pub relative_citation_ratio: Option<f64>,
    pub nih_percentile: Option<f64>,
    pub field_citation_rate: Option<f64>,
    pub is_research_article: Option<bool>,
    pub is_clinical: Option<bool>,
    pub provisional: Option<bool>,
    pub citation_net: Vec<CitationEdge>,
    pub ref_count: usize,
}

/// One upstream row after header normalization
struct RawRow {
    record: CitationRecord,
    /// `None` when the field is absent or blank, as opposed to an empty list
    references: Option<Vec<String>>,
    cited_by: Option<Vec<String>>,
}

fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    value
        .parse::<i64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|f| f as i64))
}

fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_id_list(value: Option<&str>) -> Option<Vec<String>> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(split_tokens)
}

/// Parse an iCite CSV body into records and the metric columns it carried
pub(crate) fn parse_metrics(body: &[u8]) -> Result<Table<CitationRecord>> {
    let mut reader = csv::Reader::from_reader(body);

    let raw_headers = reader.headers()?.clone();
    let naming = CitationFieldNaming::detect(raw_headers.iter());
    let headers: Vec<String> = raw_headers.iter().map(|h| naming.canonical(h)).collect();
    debug!(?naming, columns = headers.len(), "Read iCite header");

    let index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();

    if !index.contains_key("pmid") {
        return Err(RetrievalError::MalformedResponse(
            "iCite response has no pmid column".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let field = |name: &str| index.get(name).and_then(|&i| record.get(i));

        let Some(pmid) = field("pmid").map(str::trim).filter(|p| !p.is_empty()) else {
            continue;
        };

        let references = parse_id_list(field(REFERENCES));
        let cited_by = parse_id_list(field(CITED_BY));

        rows.push(RawRow {
            record: CitationRecord {
                pmid: pmid.to_string(),
                citation_count: field("citation_count").and_then(parse_int),
                relative_citation_ratio: field("relative_citation_ratio").and_then(parse_float),
                nih_percentile: field("nih_percentile").and_then(parse_float),
                field_citation_rate: field("field_citation_rate").and_then(parse_float),
                is_research_article: field("is_research_article").and_then(parse_bool),
                is_clinical: field("is_clinical").and_then(parse_bool),
                provisional: field("provisional").and_then(parse_bool),
                citation_net: Vec::new(),
                ref_count: references.as_ref().map_or(0, Vec::len),
            },
            references,
            cited_by,
        });
    }

    let mut columns: Vec<&'static str> = METRIC_COLUMNS
        .iter()
        .copied()
        .filter(|c| index.contains_key(c))
        .collect();
    columns.extend(["citation_net", "ref_count"]);

    Ok(Table::new(columns, attach_citation_net(rows)))
}

/// Build `(doc, from, to)` edges from both list directions and attach them to
/// their document
///
/// Article A listing reference B gives `(A, A, B)`; A listing citer C gives
/// `(A, C, A)`.
fn attach_citation_net(rows: Vec<RawRow>) -> Vec<CitationRecord> {
    let mut edges: BTreeMap<String, Vec<CitationEdge>> = BTreeMap::new();

    for row in &rows {
        let doc = &row.record.pmid;
        let outgoing = row.references.iter().flatten().map(|to| CitationEdge {
            from: doc.clone(),
            to: to.clone(),
        });
        let incoming = row.cited_by.iter().flatten().map(|from| CitationEdge {
            from: from.clone(),
            to: doc.clone(),
        });
        edges
            .entry(doc.clone())
            .or_default()
            .extend(outgoing.chain(incoming));
    }

    rows.into_iter()
        .map(|row| {
            let mut record = row.record;
            record.citation_net = edges.remove(&record.pmid).unwrap_or_default();
            record
        })
        .collect()
}

/// Fetches citation metrics from iCite
pub struct CitationMetricsAdapter {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl CitationMetricsAdapter {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }

    fn url(&self, batch: &Batch) -> String {
        format!(
            "{}/api/pubs?pmids={}&format=csv",
            self.config.urls.icite.trim_end_matches('/'),
            batch.join(",")
        )
    }
}

#[async_trait]
impl EndpointAdapter for CitationMetricsAdapter {
    type Record = CitationRecord;

    fn name(&self) -> &'static str {
        "icites"
    }

    #[instrument(skip_all, fields(batch = batch.index(), size = batch.len()))]
    async fn fetch_table(
        &self,
        batch: &Batch,
        _ctx: &FetchContext,
    ) -> Result<Table<CitationRecord>> {
        let body = self.transport.get(&self.url(batch)).await?;
        parse_metrics(&body)
    }
}
