//! Entity-annotation adapter backed by the PubTator3 BioC-JSON export
//!
//! The export has been served both as a stream of bare document objects and
//! wrapped in a `{"PubTator3": [...]}` object, so documents are collected from
//! whatever JSON values the body contains.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::adapter::{EndpointAdapter, FetchContext};
use crate::batch::Batch;
use crate::config::ClientConfig;
use crate::endpoint::{ColumnInfo, column_names};
use crate::error::{Result, RetrievalError};
use crate::table::Table;
use crate::text::parse_location;
use crate::transport::Transport;

pub const DEFAULT_BATCH_SIZE: usize = 99;

const WRAPPER_KEY: &str = "PubTator3";

pub(crate) const COLUMNS: &[ColumnInfo] = &[
    ColumnInfo::new("pmid", "str", "PubMed identifier"),
    ColumnInfo::new("tiab", "enum{title,abstract}", "Passage the annotation was found in"),
    ColumnInfo::new("id", "str?", "Annotation identifier within the document"),
    ColumnInfo::new("text", "str?", "Annotated text span"),
    ColumnInfo::new("identifier", "str?", "Normalized concept identifier, e.g. MESH:D003920"),
    ColumnInfo::new("type", "str?", "Entity type, e.g. Gene, Disease, Chemical"),
    ColumnInfo::new("start", "int?", "Start offset of the span"),
    ColumnInfo::new("end", "int?", "End offset of the span (start + length)"),
];

/// Passage scope of an annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Title,
    Abstract,
}

impl Scope {
    fn passage_type(self) -> &'static str {
        match self {
            Scope::Title => "title",
            Scope::Abstract => "abstract",
        }
    }

    /// Position of the passage when no passage declares its type
    fn fallback_index(self) -> usize {
        match self {
            Scope::Title => 0,
            Scope::Abstract => 1,
        }
    }
}

/// One annotation, or the all-null placeholder for a scope without any
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationRecord {
    pub pmid: String,
    pub tiab: Scope,
    pub id: Option<String>,
    pub text: Option<String>,
    pub identifier: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl AnnotationRecord {
    /// Row that keeps a scope visible when it produced no annotations
    pub fn placeholder(pmid: &str, tiab: Scope) -> Self {
        Self {
            pmid: pmid.to_string(),
            tiab,
            id: None,
            text: None,
            identifier: None,
            kind: None,
            start: None,
            end: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.id.is_none()
            && self.text.is_none()
            && self.identifier.is_none()
            && self.kind.is_none()
            && self.start.is_none()
            && self.end.is_none()
    }
}

/// String form of a scalar JSON value
fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Location as an `"offset,length"` string, whichever shape it arrived in
fn location_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => Some(format!(
            "{},{}",
            scalar(map.get("offset"))?,
            scalar(map.get("length"))?
        )),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| scalar(Some(v)))
                .collect::<Vec<_>>()
                .join(","),
        ),
        _ => None,
    }
}

/// Collect document objects from any nesting of arrays and wrapper objects
fn collect_documents(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_documents(item, out);
            }
        }
        Value::Object(mut map) => {
            if let Some(inner) = map.remove(WRAPPER_KEY) {
                collect_documents(inner, out);
            } else if map.contains_key("passages") || map.contains_key("id") {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

fn document_pmid(doc: &Value) -> Option<String> {
    scalar(doc.get("pmid"))
        .or_else(|| scalar(doc.get("id")))
        .or_else(|| {
            scalar(doc.get("_id")).map(|id| id.split('|').next().unwrap_or_default().to_string())
        })
        .filter(|id| !id.is_empty())
}

fn find_passage(passages: &[Value], scope: Scope) -> Option<&Value> {
    passages
        .iter()
        .find(|p| {
            p.get("infons")
                .and_then(|i| i.get("type"))
                .and_then(Value::as_str)
                .is_some_and(|t| t.eq_ignore_ascii_case(scope.passage_type()))
        })
        .or_else(|| {
            let typed = passages
                .iter()
                .any(|p| p.get("infons").and_then(|i| i.get("type")).is_some());
            if typed {
                None
            } else {
                passages.get(scope.fallback_index())
            }
        })
}

fn annotation_row(pmid: &str, scope: Scope, annotation: &Value) -> AnnotationRecord {
    let infons = annotation.get("infons");
    let location = annotation
        .get("locations")
        .and_then(Value::as_array)
        .and_then(|locs| locs.first())
        .and_then(location_string)
        .and_then(|raw| parse_location(&raw));

    AnnotationRecord {
        pmid: pmid.to_string(),
        tiab: scope,
        id: scalar(annotation.get("id")),
        text: scalar(annotation.get("text")),
        identifier: scalar(infons.and_then(|i| i.get("identifier"))),
        kind: scalar(infons.and_then(|i| i.get("type"))),
        start: location.map(|(start, _)| start),
        end: location.map(|(_, end)| end),
    }
}

/// Title-scope rows then abstract-scope rows for one document
pub(crate) fn document_rows(doc: &Value) -> Vec<AnnotationRecord> {
    let Some(pmid) = document_pmid(doc) else {
        debug!("Skipping PubTator document without identifier");
        return Vec::new();
    };
    let passages = doc
        .get("passages")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut rows = Vec::new();
    for scope in [Scope::Title, Scope::Abstract] {
        let annotations = find_passage(passages, scope)
            .and_then(|p| p.get("annotations"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        if annotations.is_empty() {
            rows.push(AnnotationRecord::placeholder(&pmid, scope));
        } else {
            rows.extend(annotations.iter().map(|a| annotation_row(&pmid, scope, a)));
        }
    }
    rows
}

/// Parse a BioC-JSON export body
pub(crate) fn parse_annotations(body: &[u8]) -> Result<Vec<AnnotationRecord>> {
    let mut documents = Vec::new();
    for value in serde_json::Deserializer::from_slice(body).into_iter::<Value>() {
        collect_documents(value?, &mut documents);
    }

    if documents.is_empty() && !body.iter().all(u8::is_ascii_whitespace) {
        return Err(RetrievalError::MalformedResponse(
            "PubTator response held no documents".to_string(),
        ));
    }

    debug!(documents = documents.len(), "Parsed PubTator export");
    Ok(documents.iter().flat_map(document_rows).collect())
}

/// Fetches entity annotations from PubTator3
pub struct AnnotationsAdapter {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl AnnotationsAdapter {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }

    fn url(&self, batch: &Batch) -> String {
        format!(
            "{}/publications/export/biocjson?pmids={}",
            self.config.urls.pubtator.trim_end_matches('/'),
            batch.join(",")
        )
    }
}

#[async_trait]
impl EndpointAdapter for AnnotationsAdapter {
    type Record = AnnotationRecord;

    fn name(&self) -> &'static str {
        "pubtations"
    }

    #[instrument(skip_all, fields(batch = batch.index(), size = batch.len()))]
    async fn fetch_table(
        &self,
        batch: &Batch,
        _ctx: &FetchContext,
    ) -> Result<Table<AnnotationRecord>> {
        let body = self.transport.get(&self.url(batch)).await?;
        let rows = parse_annotations(&body)?;
        Ok(Table::new(column_names(COLUMNS), rows))
    }
}
