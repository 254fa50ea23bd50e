//! # PubMed Batch
//!
//! Batched retrieval of article data from PubMed, iCite, PubTator and PubMed
//! Central, normalized into one table per call.
//!
//! A call partitions the input identifiers into endpoint-sized batches, runs
//! the endpoint's adapter over every batch (in order, or on a worker pool),
//! and concatenates the batches that succeeded. Failed batches are logged and
//! contribute no rows; only invalid input is returned as an error.
//!
//! ## Endpoints
//!
//! | Endpoint | Source | Batch | Rows |
//! |---|---|---|---|
//! | `pubmed_abstracts` | E-utilities efetch | 199 | one per article |
//! | `pubmed_affiliations` | E-utilities efetch | 199 | one per author |
//! | `icites` | iCite CSV | 199 | one per article |
//! | `pubtations` | PubTator3 BioC JSON | 99 | one per annotation and scope |
//! | `pmc_fulltext` | PMC OA packages | 5 | one per body section |
//!
//! ## Quick Start
//!
//! ```no_run
//! use pubmed_batch::{ClientConfig, RetrieveOptions, Retriever};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let retriever = Retriever::with_config(ClientConfig::from_env())?;
//!
//!     let pmids = retriever.search("crispr screen", Some((2018, 2020)), 50).await?;
//!     let metrics = retriever
//!         .citation_metrics(&pmids, &RetrieveOptions::new().with_worker_count(4))
//!         .await?;
//!     println!("{} of {} articles have metrics", metrics.len(), pmids.len());
//!
//!     let urls = retriever.pmid_to_ftp(&pmids, &RetrieveOptions::new()).await?;
//!     for mapping in urls.iter() {
//!         println!("{} -> {:?}", mapping.pmid, mapping.url);
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod batch;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod icite;
pub mod pmc;
pub mod pubmed;
pub mod pubtator;
pub mod retriever;
pub mod retry;
pub mod table;
pub mod text;
pub mod transport;
pub(crate) mod xml;

// Re-export main types for convenience
pub use adapter::{EndpointAdapter, FetchContext};
pub use batch::{Batch, partition};
pub use config::{ApiKey, ClientConfig, ServiceUrls};
pub use dispatch::dispatch;
pub use endpoint::{
    ColumnInfo, Description, Endpoint, EndpointInfo, ParameterInfo, describe,
};
pub use error::{Result, RetrievalError};
pub use icite::{CitationEdge, CitationMetricsAdapter, CitationRecord};
pub use pmc::{
    FullTextAdapter, FullTextSection, IdConversionAdapter, IdMapping, PackageLink,
    PackageLinkAdapter,
};
pub use pubmed::{
    AbstractRecord, AbstractsAdapter, AffiliationRecord, AffiliationsAdapter, AnnotationTerm,
    AnnotationType,
};
pub use pubtator::{AnnotationRecord, AnnotationsAdapter, Scope};
pub use retriever::{EndpointTable, RetrieveOptions, Retriever};
pub use retry::{RetryConfig, RetryableError};
pub use table::{BatchOutcome, Table, assemble};
pub use transport::{HttpTransport, Transport};
