//! PubMed E-utilities adapters

pub mod abstracts;
pub mod affiliations;
pub(crate) mod records;
pub(crate) mod search;

pub use abstracts::{AbstractRecord, AbstractsAdapter, AnnotationTerm, AnnotationType};
pub use affiliations::{AffiliationRecord, AffiliationsAdapter};
pub use search::MAX_RETRIEVABLE;
