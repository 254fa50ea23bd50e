//! PubMed Central: identifier resolution and full-text sections

pub mod fulltext;
pub mod idconv;
pub(crate) mod sections;
pub(crate) mod tar;

pub use fulltext::{FullTextAdapter, FullTextSection};
pub use idconv::{IdConversionAdapter, IdMapping, PackageLink, PackageLinkAdapter};
