//! Ingest pipelines
//!
//! Two ways articles enter the repository:
//! - author self-deposit of a PDF through the web form ([`upload`])
//! - staff ingest of reviewed PubMed Central harvest records ([`harvest`])
//!
//! Both produce an unpublished article attached to the site collection,
//! with a provenance event recording how it arrived.

pub mod harvest;
pub mod upload;

pub use harvest::HarvestProcessor;
pub use upload::{LegalStatement, UploadProcessor, UploadRequest};
