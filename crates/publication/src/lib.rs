//! Publication domain for OpenRepo
//!
//! The article aggregate and everything that hangs off it: typed
//! descriptive metadata with its Dublin Core mirror, the PREMIS
//! provenance log, embargo rules, the external-feed model and
//! reconciler, search-index document construction, and the RIS and RDF
//! exports.

pub mod article;
pub mod dc;
pub mod embargo;
pub mod indexer;
pub mod language;
pub mod mods;
pub mod premis;
pub mod rdf;
pub mod reconcile;
pub mod ris;
pub mod symp;

pub use article::Article;
pub use dc::DublinCore;
pub use embargo::{AccessDecision, EmbargoDuration};
pub use indexer::Indexer;
pub use mods::PublicationMods;
pub use premis::{EventKind, ProvenanceLog};
pub use reconcile::{DuplicateAction, Reconciler};
pub use symp::SympAtom;
