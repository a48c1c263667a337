//! OpenRepo Common Library
//!
//! Shared code for all OpenRepo services including:
//! - Object store client (authoritative article storage)
//! - Search index client
//! - Identifier minter (ARK / pid)
//! - Statistics and harvest-record database layer
//! - PDF inspection and text extraction
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod errors;
pub mod fedora;
pub mod metrics;
pub mod pdf;
pub mod pidman;
pub mod solr;

// Re-export commonly used types
pub use config::AppConfig;
pub use context::RepoContext;
pub use db::{DbPool, Repository};
pub use errors::{RepoError, Result};
pub use fedora::ObjectStore;
pub use pidman::{Ark, Minter, Pid};
pub use solr::SearchIndex;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
