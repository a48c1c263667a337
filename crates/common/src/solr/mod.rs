//! Search index client
//!
//! Documents follow the flat schema the indexer produces; queries cover
//! the browse and discovery surfaces: filters, facets (including prefix
//! facets for letter-filtered browse), highlighting on abstract and full
//! text, sorting and pagination, and field-limit projection.

pub mod client;
pub mod memory;

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use client::SolrClient;
pub use memory::MemoryIndex;

/// Fields highlighted in search results
pub const HIGHLIGHT_FIELDS: [&str; 2] = ["abstract", "fulltext"];

/// A flat index document. Every field is optional or repeatable so the
/// same type serves full submissions and field-limited projections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub pid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pidspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner: Vec<String>,
    /// Parsed author-display strings, `<login>:<Family, Given>`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creator: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_sorting: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creator_facet: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_sorting: Option<String>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulltext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubyear: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_title_sorting: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_title_facet: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub researchfield: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub researchfield_sorting: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub researchfield_facet: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affiliations_facet: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub department_shortname_facet: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub division_dept_id: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embargo_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmcid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyword_facet: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub funder_facet: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub author_affiliation_facet: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Facet behaviour for browse views: every present value (`mincount=1`),
/// alphabetical (`sort=index`), unbounded (`limit=-1`)
#[derive(Debug, Clone)]
pub struct FacetOptions {
    pub mincount: u32,
    pub sort_by_index: bool,
    pub limit: i64,
}

impl Default for FacetOptions {
    fn default() -> Self {
        Self {
            mincount: 1,
            sort_by_index: true,
            limit: -1,
        }
    }
}

/// A search request built up fluently by the query surfaces
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub filters: Vec<(String, String)>,
    pub facet_fields: Vec<String>,
    pub facet_options: Option<FacetOptions>,
    /// (field, prefix) pairs for letter-filtered browse
    pub facet_prefixes: Vec<(String, String)>,
    pub highlight: bool,
    pub sort: Option<(String, SortOrder)>,
    pub start: usize,
    pub rows: usize,
    pub field_list: Vec<String>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self {
            rows: 10,
            ..Default::default()
        }
    }

    pub fn terms(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn facet(mut self, field: impl Into<String>) -> Self {
        self.facet_fields.push(field.into());
        if self.facet_options.is_none() {
            self.facet_options = Some(FacetOptions::default());
        }
        self
    }

    pub fn facet_limit(mut self, limit: i64) -> Self {
        self.facet_options.get_or_insert_with(FacetOptions::default).limit = limit;
        self
    }

    pub fn facet_prefix(mut self, field: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.facet_prefixes.push((field.into(), prefix.into()));
        self
    }

    pub fn highlighted(mut self) -> Self {
        self.highlight = true;
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((field.into(), order));
        self
    }

    pub fn page(mut self, start: usize, rows: usize) -> Self {
        self.start = start;
        self.rows = rows;
        self
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.field_list = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub total: u64,
    pub start: usize,
    pub docs: Vec<IndexDocument>,
    /// facet field -> counted values
    pub facets: HashMap<String, Vec<FacetCount>>,
    /// pid -> field -> snippets
    pub highlights: HashMap<String, HashMap<String, Vec<String>>>,
}

/// Derived-view index over published repository content. May lag the
/// object store; the store stays authoritative.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn submit(&self, doc: IndexDocument) -> Result<()>;

    /// Idempotent removal by pid
    async fn remove(&self, pid: &str) -> Result<()>;

    async fn search(&self, query: SearchQuery) -> Result<SearchResults>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder() {
        let query = SearchQuery::new()
            .terms("cancer")
            .filter("state", "published")
            .facet("creator_facet")
            .highlighted()
            .page(20, 10);
        assert_eq!(query.q.as_deref(), Some("cancer"));
        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.start, 20);
        let opts = query.facet_options.unwrap();
        assert_eq!(opts.mincount, 1);
        assert_eq!(opts.limit, -1);
        assert!(opts.sort_by_index);
    }

    #[test]
    fn test_document_omits_empty_fields() {
        let doc = IndexDocument {
            pid: "oe:1".into(),
            title: Some("A title".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&doc).unwrap();
        let map = json.as_object().unwrap();
        assert!(map.contains_key("title"));
        assert!(!map.contains_key("fulltext"));
        assert!(!map.contains_key("creator"));
    }

    #[test]
    fn test_abstract_field_name() {
        let doc = IndexDocument {
            pid: "oe:1".into(),
            abstract_text: Some("Summary".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["abstract"], "Summary");
    }
}
