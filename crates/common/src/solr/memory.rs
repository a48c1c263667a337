//! In-memory search index for tests and local development.
//!
//! Approximates the backend's behaviour over documents serialized to
//! JSON: exact-match filters, substring term matching, index-sorted
//! facets with prefix filtering, naive highlighting and field-limited
//! projection. Good enough to exercise every query surface without a
//! running Solr.

use super::{
    FacetCount, IndexDocument, SearchIndex, SearchQuery, SearchResults, SortOrder,
    HIGHLIGHT_FIELDS,
};
use crate::errors::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryIndex {
    docs: Mutex<BTreeMap<String, Value>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw stored document, for assertions in tests
    pub fn get(&self, pid: &str) -> Option<Value> {
        self.docs.lock().unwrap().get(pid).cloned()
    }

    fn field_values(doc: &Value, field: &str) -> Vec<String> {
        match doc.get(field) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Number(n)) => vec![n.to_string()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn matches_terms(doc: &Value, q: &str) -> bool {
        let needle = q.to_lowercase();
        // every whitespace-separated term must appear in some field
        needle.split_whitespace().all(|term| {
            doc.as_object().into_iter().flatten().any(|(_, v)| {
                Self::field_values_of(v)
                    .iter()
                    .any(|s| s.to_lowercase().contains(term))
            })
        })
    }

    fn field_values_of(v: &Value) -> Vec<String> {
        match v {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .filter_map(|i| i.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn snippet(text: &str, term: &str) -> Option<String> {
        let lower = text.to_lowercase();
        let pos = lower.find(&term.to_lowercase())?;
        let start = text[..pos]
            .char_indices()
            .rev()
            .nth(40)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let end = (pos + term.len() + 40).min(text.len());
        let end = text
            .char_indices()
            .map(|(i, _)| i)
            .chain([text.len()])
            .find(|&i| i >= end)
            .unwrap_or(text.len());
        Some(text[start..end].to_string())
    }

    fn project(doc: &Value, fields: &[String]) -> Value {
        if fields.is_empty() {
            return doc.clone();
        }
        let mut out = serde_json::Map::new();
        if let Some(map) = doc.as_object() {
            for field in fields {
                if let Some(v) = map.get(field) {
                    out.insert(field.clone(), v.clone());
                }
            }
            // pid always survives projection; deserialization needs it
            if let Some(pid) = map.get("pid") {
                out.insert("pid".into(), pid.clone());
            }
        }
        Value::Object(out)
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn submit(&self, doc: IndexDocument) -> Result<()> {
        let value = serde_json::to_value(&doc)?;
        self.docs.lock().unwrap().insert(doc.pid, value);
        Ok(())
    }

    async fn remove(&self, pid: &str) -> Result<()> {
        self.docs.lock().unwrap().remove(pid);
        Ok(())
    }

    async fn search(&self, query: SearchQuery) -> Result<SearchResults> {
        let docs = self.docs.lock().unwrap();
        let mut hits: Vec<&Value> = docs
            .values()
            .filter(|doc| {
                query
                    .filters
                    .iter()
                    .all(|(field, value)| Self::field_values(doc, field).iter().any(|v| v == value))
            })
            .filter(|doc| match &query.q {
                Some(q) if q != "*:*" => Self::matches_terms(doc, q),
                _ => true,
            })
            .collect();

        if let Some((field, order)) = &query.sort {
            if field != "score" {
                hits.sort_by(|a, b| {
                    let av = Self::field_values(a, field).into_iter().next().unwrap_or_default();
                    let bv = Self::field_values(b, field).into_iter().next().unwrap_or_default();
                    match order {
                        SortOrder::Asc => av.cmp(&bv),
                        SortOrder::Desc => bv.cmp(&av),
                    }
                });
            }
        }

        // facet counts over the full filtered set, before pagination
        let mut facets: HashMap<String, Vec<FacetCount>> = HashMap::new();
        let opts = query.facet_options.clone().unwrap_or_default();
        for field in &query.facet_fields {
            let prefix = query
                .facet_prefixes
                .iter()
                .find(|(f, _)| f == field)
                .map(|(_, p)| p.as_str());
            let mut counts: BTreeMap<String, u64> = BTreeMap::new();
            for doc in &hits {
                for value in Self::field_values(doc, field) {
                    if prefix.is_some_and(|p| !value.starts_with(p)) {
                        continue;
                    }
                    *counts.entry(value).or_insert(0) += 1;
                }
            }
            let mut list: Vec<FacetCount> = counts
                .into_iter()
                .filter(|(_, c)| *c >= opts.mincount as u64)
                .map(|(value, count)| FacetCount { value, count })
                .collect();
            if !opts.sort_by_index {
                list.sort_by(|a, b| b.count.cmp(&a.count));
            }
            if opts.limit >= 0 {
                list.truncate(opts.limit as usize);
            }
            facets.insert(field.clone(), list);
        }

        let total = hits.len() as u64;
        let page: Vec<&Value> = hits
            .into_iter()
            .skip(query.start)
            .take(query.rows)
            .collect();

        let mut highlights: HashMap<String, HashMap<String, Vec<String>>> = HashMap::new();
        if query.highlight {
            if let Some(q) = &query.q {
                for doc in &page {
                    let pid = doc.get("pid").and_then(|v| v.as_str()).unwrap_or_default();
                    let mut per_field: HashMap<String, Vec<String>> = HashMap::new();
                    for field in HIGHLIGHT_FIELDS {
                        let snippets: Vec<String> = Self::field_values(doc, field)
                            .iter()
                            .flat_map(|text| {
                                q.split_whitespace()
                                    .filter_map(|term| Self::snippet(text, term))
                            })
                            .collect();
                        if !snippets.is_empty() {
                            per_field.insert(field.to_string(), snippets);
                        }
                    }
                    if !per_field.is_empty() {
                        highlights.insert(pid.to_string(), per_field);
                    }
                }
            }
        }

        let docs_out = page
            .into_iter()
            .map(|doc| Self::project(doc, &query.field_list))
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<IndexDocument>, _>>()?;

        Ok(SearchResults {
            total,
            start: query.start,
            docs: docs_out,
            facets,
            highlights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pid: &str, title: &str, journal: &str, state: &str) -> IndexDocument {
        IndexDocument {
            pid: pid.into(),
            state: Some(state.into()),
            title: Some(title.into()),
            journal_title_facet: Some(journal.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_filter_and_pagination() {
        let index = MemoryIndex::new();
        for i in 0..5 {
            index
                .submit(doc(&format!("oe:a{i}"), "Paper", "Nature", "published"))
                .await
                .unwrap();
        }
        index
            .submit(doc("oe:u1", "Draft", "Nature", "unpublished"))
            .await
            .unwrap();

        let results = index
            .search(
                SearchQuery::new()
                    .filter("state", "published")
                    .page(2, 2),
            )
            .await
            .unwrap();
        assert_eq!(results.total, 5);
        assert_eq!(results.docs.len(), 2);
    }

    #[tokio::test]
    async fn test_facets_index_sorted_with_prefix() {
        let index = MemoryIndex::new();
        index.submit(doc("oe:1", "A", "Nature", "published")).await.unwrap();
        index.submit(doc("oe:2", "B", "Nature", "published")).await.unwrap();
        index.submit(doc("oe:3", "C", "Cell", "published")).await.unwrap();
        index.submit(doc("oe:4", "D", "Neuron", "published")).await.unwrap();

        let results = index
            .search(SearchQuery::new().facet("journal_title_facet"))
            .await
            .unwrap();
        let counts = &results.facets["journal_title_facet"];
        let values: Vec<&str> = counts.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, ["Cell", "Nature", "Neuron"]);
        assert_eq!(counts[1].count, 2);

        let filtered = index
            .search(
                SearchQuery::new()
                    .facet("journal_title_facet")
                    .facet_prefix("journal_title_facet", "N"),
            )
            .await
            .unwrap();
        let values: Vec<&str> = filtered.facets["journal_title_facet"]
            .iter()
            .map(|c| c.value.as_str())
            .collect();
        assert_eq!(values, ["Nature", "Neuron"]);
    }

    #[tokio::test]
    async fn test_term_search_with_highlighting() {
        let index = MemoryIndex::new();
        let mut d = doc("oe:1", "Tumor growth study", "Cell", "published");
        d.abstract_text = Some("We study tumor growth in model organisms".into());
        index.submit(d).await.unwrap();
        index
            .submit(doc("oe:2", "Unrelated", "Cell", "published"))
            .await
            .unwrap();

        let results = index
            .search(SearchQuery::new().terms("tumor").highlighted())
            .await
            .unwrap();
        assert_eq!(results.total, 1);
        let snippets = &results.highlights["oe:1"]["abstract"];
        assert!(snippets[0].contains("tumor"));
    }

    #[tokio::test]
    async fn test_field_limit_projection() {
        let index = MemoryIndex::new();
        let mut d = doc("oe:1", "Title here", "Cell", "published");
        d.fulltext = Some("long body text".into());
        index.submit(d).await.unwrap();

        let results = index
            .search(SearchQuery::new().fields(&["title"]))
            .await
            .unwrap();
        let doc = &results.docs[0];
        assert_eq!(doc.pid, "oe:1");
        assert_eq!(doc.title.as_deref(), Some("Title here"));
        assert!(doc.fulltext.is_none());
        assert!(doc.state.is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let index = MemoryIndex::new();
        index.submit(doc("oe:1", "T", "Cell", "published")).await.unwrap();
        index.remove("oe:1").await.unwrap();
        index.remove("oe:1").await.unwrap();
        assert!(index.is_empty());
    }
}
