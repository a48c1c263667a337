//! HTTP client for the Solr search backend.

use super::{
    FacetCount, IndexDocument, SearchIndex, SearchQuery, SearchResults, SortOrder,
    HIGHLIGHT_FIELDS,
};
use crate::config::SolrConfig;
use crate::errors::{RepoError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub struct SolrClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

#[derive(Deserialize)]
struct SelectResponse {
    response: SelectBody,
    #[serde(default)]
    facet_counts: Option<FacetCounts>,
    #[serde(default)]
    highlighting: Option<HashMap<String, HashMap<String, Vec<String>>>>,
}

#[derive(Deserialize)]
struct SelectBody {
    #[serde(rename = "numFound")]
    num_found: u64,
    start: u64,
    docs: Vec<IndexDocument>,
}

#[derive(Deserialize)]
struct FacetCounts {
    #[serde(default)]
    facet_fields: HashMap<String, Value>,
}

impl SolrClient {
    pub fn new(config: &SolrConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RepoError::Configuration {
                message: format!("failed to build search index HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    /// Updates retry on transport failures; document posting happens on
    /// save paths where a transient index outage should not fail the save
    /// pipeline's caller more than necessary.
    async fn post_update(&self, body: Value) -> Result<()> {
        let url = format!("{}/update?commit=true", self.base_url);
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2_u64.pow(attempt));
                tokio::time::sleep(delay).await;
            }
            match self.try_post(&url, &body).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Search index update failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| RepoError::unavailable("solr", "update failed after retries")))
    }

    async fn try_post(&self, url: &str, body: &Value) -> Result<()> {
        let response = self.client.post(url).json(body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RepoError::unavailable("solr", format!("HTTP {status}: {text}")));
        }
        Ok(())
    }

    fn query_params(query: &SearchQuery) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = Vec::new();
        params.push(("wt".into(), "json".into()));
        params.push(("q".into(), query.q.clone().unwrap_or_else(|| "*:*".into())));
        for (field, value) in &query.filters {
            params.push(("fq".into(), format!("{}:\"{}\"", field, value.replace('"', "\\\""))));
        }
        if !query.facet_fields.is_empty() {
            params.push(("facet".into(), "true".into()));
            let opts = query.facet_options.clone().unwrap_or_default();
            params.push(("facet.mincount".into(), opts.mincount.to_string()));
            params.push((
                "facet.sort".into(),
                if opts.sort_by_index { "index" } else { "count" }.into(),
            ));
            params.push(("facet.limit".into(), opts.limit.to_string()));
            for field in &query.facet_fields {
                params.push(("facet.field".into(), field.clone()));
            }
            for (field, prefix) in &query.facet_prefixes {
                params.push((format!("f.{field}.facet.prefix"), prefix.clone()));
            }
        }
        if query.highlight {
            params.push(("hl".into(), "true".into()));
            params.push(("hl.fl".into(), HIGHLIGHT_FIELDS.join(",")));
        }
        if let Some((field, order)) = &query.sort {
            let dir = match order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            params.push(("sort".into(), format!("{field} {dir}")));
        }
        params.push(("start".into(), query.start.to_string()));
        params.push(("rows".into(), query.rows.to_string()));
        if !query.field_list.is_empty() {
            params.push(("fl".into(), query.field_list.join(",")));
        }
        params
    }

    /// Solr returns facet fields as a flat alternating [value, count] list
    fn parse_facet_field(value: &Value) -> Vec<FacetCount> {
        let mut counts = Vec::new();
        if let Some(items) = value.as_array() {
            for pair in items.chunks(2) {
                if let [Value::String(value), count] = pair {
                    counts.push(FacetCount {
                        value: value.clone(),
                        count: count.as_u64().unwrap_or(0),
                    });
                }
            }
        }
        counts
    }
}

#[async_trait]
impl SearchIndex for SolrClient {
    async fn submit(&self, doc: IndexDocument) -> Result<()> {
        let mut doc_value = serde_json::to_value(&doc)?;
        if let Some(map) = doc_value.as_object_mut() {
            // the index's unique key
            map.insert("id".into(), Value::String(doc.pid.clone()));
        }
        self.post_update(serde_json::json!({ "add": { "doc": doc_value } }))
            .await
    }

    async fn remove(&self, pid: &str) -> Result<()> {
        self.post_update(serde_json::json!({ "delete": { "id": pid } }))
            .await
    }

    async fn search(&self, query: SearchQuery) -> Result<SearchResults> {
        let url = format!("{}/select", self.base_url);
        let params = Self::query_params(&query);
        let response = self.client.get(&url).query(&params).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RepoError::unavailable("solr", format!("HTTP {status}: {text}")));
        }
        let parsed: SelectResponse = response.json().await?;
        let facets = parsed
            .facet_counts
            .map(|fc| {
                fc.facet_fields
                    .iter()
                    .map(|(field, value)| (field.clone(), Self::parse_facet_field(value)))
                    .collect()
            })
            .unwrap_or_default();
        Ok(SearchResults {
            total: parsed.response.num_found,
            start: parsed.response.start as usize,
            docs: parsed.response.docs,
            facets,
            highlights: parsed.highlighting.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solr::FacetOptions;

    #[test]
    fn test_browse_query_params() {
        let query = SearchQuery::new()
            .filter("state", "published")
            .facet("journal_title_facet")
            .facet_prefix("journal_title_facet", "N");
        let params = SolrClient::query_params(&query);
        let has = |k: &str, v: &str| params.iter().any(|(pk, pv)| pk == k && pv == v);
        assert!(has("q", "*:*"));
        assert!(has("fq", "state:\"published\""));
        assert!(has("facet.mincount", "1"));
        assert!(has("facet.sort", "index"));
        assert!(has("facet.limit", "-1"));
        assert!(has("f.journal_title_facet.facet.prefix", "N"));
    }

    #[test]
    fn test_highlight_and_sort_params() {
        let query = SearchQuery::new()
            .terms("tumor microenvironment")
            .highlighted()
            .sort("score", SortOrder::Desc)
            .page(0, 25);
        let params = SolrClient::query_params(&query);
        let has = |k: &str, v: &str| params.iter().any(|(pk, pv)| pk == k && pv == v);
        assert!(has("hl", "true"));
        assert!(has("hl.fl", "abstract,fulltext"));
        assert!(has("sort", "score desc"));
        assert!(has("rows", "25"));
    }

    #[test]
    fn test_facet_limit_override() {
        let query = SearchQuery::new().facet("keyword_facet").facet_limit(15);
        let params = SolrClient::query_params(&query);
        assert!(params.iter().any(|(k, v)| k == "facet.limit" && v == "15"));
        // mincount and sort keep their browse defaults
        let opts = query.facet_options.as_ref().unwrap();
        assert_eq!(opts.mincount, FacetOptions::default().mincount);
        assert!(opts.sort_by_index);
    }

    #[test]
    fn test_parse_facet_field_pairs() {
        let value = serde_json::json!(["Biology", 12, "Chemistry", 3]);
        let counts = SolrClient::parse_facet_field(&value);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].value, "Biology");
        assert_eq!(counts[0].count, 12);
    }
}
