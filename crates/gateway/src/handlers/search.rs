//! Search, browse, suggest and listing handlers
//!
//! All public queries are restricted to published articles; the index
//! carries unpublished and withdrawn states only for staff views.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::handlers::articles::admin_only;
use crate::identity::Identity;
use crate::AppState;
use openrepo_common::errors::{RepoError, Result};
use openrepo_common::fedora::CM_ARTICLE;
use openrepo_common::metrics;
use openrepo_common::solr::{IndexDocument, SearchQuery, SearchResults, SortOrder};
use openrepo_publication::{Article, Indexer};

/// Terms returned by the suggest endpoint
const SUGGEST_LIMIT: i64 = 15;

/// Facet fields reachable through browse and suggest
fn facet_field(name: &str) -> Result<&'static str> {
    match name {
        "creator" => Ok("creator_facet"),
        "journal" => Ok("journal_title_facet"),
        "keyword" => Ok("keyword_facet"),
        "subject" => Ok("researchfield_facet"),
        "affiliation" => Ok("affiliations_facet"),
        "funder" => Ok("funder_facet"),
        other => Err(RepoError::validation(
            "field",
            format!("unknown facet field {other:?}"),
        )),
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    /// Staff only; the public always searches published articles
    pub state: Option<String>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub pid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub creators: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubyear: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmcid: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snippets: Vec<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub total: u64,
    pub start: usize,
    pub docs: Vec<SearchHit>,
    pub facets: HashMap<String, Vec<FacetEntry>>,
}

#[derive(Serialize)]
pub struct FacetEntry {
    pub value: String,
    pub count: u64,
}

fn to_hits(results: SearchResults) -> (Vec<SearchHit>, HashMap<String, Vec<FacetEntry>>) {
    let highlights = results.highlights;
    let docs = results
        .docs
        .into_iter()
        .map(|doc: IndexDocument| {
            let snippets = highlights
                .get(&doc.pid)
                .map(|fields| fields.values().flatten().cloned().collect())
                .unwrap_or_default();
            SearchHit {
                pid: doc.pid,
                title: doc.title,
                creators: doc.creator,
                journal_title: doc.journal_title,
                pubyear: doc.pubyear,
                pmcid: doc.pmcid,
                snippets,
            }
        })
        .collect();
    let facets = results
        .facets
        .into_iter()
        .map(|(field, counts)| {
            let entries = counts
                .into_iter()
                .map(|c| FacetEntry {
                    value: c.value,
                    count: c.count,
                })
                .collect();
            (field, entries)
        })
        .collect();
    (docs, facets)
}

/// Keyword search over published articles with highlighting and the
/// standard browse facets.
pub async fn search(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(10).clamp(1, 100);

    // The review queue searches unpublished articles; only staff see
    // anything other than published ones.
    let state_filter = match params.state.as_deref() {
        None | Some("published") => "published",
        Some(other) => {
            admin_only(&caller)?;
            other
        }
    };

    let mut query = SearchQuery::new()
        .filter("state", state_filter)
        .facet("creator_facet")
        .facet("journal_title_facet")
        .facet("keyword_facet")
        .facet("researchfield_facet")
        .facet("affiliations_facet")
        .highlighted()
        .page((page - 1) * per_page, per_page);
    if let Some(q) = &params.q {
        query = query.terms(q);
    }

    let results = state.ctx.index.search(query).await?;
    metrics::record_search("search");

    let total = results.total;
    let start = results.start;
    let (docs, facets) = to_hits(results);
    Ok(Json(SearchResponse {
        total,
        start,
        docs,
        facets,
    }))
}

#[derive(Deserialize)]
pub struct BrowseParams {
    /// Optional first-letter filter
    pub letter: Option<String>,
}

/// Alphabetical browse of one facet: every present value, in index
/// order, optionally restricted by first letter.
pub async fn browse(
    State(state): State<AppState>,
    Path(field): Path<String>,
    Query(params): Query<BrowseParams>,
) -> Result<Json<Vec<FacetEntry>>> {
    let field = facet_field(&field)?;

    let mut query = SearchQuery::new()
        .filter("state", "published")
        .facet(field)
        .facet_limit(-1)
        .page(0, 0);
    if let Some(letter) = &params.letter {
        query = query.facet_prefix(field, letter);
    }

    let mut results = state.ctx.index.search(query).await?;
    metrics::record_search("browse");

    let entries = results
        .facets
        .remove(field)
        .unwrap_or_default()
        .into_iter()
        .map(|c| FacetEntry {
            value: c.value,
            count: c.count,
        })
        .collect();
    Ok(Json(entries))
}

#[derive(Deserialize)]
pub struct SuggestParams {
    pub term: String,
}

/// Typeahead: the most common facet values matching a prefix
pub async fn suggest(
    State(state): State<AppState>,
    Path(field): Path<String>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<Vec<FacetEntry>>> {
    let field = facet_field(&field)?;

    let query = SearchQuery::new()
        .filter("state", "published")
        .facet(field)
        .facet_limit(SUGGEST_LIMIT)
        .facet_prefix(field, &params.term)
        .page(0, 0);

    let mut results = state.ctx.index.search(query).await?;
    metrics::record_search("suggest");

    let entries = results
        .facets
        .remove(field)
        .unwrap_or_default()
        .into_iter()
        .map(|c| FacetEntry {
            value: c.value,
            count: c.count,
        })
        .collect();
    Ok(Json(entries))
}

#[derive(Deserialize)]
pub struct RecentParams {
    pub limit: Option<usize>,
}

/// Most recently modified published articles
pub async fn recent(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<SearchResponse>> {
    let limit = params.limit.unwrap_or(10).clamp(1, 50);

    let query = SearchQuery::new()
        .filter("state", "published")
        .sort("last_modified", SortOrder::Desc)
        .page(0, limit);

    let results = state.ctx.index.search(query).await?;

    let total = results.total;
    let start = results.start;
    let (docs, facets) = to_hits(results);
    Ok(Json(SearchResponse {
        total,
        start,
        docs,
        facets,
    }))
}

#[derive(Serialize)]
pub struct FeaturedResponse {
    pub pids: Vec<String>,
}

/// Pids in the home-page rotation
pub async fn featured(State(state): State<AppState>) -> Result<Json<FeaturedResponse>> {
    let pids = state.repo.featured_pids().await?;
    Ok(Json(FeaturedResponse { pids }))
}

/// Add an article to the home-page rotation. Admins only.
pub async fn feature(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pid): Path<String>,
) -> Result<StatusCode> {
    admin_only(&caller)?;
    state.repo.feature_article(&pid).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove an article from the home-page rotation. Admins only.
pub async fn unfeature(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pid): Path<String>,
) -> Result<StatusCode> {
    admin_only(&caller)?;
    state.repo.unfeature_article(&pid).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct TopParams {
    pub metric: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Serialize)]
pub struct TopEntry {
    pub pid: String,
    pub count: i64,
}

/// Top downloaded or top viewed articles for summary pages
pub async fn top_stats(
    State(state): State<AppState>,
    Query(params): Query<TopParams>,
) -> Result<Json<Vec<TopEntry>>> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let counts = match params.metric.as_deref() {
        None | Some("downloads") => state.repo.top_downloaded(limit).await?,
        Some("views") => state.repo.top_viewed(limit).await?,
        Some(other) => {
            return Err(RepoError::validation(
                "metric",
                format!("must be \"downloads\" or \"views\", got {other:?}"),
            ))
        }
    };

    let entries = counts
        .into_iter()
        .map(|c| TopEntry {
            pid: c.pid,
            count: c.count,
        })
        .collect();
    Ok(Json(entries))
}

#[derive(Serialize)]
pub struct ReindexResponse {
    pub indexed: u64,
}

/// Rebuild the search index by walking every article in the object
/// store and resubmitting its index document. Admins only.
pub async fn reindex(
    State(state): State<AppState>,
    Identity(caller): Identity,
) -> Result<Json<ReindexResponse>> {
    admin_only(&caller)?;

    let indexer = Indexer::new(state.ctx.clone());
    let mut cursor = None;
    let mut indexed = 0u64;
    loop {
        let page = state
            .ctx
            .store
            .find_by_content_model(CM_ARTICLE, cursor)
            .await?;
        for pid in &page.pids {
            let article = Article::load(state.ctx.clone(), pid).await?;
            indexer.submit(&article).await?;
            indexed += 1;
        }
        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    tracing::info!(indexed, "search index rebuilt");
    Ok(Json(ReindexResponse { indexed }))
}
