//! Article record, lifecycle and export handlers

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::AppState;
use openrepo_common::auth::Caller;
use openrepo_common::errors::{RepoError, Result};
use openrepo_common::metrics;
use openrepo_common::pidman::Pid;
use openrepo_publication::rdf;
use openrepo_publication::ris;
use openrepo_publication::{AccessDecision, Article, Indexer};

/// RIS media type registered for citation managers
const RIS_CONTENT_TYPE: &str = "application/x-research-info-systems";

#[derive(Serialize)]
pub struct AuthorResponse {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

#[derive(Serialize)]
pub struct ArticleResponse {
    pub pid: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub authors: Vec<AuthorResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embargo_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmcid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ark_uri: Option<String>,
    pub views: i64,
    pub downloads: i64,
}

/// An unpublished or withdrawn article looks like NotFound to anyone
/// who is neither an owner nor an admin. Embargo denials apply to the
/// PDF only, never to the record.
fn visible_to(article: &Article, caller: &Caller) -> Result<()> {
    match article.access_decision(caller, Utc::now().date_naive()) {
        AccessDecision::NotFound => Err(RepoError::ObjectNotFound {
            pid: article.pid().to_string(),
        }),
        _ => Ok(()),
    }
}

fn owner_or_admin(article: &Article, caller: &Caller) -> Result<()> {
    if caller.admin || caller.owns(article.owners()) {
        Ok(())
    } else {
        Err(RepoError::PermissionDenied {
            message: format!("not an owner of {}", article.pid()),
        })
    }
}

pub(crate) fn admin_only(caller: &Caller) -> Result<()> {
    if caller.admin {
        Ok(())
    } else {
        Err(RepoError::PermissionDenied {
            message: "administrator authority required".to_string(),
        })
    }
}

/// Public article record. Views of published records count toward the
/// article's statistics.
pub async fn get_article(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pid): Path<String>,
) -> Result<Json<ArticleResponse>> {
    let pid = Pid::parse(&pid)?;
    let article = Article::load(state.ctx.clone(), &pid).await?;
    visible_to(&article, &caller)?;

    if article.state() == openrepo_common::fedora::ObjectState::Published {
        state.repo.record_view(&pid.to_string()).await?;
        metrics::record_view();
    }
    let (views, downloads) = state.repo.totals(&pid.to_string()).await?;

    let mods = article.mods();
    let authors = mods
        .authors
        .iter()
        .map(|a| AuthorResponse {
            name: a.display_name(),
            login: a.id.clone(),
            affiliation: a.affiliation.clone(),
        })
        .collect();

    Ok(Json(ArticleResponse {
        pid: pid.to_string(),
        state: article.state().as_str().to_string(),
        title: mods.full_title(),
        authors,
        journal_title: mods.journal_title().map(String::from),
        publisher: mods.publisher().map(String::from),
        publication_date: mods.publication_date.clone(),
        abstract_text: mods.abstract_text.clone(),
        keywords: mods.keywords.clone(),
        embargo_end: mods.embargo_end.clone(),
        pmcid: article.pmcid(),
        ark_uri: mods.ark_uri.clone(),
        views,
        downloads,
    }))
}

#[derive(Serialize)]
pub struct LifecycleResponse {
    pub pid: String,
    pub state: String,
}

/// Publish an unpublished article. Owners and admins only; publishing
/// an already-published article is a no-op.
pub async fn publish(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pid): Path<String>,
) -> Result<Json<LifecycleResponse>> {
    let pid = Pid::parse(&pid)?;
    let mut article = Article::load(state.ctx.clone(), &pid).await?;
    owner_or_admin(&article, &caller)?;

    article.publish(&caller).await?;
    Indexer::new(state.ctx.clone()).submit(&article).await?;

    Ok(Json(LifecycleResponse {
        pid: pid.to_string(),
        state: article.state().as_str().to_string(),
    }))
}

/// Record a curator review. The last review date is indexed so the
/// review queue can exclude articles already looked at.
pub async fn review(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pid): Path<String>,
) -> Result<Json<LifecycleResponse>> {
    admin_only(&caller)?;
    let pid = Pid::parse(&pid)?;
    let mut article = Article::load(state.ctx.clone(), &pid).await?;

    let login = caller.require_login()?.to_string();
    article.provenance_mut().reviewed(&login, caller.event_name());
    article.save("reviewed", &caller).await?;
    Indexer::new(state.ctx.clone()).submit(&article).await?;

    Ok(Json(LifecycleResponse {
        pid: pid.to_string(),
        state: article.state().as_str().to_string(),
    }))
}

#[derive(Deserialize)]
pub struct WithdrawRequest {
    pub reason: String,
}

/// Withdraw a published article from public view. Admins only.
pub async fn withdraw(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pid): Path<String>,
    Json(request): Json<WithdrawRequest>,
) -> Result<Json<LifecycleResponse>> {
    admin_only(&caller)?;
    let pid = Pid::parse(&pid)?;
    let mut article = Article::load(state.ctx.clone(), &pid).await?;

    article.withdraw(&caller, &request.reason).await?;
    Indexer::new(state.ctx.clone()).submit(&article).await?;

    Ok(Json(LifecycleResponse {
        pid: pid.to_string(),
        state: article.state().as_str().to_string(),
    }))
}

#[derive(Deserialize, Default)]
pub struct ReinstateRequest {
    pub reason: Option<String>,
}

/// Reinstate a withdrawn article. Admins only.
pub async fn reinstate(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pid): Path<String>,
    request: Option<Json<ReinstateRequest>>,
) -> Result<Json<LifecycleResponse>> {
    admin_only(&caller)?;
    let pid = Pid::parse(&pid)?;
    let mut article = Article::load(state.ctx.clone(), &pid).await?;

    let Json(request) = request.unwrap_or_default();
    article.reinstate(&caller, request.reason.as_deref()).await?;
    Indexer::new(state.ctx.clone()).submit(&article).await?;

    Ok(Json(LifecycleResponse {
        pid: pid.to_string(),
        state: article.state().as_str().to_string(),
    }))
}

#[derive(Deserialize)]
pub struct MergeRequest {
    /// Legacy pid whose content and statistics move into this article
    pub legacy_pid: String,
}

/// Fold a legacy local object into this externally-minted article.
/// Admins only; the legacy object ends up inactive.
pub async fn merge(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pid): Path<String>,
    Json(request): Json<MergeRequest>,
) -> Result<Json<LifecycleResponse>> {
    admin_only(&caller)?;
    let pid = Pid::parse(&pid)?;
    let legacy_pid = Pid::parse(&request.legacy_pid)?;

    let mut article = Article::load(state.ctx.clone(), &pid).await?;
    let mut legacy = Article::load(state.ctx.clone(), &legacy_pid).await?;

    article.merge_from(&mut legacy, &state.repo, &caller).await?;

    let indexer = Indexer::new(state.ctx.clone());
    indexer.submit(&article).await?;
    indexer.remove(&legacy_pid).await?;

    Ok(Json(LifecycleResponse {
        pid: pid.to_string(),
        state: article.state().as_str().to_string(),
    }))
}

/// RIS citation export, UTF-8 with CRLF line endings
pub async fn export_ris(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pid): Path<String>,
) -> Result<(StatusCode, [(HeaderName, String); 2], String)> {
    let pid = Pid::parse(&pid)?;
    let article = Article::load(state.ctx.clone(), &pid).await?;
    visible_to(&article, &caller)?;

    let body = ris::render(article.mods(), &state.ctx.article_url(&pid));

    let headers = [
        (header::CONTENT_TYPE, RIS_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}.ris", pid.noid()),
        ),
    ];
    Ok((StatusCode::OK, headers, body))
}

/// RDF description of the article in Turtle
pub async fn export_rdf(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pid): Path<String>,
) -> Result<(StatusCode, [(HeaderName, String); 1], String)> {
    let pid = Pid::parse(&pid)?;
    let article = Article::load(state.ctx.clone(), &pid).await?;
    visible_to(&article, &caller)?;

    let subject = state.ctx.article_url(&pid);
    let graph = rdf::article_graph(&article, &subject).await?;

    let headers = [(header::CONTENT_TYPE, "text/turtle".to_string())];
    Ok((StatusCode::OK, headers, graph.to_turtle()))
}
