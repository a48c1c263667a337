//! Deposit, harvest-queue and reconciliation handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::handlers::articles::admin_only;
use crate::identity::Identity;
use crate::AppState;
use openrepo_common::auth::CAP_HARVEST_INGEST;
use openrepo_common::errors::{RepoError, Result};
use openrepo_common::pidman::Pid;
use openrepo_ingest::{HarvestProcessor, LegalStatement, UploadProcessor, UploadRequest};
use openrepo_publication::{DuplicateAction, Reconciler};

#[derive(Debug, Deserialize, Validate)]
pub struct UploadParams {
    #[validate(length(min = 1, max = 255))]
    pub filename: String,

    /// The depositor's assent to the deposit agreement
    #[serde(default)]
    pub assent: bool,

    /// "AUTHOR" (default) or "MEDIATED"
    pub statement: Option<String>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub pid: String,
    pub location: String,
}

/// Author deposit: the request body is the PDF itself, with deposit
/// details in the query string. Mediated deposits are admin-only.
pub async fn upload(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    params.validate().map_err(|e| RepoError::validation("filename", e.to_string()))?;

    let statement = match params.statement.as_deref() {
        None | Some("AUTHOR") => LegalStatement::Author,
        Some("MEDIATED") => {
            admin_only(&caller)?;
            LegalStatement::Mediated
        }
        Some(other) => {
            return Err(RepoError::validation(
                "statement",
                format!("unknown legal statement {other:?}"),
            ))
        }
    };

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let request = UploadRequest {
        filename: params.filename,
        mime_type,
        bytes: body.to_vec(),
        assent: params.assent,
        statement,
    };

    let pid = UploadProcessor::new(state.ctx.clone()).process(request, &caller).await?;

    let location = state.ctx.article_url(&pid);
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            pid: pid.to_string(),
            location,
        }),
    ))
}

#[derive(Deserialize)]
pub struct QueueParams {
    pub limit: Option<u64>,
}

#[derive(Serialize)]
pub struct HarvestRecordResponse {
    pub pmcid: i64,
    pub title: String,
    pub authors: Vec<String>,
    pub harvested: String,
    pub status: String,
    pub fulltext: bool,
    pub access_url: String,
}

/// Pending harvest queue for reviewers
pub async fn harvest_queue(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Query(params): Query<QueueParams>,
) -> Result<Json<Vec<HarvestRecordResponse>>> {
    caller.require_capability(CAP_HARVEST_INGEST)?;

    let records = state.repo.pending_harvests(params.limit.unwrap_or(20)).await?;
    let listing = records
        .into_iter()
        .map(|r| HarvestRecordResponse {
            pmcid: r.pmcid,
            title: r.title.clone(),
            authors: r.author_logins(),
            harvested: r.harvested.to_rfc3339(),
            status: r.status.clone(),
            fulltext: r.fulltext,
            access_url: r.access_url(),
        })
        .collect();
    Ok(Json(listing))
}

#[derive(Serialize)]
pub struct HarvestIngestResponse {
    pub pmcid: i64,
    pub pid: String,
}

/// Turn a reviewed harvest record into an unpublished article
pub async fn harvest_ingest(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pmcid): Path<i64>,
) -> Result<(StatusCode, Json<HarvestIngestResponse>)> {
    let processor = HarvestProcessor::new(state.ctx.clone(), state.repo.clone());
    let pid = processor.process(pmcid, &caller).await?;

    Ok((
        StatusCode::CREATED,
        Json(HarvestIngestResponse {
            pmcid,
            pid: pid.to_string(),
        }),
    ))
}

/// Reviewer rejection of a pending harvest record
pub async fn harvest_ignore(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pmcid): Path<i64>,
) -> Result<StatusCode> {
    caller.require_capability(CAP_HARVEST_INGEST)?;
    state.repo.mark_ignored(pmcid).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ReconcileParams {
    pub action: Option<String>,
}

#[derive(Serialize)]
pub struct ReconcileResponse {
    pub duplicate: String,
    pub original: String,
    pub action: String,
    pub report_path: String,
}

/// Fold (or disregard) a feed duplicate. Exactly one action must be
/// named; anything else is a caller error.
pub async fn reconcile(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pid): Path<String>,
    Query(params): Query<ReconcileParams>,
) -> Result<Json<ReconcileResponse>> {
    admin_only(&caller)?;

    let action = match params.action.as_deref() {
        Some("replace") => DuplicateAction::Replace,
        Some("ignore") => DuplicateAction::Ignore,
        other => {
            return Err(RepoError::validation(
                "action",
                format!("must be \"replace\" or \"ignore\", got {other:?}"),
            ))
        }
    };

    let pid = Pid::parse(&pid)?;
    let reconciler = Reconciler::new(state.ctx.clone(), &state.config.repository.reports_dir);
    let outcome = reconciler.reconcile(&pid, action, &caller).await?;

    Ok(Json(ReconcileResponse {
        duplicate: outcome.duplicate.to_string(),
        original: outcome.original.to_string(),
        action: outcome.action.as_str().to_string(),
        report_path: outcome.report_path.display().to_string(),
    }))
}
