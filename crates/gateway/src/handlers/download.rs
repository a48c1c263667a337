//! PDF download behind the embargo gate

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
};
use chrono::Utc;
use tracing::info;

use crate::identity::Identity;
use crate::AppState;
use openrepo_common::errors::{RepoError, Result};
use openrepo_common::fedora::DS_CONTENT;
use openrepo_common::metrics;
use openrepo_common::pidman::Pid;
use openrepo_publication::{AccessDecision, Article};

/// Serve the article PDF as an attachment.
///
/// The embargo gate decides per caller: during an embargo anonymous
/// callers get 401 and authenticated non-owners 403; objects hidden
/// from the caller are a plain 404. Downloads count toward statistics
/// only when access is allowed.
pub async fn download_pdf(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(pid): Path<String>,
) -> Result<(StatusCode, [(HeaderName, String); 2], Vec<u8>)> {
    let pid = Pid::parse(&pid)?;
    let article = Article::load(state.ctx.clone(), &pid).await?;

    match article.access_decision(&caller, Utc::now().date_naive()) {
        AccessDecision::Allow => {}
        AccessDecision::Deny401 => {
            return Err(RepoError::Unauthorized {
                message: "content is under embargo; log in to check your access".to_string(),
            })
        }
        AccessDecision::Deny403 => {
            return Err(RepoError::PermissionDenied {
                message: format!(
                    "content of {pid} is under embargo until {}",
                    article.embargo_end_date().map(|d| d.to_string()).unwrap_or_default()
                ),
            })
        }
        AccessDecision::NotFound => {
            return Err(RepoError::ObjectNotFound {
                pid: pid.to_string(),
            })
        }
    }

    let pdf = state
        .ctx
        .store
        .get_datastream(&pid, DS_CONTENT)
        .await?
        .ok_or_else(|| RepoError::DatastreamNotFound {
            pid: pid.to_string(),
            dsid: DS_CONTENT.to_string(),
        })?;

    state.repo.record_download(&pid.to_string()).await?;
    metrics::record_download();
    info!(pid = %pid, bytes = pdf.bytes.len(), "pdf download");

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={pid}.pdf"),
        ),
    ];
    Ok((StatusCode::OK, headers, pdf.bytes))
}
