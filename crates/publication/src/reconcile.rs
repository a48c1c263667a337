//! External-feed duplicate reconciler
//!
//! The external feed mints its own objects; when an entry carries a
//! `dcterms:replaces` relation it duplicates an article already in the
//! repository. The reconciler folds the feed content into the original
//! (or disregards it) and repoints the feed system's wrapper object,
//! leaving a report and a provenance trail either way.
//!
//! One pid at a time; concurrent runs over the same pids are not
//! supported and must be serialized by the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use openrepo_common::auth::{Caller, Credentials};
use openrepo_common::errors::{RepoError, Result};
use openrepo_common::fedora::{DS_CONTENT, DS_SYMP_ATOM};
use openrepo_common::metrics;
use openrepo_common::pidman::Pid;
use openrepo_common::RepoContext;

use crate::article::Article;
use crate::symp::SympAtom;

/// What to do with a detected duplicate. Exactly one mode applies;
/// there is no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateAction {
    /// Copy the feed entry and PDF into the original pid
    Replace,
    /// Leave the original untouched, only repoint the wrapper
    Ignore,
}

impl DuplicateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateAction::Replace => "replace",
            DuplicateAction::Ignore => "ignore",
        }
    }
}

/// Outcome of one reconciliation, echoed into the report file.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub duplicate: Pid,
    pub original: Pid,
    pub action: DuplicateAction,
    pub report_path: PathBuf,
}

pub struct Reconciler {
    ctx: Arc<RepoContext>,
    reports_dir: PathBuf,
}

impl Reconciler {
    pub fn new(ctx: Arc<RepoContext>, reports_dir: impl AsRef<Path>) -> Self {
        Self {
            ctx,
            reports_dir: reports_dir.as_ref().to_path_buf(),
        }
    }

    /// Folds (or disregards) one duplicate. The duplicate object must
    /// carry a `dcterms:replaces` relation naming the original.
    #[instrument(skip(self, caller), fields(action = action.as_str()))]
    pub async fn reconcile(
        &self,
        duplicate_pid: &Pid,
        action: DuplicateAction,
        caller: &Caller,
    ) -> Result<ReconcileOutcome> {
        let mut duplicate = self.ctx.store.get_profile(duplicate_pid).await?;
        let original_pid = duplicate.replaces.clone().ok_or_else(|| RepoError::Conflict {
            message: format!("{duplicate_pid} carries no replaces relation"),
        })?;

        let atom_ds = self.ctx.store.get_datastream(duplicate_pid, DS_SYMP_ATOM).await?;
        let external_id = atom_ds
            .as_ref()
            .and_then(|ds| ds.as_str().ok())
            .and_then(|xml| SympAtom::from_xml(xml).ok())
            .and_then(|atom| atom.external_id);

        let mut original = Article::load(self.ctx.clone(), &original_pid).await?;
        let actor = caller.require_login()?;

        let mut report = vec![
            format!("duplicate: {duplicate_pid}"),
            format!("original:  {original_pid}"),
            format!("action:    {}", action.as_str()),
        ];

        if action == DuplicateAction::Replace {
            if let Some(ds) = atom_ds {
                original.set_symp_atom(ds.bytes);
                report.push("copied: SYMPLECTIC-ATOM".to_string());
            }
            if let Some(pdf) = self.ctx.store.get_datastream(duplicate_pid, DS_CONTENT).await? {
                original.set_pdf(pdf.bytes);
                report.push("copied: content PDF".to_string());
            }
        }
        original.provenance_mut().symp_ingest(
            actor,
            caller.event_name(),
            external_id.as_deref().unwrap_or("unknown"),
        );
        original
            .save(&format!("reconciled duplicate {duplicate_pid}"), caller)
            .await?;

        // the wrapper's pointers decide which object the feed system
        // treats as current and visible
        let expected = duplicate.version;
        duplicate.has_current = Some(original_pid.clone());
        duplicate.has_visible = Some(original_pid.clone());
        self.ctx
            .store
            .commit(
                &duplicate,
                Vec::new(),
                expected,
                "repointed wrapper to original",
                &Credentials::for_caller(caller),
            )
            .await?;

        let report_path = self.write_report(duplicate_pid, action, &report).await?;
        metrics::record_reconcile(action.as_str());
        info!(%duplicate_pid, %original_pid, report = %report_path.display(), "reconciled");

        Ok(ReconcileOutcome {
            duplicate: duplicate_pid.clone(),
            original: original_pid,
            action,
            report_path,
        })
    }

    async fn write_report(
        &self,
        duplicate_pid: &Pid,
        action: DuplicateAction,
        lines: &[String],
    ) -> Result<PathBuf> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S");
        let prefix = match action {
            DuplicateAction::Replace => "replaces-report",
            DuplicateAction::Ignore => "ignore-report",
        };
        let name = format!("{prefix}-{}-{stamp}.txt", duplicate_pid.noid());
        let path = self.reports_dir.join(name);
        tokio::fs::create_dir_all(&self.reports_dir)
            .await
            .map_err(|e| RepoError::Internal {
                message: format!("report directory: {e}"),
            })?;
        let mut body = lines.join("\n");
        body.push('\n');
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| RepoError::Internal {
                message: format!("writing report {}: {e}", path.display()),
            })?;
        Ok(path)
    }
}
