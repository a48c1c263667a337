//! Author-upload pipeline
//!
//! Turns a deposited PDF into a new unpublished article. The caller's
//! assent to the deposit agreement is a hard precondition, and the file
//! type comes from magic-byte sniffing, never from the caller-supplied
//! MIME type.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use openrepo_common::auth::Caller;
use openrepo_common::errors::{FieldError, RepoError, Result};
use openrepo_common::metrics;
use openrepo_common::pdf;
use openrepo_common::pidman::Pid;
use openrepo_common::RepoContext;
use openrepo_publication::mods::Author;
use openrepo_publication::premis::EventKind;
use openrepo_publication::{Article, Indexer};

/// Deposit agreement variant recorded in provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegalStatement {
    /// The depositing author assents for themselves
    Author,
    /// Staff deposit with an assist authorization on file
    Mediated,
}

impl LegalStatement {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegalStatement::Author => "AUTHOR",
            LegalStatement::Mediated => "MEDIATED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    /// As sent by the client; informational only
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub assent: bool,
    pub statement: LegalStatement,
}

pub struct UploadProcessor {
    ctx: Arc<RepoContext>,
    indexer: Indexer,
}

impl UploadProcessor {
    pub fn new(ctx: Arc<RepoContext>) -> Self {
        let indexer = Indexer::new(ctx.clone());
        Self { ctx, indexer }
    }

    /// Runs one deposit; returns the new article's pid.
    #[instrument(skip(self, request, caller), fields(filename = %request.filename))]
    pub async fn process(&self, request: UploadRequest, caller: &Caller) -> Result<Pid> {
        let started = Instant::now();
        let login = caller.require_login()?.to_string();

        if !request.assent {
            return Err(RepoError::Validation {
                errors: vec![FieldError::new(
                    "assent",
                    "deposit requires assent to the repository agreement",
                )],
            });
        }
        if !pdf::is_pdf(&request.bytes) {
            return Err(RepoError::Validation {
                errors: vec![FieldError::new("content", "uploaded file is not a PDF")],
            });
        }
        if request.mime_type != "application/pdf" {
            // sniffing wins; the mismatch is only worth a log line
            warn!(mime = %request.mime_type, "client MIME disagrees with PDF magic bytes");
        }

        let mut article = Article::create(self.ctx.clone(), &request.filename).await?;
        article.mods_mut().set_title(&request.filename);
        article.set_owner(&login);
        article.attach_to_collection(self.ctx.collection.clone());
        article.set_pdf(request.bytes);

        if request.statement == LegalStatement::Author {
            let (given, family) = split_display_name(caller.event_name(), &login);
            article.mods_mut().authors.insert(
                0,
                Author {
                    id: Some(login.clone()),
                    family_name: family,
                    given_name: given,
                    affiliation: None,
                },
            );
        }

        // retried deposits must not double-log the event
        if !article.provenance().has_event(EventKind::Uploaded) {
            article.provenance_mut().uploaded(
                &login,
                caller.event_name(),
                request.statement.as_str(),
            );
        }

        article.save("author deposit", caller).await?;
        self.indexer.submit(&article).await?;

        metrics::record_ingest(started.elapsed().as_secs_f64(), "upload");
        info!(pid = %article.pid(), "deposit ingested");
        Ok(article.pid().clone())
    }
}

/// Best-effort split of a display name into given and family parts.
fn split_display_name(display_name: &str, fallback: &str) -> (String, String) {
    match display_name.rsplit_once(' ') {
        Some((given, family)) => (given.to_string(), family.to_string()),
        None if !display_name.is_empty() => (String::new(), display_name.to_string()),
        None => (String::new(), fallback.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openrepo_common::config::{PidmanConfig, RepositoryConfig};
    use openrepo_common::fedora::{MemoryStore, DS_CONTENT};
    use openrepo_common::pidman::Minter;
    use openrepo_common::solr::{MemoryIndex, SearchQuery};

    fn test_ctx() -> Arc<RepoContext> {
        let config = RepositoryConfig {
            pidspace: "openrepo".into(),
            collection_pid: "openrepo:collection".into(),
            admin_users: vec![],
            harvest_users: vec![],
            reports_dir: "/tmp".into(),
            base_url: "http://repo.example.edu".into(),
        };
        let pidman = PidmanConfig {
            host: None,
            domain: None,
            naan: "25593".into(),
            dev_fallback: true,
            timeout_secs: 5,
        };
        Arc::new(
            RepoContext::new(
                Arc::new(MemoryStore::new()),
                Arc::new(MemoryIndex::new()),
                Arc::new(Minter::new(pidman).unwrap()),
                &config,
            )
            .unwrap(),
        )
    }

    fn pdf_request() -> UploadRequest {
        UploadRequest {
            filename: "stents.pdf".into(),
            mime_type: "application/pdf".into(),
            bytes: b"%PDF-1.4 minimal test body".to_vec(),
            assent: true,
            statement: LegalStatement::Author,
        }
    }

    #[tokio::test]
    async fn test_upload_creates_unpublished_article() {
        let ctx = test_ctx();
        let processor = UploadProcessor::new(ctx.clone());
        let caller = Caller::user("jsmith");

        let pid = processor.process(pdf_request(), &caller).await.unwrap();

        let article = Article::load(ctx.clone(), &pid).await.unwrap();
        assert_eq!(article.label(), "stents.pdf");
        assert_eq!(article.owners(), ["jsmith"]);
        assert_eq!(article.state().as_str(), "unpublished");
        assert_eq!(
            article.profile().collection,
            Some(ctx.collection.clone())
        );
        // uploader prepended as first author
        assert_eq!(article.mods().authors[0].id.as_deref(), Some("jsmith"));
        assert!(article.provenance().has_event(EventKind::Uploaded));

        let stored = ctx.store.get_datastream(&pid, DS_CONTENT).await.unwrap();
        let stored = stored.unwrap();
        assert!(stored.info.checksum_md5.is_some());

        let hits = ctx
            .index
            .search(SearchQuery::new().filter("pid", pid.to_string()))
            .await
            .unwrap();
        assert_eq!(hits.total, 1);
    }

    #[tokio::test]
    async fn test_upload_requires_assent() {
        let processor = UploadProcessor::new(test_ctx());
        let mut request = pdf_request();
        request.assent = false;
        let err = processor
            .process(request, &Caller::user("jsmith"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_upload_sniffs_magic_bytes_not_mime() {
        let processor = UploadProcessor::new(test_ctx());
        let mut request = pdf_request();
        // claimed PDF, actually HTML
        request.bytes = b"<html><body>not a pdf</body></html>".to_vec();
        let err = processor
            .process(request, &Caller::user("jsmith"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_upload_requires_login() {
        let processor = UploadProcessor::new(test_ctx());
        let err = processor
            .process(pdf_request(), &Caller::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_mediated_deposit_skips_author_prepend() {
        let ctx = test_ctx();
        let processor = UploadProcessor::new(ctx.clone());
        let mut request = pdf_request();
        request.statement = LegalStatement::Mediated;
        let pid = processor
            .process(request, &Caller::user("libstaff"))
            .await
            .unwrap();
        let article = Article::load(ctx, &pid).await.unwrap();
        assert!(article.mods().authors.is_empty());
    }

    #[test]
    fn test_split_display_name() {
        assert_eq!(
            split_display_name("Jane Smith", "jsmith"),
            ("Jane".to_string(), "Smith".to_string())
        );
        assert_eq!(
            split_display_name("jsmith", "jsmith"),
            (String::new(), "jsmith".to_string())
        );
    }
}
