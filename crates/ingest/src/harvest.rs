//! Harvested-record ingest pipeline
//!
//! Turns a reviewed PubMed Central harvest record into a repository
//! article. The record is claimed (`harvested` -> `in_process`) before
//! any object-store work begins, so two reviewers cannot ingest the
//! same record; on any failure the claim is released and the record
//! returns to the review queue.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use openrepo_common::auth::{Caller, CAP_HARVEST_INGEST};
use openrepo_common::db::models::HarvestRecord;
use openrepo_common::db::Repository;
use openrepo_common::errors::Result;
use openrepo_common::metrics;
use openrepo_common::pidman::Pid;
use openrepo_common::RepoContext;
use openrepo_publication::mods::Author;
use openrepo_publication::{Article, Indexer};

/// Ingests reviewed harvest records as unpublished articles.
pub struct HarvestProcessor {
    ctx: Arc<RepoContext>,
    repo: Arc<Repository>,
    indexer: Indexer,
}

impl HarvestProcessor {
    pub fn new(ctx: Arc<RepoContext>, repo: Arc<Repository>) -> Self {
        let indexer = Indexer::new(ctx.clone());
        Self { ctx, repo, indexer }
    }

    /// Ingest the record for `pmcid`, returning the new article's pid.
    ///
    /// Requires the `harvest.ingest` capability and a record in
    /// `harvested` status; anything else is a conflict. The new
    /// article starts unpublished so a curator can finish the metadata
    /// before it goes live.
    #[instrument(skip(self, caller), fields(caller = caller.login.as_deref()))]
    pub async fn process(&self, pmcid: i64, caller: &Caller) -> Result<Pid> {
        caller.require_capability(CAP_HARVEST_INGEST)?;
        let login = caller.require_login()?;
        let started = Instant::now();

        let record = self.repo.begin_harvest_ingest(pmcid).await?;

        match self.ingest_record(&record, login, caller).await {
            Ok(pid) => {
                self.repo.mark_ingested(pmcid).await?;
                metrics::record_ingest(started.elapsed().as_secs_f64(), "harvest");
                info!(pmcid, pid = %pid, "harvest record ingested");
                Ok(pid)
            }
            Err(err) => {
                warn!(pmcid, error = %err, "harvest ingest failed, releasing claim");
                if let Err(revert_err) = self.repo.revert_to_harvested(pmcid).await {
                    warn!(pmcid, error = %revert_err, "could not release harvest claim");
                }
                Err(err)
            }
        }
    }

    async fn ingest_record(
        &self,
        record: &HarvestRecord,
        login: &str,
        caller: &Caller,
    ) -> Result<Pid> {
        let mut article = Article::create(self.ctx.clone(), &record.title).await?;

        populate_from_record(&mut article, record);
        article.attach_to_collection(self.ctx.collection.clone());
        article
            .provenance_mut()
            .harvested(login, caller.event_name(), record.pmcid);

        article.save("harvest ingest", caller).await?;
        self.indexer.submit(&article).await?;
        Ok(article.pid().clone())
    }
}

/// Copy the harvested metadata onto a fresh article.
///
/// Matched repository users are recorded by login alone; family and
/// given names are filled in during curation. The PMC identifiers make
/// the article findable by its source id before that happens.
fn populate_from_record(article: &mut Article, record: &HarvestRecord) {
    article.mods_mut().set_title(&record.title);
    for login in record.author_logins() {
        article.mods_mut().authors.push(Author {
            id: Some(login.clone()),
            family_name: login,
            given_name: String::new(),
            affiliation: None,
        });
    }
    article.dc_mut().add_identifier(format!("PMC{}", record.pmcid));
    article.dc_mut().add_identifier(record.access_url());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use openrepo_common::config::{PidmanConfig, RepositoryConfig};
    use openrepo_common::db::DbPool;
    use openrepo_common::errors::RepoError;
    use openrepo_common::fedora::{MemoryStore, ObjectState};
    use openrepo_common::pidman::Minter;
    use openrepo_common::solr::MemoryIndex;
    use sea_orm::DatabaseConnection;

    fn test_ctx() -> Arc<RepoContext> {
        let repository = RepositoryConfig {
            pidspace: "oe".into(),
            collection_pid: "oe:collection".into(),
            admin_users: vec![],
            harvest_users: vec!["pmcbot".into()],
            reports_dir: "/tmp/openrepo-reports".into(),
            base_url: "https://openrepo.example.edu".into(),
        };
        let pidman = PidmanConfig {
            host: None,
            domain: None,
            naan: "25593".into(),
            dev_fallback: true,
            timeout_secs: 10,
        };
        let ctx = RepoContext::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryIndex::new()),
            Arc::new(Minter::new(pidman).unwrap()),
            &repository,
        )
        .unwrap();
        Arc::new(ctx)
    }

    fn disconnected_repo() -> Arc<Repository> {
        // Never reached by tests that fail authorization first.
        Arc::new(Repository::new(DbPool {
            conn: DatabaseConnection::Disconnected,
        }))
    }

    fn sample_record() -> HarvestRecord {
        HarvestRecord {
            id: 1,
            pmcid: 2001395,
            title: "Mouse Tracking in Open Field Trials".into(),
            authors: serde_json::json!(["jsmith", "mmouse"]),
            harvested: Utc::now().into(),
            status: "in_process".into(),
            fulltext: true,
            content: Some("<article/>".into()),
        }
    }

    #[tokio::test]
    async fn test_capability_required() {
        let processor = HarvestProcessor::new(test_ctx(), disconnected_repo());
        let err = processor
            .process(2001395, &Caller::user("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_anonymous_rejected() {
        let processor = HarvestProcessor::new(test_ctx(), disconnected_repo());
        let err = processor.process(2001395, &Caller::anonymous()).await.unwrap_err();
        assert!(matches!(err, RepoError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_ingest_record_builds_unpublished_article() {
        let ctx = test_ctx();
        let processor = HarvestProcessor::new(ctx.clone(), disconnected_repo());
        let record = sample_record();
        let caller = Caller::user("pmcbot");

        let pid = processor
            .ingest_record(&record, "pmcbot", &caller)
            .await
            .unwrap();

        let article = Article::load(ctx.clone(), &pid).await.unwrap();
        assert_eq!(article.state(), ObjectState::Unpublished);
        assert_eq!(
            article.mods().full_title().as_deref(),
            Some("Mouse Tracking in Open Field Trials")
        );
        assert_eq!(article.pmcid(), Some(2001395));
        assert!(article
            .dc()
            .identifiers
            .iter()
            .any(|id| id == "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC2001395/"));
        assert!(article
            .provenance()
            .events
            .iter()
            .any(|e| e.detail.contains("Harvested PMC2001395")));
    }

    #[tokio::test]
    async fn test_authors_recorded_by_login() {
        let ctx = test_ctx();
        let record = sample_record();
        let mut article = Article::create(ctx, &record.title).await.unwrap();
        populate_from_record(&mut article, &record);

        let ids: Vec<_> = article
            .mods()
            .authors
            .iter()
            .map(|a| a.id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["jsmith", "mmouse"]);
        assert!(article.mods().authors.iter().all(|a| !a.family_name.is_empty()));
    }
}
