//! Repository pattern for database operations
//!
//! All access to the statistics and harvest tables goes through here,
//! with the concurrency-sensitive paths (counter increments, harvest
//! status transitions) expressed as atomic queries or row-locked
//! transactions.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{RepoError, Result};
use chrono::{DateTime, Datelike, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionTrait,
};
use serde::{Deserialize, Serialize};

/// One entry of a top-viewed / top-downloaded listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidCount {
    pub pid: String,
    pub count: i64,
}

/// `(year, quarter)` of a timestamp; quarters are 1 through 4
pub fn year_quarter(at: DateTime<Utc>) -> (i32, i16) {
    (at.year(), ((at.month0() / 3) + 1) as i16)
}

#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        &self.pool.conn
    }

    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Statistics Operations
    // ========================================================================

    /// Atomic counter bump keyed on (pid, year, quarter); concurrent
    /// increments serialize on the unique key and none are lost.
    async fn increment(&self, pid: &str, column: &str, at: DateTime<Utc>) -> Result<()> {
        let (year, quarter) = year_quarter(at);
        let sql = format!(
            "INSERT INTO article_statistics (pid, year, quarter, num_views, num_downloads) \
             VALUES ($1, $2, $3, {views}, {downloads}) \
             ON CONFLICT (pid, year, quarter) \
             DO UPDATE SET {column} = article_statistics.{column} + 1",
            views = if column == "num_views" { 1 } else { 0 },
            downloads = if column == "num_downloads" { 1 } else { 0 },
        );
        self.conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                [pid.into(), year.into(), (quarter as i32).into()],
            ))
            .await?;
        Ok(())
    }

    pub async fn record_view(&self, pid: &str) -> Result<()> {
        self.increment(pid, "num_views", Utc::now()).await
    }

    pub async fn record_download(&self, pid: &str) -> Result<()> {
        self.increment(pid, "num_downloads", Utc::now()).await
    }

    /// Lifetime (views, downloads) for one article
    pub async fn totals(&self, pid: &str) -> Result<(i64, i64)> {
        let rows = ArticleStatisticsEntity::find()
            .filter(ArticleStatisticsColumn::Pid.eq(pid))
            .all(self.conn())
            .await?;
        Ok(rows.iter().fold((0, 0), |(views, downloads), row| {
            (views + row.num_views, downloads + row.num_downloads)
        }))
    }

    pub async fn top_downloaded(&self, limit: u64) -> Result<Vec<PidCount>> {
        self.top_by("num_downloads", limit).await
    }

    pub async fn top_viewed(&self, limit: u64) -> Result<Vec<PidCount>> {
        self.top_by("num_views", limit).await
    }

    async fn top_by(&self, column: &str, limit: u64) -> Result<Vec<PidCount>> {
        let sql = format!(
            "SELECT pid, SUM({column}) AS count FROM article_statistics \
             GROUP BY pid ORDER BY count DESC LIMIT $1"
        );
        let rows = self
            .conn()
            .query_all(Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                [(limit as i64).into()],
            ))
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(PidCount {
                pid: row.try_get("", "pid")?,
                count: row.try_get("", "count")?,
            });
        }
        Ok(out)
    }

    /// Fold `from_pid`'s counters into `to_pid`, summing per
    /// (year, quarter), then drop the source rows. Used when a duplicate
    /// object is merged into the authoritative one.
    pub async fn transfer_statistics(&self, from_pid: &str, to_pid: &str) -> Result<()> {
        let txn = self.conn().begin().await?;
        let rows = ArticleStatisticsEntity::find()
            .filter(ArticleStatisticsColumn::Pid.eq(from_pid))
            .all(&txn)
            .await?;
        for row in &rows {
            txn.execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "INSERT INTO article_statistics (pid, year, quarter, num_views, num_downloads) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (pid, year, quarter) \
                 DO UPDATE SET num_views = article_statistics.num_views + EXCLUDED.num_views, \
                               num_downloads = article_statistics.num_downloads + EXCLUDED.num_downloads",
                [
                    to_pid.into(),
                    row.year.into(),
                    (row.quarter as i32).into(),
                    row.num_views.into(),
                    row.num_downloads.into(),
                ],
            ))
            .await?;
        }
        ArticleStatisticsEntity::delete_many()
            .filter(ArticleStatisticsColumn::Pid.eq(from_pid))
            .exec(&txn)
            .await?;
        txn.commit().await?;
        Ok(())
    }

    // ========================================================================
    // Harvest Record Operations
    // ========================================================================

    /// Record a newly harvested article. Ok(None) when the pmcid is
    /// already known.
    pub async fn record_harvest(
        &self,
        pmcid: i64,
        title: String,
        author_logins: Vec<String>,
        fulltext: bool,
        content: Option<String>,
    ) -> Result<Option<HarvestRecord>> {
        let existing = HarvestRecordEntity::find()
            .filter(HarvestRecordColumn::Pmcid.eq(pmcid))
            .one(self.conn())
            .await?;
        if existing.is_some() {
            return Ok(None);
        }
        let record = HarvestRecordActiveModel {
            pmcid: Set(pmcid),
            title: Set(title),
            authors: Set(serde_json::json!(author_logins)),
            harvested: Set(Utc::now().into()),
            status: Set(HarvestStatus::Harvested.into()),
            fulltext: Set(fulltext),
            content: Set(content),
            ..Default::default()
        };
        Ok(Some(record.insert(self.conn()).await?))
    }

    pub async fn find_harvest_by_pmcid(&self, pmcid: i64) -> Result<Option<HarvestRecord>> {
        HarvestRecordEntity::find()
            .filter(HarvestRecordColumn::Pmcid.eq(pmcid))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Records waiting for review, newest harvest first
    pub async fn pending_harvests(&self, limit: u64) -> Result<Vec<HarvestRecord>> {
        HarvestRecordEntity::find()
            .filter(HarvestRecordColumn::Status.eq(String::from(HarvestStatus::Harvested)))
            .order_by_desc(HarvestRecordColumn::Harvested)
            .limit(limit)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Claim a harvested record for ingest: `harvested -> in_process`.
    ///
    /// The row lock serializes concurrent attempts; exactly one claims
    /// the record, the rest get `Conflict`.
    pub async fn begin_harvest_ingest(&self, pmcid: i64) -> Result<HarvestRecord> {
        let txn = self.conn().begin().await?;
        let record = HarvestRecordEntity::find()
            .filter(HarvestRecordColumn::Pmcid.eq(pmcid))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| RepoError::NotFound {
                resource_type: "harvest record".into(),
                id: pmcid.to_string(),
            })?;
        if record.harvest_status() != HarvestStatus::Harvested {
            txn.rollback().await?;
            return Err(RepoError::Conflict {
                message: format!(
                    "Record PMC{pmcid} cannot be ingested: status is {}",
                    record.status
                ),
            });
        }
        let mut active: HarvestRecordActiveModel = record.into();
        active.status = Set(HarvestStatus::InProcess.into());
        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Finish a claimed ingest; the raw content has served its purpose
    pub async fn mark_ingested(&self, pmcid: i64) -> Result<()> {
        self.set_status(pmcid, HarvestStatus::InProcess, HarvestStatus::Ingested, true)
            .await
    }

    /// Release a claim after a failed ingest so the record can be retried
    pub async fn revert_to_harvested(&self, pmcid: i64) -> Result<()> {
        self.set_status(pmcid, HarvestStatus::InProcess, HarvestStatus::Harvested, false)
            .await
    }

    /// Reviewer rejection of a pending record
    pub async fn mark_ignored(&self, pmcid: i64) -> Result<()> {
        self.set_status(pmcid, HarvestStatus::Harvested, HarvestStatus::Ignored, true)
            .await
    }

    async fn set_status(
        &self,
        pmcid: i64,
        from: HarvestStatus,
        to: HarvestStatus,
        drop_content: bool,
    ) -> Result<()> {
        let txn = self.conn().begin().await?;
        let record = HarvestRecordEntity::find()
            .filter(HarvestRecordColumn::Pmcid.eq(pmcid))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| RepoError::NotFound {
                resource_type: "harvest record".into(),
                id: pmcid.to_string(),
            })?;
        if record.harvest_status() != from {
            txn.rollback().await?;
            return Err(RepoError::Conflict {
                message: format!(
                    "Record PMC{pmcid} is {}, expected {}",
                    record.status,
                    String::from(from)
                ),
            });
        }
        let mut active: HarvestRecordActiveModel = record.into();
        active.status = Set(to.into());
        if drop_content {
            active.content = Set(None);
        }
        active.update(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    // ========================================================================
    // Featured Article Operations
    // ========================================================================

    pub async fn feature_article(&self, pid: &str) -> Result<()> {
        let existing = FeaturedArticleEntity::find()
            .filter(FeaturedArticleColumn::Pid.eq(pid))
            .one(self.conn())
            .await?;
        if existing.is_none() {
            let marker = FeaturedArticleActiveModel {
                pid: Set(pid.to_string()),
                ..Default::default()
            };
            marker.insert(self.conn()).await?;
        }
        Ok(())
    }

    pub async fn unfeature_article(&self, pid: &str) -> Result<()> {
        FeaturedArticleEntity::delete_many()
            .filter(FeaturedArticleColumn::Pid.eq(pid))
            .exec(self.conn())
            .await?;
        Ok(())
    }

    pub async fn featured_pids(&self) -> Result<Vec<String>> {
        let rows = FeaturedArticleEntity::find().all(self.conn()).await?;
        Ok(rows.into_iter().map(|r| r.pid).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_year_quarter_boundaries() {
        let cases = [
            ((2024, 1, 1), (2024, 1)),
            ((2024, 3, 31), (2024, 1)),
            ((2024, 4, 1), (2024, 2)),
            ((2024, 9, 30), (2024, 3)),
            ((2024, 10, 1), (2024, 4)),
            ((2024, 12, 31), (2024, 4)),
        ];
        for ((y, m, d), expected) in cases {
            let at = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
            assert_eq!(year_quarter(at), expected, "{y}-{m}-{d}");
        }
    }
}
