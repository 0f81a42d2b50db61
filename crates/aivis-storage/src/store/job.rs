use aivis_common::types::{JobStatus, Platform};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DbErr, EntityTrait, Order, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::keyword;
use crate::entities::tracking_job::{self, Column, Entity};
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingJobRow {
    pub id: String,
    pub project_id: String,
    pub keyword_id: String,
    pub platform: Platform,
    pub status: JobStatus,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub citation_found: Option<bool>,
    pub result_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub project_id: String,
    pub keyword_id: String,
    pub platform: Platform,
    pub scheduled_at: DateTime<Utc>,
}

/// Job counts for the status endpoint, keyed by (platform, status).
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobCounts {
    pub by_platform_status: HashMap<String, u64>,
}

/// Tracking progress for one project, as surfaced to the API layer.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingStatus {
    pub total_keywords: u64,
    pub tracked_keywords: u64,
    pub pending_keywords: u64,
    pub last_track_time: Option<DateTime<Utc>>,
    /// (platform, status) job counts over the trailing 24 hours.
    pub last_24h: JobCounts,
}

fn to_row(m: tracking_job::Model) -> Result<TrackingJobRow> {
    Ok(TrackingJobRow {
        id: m.id,
        project_id: m.project_id,
        keyword_id: m.keyword_id,
        platform: m.platform.parse().map_err(anyhow::Error::msg)?,
        status: m.status.parse().map_err(anyhow::Error::msg)?,
        scheduled_at: m.scheduled_at.with_timezone(&Utc),
        started_at: m.started_at.map(|t| t.with_timezone(&Utc)),
        completed_at: m.completed_at.map(|t| t.with_timezone(&Utc)),
        retry_count: m.retry_count,
        error_message: m.error_message,
        citation_found: m.citation_found,
        result_data: m.result_data.as_deref().map(serde_json::from_str).transpose()?,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

impl Store {
    /// Insert a pending job. Enqueuing a (project, keyword, platform,
    /// scheduled_at) that already exists in a non-terminal state is a
    /// no-op; the partial unique index enforces it and we swallow the
    /// conflict. Returns whether a row was actually created.
    pub async fn insert_job(&self, new: &NewJob) -> Result<bool> {
        let now = Utc::now().fixed_offset();
        let am = tracking_job::ActiveModel {
            id: Set(aivis_common::id::next_id()),
            project_id: Set(new.project_id.clone()),
            keyword_id: Set(new.keyword_id.clone()),
            platform: Set(new.platform.as_str().to_string()),
            status: Set(JobStatus::Pending.as_str().to_string()),
            scheduled_at: Set(new.scheduled_at.fixed_offset()),
            started_at: Set(None),
            completed_at: Set(None),
            retry_count: Set(0),
            error_message: Set(None),
            citation_found: Set(None),
            result_data: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let res = Entity::insert(am)
            .on_conflict(OnConflict::new().do_nothing().to_owned())
            .exec(self.db())
            .await;
        match res {
            Ok(_) => Ok(true),
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<TrackingJobRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_row).transpose()
    }

    /// Jobs ready to run: pending or retrying, scheduled at or before `now`,
    /// oldest first.
    pub async fn due_jobs(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<TrackingJobRow>> {
        let rows = Entity::find()
            .filter(
                Column::Status
                    .eq(JobStatus::Pending.as_str())
                    .or(Column::Status.eq(JobStatus::Retrying.as_str())),
            )
            .filter(Column::ScheduledAt.lte(now.fixed_offset()))
            .order_by(Column::ScheduledAt, Order::Asc)
            .limit(limit)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    /// Atomically transition a job from pending/retrying to processing.
    /// Returns false when the row is already processing or terminal, which
    /// tells the worker to discard the (at-least-once) delivery.
    pub async fn claim_job(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let res = Entity::update_many()
            .col_expr(Column::Status, Expr::value(JobStatus::Processing.as_str()))
            .col_expr(Column::StartedAt, Expr::value(now.fixed_offset()))
            .col_expr(Column::UpdatedAt, Expr::value(now.fixed_offset()))
            .filter(Column::Id.eq(id))
            .filter(
                Column::Status
                    .eq(JobStatus::Pending.as_str())
                    .or(Column::Status.eq(JobStatus::Retrying.as_str())),
            )
            .exec(self.db())
            .await?;
        Ok(res.rows_affected == 1)
    }

    pub async fn complete_job(
        &self,
        id: &str,
        citation_found: bool,
        result_data: Option<&serde_json::Value>,
    ) -> Result<()> {
        let now = Utc::now().fixed_offset();
        let mut update = Entity::update_many()
            .col_expr(Column::Status, Expr::value(JobStatus::Completed.as_str()))
            .col_expr(Column::CompletedAt, Expr::value(now))
            .col_expr(Column::CitationFound, Expr::value(citation_found))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id));
        if let Some(data) = result_data {
            update = update.col_expr(Column::ResultData, Expr::value(data.to_string()));
        }
        update.exec(self.db()).await?;
        Ok(())
    }

    /// Record a failed attempt: bump retry_count, keep the job alive as
    /// `retrying` with a new `scheduled_at` when allowed, otherwise mark it
    /// terminally `failed`.
    pub async fn fail_job(
        &self,
        id: &str,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<TrackingJobRow> {
        let Some(model) = Entity::find_by_id(id).one(self.db()).await? else {
            anyhow::bail!("tracking job not found: {id}");
        };
        let now = Utc::now().fixed_offset();

        let mut am: tracking_job::ActiveModel = model.into();
        am.retry_count = Set(am.retry_count.take().unwrap_or(0) + 1);
        am.error_message = Set(Some(error.to_string()));
        am.updated_at = Set(now);
        match retry_at {
            Some(at) => {
                am.status = Set(JobStatus::Retrying.as_str().to_string());
                am.scheduled_at = Set(at.fixed_offset());
            }
            None => {
                am.status = Set(JobStatus::Failed.as_str().to_string());
                am.completed_at = Set(Some(now));
            }
        }
        to_row(am.update(self.db()).await?)
    }

    /// Requeue `processing` rows whose worker died: anything started before
    /// `stale_before` goes back to `retrying` for immediate pickup.
    pub async fn reap_stale_jobs(&self, stale_before: DateTime<Utc>) -> Result<u64> {
        let now = Utc::now().fixed_offset();
        let res = Entity::update_many()
            .col_expr(Column::Status, Expr::value(JobStatus::Retrying.as_str()))
            .col_expr(Column::ScheduledAt, Expr::value(now))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Status.eq(JobStatus::Processing.as_str()))
            .filter(Column::StartedAt.lt(stale_before.fixed_offset()))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    /// (platform, status) job counts for a project since `since`.
    pub async fn job_counts_since(
        &self,
        project_id: &str,
        since: DateTime<Utc>,
    ) -> Result<JobCounts> {
        let rows: Vec<(String, String)> = Entity::find()
            .select_only()
            .column(Column::Platform)
            .column(Column::Status)
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::CreatedAt.gte(since.fixed_offset()))
            .into_tuple()
            .all(self.db())
            .await?;

        let mut counts = JobCounts::default();
        for (platform, status) in rows {
            *counts
                .by_platform_status
                .entry(format!("{platform}:{status}"))
                .or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Keyword coverage plus last-24h job counts for one project.
    pub async fn tracking_status(&self, project_id: &str) -> Result<TrackingStatus> {
        let keywords = keyword::Entity::find()
            .filter(keyword::Column::ProjectId.eq(project_id))
            .filter(keyword::Column::IsActive.eq(true))
            .all(self.db())
            .await?;

        let total = keywords.len() as u64;
        let tracked = keywords.iter().filter(|k| k.last_tracked_at.is_some()).count() as u64;
        let last_track_time = keywords
            .iter()
            .filter_map(|k| k.last_tracked_at)
            .max()
            .map(|t| t.with_timezone(&Utc));

        let last_24h = self
            .job_counts_since(project_id, Utc::now() - chrono::Duration::hours(24))
            .await?;

        Ok(TrackingStatus {
            total_keywords: total,
            tracked_keywords: tracked,
            pending_keywords: total.saturating_sub(tracked),
            last_track_time,
            last_24h,
        })
    }

    pub async fn delete_jobs_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let res = Entity::delete_many()
            .filter(Column::CreatedAt.lt(cutoff.fixed_offset()))
            .filter(
                Column::Status
                    .eq(JobStatus::Completed.as_str())
                    .or(Column::Status.eq(JobStatus::Failed.as_str())),
            )
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
