use aivis_common::types::{CompetitorCitation, Platform, Sentiment};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entities::citation::{self, Column, Entity};
use crate::entities::keyword;
use crate::store::{KeywordRow, Store};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationRow {
    pub id: String,
    pub project_id: String,
    pub keyword_id: String,
    pub platform: Platform,
    pub tracked_at: DateTime<Utc>,
    pub domain_mentioned: bool,
    pub citation_position: Option<i32>,
    pub citation_context: Option<String>,
    pub full_response_text: String,
    pub response_summary: String,
    pub sentiment: Sentiment,
    pub confidence_score: f64,
    pub word_count: i32,
    pub competitor_citations: Vec<CompetitorCitation>,
    pub total_sources_cited: i32,
    pub response_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// Payload for one successful tracking attempt. `tracked_at` is stamped at
/// insert time so the row order matches write order.
#[derive(Debug, Clone)]
pub struct NewCitation {
    pub project_id: String,
    pub keyword_id: String,
    pub platform: Platform,
    pub domain_mentioned: bool,
    pub citation_position: Option<i32>,
    pub citation_context: Option<String>,
    pub full_response_text: String,
    pub response_summary: String,
    pub sentiment: Sentiment,
    pub confidence_score: f64,
    pub word_count: i32,
    pub competitor_citations: Vec<CompetitorCitation>,
    pub total_sources_cited: i32,
    pub response_time_ms: i64,
}

/// All inputs to one scoring run, read under a single transaction so a run
/// is internally consistent even while the worker keeps writing.
#[derive(Debug, Clone)]
pub struct ScoringSnapshot {
    pub as_of: DateTime<Utc>,
    pub citations: Vec<CitationRow>,
    pub keywords: Vec<KeywordRow>,
}

fn to_row(m: citation::Model) -> Result<CitationRow> {
    Ok(CitationRow {
        id: m.id,
        project_id: m.project_id,
        keyword_id: m.keyword_id,
        platform: m.platform.parse().map_err(anyhow::Error::msg)?,
        tracked_at: m.tracked_at.with_timezone(&Utc),
        domain_mentioned: m.domain_mentioned,
        citation_position: m.citation_position,
        citation_context: m.citation_context,
        full_response_text: m.full_response_text,
        response_summary: m.response_summary,
        sentiment: m.sentiment.parse().map_err(anyhow::Error::msg)?,
        confidence_score: m.confidence_score,
        word_count: m.word_count,
        competitor_citations: serde_json::from_str(&m.competitor_citations)?,
        total_sources_cited: m.total_sources_cited,
        response_time_ms: m.response_time_ms,
        created_at: m.created_at.with_timezone(&Utc),
    })
}

impl Store {
    pub async fn insert_citation(&self, new: &NewCitation) -> Result<CitationRow> {
        let now = Utc::now().fixed_offset();
        let am = citation::ActiveModel {
            id: Set(aivis_common::id::next_id()),
            project_id: Set(new.project_id.clone()),
            keyword_id: Set(new.keyword_id.clone()),
            platform: Set(new.platform.as_str().to_string()),
            tracked_at: Set(now),
            domain_mentioned: Set(new.domain_mentioned),
            citation_position: Set(new.citation_position),
            citation_context: Set(new.citation_context.clone()),
            full_response_text: Set(new.full_response_text.clone()),
            response_summary: Set(new.response_summary.clone()),
            sentiment: Set(new.sentiment.as_str().to_string()),
            confidence_score: Set(new.confidence_score),
            word_count: Set(new.word_count),
            competitor_citations: Set(serde_json::to_string(&new.competitor_citations)?),
            total_sources_cited: Set(new.total_sources_cited),
            response_time_ms: Set(new.response_time_ms),
            created_at: Set(now),
        };
        to_row(am.insert(self.db()).await?)
    }

    /// Most recent citation for a (keyword, platform) pair, excluding any
    /// tracked at or after `before`. This is the "previous" side of the
    /// alert diff.
    pub async fn latest_citation_before(
        &self,
        keyword_id: &str,
        platform: Platform,
        before: DateTime<Utc>,
    ) -> Result<Option<CitationRow>> {
        let model = Entity::find()
            .filter(Column::KeywordId.eq(keyword_id))
            .filter(Column::Platform.eq(platform.as_str()))
            .filter(Column::TrackedAt.lt(before.fixed_offset()))
            .order_by(Column::TrackedAt, Order::Desc)
            .one(self.db())
            .await?;
        model.map(to_row).transpose()
    }

    /// Latest citation for a (keyword, platform) pair, if any.
    pub async fn latest_citation(
        &self,
        keyword_id: &str,
        platform: Platform,
    ) -> Result<Option<CitationRow>> {
        let model = Entity::find()
            .filter(Column::KeywordId.eq(keyword_id))
            .filter(Column::Platform.eq(platform.as_str()))
            .order_by(Column::TrackedAt, Order::Desc)
            .one(self.db())
            .await?;
        model.map(to_row).transpose()
    }

    /// Citations for a project in `[from, to]`, oldest first.
    pub async fn citations_in_window(
        &self,
        project_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CitationRow>> {
        let rows = Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::TrackedAt.gte(from.fixed_offset()))
            .filter(Column::TrackedAt.lte(to.fixed_offset()))
            .order_by(Column::TrackedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    /// Read the 30-day scoring window and the keyword catalog in one
    /// transaction.
    pub async fn load_scoring_snapshot(
        &self,
        project_id: &str,
        as_of: DateTime<Utc>,
        window_days: i64,
    ) -> Result<ScoringSnapshot> {
        let txn = self.db().begin().await?;
        let from = as_of - chrono::Duration::days(window_days);

        let citations = Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::TrackedAt.gte(from.fixed_offset()))
            .filter(Column::TrackedAt.lte(as_of.fixed_offset()))
            .order_by(Column::TrackedAt, Order::Asc)
            .all(&txn)
            .await?;

        let keywords = keyword::Entity::find()
            .filter(keyword::Column::ProjectId.eq(project_id))
            .all(&txn)
            .await?;

        txn.commit().await?;

        Ok(ScoringSnapshot {
            as_of,
            citations: citations.into_iter().map(to_row).collect::<Result<_>>()?,
            keywords: keywords
                .into_iter()
                .map(crate::store::keyword::to_row)
                .collect::<Result<_>>()?,
        })
    }

    pub async fn count_citations_since(
        &self,
        project_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        use sea_orm::PaginatorTrait;
        Ok(Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::TrackedAt.gte(since.fixed_offset()))
            .count(self.db())
            .await?)
    }

    /// Drop citations older than the retention horizon. Returns rows removed.
    pub async fn delete_citations_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let res = Entity::delete_many()
            .filter(Column::TrackedAt.lt(cutoff.fixed_offset()))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
