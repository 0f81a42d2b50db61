use aivis_common::types::Platform;
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::entities::daily_metric::{self, Column, Entity};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetricRow {
    pub project_id: String,
    pub date: NaiveDate,
    pub platform: Platform,
    pub total_citations: i32,
    pub mentions: i32,
    pub avg_position: Option<f64>,
    pub positive_count: i32,
    pub neutral_count: i32,
    pub negative_count: i32,
    pub competitor_mentions: i32,
    pub avg_confidence: f64,
}

fn to_row(m: daily_metric::Model) -> Result<DailyMetricRow> {
    Ok(DailyMetricRow {
        project_id: m.project_id,
        date: m.date,
        platform: m.platform.parse().map_err(anyhow::Error::msg)?,
        total_citations: m.total_citations,
        mentions: m.mentions,
        avg_position: m.avg_position,
        positive_count: m.positive_count,
        neutral_count: m.neutral_count,
        negative_count: m.negative_count,
        competitor_mentions: m.competitor_mentions,
        avg_confidence: m.avg_confidence,
    })
}

impl Store {
    /// Idempotent upsert keyed by (project, date, platform): recomputing a
    /// day converges to the same row.
    pub async fn upsert_daily_metric(&self, row: &DailyMetricRow) -> Result<()> {
        let now = Utc::now().fixed_offset();
        let am = daily_metric::ActiveModel {
            project_id: Set(row.project_id.clone()),
            date: Set(row.date),
            platform: Set(row.platform.as_str().to_string()),
            total_citations: Set(row.total_citations),
            mentions: Set(row.mentions),
            avg_position: Set(row.avg_position),
            positive_count: Set(row.positive_count),
            neutral_count: Set(row.neutral_count),
            negative_count: Set(row.negative_count),
            competitor_mentions: Set(row.competitor_mentions),
            avg_confidence: Set(row.avg_confidence),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Entity::insert(am)
            .on_conflict(
                OnConflict::columns([Column::ProjectId, Column::Date, Column::Platform])
                    .update_columns([
                        Column::TotalCitations,
                        Column::Mentions,
                        Column::AvgPosition,
                        Column::PositiveCount,
                        Column::NeutralCount,
                        Column::NegativeCount,
                        Column::CompetitorMentions,
                        Column::AvgConfidence,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.db())
            .await?;
        Ok(())
    }

    pub async fn daily_metrics_in_range(
        &self,
        project_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        platform: Option<Platform>,
    ) -> Result<Vec<DailyMetricRow>> {
        let mut q = Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::Date.gte(from))
            .filter(Column::Date.lte(to));
        if let Some(p) = platform {
            q = q.filter(Column::Platform.eq(p.as_str()));
        }
        let rows = q.order_by(Column::Date, Order::Asc).all(self.db()).await?;
        rows.into_iter().map(to_row).collect()
    }

    pub async fn get_daily_metric(
        &self,
        project_id: &str,
        date: NaiveDate,
        platform: Platform,
    ) -> Result<Option<DailyMetricRow>> {
        let model = Entity::find_by_id((
            project_id.to_string(),
            date,
            platform.as_str().to_string(),
        ))
        .one(self.db())
        .await?;
        model.map(to_row).transpose()
    }
}
