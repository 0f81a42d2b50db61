use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::visibility_score::{self, Column, Entity};
use crate::store::Store;

/// One row of the append-only visibility score series. The "current" score
/// for a project is the newest `calculated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityScoreRow {
    pub id: String,
    pub project_id: String,
    pub calculated_at: DateTime<Utc>,
    pub overall_score: f64,
    pub grade: String,
    pub frequency_score: f64,
    pub position_score: f64,
    pub diversity_score: f64,
    pub context_score: f64,
    pub momentum_score: f64,
    pub delta_7d: Option<f64>,
    pub delta_30d: Option<f64>,
}

fn to_row(m: visibility_score::Model) -> VisibilityScoreRow {
    VisibilityScoreRow {
        id: m.id,
        project_id: m.project_id,
        calculated_at: m.calculated_at.with_timezone(&Utc),
        overall_score: m.overall_score,
        grade: m.grade,
        frequency_score: m.frequency_score,
        position_score: m.position_score,
        diversity_score: m.diversity_score,
        context_score: m.context_score,
        momentum_score: m.momentum_score,
        delta_7d: m.delta_7d,
        delta_30d: m.delta_30d,
    }
}

impl Store {
    pub async fn insert_visibility_score(&self, row: &VisibilityScoreRow) -> Result<VisibilityScoreRow> {
        let now = Utc::now().fixed_offset();
        let am = visibility_score::ActiveModel {
            id: Set(row.id.clone()),
            project_id: Set(row.project_id.clone()),
            calculated_at: Set(row.calculated_at.fixed_offset()),
            overall_score: Set(row.overall_score),
            grade: Set(row.grade.clone()),
            frequency_score: Set(row.frequency_score),
            position_score: Set(row.position_score),
            diversity_score: Set(row.diversity_score),
            context_score: Set(row.context_score),
            momentum_score: Set(row.momentum_score),
            delta_7d: Set(row.delta_7d),
            delta_30d: Set(row.delta_30d),
            created_at: Set(now),
        };
        Ok(to_row(am.insert(self.db()).await?))
    }

    pub async fn latest_visibility_score(&self, project_id: &str) -> Result<Option<VisibilityScoreRow>> {
        let model = Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .order_by(Column::CalculatedAt, Order::Desc)
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    /// Newest score calculated at or before `at`; feeds the 7/30-day deltas.
    pub async fn visibility_score_at_or_before(
        &self,
        project_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<VisibilityScoreRow>> {
        let model = Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::CalculatedAt.lte(at.fixed_offset()))
            .order_by(Column::CalculatedAt, Order::Desc)
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    pub async fn score_history(
        &self,
        project_id: &str,
        since: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<VisibilityScoreRow>> {
        let rows = Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::CalculatedAt.gte(since.fixed_offset()))
            .order_by(Column::CalculatedAt, Order::Desc)
            .limit(limit)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }
}
