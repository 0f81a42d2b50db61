use aivis_common::types::FunnelStage;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};

use crate::entities::keyword::{self, Column, Entity};
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRow {
    pub id: String,
    pub project_id: String,
    pub keyword_text: String,
    pub priority_level: i32,
    pub funnel_stage: FunnelStage,
    pub is_active: bool,
    pub last_tracked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewKeyword {
    pub project_id: String,
    pub keyword_text: String,
    pub priority_level: i32,
    pub funnel_stage: FunnelStage,
}

#[derive(Debug, Clone, Default)]
pub struct KeywordUpdate {
    pub keyword_text: Option<String>,
    pub priority_level: Option<i32>,
    pub funnel_stage: Option<FunnelStage>,
    pub is_active: Option<bool>,
}

pub(crate) fn to_row(m: keyword::Model) -> Result<KeywordRow> {
    Ok(KeywordRow {
        id: m.id,
        project_id: m.project_id,
        keyword_text: m.keyword_text,
        priority_level: m.priority_level,
        funnel_stage: m.funnel_stage.parse().map_err(anyhow::Error::msg)?,
        is_active: m.is_active,
        last_tracked_at: m.last_tracked_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

impl Store {
    pub async fn insert_keyword(&self, new: &NewKeyword) -> Result<KeywordRow> {
        let text = new.keyword_text.trim();
        if text.is_empty() {
            bail!("keyword text must not be empty");
        }
        if !(1..=5).contains(&new.priority_level) {
            bail!("priority level must be in 1..=5");
        }

        let now = Utc::now().fixed_offset();
        let am = keyword::ActiveModel {
            id: Set(aivis_common::id::next_id()),
            project_id: Set(new.project_id.clone()),
            keyword_text: Set(text.to_string()),
            priority_level: Set(new.priority_level),
            funnel_stage: Set(new.funnel_stage.as_str().to_string()),
            is_active: Set(true),
            last_tracked_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        to_row(model)
    }

    pub async fn get_keyword(&self, id: &str) -> Result<Option<KeywordRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_row).transpose()
    }

    /// Active keywords for a project, highest priority first so planner
    /// batches enqueue important keywords ahead of the rest.
    pub async fn list_active_keywords(&self, project_id: &str) -> Result<Vec<KeywordRow>> {
        let rows = Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::IsActive.eq(true))
            .order_by(Column::PriorityLevel, Order::Desc)
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    pub async fn list_keywords(&self, project_id: &str) -> Result<Vec<KeywordRow>> {
        let rows = Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    pub async fn update_keyword(&self, id: &str, update: &KeywordUpdate) -> Result<Option<KeywordRow>> {
        let Some(model) = Entity::find_by_id(id).one(self.db()).await? else {
            return Ok(None);
        };

        let mut am: keyword::ActiveModel = model.into();
        if let Some(text) = &update.keyword_text {
            let text = text.trim();
            if text.is_empty() {
                bail!("keyword text must not be empty");
            }
            am.keyword_text = Set(text.to_string());
        }
        if let Some(level) = update.priority_level {
            if !(1..=5).contains(&level) {
                bail!("priority level must be in 1..=5");
            }
            am.priority_level = Set(level);
        }
        if let Some(stage) = update.funnel_stage {
            am.funnel_stage = Set(stage.as_str().to_string());
        }
        if let Some(active) = update.is_active {
            am.is_active = Set(active);
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        Ok(Some(to_row(am.update(self.db()).await?)?))
    }

    pub async fn delete_keyword(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    /// Stamp `last_tracked_at` once per tracking pass, after all requested
    /// platforms have been attempted.
    pub async fn touch_keyword_tracked(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let Some(model) = Entity::find_by_id(id).one(self.db()).await? else {
            return Ok(());
        };
        let mut am: keyword::ActiveModel = model.into();
        am.last_tracked_at = Set(Some(at.fixed_offset()));
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        Ok(())
    }
}
