use aivis_common::types::{AlertType, Platform, Severity};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::alert::{self, Column, Entity};
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRow {
    pub id: String,
    pub project_id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub keyword_id: Option<String>,
    pub platform: Option<Platform>,
    pub citation_id: Option<String>,
    pub previous_value: Option<String>,
    pub current_value: Option<String>,
    pub change_percent: Option<f64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// An alert the diff engine wants persisted. The store stamps id and
/// created_at.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub project_id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub keyword_id: Option<String>,
    pub platform: Option<Platform>,
    pub citation_id: Option<String>,
    pub previous_value: Option<String>,
    pub current_value: Option<String>,
    pub change_percent: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub project_id: Option<String>,
    pub alert_type: Option<AlertType>,
    pub severity: Option<Severity>,
    pub unread_only: bool,
}

/// Unread alert counts grouped by severity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UnreadCounts {
    pub total: u64,
    pub by_severity: HashMap<String, u64>,
}

fn to_row(m: alert::Model) -> Result<AlertRow> {
    Ok(AlertRow {
        id: m.id,
        project_id: m.project_id,
        alert_type: m.alert_type.parse().map_err(anyhow::Error::msg)?,
        severity: m.severity.parse().map_err(anyhow::Error::msg)?,
        title: m.title,
        description: m.description,
        keyword_id: m.keyword_id,
        platform: m
            .platform
            .map(|p| p.parse().map_err(anyhow::Error::msg))
            .transpose()?,
        citation_id: m.citation_id,
        previous_value: m.previous_value,
        current_value: m.current_value,
        change_percent: m.change_percent,
        is_read: m.is_read,
        created_at: m.created_at.with_timezone(&Utc),
    })
}

impl Store {
    pub async fn insert_alert(&self, new: &NewAlert) -> Result<AlertRow> {
        let now = Utc::now().fixed_offset();
        let am = alert::ActiveModel {
            id: Set(aivis_common::id::next_id()),
            project_id: Set(new.project_id.clone()),
            alert_type: Set(new.alert_type.as_str().to_string()),
            severity: Set(new.severity.to_string()),
            title: Set(new.title.clone()),
            description: Set(new.description.clone()),
            keyword_id: Set(new.keyword_id.clone()),
            platform: Set(new.platform.map(|p| p.as_str().to_string())),
            citation_id: Set(new.citation_id.clone()),
            previous_value: Set(new.previous_value.clone()),
            current_value: Set(new.current_value.clone()),
            change_percent: Set(new.change_percent),
            is_read: Set(false),
            created_at: Set(now),
        };
        to_row(am.insert(self.db()).await?)
    }

    pub async fn list_alerts(
        &self,
        filter: &AlertFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<AlertRow>> {
        let mut q = Entity::find();
        if let Some(project_id) = &filter.project_id {
            q = q.filter(Column::ProjectId.eq(project_id));
        }
        if let Some(alert_type) = filter.alert_type {
            q = q.filter(Column::AlertType.eq(alert_type.as_str()));
        }
        if let Some(severity) = filter.severity {
            q = q.filter(Column::Severity.eq(severity.to_string()));
        }
        if filter.unread_only {
            q = q.filter(Column::IsRead.eq(false));
        }
        let rows = q
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit)
            .offset(offset)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    pub async fn unread_alert_counts(&self, project_id: &str) -> Result<UnreadCounts> {
        let rows: Vec<String> = Entity::find()
            .select_only()
            .column(Column::Severity)
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::IsRead.eq(false))
            .into_tuple()
            .all(self.db())
            .await?;

        let mut counts = UnreadCounts::default();
        for severity in rows {
            counts.total += 1;
            *counts.by_severity.entry(severity).or_insert(0) += 1;
        }
        Ok(counts)
    }

    pub async fn mark_alert_read(&self, id: &str) -> Result<bool> {
        let res = Entity::update_many()
            .col_expr(Column::IsRead, Expr::value(true))
            .filter(Column::Id.eq(id))
            .filter(Column::IsRead.eq(false))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn mark_all_alerts_read(&self, project_id: &str) -> Result<u64> {
        let res = Entity::update_many()
            .col_expr(Column::IsRead, Expr::value(true))
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::IsRead.eq(false))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    pub async fn delete_alert(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn delete_alerts_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let res = Entity::delete_many()
            .filter(Column::CreatedAt.lt(cutoff.fixed_offset()))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    pub async fn count_alerts(&self, project_id: &str) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .count(self.db())
            .await?)
    }
}
