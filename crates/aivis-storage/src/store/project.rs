use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::entities::project::{self, Column, Entity};
use crate::entities::{alert, citation, daily_metric, keyword, tracking_job, visibility_score};
use crate::store::Store;

/// Maximum number of competitor domains a project may track.
pub const MAX_COMPETITORS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub primary_domain: String,
    pub competitor_domains: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub primary_domain: String,
    pub competitor_domains: Vec<String>,
}

/// Optional-field update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub primary_domain: Option<String>,
    pub is_active: Option<bool>,
}

fn domain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,61}[a-z0-9]\.[a-z]{2,}$").unwrap())
}

/// Lowercase a domain and strip a leading `www.`.
pub fn normalize_domain(domain: &str) -> String {
    let d = domain.trim().to_lowercase();
    d.strip_prefix("www.").unwrap_or(&d).to_string()
}

/// Normalize, then validate against the exact-domain grammar.
pub fn validate_domain(domain: &str) -> Result<String> {
    let normalized = normalize_domain(domain);
    if !domain_regex().is_match(&normalized) {
        bail!("invalid domain: {domain}");
    }
    Ok(normalized)
}

fn to_row(m: project::Model) -> Result<ProjectRow> {
    Ok(ProjectRow {
        id: m.id,
        name: m.name,
        primary_domain: m.primary_domain,
        competitor_domains: serde_json::from_str(&m.competitor_domains)?,
        is_active: m.is_active,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

impl Store {
    pub async fn insert_project(&self, new: &NewProject) -> Result<ProjectRow> {
        let primary = validate_domain(&new.primary_domain)?;
        let mut competitors = Vec::new();
        for c in &new.competitor_domains {
            let c = validate_domain(c)?;
            if c == primary {
                bail!("primary domain cannot be listed as a competitor");
            }
            if !competitors.contains(&c) {
                competitors.push(c);
            }
        }
        if competitors.len() > MAX_COMPETITORS {
            bail!("at most {MAX_COMPETITORS} competitor domains per project");
        }

        let now = Utc::now().fixed_offset();
        let am = project::ActiveModel {
            id: Set(aivis_common::id::next_id()),
            name: Set(new.name.clone()),
            primary_domain: Set(primary),
            competitor_domains: Set(serde_json::to_string(&competitors)?),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        to_row(model)
    }

    pub async fn get_project(&self, id: &str) -> Result<Option<ProjectRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_row).transpose()
    }

    pub async fn list_projects(&self, active_only: bool) -> Result<Vec<ProjectRow>> {
        let mut q = Entity::find();
        if active_only {
            q = q.filter(Column::IsActive.eq(true));
        }
        let rows = q
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    pub async fn update_project(&self, id: &str, update: &ProjectUpdate) -> Result<Option<ProjectRow>> {
        let Some(model) = Entity::find_by_id(id).one(self.db()).await? else {
            return Ok(None);
        };

        if let Some(new_primary) = &update.primary_domain {
            let normalized = validate_domain(new_primary)?;
            let competitors: Vec<String> = serde_json::from_str(&model.competitor_domains)?;
            if competitors.contains(&normalized) {
                bail!("primary domain cannot be listed as a competitor");
            }
        }

        let mut am: project::ActiveModel = model.into();
        if let Some(name) = &update.name {
            am.name = Set(name.clone());
        }
        if let Some(primary) = &update.primary_domain {
            am.primary_domain = Set(validate_domain(primary)?);
        }
        if let Some(active) = update.is_active {
            am.is_active = Set(active);
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(to_row(updated)?))
    }

    /// Delete a project and everything it owns.
    pub async fn delete_project(&self, id: &str) -> Result<bool> {
        let txn = self.db().begin().await?;

        let res = Entity::delete_by_id(id).exec(&txn).await?;
        if res.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        keyword::Entity::delete_many()
            .filter(keyword::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        citation::Entity::delete_many()
            .filter(citation::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        tracking_job::Entity::delete_many()
            .filter(tracking_job::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        daily_metric::Entity::delete_many()
            .filter(daily_metric::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        visibility_score::Entity::delete_many()
            .filter(visibility_score::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        alert::Entity::delete_many()
            .filter(alert::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(true)
    }

    pub async fn add_competitor(&self, project_id: &str, domain: &str) -> Result<ProjectRow> {
        let Some(model) = Entity::find_by_id(project_id).one(self.db()).await? else {
            bail!("project not found: {project_id}");
        };

        let normalized = validate_domain(domain)?;
        if normalized == model.primary_domain {
            bail!("primary domain cannot be listed as a competitor");
        }

        let mut competitors: Vec<String> = serde_json::from_str(&model.competitor_domains)?;
        if !competitors.contains(&normalized) {
            if competitors.len() >= MAX_COMPETITORS {
                bail!("at most {MAX_COMPETITORS} competitor domains per project");
            }
            competitors.push(normalized);
        }

        let mut am: project::ActiveModel = model.into();
        am.competitor_domains = Set(serde_json::to_string(&competitors)?);
        am.updated_at = Set(Utc::now().fixed_offset());
        to_row(am.update(self.db()).await?)
    }

    pub async fn remove_competitor(&self, project_id: &str, domain: &str) -> Result<ProjectRow> {
        let Some(model) = Entity::find_by_id(project_id).one(self.db()).await? else {
            bail!("project not found: {project_id}");
        };

        let normalized = normalize_domain(domain);
        let mut competitors: Vec<String> = serde_json::from_str(&model.competitor_domains)?;
        competitors.retain(|c| c != &normalized);

        let mut am: project::ActiveModel = model.into();
        am.competitor_domains = Set(serde_json::to_string(&competitors)?);
        am.updated_at = Set(Utc::now().fixed_offset());
        to_row(am.update(self.db()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_www_and_case() {
        assert_eq!(normalize_domain("WWW.Acme.COM"), "acme.com");
        assert_eq!(normalize_domain("acme.com"), "acme.com");
    }

    #[test]
    fn validate_rejects_bad_domains() {
        assert!(validate_domain("acme.com").is_ok());
        assert!(validate_domain("sub-brand.example.io").is_ok());
        assert!(validate_domain("not a domain").is_err());
        assert!(validate_domain("-leading.com").is_err());
        assert!(validate_domain("acme").is_err());
    }
}
