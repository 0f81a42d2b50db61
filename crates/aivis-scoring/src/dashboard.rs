//! Dashboard reads: assembled views over scores, metrics, share of voice
//! and alerts. These endpoints serve the last successfully computed values;
//! staleness is visible through `calculated_at`.

use crate::score::SCORING_WINDOW_DAYS;
use crate::trends::{ShareOfVoiceEntry, TrendingKeyword};
use crate::ScoringService;
use aivis_common::types::Platform;
use aivis_storage::{DailyMetricRow, ProjectRow, UnreadCounts, VisibilityScoreRow};
use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub project: ProjectRow,
    pub latest_score: Option<VisibilityScoreRow>,
    pub share_of_voice: Vec<ShareOfVoiceEntry>,
    pub trending: Vec<TrendingKeyword>,
    pub unread_alerts: UnreadCounts,
    pub citations_30d: u64,
}

impl ScoringService {
    /// Assemble the dashboard from the latest persisted values. Never
    /// triggers a recompute; see [`Self::refresh_dashboard`].
    pub async fn get_dashboard(&self, project_id: &str) -> Result<DashboardSummary> {
        let Some(project) = self.store().get_project(project_id).await? else {
            anyhow::bail!("project not found: {project_id}");
        };

        let latest_score = self.store().latest_visibility_score(project_id).await?;
        let share_of_voice = self.share_of_voice(project_id).await?;
        let trending = self.trending_keywords(project_id, 5).await?;
        let unread_alerts = self.store().unread_alert_counts(project_id).await?;
        let citations_30d = self
            .store()
            .count_citations_since(project_id, Utc::now() - Duration::days(SCORING_WINDOW_DAYS))
            .await?;

        Ok(DashboardSummary {
            project,
            latest_score,
            share_of_voice,
            trending,
            unread_alerts,
            citations_30d,
        })
    }

    /// Recompute the score and today's metrics, then return the fresh
    /// dashboard.
    pub async fn refresh_dashboard(&self, project_id: &str) -> Result<DashboardSummary> {
        self.compute_visibility_score(project_id, None).await?;
        self.generate_daily_metrics(project_id, Utc::now().date_naive())
            .await?;
        self.get_dashboard(project_id).await
    }

    pub async fn score_history(
        &self,
        project_id: &str,
        days: i64,
    ) -> Result<Vec<VisibilityScoreRow>> {
        self.store()
            .score_history(project_id, Utc::now() - Duration::days(days), 1000)
            .await
    }

    pub async fn daily_metrics(
        &self,
        project_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        platform: Option<Platform>,
    ) -> Result<Vec<DailyMetricRow>> {
        self.store()
            .daily_metrics_in_range(project_id, from, to, platform)
            .await
    }

    /// Daily metric series over the trailing `days`, optionally narrowed to
    /// one platform.
    pub async fn get_trends(
        &self,
        project_id: &str,
        platform: Option<Platform>,
        days: i64,
    ) -> Result<Vec<DailyMetricRow>> {
        let to = Utc::now().date_naive();
        let from = to - Duration::days(days);
        self.daily_metrics(project_id, from, to, platform).await
    }
}
