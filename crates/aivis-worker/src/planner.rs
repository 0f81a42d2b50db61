//! Planner loops: periodic single-writer ticks that turn the keyword
//! catalog into pending tracking jobs, keep scores fresh, and enforce
//! retention. Planners do no provider work themselves, and every tick is
//! idempotent: re-planning an already-open (project, keyword, platform,
//! scheduled_at) is a no-op.

use crate::config::{parse_daily_time, WorkerConfig};
use crate::queue::Broker;
use aivis_common::types::{JobMessage, Platform};
use aivis_scoring::ScoringService;
use aivis_storage::Store;
use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// How often the daily-tracker loop checks whether it is due.
const DAILY_TICK_SECS: u64 = 60;
const SCORE_PERIOD_SECS: u64 = 6 * 3600;
const RETENTION_PERIOD_SECS: u64 = 7 * 24 * 3600;

/// Spacing between keyword starts in a project-wide batch, to smooth
/// upstream load.
const KEYWORD_SPACING_SECS: i64 = 1;

/// Bulk scheduling request, deduplicated against open jobs.
#[derive(Debug, Clone)]
pub struct ScheduleJobsRequest {
    pub project_id: String,
    /// All active keywords of the project when empty.
    pub keyword_ids: Vec<String>,
    /// All registered platforms when empty.
    pub platforms: Vec<Platform>,
    /// Immediate when absent.
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Project-wide tracking request. The batch is enqueued through the
/// broker; nothing runs in the caller's context.
#[derive(Debug, Clone)]
pub struct TrackProjectRequest {
    pub project_id: String,
    /// All registered platforms when empty.
    pub platforms: Vec<Platform>,
    /// Glob over the keyword text, e.g. `*pricing*`.
    pub keyword_filter: Option<String>,
}

/// Returned immediately from [`Planner::track_project`]; progress is
/// visible through the tracking status of the project.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackProjectHandle {
    pub project_id: String,
    pub jobs_created: u32,
    pub first_scheduled_at: DateTime<Utc>,
}

pub struct Planner {
    store: Arc<Store>,
    broker: Arc<dyn Broker>,
    scoring: Arc<ScoringService>,
    platforms: Vec<Platform>,
    config: WorkerConfig,
}

impl Planner {
    pub fn new(
        store: Arc<Store>,
        broker: Arc<dyn Broker>,
        scoring: Arc<ScoringService>,
        platforms: Vec<Platform>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            broker,
            scoring,
            platforms,
            config,
        }
    }

    // ---- daily tracker ----

    /// Once per day at the configured local time, plan one job per
    /// (active keyword × registered platform) across active projects.
    /// Exactly-once per day: the last planned date gates re-entry, so a
    /// slow tick delays but never double-runs.
    pub async fn run_daily_tracker(&self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(Duration::from_secs(DAILY_TICK_SECS));
        let mut last_planned: Option<NaiveDate> = None;

        tracing::info!(
            at = %self.config.daily_tracking_time,
            "Daily tracking planner started"
        );

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }

            let now = Utc::now();
            if !self.daily_run_due(now, last_planned) {
                continue;
            }

            match self.plan_daily_batch(now).await {
                Ok(planned) => {
                    last_planned = Some(now.date_naive());
                    tracing::info!(planned, "Daily tracking batch planned");
                }
                Err(e) => {
                    // Skip this tick; the next period retries
                    tracing::error!(error = %e, "Daily planner tick failed");
                }
            }
        }
    }

    fn daily_run_due(&self, now: DateTime<Utc>, last_planned: Option<NaiveDate>) -> bool {
        if last_planned == Some(now.date_naive()) {
            return false;
        }
        let (hour, minute) = match parse_daily_time(&self.config.daily_tracking_time) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable daily tracking time, defaulting to 02:00");
                (2, 0)
            }
        };
        now.hour() > hour || (now.hour() == hour && now.minute() >= minute)
    }

    /// One batch: every active project, every active keyword not freshly
    /// tracked, every registered platform.
    pub async fn plan_daily_batch(&self, now: DateTime<Utc>) -> Result<u32> {
        let freshness_floor = now - ChronoDuration::hours(self.config.tracking_interval_hours);
        let mut planned = 0u32;

        for project in self.store.list_projects(true).await? {
            let keywords = self.store.list_active_keywords(&project.id).await?;
            for keyword in keywords {
                if keyword
                    .last_tracked_at
                    .is_some_and(|tracked| tracked > freshness_floor)
                {
                    continue;
                }
                for &platform in &self.platforms {
                    let created = self
                        .broker
                        .enqueue(&JobMessage {
                            job_id: String::new(),
                            project_id: project.id.clone(),
                            keyword_id: keyword.id.clone(),
                            platform,
                            scheduled_at: now,
                        })
                        .await?;
                    if created {
                        planned += 1;
                    }
                }
            }
        }
        Ok(planned)
    }

    /// Project-wide tracking: enqueue one job per matching active keyword
    /// and platform, keyword starts spaced one second apart, and return
    /// immediately with a handle. The worker does the provider work; the
    /// caller never blocks on it.
    pub async fn track_project(&self, request: &TrackProjectRequest) -> Result<TrackProjectHandle> {
        if self.store.get_project(&request.project_id).await?.is_none() {
            anyhow::bail!("project not found: {}", request.project_id);
        }

        let platforms: &[Platform] = if request.platforms.is_empty() {
            &self.platforms
        } else {
            &request.platforms
        };

        let first_scheduled_at = Utc::now();
        let mut jobs_created = 0u32;
        let mut keyword_slot = 0i64;

        for keyword in self.store.list_active_keywords(&request.project_id).await? {
            if let Some(pattern) = &request.keyword_filter {
                if !glob_match::glob_match(pattern, &keyword.keyword_text) {
                    continue;
                }
            }

            let scheduled_at =
                first_scheduled_at + ChronoDuration::seconds(keyword_slot * KEYWORD_SPACING_SECS);
            keyword_slot += 1;

            for &platform in platforms {
                let created = self
                    .broker
                    .enqueue(&JobMessage {
                        job_id: String::new(),
                        project_id: request.project_id.clone(),
                        keyword_id: keyword.id.clone(),
                        platform,
                        scheduled_at,
                    })
                    .await?;
                if created {
                    jobs_created += 1;
                }
            }
        }

        tracing::info!(
            project_id = %request.project_id,
            jobs_created,
            filter = ?request.keyword_filter,
            "Project tracking batch enqueued"
        );

        Ok(TrackProjectHandle {
            project_id: request.project_id.clone(),
            jobs_created,
            first_scheduled_at,
        })
    }

    /// Bulk job scheduling for the API layer. Returns how many new rows
    /// were created (duplicates are absorbed).
    pub async fn schedule_jobs(&self, request: &ScheduleJobsRequest) -> Result<u32> {
        let keywords = if request.keyword_ids.is_empty() {
            self.store
                .list_active_keywords(&request.project_id)
                .await?
                .into_iter()
                .map(|k| k.id)
                .collect()
        } else {
            request.keyword_ids.clone()
        };
        let platforms: &[Platform] = if request.platforms.is_empty() {
            &self.platforms
        } else {
            &request.platforms
        };
        let scheduled_at = request.scheduled_at.unwrap_or_else(Utc::now);

        let mut created = 0u32;
        for keyword_id in &keywords {
            for &platform in platforms {
                let inserted = self
                    .broker
                    .enqueue(&JobMessage {
                        job_id: String::new(),
                        project_id: request.project_id.clone(),
                        keyword_id: keyword_id.clone(),
                        platform,
                        scheduled_at,
                    })
                    .await?;
                if inserted {
                    created += 1;
                }
            }
        }
        Ok(created)
    }

    // ---- score recompute ----

    pub async fn run_score_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(Duration::from_secs(SCORE_PERIOD_SECS));
        tracing::info!(period_hours = SCORE_PERIOD_SECS / 3600, "Score planner started");

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.recompute_scores().await {
                tracing::error!(error = %e, "Score planner tick failed");
            }
        }
    }

    pub async fn recompute_scores(&self) -> Result<()> {
        let today = Utc::now().date_naive();
        for project in self.store.list_projects(true).await? {
            if let Err(e) = self
                .scoring
                .compute_visibility_score(&project.id, None)
                .await
            {
                tracing::error!(project_id = %project.id, error = %e, "Score recompute failed");
            }
            if let Err(e) = self.scoring.generate_daily_metrics(&project.id, today).await {
                tracing::error!(project_id = %project.id, error = %e, "Daily metric refresh failed");
            }
        }
        Ok(())
    }

    // ---- retention ----

    pub async fn run_retention_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(Duration::from_secs(RETENTION_PERIOD_SECS));
        tracing::info!("Retention planner started");

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.apply_retention().await {
                tracing::error!(error = %e, "Retention tick failed");
            }
        }
    }

    pub async fn apply_retention(&self) -> Result<()> {
        let now = Utc::now();
        let citations = self
            .store
            .delete_citations_older_than(now - ChronoDuration::days(self.config.retention_citations_days))
            .await?;
        let alerts = self
            .store
            .delete_alerts_older_than(now - ChronoDuration::days(self.config.retention_alerts_days))
            .await?;
        let jobs = self
            .store
            .delete_jobs_older_than(now - ChronoDuration::days(self.config.retention_jobs_days))
            .await?;

        if citations + alerts + jobs > 0 {
            tracing::info!(citations, alerts, jobs, "Retention cleanup removed expired rows");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::DbQueue;
    use aivis_common::types::FunnelStage;
    use aivis_storage::{NewKeyword, NewProject};
    use chrono::TimeZone;

    async fn build_planner(platforms: Vec<Platform>) -> (Planner, Arc<Store>, String, String) {
        aivis_common::id::init(1, 1);
        let store = Arc::new(Store::in_memory().await.unwrap());
        let project = store
            .insert_project(&NewProject {
                name: "Acme".into(),
                primary_domain: "acme.com".into(),
                competitor_domains: vec![],
            })
            .await
            .unwrap();
        let keyword = store
            .insert_keyword(&NewKeyword {
                project_id: project.id.clone(),
                keyword_text: "best crm".into(),
                priority_level: 3,
                funnel_stage: FunnelStage::Awareness,
            })
            .await
            .unwrap();

        let broker = Arc::new(DbQueue::new(store.clone()));
        let scoring = Arc::new(ScoringService::new(store.clone()));
        let config = WorkerConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            _ => None,
        })
        .unwrap();

        let planner = Planner::new(store.clone(), broker, scoring, platforms, config);
        (planner, store, project.id, keyword.id)
    }

    #[tokio::test]
    async fn daily_batch_plans_keyword_times_platform_and_is_idempotent() {
        let (planner, store, ..) =
            build_planner(vec![Platform::Gemini, Platform::Chatgpt]).await;

        let now = Utc::now();
        let first = planner.plan_daily_batch(now).await.unwrap();
        assert_eq!(first, 2);

        // Re-planning the same batch creates nothing new
        let second = planner.plan_daily_batch(now).await.unwrap();
        assert_eq!(second, 0);

        let due = store.due_jobs(now + ChronoDuration::seconds(1), 10).await.unwrap();
        assert_eq!(due.len(), 2);
    }

    #[tokio::test]
    async fn freshly_tracked_keywords_are_skipped() {
        let (planner, store, _, keyword_id) = build_planner(vec![Platform::Gemini]).await;
        store
            .touch_keyword_tracked(&keyword_id, Utc::now())
            .await
            .unwrap();

        let planned = planner.plan_daily_batch(Utc::now()).await.unwrap();
        assert_eq!(planned, 0);
    }

    #[tokio::test]
    async fn track_project_enqueues_through_the_broker_and_returns_a_handle() {
        let (planner, store, project_id, _) =
            build_planner(vec![Platform::Gemini, Platform::Chatgpt]).await;
        store
            .insert_keyword(&NewKeyword {
                project_id: project_id.clone(),
                keyword_text: "crm pricing".into(),
                priority_level: 2,
                funnel_stage: FunnelStage::Decision,
            })
            .await
            .unwrap();

        let handle = planner
            .track_project(&TrackProjectRequest {
                project_id: project_id.clone(),
                platforms: vec![],
                keyword_filter: None,
            })
            .await
            .unwrap();

        assert_eq!(handle.project_id, project_id);
        assert_eq!(handle.jobs_created, 4);

        // Keyword starts are staggered: only the first keyword's jobs are
        // due at the handle's first_scheduled_at
        let due_now = store
            .due_jobs(handle.first_scheduled_at, 10)
            .await
            .unwrap();
        assert_eq!(due_now.len(), 2);
        let due_later = store
            .due_jobs(handle.first_scheduled_at + ChronoDuration::seconds(1), 10)
            .await
            .unwrap();
        assert_eq!(due_later.len(), 4);
    }

    #[tokio::test]
    async fn track_project_keyword_filter_narrows_the_batch() {
        let (planner, _, project_id, _) = build_planner(vec![Platform::Gemini]).await;

        let handle = planner
            .track_project(&TrackProjectRequest {
                project_id: project_id.clone(),
                platforms: vec![],
                keyword_filter: Some("*pricing*".into()),
            })
            .await
            .unwrap();
        // The seeded keyword is "best crm"; nothing matches
        assert_eq!(handle.jobs_created, 0);

        let handle = planner
            .track_project(&TrackProjectRequest {
                project_id,
                platforms: vec![],
                keyword_filter: Some("*crm*".into()),
            })
            .await
            .unwrap();
        assert_eq!(handle.jobs_created, 1);
    }

    #[tokio::test]
    async fn track_project_rejects_unknown_projects() {
        let (planner, ..) = build_planner(vec![Platform::Gemini]).await;
        let result = planner
            .track_project(&TrackProjectRequest {
                project_id: "missing".into(),
                platforms: vec![],
                keyword_filter: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn schedule_jobs_defaults_to_all_keywords_and_platforms() {
        let (planner, _, project_id, _) =
            build_planner(vec![Platform::Gemini, Platform::Perplexity]).await;

        let created = planner
            .schedule_jobs(&ScheduleJobsRequest {
                project_id,
                keyword_ids: vec![],
                platforms: vec![],
                scheduled_at: None,
            })
            .await
            .unwrap();
        assert_eq!(created, 2);
    }

    #[tokio::test]
    async fn daily_run_gate_respects_time_and_date() {
        let (planner, ..) = build_planner(vec![Platform::Gemini]).await;

        let before = Utc.with_ymd_and_hms(2026, 8, 2, 1, 59, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 8, 2, 2, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 8, 2, 11, 30, 0).unwrap();

        assert!(!planner.daily_run_due(before, None));
        assert!(planner.daily_run_due(after, None));
        // A slow tick still runs, once
        assert!(planner.daily_run_due(later, None));
        assert!(!planner.daily_run_due(later, Some(later.date_naive())));
        // The next day re-arms
        let next_day = Utc.with_ymd_and_hms(2026, 8, 3, 2, 0, 0).unwrap();
        assert!(planner.daily_run_due(next_day, Some(later.date_naive())));
    }
}
