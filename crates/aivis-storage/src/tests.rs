use crate::store::{
    AlertFilter, NewAlert, NewCitation, NewJob, NewKeyword, NewProject, Store,
};
use crate::DailyMetricRow;
use aivis_common::types::{AlertType, FunnelStage, JobStatus, Platform, Sentiment, Severity};
use chrono::{Duration, Utc};

async fn setup() -> Store {
    aivis_common::id::init(1, 1);
    Store::in_memory().await.unwrap()
}

async fn seed_project(store: &Store) -> (String, String) {
    let project = store
        .insert_project(&NewProject {
            name: "Acme".into(),
            primary_domain: "www.Acme.com".into(),
            competitor_domains: vec!["rival.io".into()],
        })
        .await
        .unwrap();
    let keyword = store
        .insert_keyword(&NewKeyword {
            project_id: project.id.clone(),
            keyword_text: "best crm software".into(),
            priority_level: 4,
            funnel_stage: FunnelStage::Consideration,
        })
        .await
        .unwrap();
    (project.id, keyword.id)
}

fn citation(project_id: &str, keyword_id: &str, mentioned: bool, position: Option<i32>) -> NewCitation {
    NewCitation {
        project_id: project_id.into(),
        keyword_id: keyword_id.into(),
        platform: Platform::Gemini,
        domain_mentioned: mentioned,
        citation_position: position,
        citation_context: position.map(|_| "Acme guide".into()),
        full_response_text: "Acme is a leading provider.".into(),
        response_summary: "Acme is a leading provider.".into(),
        sentiment: Sentiment::Positive,
        confidence_score: 0.8,
        word_count: 5,
        competitor_citations: vec![],
        total_sources_cited: if mentioned { 1 } else { 0 },
        response_time_ms: 1200,
    }
}

#[tokio::test]
async fn project_domain_is_normalized_on_insert() {
    let store = setup().await;
    let (project_id, _) = seed_project(&store).await;
    let project = store.get_project(&project_id).await.unwrap().unwrap();
    assert_eq!(project.primary_domain, "acme.com");
    assert_eq!(project.competitor_domains, vec!["rival.io".to_string()]);
}

#[tokio::test]
async fn competitor_limit_is_enforced() {
    let store = setup().await;
    let (project_id, _) = seed_project(&store).await;
    for i in 0..9 {
        store
            .add_competitor(&project_id, &format!("rival{i}.com"))
            .await
            .unwrap();
    }
    // rival.io from the seed plus nine more is the cap
    assert!(store.add_competitor(&project_id, "one-more.com").await.is_err());
}

#[tokio::test]
async fn primary_domain_rejected_as_competitor() {
    let store = setup().await;
    let (project_id, _) = seed_project(&store).await;
    assert!(store.add_competitor(&project_id, "WWW.acme.com").await.is_err());
}

#[tokio::test]
async fn duplicate_keyword_in_project_is_rejected() {
    let store = setup().await;
    let (project_id, _) = seed_project(&store).await;
    let dup = store
        .insert_keyword(&NewKeyword {
            project_id,
            keyword_text: "best crm software".into(),
            priority_level: 1,
            funnel_stage: FunnelStage::Awareness,
        })
        .await;
    assert!(dup.is_err());
}

#[tokio::test]
async fn latest_citation_before_returns_prior_row() {
    let store = setup().await;
    let (project_id, keyword_id) = seed_project(&store).await;

    let first = store
        .insert_citation(&citation(&project_id, &keyword_id, true, Some(3)))
        .await
        .unwrap();
    let second = store
        .insert_citation(&citation(&project_id, &keyword_id, true, Some(1)))
        .await
        .unwrap();

    let previous = store
        .latest_citation_before(&keyword_id, Platform::Gemini, second.tracked_at)
        .await
        .unwrap();
    // Only rows strictly older than the new citation qualify
    assert!(previous.is_none() || previous.as_ref().unwrap().id == first.id);

    let latest = store
        .latest_citation(&keyword_id, Platform::Gemini)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, second.id);
}

#[tokio::test]
async fn planner_batch_enqueue_is_idempotent() {
    let store = setup().await;
    let (project_id, keyword_id) = seed_project(&store).await;
    let scheduled_at = Utc::now();

    let job = NewJob {
        project_id,
        keyword_id,
        platform: Platform::Chatgpt,
        scheduled_at,
    };

    assert!(store.insert_job(&job).await.unwrap());
    // Same (project, keyword, platform, scheduled_at) while non-terminal: no-op
    assert!(!store.insert_job(&job).await.unwrap());

    let due = store.due_jobs(Utc::now() + Duration::seconds(1), 10).await.unwrap();
    assert_eq!(due.len(), 1);
}

#[tokio::test]
async fn claim_is_exclusive_and_discards_duplicate_delivery() {
    let store = setup().await;
    let (project_id, keyword_id) = seed_project(&store).await;
    store
        .insert_job(&NewJob {
            project_id,
            keyword_id,
            platform: Platform::Perplexity,
            scheduled_at: Utc::now(),
        })
        .await
        .unwrap();

    let job = store.due_jobs(Utc::now(), 1).await.unwrap().pop().unwrap();
    assert!(store.claim_job(&job.id, Utc::now()).await.unwrap());
    // at-least-once delivery: a second claim of the same job is refused
    assert!(!store.claim_job(&job.id, Utc::now()).await.unwrap());

    let row = store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(row.status, JobStatus::Processing);
    assert!(row.started_at.is_some());
}

#[tokio::test]
async fn fail_job_retries_then_goes_terminal() {
    let store = setup().await;
    let (project_id, keyword_id) = seed_project(&store).await;
    store
        .insert_job(&NewJob {
            project_id,
            keyword_id,
            platform: Platform::Grok,
            scheduled_at: Utc::now(),
        })
        .await
        .unwrap();
    let job = store.due_jobs(Utc::now(), 1).await.unwrap().pop().unwrap();

    let retried = store
        .fail_job(&job.id, "rate limited", Some(Utc::now() + Duration::seconds(30)))
        .await
        .unwrap();
    assert_eq!(retried.status, JobStatus::Retrying);
    assert_eq!(retried.retry_count, 1);
    assert_eq!(retried.error_message.as_deref(), Some("rate limited"));

    let failed = store.fail_job(&job.id, "auth error", None).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.retry_count, 2);
    assert!(failed.completed_at.is_some());
}

#[tokio::test]
async fn reaper_requeues_stale_processing_jobs() {
    let store = setup().await;
    let (project_id, keyword_id) = seed_project(&store).await;
    store
        .insert_job(&NewJob {
            project_id,
            keyword_id,
            platform: Platform::Claude,
            scheduled_at: Utc::now(),
        })
        .await
        .unwrap();
    let job = store.due_jobs(Utc::now(), 1).await.unwrap().pop().unwrap();
    store.claim_job(&job.id, Utc::now() - Duration::minutes(10)).await.unwrap();

    let reaped = store.reap_stale_jobs(Utc::now() - Duration::minutes(1)).await.unwrap();
    assert_eq!(reaped, 1);
    let row = store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(row.status, JobStatus::Retrying);
}

#[tokio::test]
async fn daily_metric_upsert_converges() {
    let store = setup().await;
    let (project_id, _) = seed_project(&store).await;

    let mut row = DailyMetricRow {
        project_id: project_id.clone(),
        date: Utc::now().date_naive(),
        platform: Platform::Gemini,
        total_citations: 4,
        mentions: 3,
        avg_position: Some(1.75),
        positive_count: 2,
        neutral_count: 1,
        negative_count: 0,
        competitor_mentions: 5,
        avg_confidence: 0.8,
    };
    store.upsert_daily_metric(&row).await.unwrap();

    row.mentions = 4;
    store.upsert_daily_metric(&row).await.unwrap();
    store.upsert_daily_metric(&row).await.unwrap();

    let stored = store
        .get_daily_metric(&project_id, row.date, Platform::Gemini)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, row);
}

#[tokio::test]
async fn unread_counts_and_mark_read() {
    let store = setup().await;
    let (project_id, keyword_id) = seed_project(&store).await;

    let alert = store
        .insert_alert(&NewAlert {
            project_id: project_id.clone(),
            alert_type: AlertType::NewCitation,
            severity: Severity::Info,
            title: "New citation".into(),
            description: "gemini now cites acme.com".into(),
            keyword_id: Some(keyword_id),
            platform: Some(Platform::Gemini),
            citation_id: None,
            previous_value: None,
            current_value: Some("2".into()),
            change_percent: None,
        })
        .await
        .unwrap();

    let counts = store.unread_alert_counts(&project_id).await.unwrap();
    assert_eq!(counts.total, 1);
    assert_eq!(counts.by_severity.get("info"), Some(&1));

    assert!(store.mark_alert_read(&alert.id).await.unwrap());
    assert!(!store.mark_alert_read(&alert.id).await.unwrap());

    let unread = store
        .list_alerts(
            &AlertFilter {
                project_id: Some(project_id.clone()),
                unread_only: true,
                ..Default::default()
            },
            10,
            0,
        )
        .await
        .unwrap();
    assert!(unread.is_empty());
}

#[tokio::test]
async fn remove_competitor_is_tolerant_of_format() {
    let store = setup().await;
    let (project_id, _) = seed_project(&store).await;

    let project = store
        .remove_competitor(&project_id, "WWW.Rival.IO")
        .await
        .unwrap();
    assert!(project.competitor_domains.is_empty());
}

#[tokio::test]
async fn tracking_status_reports_coverage_and_job_counts() {
    let store = setup().await;
    let (project_id, keyword_id) = seed_project(&store).await;

    let status = store.tracking_status(&project_id).await.unwrap();
    assert_eq!(status.total_keywords, 1);
    assert_eq!(status.tracked_keywords, 0);
    assert_eq!(status.pending_keywords, 1);
    assert!(status.last_track_time.is_none());

    store
        .insert_job(&NewJob {
            project_id: project_id.clone(),
            keyword_id: keyword_id.clone(),
            platform: Platform::Gemini,
            scheduled_at: Utc::now(),
        })
        .await
        .unwrap();
    store
        .touch_keyword_tracked(&keyword_id, Utc::now())
        .await
        .unwrap();

    let status = store.tracking_status(&project_id).await.unwrap();
    assert_eq!(status.tracked_keywords, 1);
    assert_eq!(status.pending_keywords, 0);
    assert!(status.last_track_time.is_some());
    assert_eq!(
        status.last_24h.by_platform_status.get("gemini:pending"),
        Some(&1)
    );
}

#[tokio::test]
async fn delete_project_cascades() {
    let store = setup().await;
    let (project_id, keyword_id) = seed_project(&store).await;
    store
        .insert_citation(&citation(&project_id, &keyword_id, true, Some(1)))
        .await
        .unwrap();

    assert!(store.delete_project(&project_id).await.unwrap());
    assert!(store.get_project(&project_id).await.unwrap().is_none());
    assert!(store.get_keyword(&keyword_id).await.unwrap().is_none());
    let window = store
        .citations_in_window(&project_id, Utc::now() - Duration::days(1), Utc::now())
        .await
        .unwrap();
    assert!(window.is_empty());
}
