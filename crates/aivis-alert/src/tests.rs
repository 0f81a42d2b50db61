use crate::engine::{diff_citations, AlertEngine};
use aivis_common::types::{AlertType, Platform, Sentiment, Severity};
use aivis_storage::CitationRow;
use chrono::Utc;

fn citation(mentioned: bool, position: Option<i32>, sentiment: Sentiment) -> CitationRow {
    CitationRow {
        id: "c1".into(),
        project_id: "p1".into(),
        keyword_id: "k1".into(),
        platform: Platform::Gemini,
        tracked_at: Utc::now(),
        domain_mentioned: mentioned,
        citation_position: position,
        citation_context: None,
        full_response_text: String::new(),
        response_summary: String::new(),
        sentiment,
        confidence_score: 0.5,
        word_count: 0,
        competitor_citations: vec![],
        total_sources_cited: 0,
        response_time_ms: 0,
        created_at: Utc::now(),
    }
}

#[test]
fn first_mention_raises_new_citation() {
    let current = citation(true, Some(2), Sentiment::Positive);
    let alerts = diff_citations("best crm", None, &current);

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::NewCitation);
    assert_eq!(alerts[0].severity, Severity::Info);
    assert_eq!(alerts[0].current_value.as_deref(), Some("2"));
}

#[test]
fn first_observation_without_mention_is_silent() {
    let current = citation(false, None, Sentiment::Neutral);
    assert!(diff_citations("best crm", None, &current).is_empty());
}

#[test]
fn dropping_out_raises_lost_citation_with_previous_position() {
    let previous = citation(true, Some(1), Sentiment::Neutral);
    let current = citation(false, None, Sentiment::Neutral);
    let alerts = diff_citations("best crm", Some(&previous), &current);

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::LostCitation);
    assert_eq!(alerts[0].severity, Severity::Warning);
    assert_eq!(alerts[0].previous_value.as_deref(), Some("1"));
}

#[test]
fn improvement_of_three_ranks_is_an_info_position_change() {
    let previous = citation(true, Some(5), Sentiment::Neutral);
    let current = citation(true, Some(2), Sentiment::Neutral);
    let alerts = diff_citations("best crm", Some(&previous), &current);

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::PositionChange);
    assert_eq!(alerts[0].severity, Severity::Info);
    assert_eq!(alerts[0].change_percent, Some(60.0));
}

#[test]
fn jump_from_third_to_first_reports_66_67_percent() {
    let previous = citation(true, Some(3), Sentiment::Neutral);
    let current = citation(true, Some(1), Sentiment::Neutral);
    let alerts = diff_citations("best crm", Some(&previous), &current);

    assert_eq!(alerts[0].alert_type, AlertType::PositionChange);
    assert_eq!(alerts[0].severity, Severity::Info);
    assert_eq!(alerts[0].change_percent, Some(66.67));
}

#[test]
fn worsening_position_is_a_warning() {
    let previous = citation(true, Some(1), Sentiment::Neutral);
    let current = citation(true, Some(4), Sentiment::Neutral);
    let alerts = diff_citations("best crm", Some(&previous), &current);

    assert_eq!(alerts[0].alert_type, AlertType::PositionChange);
    assert_eq!(alerts[0].severity, Severity::Warning);
    assert_eq!(alerts[0].change_percent, Some(-300.0));
}

#[test]
fn sub_threshold_drift_is_silent() {
    let previous = citation(true, Some(2), Sentiment::Neutral);
    let current = citation(true, Some(3), Sentiment::Neutral);
    assert!(diff_citations("best crm", Some(&previous), &current).is_empty());
}

#[test]
fn sentiment_shift_to_negative_is_a_warning() {
    let previous = citation(true, Some(1), Sentiment::Positive);
    let current = citation(true, Some(1), Sentiment::Negative);
    let alerts = diff_citations("best crm", Some(&previous), &current);

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::SentimentShift);
    assert_eq!(alerts[0].severity, Severity::Warning);
}

#[test]
fn sentiment_shift_away_from_negative_is_info() {
    let previous = citation(true, Some(1), Sentiment::Negative);
    let current = citation(true, Some(1), Sentiment::Positive);
    let alerts = diff_citations("best crm", Some(&previous), &current);

    assert_eq!(alerts[0].alert_type, AlertType::SentimentShift);
    assert_eq!(alerts[0].severity, Severity::Info);
}

#[test]
fn sentiment_shift_requires_a_current_mention() {
    // prev mentioned positive, current unmentioned neutral: only the lost
    // citation fires
    let previous = citation(true, Some(1), Sentiment::Positive);
    let current = citation(false, None, Sentiment::Neutral);
    let alerts = diff_citations("best crm", Some(&previous), &current);

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::LostCitation);
}

#[test]
fn position_and_sentiment_can_fire_together() {
    let previous = citation(true, Some(5), Sentiment::Neutral);
    let current = citation(true, Some(1), Sentiment::Positive);
    let alerts = diff_citations("best crm", Some(&previous), &current);

    let types: Vec<AlertType> = alerts.iter().map(|a| a.alert_type).collect();
    assert_eq!(
        types,
        vec![AlertType::PositionChange, AlertType::SentimentShift]
    );
}

#[test]
fn unchanged_stream_is_silent() {
    let previous = citation(true, Some(2), Sentiment::Neutral);
    let current = citation(true, Some(2), Sentiment::Neutral);
    assert!(diff_citations("best crm", Some(&previous), &current).is_empty());
}

#[tokio::test]
async fn engine_persists_derived_alerts() {
    use aivis_storage::{NewKeyword, NewProject, Store};
    use std::sync::Arc;

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
            funnel_stage: aivis_common::types::FunnelStage::Awareness,
        })
        .await
        .unwrap();

    let mut current = citation(true, Some(2), Sentiment::Positive);
    current.project_id = project.id.clone();
    current.keyword_id = keyword.id.clone();

    let engine = AlertEngine::new(store.clone());
    let stored = engine.process("best crm", None, &current).await;
    assert_eq!(stored, 1);

    let counts = store.unread_alert_counts(&project.id).await.unwrap();
    assert_eq!(counts.total, 1);
}
