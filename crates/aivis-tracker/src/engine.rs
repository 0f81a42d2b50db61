//! The tracking engine: run the adapter, normalizer and sentiment stages
//! for one (keyword, project, provider) tuple, persist the resulting
//! citation, and hand the transition to the alert engine.
//!
//! Project-wide tracking is not a direct call: callers enqueue tracking
//! jobs through the broker and the worker drives this engine one
//! (keyword, platform) at a time.

use crate::normalize;
use crate::sentiment::{self, SentimentAnalyzer};
use aivis_alert::AlertEngine;
use aivis_common::types::{Platform, Sentiment};
use aivis_provider::{AdapterSource, ErrorKind, ProviderError, QueryOptions};
use aivis_storage::{CitationRow, KeywordRow, NewCitation, ProjectRow, Store};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Outcome of one provider attempt for one keyword. Serialized (minus the
/// full citation row) into the tracking job's `result_data`.
#[derive(Debug, Clone, Serialize)]
pub struct TrackResult {
    pub platform: Platform,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub retriable: bool,
    pub domain_mentioned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_sources_cited: Option<i32>,
    pub response_time_ms: i64,
    /// The persisted row. Absent on failure and in quick tests.
    #[serde(skip)]
    pub citation: Option<CitationRow>,
}

impl TrackResult {
    fn failure(platform: Platform, error: String, kind: Option<ErrorKind>, retriable: bool) -> Self {
        Self {
            platform,
            success: false,
            error: Some(error),
            error_kind: kind.map(|k| k.as_str().to_string()),
            retriable,
            domain_mentioned: false,
            citation_position: None,
            sentiment: None,
            total_sources_cited: None,
            response_time_ms: 0,
            citation: None,
        }
    }
}

pub struct TrackerEngine {
    store: Arc<Store>,
    adapters: Arc<dyn AdapterSource>,
    alerts: AlertEngine,
    analyzer: SentimentAnalyzer,
}

impl TrackerEngine {
    pub fn new(store: Arc<Store>, adapters: Arc<dyn AdapterSource>) -> Self {
        Self {
            alerts: AlertEngine::new(store.clone()),
            store,
            adapters,
            analyzer: SentimentAnalyzer::default(),
        }
    }

    pub fn with_analyzer(mut self, analyzer: SentimentAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Track one keyword across the requested platforms, sequentially, and
    /// stamp `last_tracked_at` once at the end.
    pub async fn track_keyword(
        &self,
        keyword: &KeywordRow,
        project: &ProjectRow,
        platforms: &[Platform],
        options: &QueryOptions,
    ) -> Vec<TrackResult> {
        let mut results = Vec::with_capacity(platforms.len());
        for &platform in platforms {
            results.push(
                self.track_one(
                    platform,
                    &keyword.keyword_text,
                    &project.primary_domain,
                    options,
                    Some((project.id.as_str(), keyword.id.as_str())),
                )
                .await,
            );
        }

        if let Err(e) = self.store.touch_keyword_tracked(&keyword.id, Utc::now()).await {
            tracing::warn!(keyword_id = %keyword.id, error = %e, "Failed to stamp last_tracked_at");
        }

        results
    }

    /// Run the full pipeline without touching the store: no citation, no
    /// alerts, no `last_tracked_at`. For ad-hoc "what would this look
    /// like" checks.
    pub async fn quick_test(
        &self,
        keyword_text: &str,
        domain: Option<&str>,
        platforms: &[Platform],
        options: &QueryOptions,
    ) -> Vec<TrackResult> {
        let domain = domain.map(aivis_storage::normalize_domain).unwrap_or_default();
        let mut results = Vec::with_capacity(platforms.len());
        for &platform in platforms {
            results.push(
                self.track_one(platform, keyword_text, &domain, options, None)
                    .await,
            );
        }
        results
    }

    /// One provider attempt. `persist` carries (project_id, keyword_id) when
    /// the resulting citation should be written.
    async fn track_one(
        &self,
        platform: Platform,
        keyword_text: &str,
        primary_domain: &str,
        options: &QueryOptions,
        persist: Option<(&str, &str)>,
    ) -> TrackResult {
        let Some(adapter) = self.adapters.adapter(platform) else {
            return TrackResult::failure(
                platform,
                "provider not configured".to_string(),
                None,
                false,
            );
        };

        if let Some(until) = self.adapters.cooldown_until(platform) {
            return TrackResult::failure(
                platform,
                format!("quota exceeded, provider cooling down until {until}"),
                Some(ErrorKind::QuotaExceeded),
                false,
            );
        }

        let answer = match adapter.query(keyword_text, options).await {
            Ok(answer) => answer,
            Err(err) => {
                if matches!(err, ProviderError::QuotaExceeded { .. }) {
                    self.adapters.start_cooldown(platform);
                }
                tracing::warn!(
                    platform = %platform,
                    keyword = keyword_text,
                    kind = %err.kind(),
                    error = %err,
                    "Provider query failed"
                );
                return TrackResult::failure(
                    platform,
                    err.to_string(),
                    Some(err.kind()),
                    err.retriable(),
                );
            }
        };

        let normalized = normalize::normalize(&answer, primary_domain);
        let sentiment = self.analyzer.analyze(&answer.response_text, primary_domain);
        let confidence = sentiment::confidence_score(
            answer.citations.len(),
            answer.response_time_ms,
            answer.response_text.len(),
        );
        let summary = sentiment::summarize(&answer.response_text);
        let word_count = answer.response_text.split_whitespace().count() as i32;

        let mut result = TrackResult {
            platform,
            success: true,
            error: None,
            error_kind: None,
            retriable: false,
            domain_mentioned: normalized.domain_mentioned,
            citation_position: normalized.citation_position,
            sentiment: Some(sentiment),
            total_sources_cited: Some(normalized.total_sources_cited),
            response_time_ms: answer.response_time_ms,
            citation: None,
        };

        let Some((project_id, keyword_id)) = persist else {
            return result;
        };

        let new_citation = NewCitation {
            project_id: project_id.to_string(),
            keyword_id: keyword_id.to_string(),
            platform,
            domain_mentioned: normalized.domain_mentioned,
            citation_position: normalized.citation_position,
            citation_context: normalized.citation_context,
            full_response_text: answer.response_text.clone(),
            response_summary: summary,
            sentiment,
            confidence_score: confidence,
            word_count,
            competitor_citations: normalized.competitor_citations,
            total_sources_cited: normalized.total_sources_cited,
            response_time_ms: answer.response_time_ms,
        };

        match self.store.insert_citation(&new_citation).await {
            Ok(row) => {
                tracing::debug!(
                    platform = %platform,
                    keyword_id,
                    mentioned = row.domain_mentioned,
                    position = ?row.citation_position,
                    "Citation recorded"
                );
                self.diff_against_previous(keyword_text, &row).await;
                result.citation = Some(row);
                result
            }
            Err(e) => {
                // The provider call already happened; the scheduler gives
                // store failures a long retry floor.
                tracing::error!(platform = %platform, keyword_id, error = %e, "Citation write failed");
                let mut failure =
                    TrackResult::failure(platform, format!("store error: {e}"), None, true);
                failure.error_kind = Some("store".to_string());
                failure
            }
        }
    }

    /// Every persisted citation goes through the alert diff against the
    /// newest prior row of its (keyword, platform) stream. Alerting is
    /// best-effort and never fails the tracking attempt.
    async fn diff_against_previous(&self, keyword_text: &str, current: &CitationRow) {
        let previous = match self
            .store
            .latest_citation_before(&current.keyword_id, current.platform, current.tracked_at)
            .await
        {
            Ok(previous) => previous,
            Err(e) => {
                tracing::error!(
                    keyword_id = %current.keyword_id,
                    platform = %current.platform,
                    error = %e,
                    "Previous-citation lookup failed, skipping alert diff"
                );
                return;
            }
        };
        self.alerts
            .process(keyword_text, previous.as_ref(), current)
            .await;
    }
}
