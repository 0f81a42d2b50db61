//! Daily metric aggregation: one row per (project, date, platform),
//! recomputed idempotently from the citations of that day.

use crate::ScoringService;
use aivis_common::types::Platform;
use aivis_storage::{CitationRow, DailyMetricRow};
use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;

/// Aggregate one day's citations for one platform. Inputs must already be
/// filtered to the (project, date, platform) triple.
pub fn aggregate_day(
    project_id: &str,
    date: NaiveDate,
    platform: Platform,
    citations: &[&CitationRow],
) -> DailyMetricRow {
    let mentions = citations.iter().filter(|c| c.domain_mentioned).count() as i32;

    let positions: Vec<f64> = citations
        .iter()
        .filter_map(|c| c.citation_position)
        .map(f64::from)
        .collect();
    let avg_position = if positions.is_empty() {
        None
    } else {
        Some(positions.iter().sum::<f64>() / positions.len() as f64)
    };

    let mut positive = 0;
    let mut neutral = 0;
    let mut negative = 0;
    for citation in citations {
        match citation.sentiment {
            aivis_common::types::Sentiment::Positive => positive += 1,
            aivis_common::types::Sentiment::Neutral => neutral += 1,
            aivis_common::types::Sentiment::Negative => negative += 1,
        }
    }

    let competitor_mentions: i32 = citations
        .iter()
        .map(|c| c.competitor_citations.len() as i32)
        .sum();

    let avg_confidence = if citations.is_empty() {
        0.0
    } else {
        citations.iter().map(|c| c.confidence_score).sum::<f64>() / citations.len() as f64
    };

    DailyMetricRow {
        project_id: project_id.to_string(),
        date,
        platform,
        total_citations: citations.len() as i32,
        mentions,
        avg_position,
        positive_count: positive,
        neutral_count: neutral,
        negative_count: negative,
        competitor_mentions,
        avg_confidence,
    }
}

impl ScoringService {
    /// Recompute and upsert the daily metrics of `date` for every platform
    /// that produced citations that day. Idempotent by construction.
    pub async fn generate_daily_metrics(
        &self,
        project_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<DailyMetricRow>> {
        let day_start = Utc
            .from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid"));
        let day_end = Utc.from_utc_datetime(
            &date
                .succ_opt()
                .unwrap_or(date)
                .and_hms_opt(0, 0, 0)
                .expect("midnight is valid"),
        );

        let citations = self
            .store()
            .citations_in_window(project_id, day_start, day_end)
            .await?;

        let mut by_platform: BTreeMap<Platform, Vec<&CitationRow>> = BTreeMap::new();
        for citation in citations.iter().filter(|c| c.tracked_at < day_end) {
            by_platform.entry(citation.platform).or_default().push(citation);
        }

        let mut rows = Vec::with_capacity(by_platform.len());
        for (platform, day_citations) in by_platform {
            let row = aggregate_day(project_id, date, platform, &day_citations);
            self.store().upsert_daily_metric(&row).await?;
            rows.push(row);
        }

        tracing::debug!(project_id, %date, platforms = rows.len(), "Daily metrics regenerated");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aivis_common::types::{CompetitorCitation, Sentiment};

    fn citation(mentioned: bool, position: Option<i32>, sentiment: Sentiment) -> CitationRow {
        CitationRow {
            id: String::new(),
            project_id: "p".into(),
            keyword_id: "k".into(),
            platform: Platform::Gemini,
            tracked_at: Utc::now(),
            domain_mentioned: mentioned,
            citation_position: position,
            citation_context: None,
            full_response_text: String::new(),
            response_summary: String::new(),
            sentiment,
            confidence_score: 0.8,
            word_count: 0,
            competitor_citations: vec![CompetitorCitation {
                domain: "rival.io".into(),
                url: "https://rival.io/x".into(),
                position: 1,
                context: None,
            }],
            total_sources_cited: 0,
            response_time_ms: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn aggregation_is_deterministic_field_by_field() {
        let rows = [
            citation(true, Some(1), Sentiment::Positive),
            citation(true, Some(3), Sentiment::Neutral),
            citation(false, None, Sentiment::Negative),
        ];
        let refs: Vec<&CitationRow> = rows.iter().collect();
        let date = Utc::now().date_naive();

        let first = aggregate_day("p", date, Platform::Gemini, &refs);
        let second = aggregate_day("p", date, Platform::Gemini, &refs);
        assert_eq!(first, second);

        assert_eq!(first.total_citations, 3);
        assert_eq!(first.mentions, 2);
        assert_eq!(first.avg_position, Some(2.0));
        assert_eq!(first.positive_count, 1);
        assert_eq!(first.neutral_count, 1);
        assert_eq!(first.negative_count, 1);
        assert_eq!(first.competitor_mentions, 3);
        assert!((first.avg_confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn empty_day_aggregates_to_zeroes() {
        let row = aggregate_day("p", Utc::now().date_naive(), Platform::Claude, &[]);
        assert_eq!(row.total_citations, 0);
        assert_eq!(row.mentions, 0);
        assert_eq!(row.avg_position, None);
        assert_eq!(row.avg_confidence, 0.0);
    }
}
