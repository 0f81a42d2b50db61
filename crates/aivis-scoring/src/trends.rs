//! Share of voice and trending keywords, both over the 30-day window.

use crate::score::SCORING_WINDOW_DAYS;
use crate::ScoringService;
use aivis_storage::{CitationRow, KeywordRow};
use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareOfVoiceEntry {
    pub domain: String,
    pub mentions: u64,
    pub share_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendingKeyword {
    pub keyword_id: String,
    pub keyword_text: String,
    pub this_week_citations: u64,
    pub last_week_citations: u64,
    pub citation_delta: i64,
    /// Positive when the average position improved (moved toward 1).
    pub position_delta: Option<f64>,
    pub direction: TrendDirection,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A competitor-citation host counts toward `domain` on the same
/// exact-or-subdomain rule the normalizer uses.
fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Share of voice: the percentage of all self-or-competitor mentions in the
/// window attributable to each tracked domain. All zeros when the window is
/// empty.
pub fn share_of_voice_from(
    citations: &[CitationRow],
    primary_domain: &str,
    competitors: &[String],
) -> Vec<ShareOfVoiceEntry> {
    let self_mentions = citations.iter().filter(|c| c.domain_mentioned).count() as u64;
    let competitor_entries: u64 = citations
        .iter()
        .map(|c| c.competitor_citations.len() as u64)
        .sum();
    let total = self_mentions + competitor_entries;

    let mut entries = Vec::with_capacity(1 + competitors.len());
    let mut push = |domain: &str, mentions: u64| {
        let share = if total == 0 {
            0.0
        } else {
            round2(mentions as f64 / total as f64 * 100.0)
        };
        entries.push(ShareOfVoiceEntry {
            domain: domain.to_string(),
            mentions,
            share_percent: share,
        });
    };

    push(primary_domain, self_mentions);
    for competitor in competitors {
        let mentions = citations
            .iter()
            .flat_map(|c| &c.competitor_citations)
            .filter(|cc| host_matches(&cc.domain, competitor))
            .count() as u64;
        push(competitor, mentions);
    }
    entries
}

fn iso_week_key(at: DateTime<Utc>) -> (i32, u32) {
    let week = at.iso_week();
    (week.year(), week.week())
}

/// Per-keyword week-over-week citation and position deltas, ranked by
/// citation delta.
pub fn trending_from(
    citations: &[CitationRow],
    keywords: &[KeywordRow],
    as_of: DateTime<Utc>,
    limit: usize,
) -> Vec<TrendingKeyword> {
    let this_week = iso_week_key(as_of);
    let last_week = iso_week_key(as_of - Duration::weeks(1));

    let mut by_keyword: HashMap<&str, (Vec<&CitationRow>, Vec<&CitationRow>)> = HashMap::new();
    for citation in citations.iter().filter(|c| c.domain_mentioned) {
        let key = iso_week_key(citation.tracked_at);
        let slot = by_keyword.entry(citation.keyword_id.as_str()).or_default();
        if key == this_week {
            slot.0.push(citation);
        } else if key == last_week {
            slot.1.push(citation);
        }
    }

    let avg_pos = |rows: &[&CitationRow]| -> Option<f64> {
        let positions: Vec<f64> = rows
            .iter()
            .filter_map(|c| c.citation_position)
            .map(f64::from)
            .collect();
        if positions.is_empty() {
            None
        } else {
            Some(positions.iter().sum::<f64>() / positions.len() as f64)
        }
    };

    let mut trending: Vec<TrendingKeyword> = keywords
        .iter()
        .map(|keyword| {
            let (this, last) = by_keyword
                .get(keyword.id.as_str())
                .map(|(a, b)| (a.as_slice(), b.as_slice()))
                .unwrap_or((&[], &[]));

            let this_count = this.len() as u64;
            let last_count = last.len() as u64;
            let citation_delta = this_count as i64 - last_count as i64;
            let position_delta = match (avg_pos(last), avg_pos(this)) {
                (Some(last_avg), Some(this_avg)) => Some(last_avg - this_avg),
                _ => None,
            };

            let direction = if citation_delta > 0 || position_delta.is_some_and(|d| d > 0.0) {
                TrendDirection::Up
            } else if citation_delta < 0 || position_delta.is_some_and(|d| d < 0.0) {
                TrendDirection::Down
            } else {
                TrendDirection::Stable
            };

            TrendingKeyword {
                keyword_id: keyword.id.clone(),
                keyword_text: keyword.keyword_text.clone(),
                this_week_citations: this_count,
                last_week_citations: last_count,
                citation_delta,
                position_delta,
                direction,
            }
        })
        .collect();

    trending.sort_by(|a, b| b.citation_delta.cmp(&a.citation_delta));
    trending.truncate(limit);
    trending
}

impl ScoringService {
    pub async fn share_of_voice(&self, project_id: &str) -> Result<Vec<ShareOfVoiceEntry>> {
        let Some(project) = self.store().get_project(project_id).await? else {
            anyhow::bail!("project not found: {project_id}");
        };
        let snapshot = self
            .store()
            .load_scoring_snapshot(project_id, Utc::now(), SCORING_WINDOW_DAYS)
            .await?;
        Ok(share_of_voice_from(
            &snapshot.citations,
            &project.primary_domain,
            &project.competitor_domains,
        ))
    }

    pub async fn trending_keywords(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<TrendingKeyword>> {
        let snapshot = self
            .store()
            .load_scoring_snapshot(project_id, Utc::now(), SCORING_WINDOW_DAYS)
            .await?;
        Ok(trending_from(
            &snapshot.citations,
            &snapshot.keywords,
            snapshot.as_of,
            limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aivis_common::types::{CompetitorCitation, Platform, Sentiment};

    fn citation(
        keyword_id: &str,
        mentioned: bool,
        position: Option<i32>,
        competitors: Vec<CompetitorCitation>,
        tracked_at: DateTime<Utc>,
    ) -> CitationRow {
        CitationRow {
            id: String::new(),
            project_id: "p".into(),
            keyword_id: keyword_id.into(),
            platform: Platform::Gemini,
            tracked_at,
            domain_mentioned: mentioned,
            citation_position: position,
            citation_context: None,
            full_response_text: String::new(),
            response_summary: String::new(),
            sentiment: Sentiment::Neutral,
            confidence_score: 0.5,
            word_count: 0,
            competitor_citations: competitors,
            total_sources_cited: 0,
            response_time_ms: 0,
            created_at: tracked_at,
        }
    }

    fn competitor(domain: &str) -> CompetitorCitation {
        CompetitorCitation {
            domain: domain.into(),
            url: format!("https://{domain}/x"),
            position: 1,
            context: None,
        }
    }

    #[test]
    fn share_of_voice_splits_mentions() {
        let now = Utc::now();
        let citations = vec![
            citation("k1", true, Some(1), vec![competitor("rival.io")], now),
            citation("k1", true, Some(2), vec![competitor("rival.io")], now),
            citation("k2", false, None, vec![competitor("elsewhere.net")], now),
        ];
        // total = 2 self + 3 competitor entries = 5
        let entries = share_of_voice_from(&citations, "acme.com", &["rival.io".into()]);
        assert_eq!(entries[0].domain, "acme.com");
        assert_eq!(entries[0].mentions, 2);
        assert_eq!(entries[0].share_percent, 40.0);
        assert_eq!(entries[1].domain, "rival.io");
        assert_eq!(entries[1].mentions, 2);
        assert_eq!(entries[1].share_percent, 40.0);
    }

    #[test]
    fn empty_window_reports_zero_shares() {
        let entries = share_of_voice_from(&[], "acme.com", &["rival.io".into()]);
        assert!(entries.iter().all(|e| e.share_percent == 0.0));
        assert!(entries.iter().all(|e| e.mentions == 0));
    }

    fn keyword(id: &str, text: &str) -> KeywordRow {
        KeywordRow {
            id: id.into(),
            project_id: "p".into(),
            keyword_text: text.into(),
            priority_level: 3,
            funnel_stage: aivis_common::types::FunnelStage::Awareness,
            is_active: true,
            last_tracked_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn trending_ranks_by_citation_delta() {
        let as_of = Utc::now();
        let last_week = as_of - Duration::weeks(1);
        let citations = vec![
            // k1: 2 this week vs 0 last week
            citation("k1", true, Some(2), vec![], as_of),
            citation("k1", true, Some(2), vec![], as_of),
            // k2: 0 this week vs 1 last week
            citation("k2", true, Some(1), vec![], last_week),
        ];
        let keywords = vec![keyword("k1", "alpha"), keyword("k2", "beta")];

        let trending = trending_from(&citations, &keywords, as_of, 10);
        assert_eq!(trending[0].keyword_id, "k1");
        assert_eq!(trending[0].citation_delta, 2);
        assert_eq!(trending[0].direction, TrendDirection::Up);
        assert_eq!(trending[1].keyword_id, "k2");
        assert_eq!(trending[1].citation_delta, -1);
        assert_eq!(trending[1].direction, TrendDirection::Down);
    }

    #[test]
    fn improving_position_alone_counts_as_up() {
        let as_of = Utc::now();
        let last_week = as_of - Duration::weeks(1);
        let citations = vec![
            citation("k1", true, Some(5), vec![], last_week),
            citation("k1", true, Some(2), vec![], as_of),
        ];
        let keywords = vec![keyword("k1", "alpha")];

        let trending = trending_from(&citations, &keywords, as_of, 10);
        assert_eq!(trending[0].citation_delta, 0);
        assert_eq!(trending[0].position_delta, Some(3.0));
        assert_eq!(trending[0].direction, TrendDirection::Up);
    }

    #[test]
    fn no_movement_is_stable() {
        let as_of = Utc::now();
        let last_week = as_of - Duration::weeks(1);
        let citations = vec![
            citation("k1", true, Some(2), vec![], last_week),
            citation("k1", true, Some(2), vec![], as_of),
        ];
        let keywords = vec![keyword("k1", "alpha")];

        let trending = trending_from(&citations, &keywords, as_of, 10);
        assert_eq!(trending[0].direction, TrendDirection::Stable);
    }
}
