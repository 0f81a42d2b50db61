//! Visibility score computation: five component scores in [0, 100], a
//! weighted composite, and a letter grade.

use crate::ScoringService;
use aivis_common::types::{Platform, Sentiment};
use aivis_storage::{CitationRow, VisibilityScoreRow};
use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, Utc};
use std::collections::HashSet;

/// Scores aggregate citations from the trailing 30 days.
pub const SCORING_WINDOW_DAYS: i64 = 30;

const WEIGHT_FREQUENCY: f64 = 0.40;
const WEIGHT_POSITION: f64 = 0.30;
const WEIGHT_DIVERSITY: f64 = 0.15;
const WEIGHT_CONTEXT: f64 = 0.10;
const WEIGHT_MOMENTUM: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentScores {
    pub frequency: f64,
    pub position: f64,
    pub diversity: f64,
    pub context: f64,
    pub momentum: f64,
}

impl ComponentScores {
    pub fn overall(&self) -> f64 {
        self.frequency * WEIGHT_FREQUENCY
            + self.position * WEIGHT_POSITION
            + self.diversity * WEIGHT_DIVERSITY
            + self.context * WEIGHT_CONTEXT
            + self.momentum * WEIGHT_MOMENTUM
    }
}

pub fn grade_for(score: f64) -> &'static str {
    if score >= 90.0 {
        "A+"
    } else if score >= 80.0 {
        "A"
    } else if score >= 70.0 {
        "B"
    } else if score >= 60.0 {
        "C"
    } else if score >= 50.0 {
        "D"
    } else {
        "F"
    }
}

fn iso_week_key(at: DateTime<Utc>) -> (i32, u32) {
    let week = at.iso_week();
    (week.year(), week.week())
}

/// Compute the five component scores from a citation window.
/// Deterministic: same inputs, same outputs.
pub fn compute_components(
    citations: &[CitationRow],
    active_keywords: usize,
    as_of: DateTime<Utc>,
) -> ComponentScores {
    let self_citations: Vec<&CitationRow> =
        citations.iter().filter(|c| c.domain_mentioned).collect();

    // Frequency: self-mentions per tracked keyword, 5 mentions/keyword = 100
    let keyword_floor = active_keywords.max(1) as f64;
    let frequency = (self_citations.len() as f64 / keyword_floor * 20.0).min(100.0);

    // Position: 1st place = 100, each average rank costs 11 points
    let positions: Vec<f64> = self_citations
        .iter()
        .filter_map(|c| c.citation_position)
        .map(f64::from)
        .collect();
    let position = if positions.is_empty() {
        0.0
    } else {
        let avg = positions.iter().sum::<f64>() / positions.len() as f64;
        (100.0 - (avg - 1.0) * 11.0).max(0.0)
    };

    // Diversity: distinct platforms citing us over all registered platforms
    let platforms: HashSet<Platform> = self_citations.iter().map(|c| c.platform).collect();
    let diversity = platforms.len() as f64 / Platform::ALL.len() as f64 * 100.0;

    // Context: positive share among opinionated citations, 50 when none
    let positive = citations
        .iter()
        .filter(|c| c.sentiment == Sentiment::Positive)
        .count();
    let negative = citations
        .iter()
        .filter(|c| c.sentiment == Sentiment::Negative)
        .count();
    let context = if positive + negative == 0 {
        50.0
    } else {
        positive as f64 / (positive + negative) as f64 * 100.0
    };

    // Momentum: ISO-week-over-week growth of self-mentions mapped to [0, 100]
    let this_week_key = iso_week_key(as_of);
    let last_week_key = iso_week_key(as_of - Duration::weeks(1));
    let this_week = self_citations
        .iter()
        .filter(|c| iso_week_key(c.tracked_at) == this_week_key)
        .count();
    let last_week = self_citations
        .iter()
        .filter(|c| iso_week_key(c.tracked_at) == last_week_key)
        .count();
    let momentum = if last_week == 0 {
        if this_week > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        let growth = (this_week as f64 - last_week as f64) / last_week as f64 * 100.0;
        (growth.clamp(-100.0, 100.0) + 100.0) / 2.0
    };

    ComponentScores {
        frequency,
        position,
        diversity,
        context,
        momentum,
    }
}

impl ScoringService {
    /// Compute and persist a visibility score over the 30-day window ending
    /// at `as_of` (now by default). Returns the appended row, deltas
    /// included.
    pub async fn compute_visibility_score(
        &self,
        project_id: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<VisibilityScoreRow> {
        let as_of = as_of.unwrap_or_else(Utc::now);
        let snapshot = self
            .store()
            .load_scoring_snapshot(project_id, as_of, SCORING_WINDOW_DAYS)
            .await?;

        let active_keywords = snapshot.keywords.iter().filter(|k| k.is_active).count();
        let components = compute_components(&snapshot.citations, active_keywords, as_of);
        let overall = components.overall();

        let prior_7d = self
            .store()
            .visibility_score_at_or_before(project_id, as_of - Duration::days(7))
            .await?;
        let prior_30d = self
            .store()
            .visibility_score_at_or_before(project_id, as_of - Duration::days(30))
            .await?;

        let row = VisibilityScoreRow {
            id: aivis_common::id::next_id(),
            project_id: project_id.to_string(),
            calculated_at: as_of,
            overall_score: overall,
            grade: grade_for(overall).to_string(),
            frequency_score: components.frequency,
            position_score: components.position,
            diversity_score: components.diversity,
            context_score: components.context,
            momentum_score: components.momentum,
            delta_7d: prior_7d.map(|p| overall - p.overall_score),
            delta_30d: prior_30d.map(|p| overall - p.overall_score),
        };

        let inserted = self.store().insert_visibility_score(&row).await?;
        tracing::info!(
            project_id,
            overall = inserted.overall_score,
            grade = %inserted.grade,
            citations = snapshot.citations.len(),
            "Visibility score computed"
        );
        Ok(inserted)
    }
}
