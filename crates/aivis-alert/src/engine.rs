use aivis_common::types::{AlertType, Sentiment, Severity};
use aivis_storage::{CitationRow, NewAlert, Store};
use std::sync::Arc;

/// Minimum rank movement before a position change is worth an alert.
pub const POSITION_CHANGE_THRESHOLD: i32 = 2;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn base_alert(current: &CitationRow, alert_type: AlertType, severity: Severity) -> NewAlert {
    NewAlert {
        project_id: current.project_id.clone(),
        alert_type,
        severity,
        title: String::new(),
        description: String::new(),
        keyword_id: Some(current.keyword_id.clone()),
        platform: Some(current.platform),
        citation_id: Some(current.id.clone()),
        previous_value: None,
        current_value: None,
        change_percent: None,
    }
}

/// Diff one (keyword, platform) stream step and derive the alerts it
/// implies. `previous` is the most recent citation strictly before
/// `current`, or `None` for a first observation.
///
/// `competitor_gain`, `new_platform` and `volume_spike` are intentionally
/// not derived here; they belong to batch checks in the scoring pipeline.
pub fn diff_citations(
    keyword_text: &str,
    previous: Option<&CitationRow>,
    current: &CitationRow,
) -> Vec<NewAlert> {
    let platform = current.platform;
    let mut alerts = Vec::new();

    let Some(previous) = previous else {
        if current.domain_mentioned {
            let mut alert = base_alert(current, AlertType::NewCitation, Severity::Info);
            alert.title = format!("New citation on {platform}");
            alert.description = format!(
                "\"{keyword_text}\" now cites the tracked domain at position {}",
                current
                    .citation_position
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "?".to_string())
            );
            alert.current_value = current.citation_position.map(|p| p.to_string());
            alerts.push(alert);
        }
        return alerts;
    };

    if previous.domain_mentioned && !current.domain_mentioned {
        let mut alert = base_alert(current, AlertType::LostCitation, Severity::Warning);
        alert.title = format!("Lost citation on {platform}");
        alert.description = format!(
            "\"{keyword_text}\" no longer cites the tracked domain (was position {})",
            previous
                .citation_position
                .map(|p| p.to_string())
                .unwrap_or_else(|| "?".to_string())
        );
        alert.previous_value = previous.citation_position.map(|p| p.to_string());
        alerts.push(alert);
    }

    if let (true, true, Some(prev_pos), Some(curr_pos)) = (
        previous.domain_mentioned,
        current.domain_mentioned,
        previous.citation_position,
        current.citation_position,
    ) {
        let delta = prev_pos - curr_pos;
        if delta.abs() >= POSITION_CHANGE_THRESHOLD {
            let improved = delta > 0;
            let severity = if improved { Severity::Info } else { Severity::Warning };
            let mut alert = base_alert(current, AlertType::PositionChange, severity);
            alert.title = if improved {
                format!("Position improved on {platform}")
            } else {
                format!("Position dropped on {platform}")
            };
            alert.description = format!(
                "\"{keyword_text}\" moved from position {prev_pos} to {curr_pos}"
            );
            alert.previous_value = Some(prev_pos.to_string());
            alert.current_value = Some(curr_pos.to_string());
            alert.change_percent =
                Some(round2(f64::from(delta) / f64::from(prev_pos) * 100.0));
            alerts.push(alert);
        }
    }

    if current.domain_mentioned && previous.sentiment != current.sentiment {
        let severity = if current.sentiment == Sentiment::Negative {
            Severity::Warning
        } else {
            Severity::Info
        };
        let mut alert = base_alert(current, AlertType::SentimentShift, severity);
        alert.title = format!("Sentiment shift on {platform}");
        alert.description = format!(
            "\"{keyword_text}\" sentiment moved from {} to {}",
            previous.sentiment, current.sentiment
        );
        alert.previous_value = Some(previous.sentiment.to_string());
        alert.current_value = Some(current.sentiment.to_string());
        alerts.push(alert);
    }

    alerts
}

/// Thin persistence wrapper: derive alerts and write them best-effort.
pub struct AlertEngine {
    store: Arc<Store>,
}

impl AlertEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Diff and persist. A failed alert write is logged and swallowed; it
    /// never affects the tracking job that produced the citation. Returns
    /// how many alerts were stored.
    pub async fn process(
        &self,
        keyword_text: &str,
        previous: Option<&CitationRow>,
        current: &CitationRow,
    ) -> usize {
        let mut stored = 0;
        for alert in diff_citations(keyword_text, previous, current) {
            match self.store.insert_alert(&alert).await {
                Ok(row) => {
                    tracing::info!(
                        alert_type = %row.alert_type,
                        severity = %row.severity,
                        keyword_id = ?row.keyword_id,
                        platform = ?row.platform.map(|p| p.as_str()),
                        "Alert raised"
                    );
                    stored += 1;
                }
                Err(e) => {
                    tracing::error!(
                        alert_type = %alert.alert_type,
                        error = %e,
                        "Failed to persist alert"
                    );
                }
            }
        }
        stored
    }
}
