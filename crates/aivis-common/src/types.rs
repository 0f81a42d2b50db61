use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A generative-AI answer engine tracked by the system.
///
/// The set is closed at any given release; adding a platform means
/// registering an adapter for it in `aivis-provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GoogleAiOverview,
    Gemini,
    Chatgpt,
    Perplexity,
    Copilot,
    Claude,
    Grok,
    Deepseek,
}

impl Platform {
    /// Every platform registered at this release, in enum order.
    pub const ALL: [Platform; 8] = [
        Platform::GoogleAiOverview,
        Platform::Gemini,
        Platform::Chatgpt,
        Platform::Perplexity,
        Platform::Copilot,
        Platform::Claude,
        Platform::Grok,
        Platform::Deepseek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::GoogleAiOverview => "google_ai_overview",
            Platform::Gemini => "gemini",
            Platform::Chatgpt => "chatgpt",
            Platform::Perplexity => "perplexity",
            Platform::Copilot => "copilot",
            Platform::Claude => "claude",
            Platform::Grok => "grok",
            Platform::Deepseek => "deepseek",
        }
    }

    /// Environment variable segment for this platform, e.g. `GEMINI` in
    /// `PROVIDER_GEMINI_API_KEY`.
    pub fn env_name(&self) -> &'static str {
        match self {
            Platform::GoogleAiOverview => "GOOGLE_AI_OVERVIEW",
            Platform::Gemini => "GEMINI",
            Platform::Chatgpt => "CHATGPT",
            Platform::Perplexity => "PERPLEXITY",
            Platform::Copilot => "COPILOT",
            Platform::Claude => "CLAUDE",
            Platform::Grok => "GROK",
            Platform::Deepseek => "DEEPSEEK",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google_ai_overview" => Ok(Platform::GoogleAiOverview),
            "gemini" => Ok(Platform::Gemini),
            "chatgpt" => Ok(Platform::Chatgpt),
            "perplexity" => Ok(Platform::Perplexity),
            "copilot" => Ok(Platform::Copilot),
            "claude" => Ok(Platform::Claude),
            "grok" => Ok(Platform::Grok),
            "deepseek" => Ok(Platform::Deepseek),
            _ => Err(format!("unknown platform: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Tone of the answer text in the sentences that mention the tracked domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            _ => Err(format!("unknown sentiment: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    NewCitation,
    LostCitation,
    PositionChange,
    CompetitorGain,
    NewPlatform,
    SentimentShift,
    VolumeSpike,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::NewCitation => "new_citation",
            AlertType::LostCitation => "lost_citation",
            AlertType::PositionChange => "position_change",
            AlertType::CompetitorGain => "competitor_gain",
            AlertType::NewPlatform => "new_platform",
            AlertType::SentimentShift => "sentiment_shift",
            AlertType::VolumeSpike => "volume_spike",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new_citation" => Ok(AlertType::NewCitation),
            "lost_citation" => Ok(AlertType::LostCitation),
            "position_change" => Ok(AlertType::PositionChange),
            "competitor_gain" => Ok(AlertType::CompetitorGain),
            "new_platform" => Ok(AlertType::NewPlatform),
            "sentiment_shift" => Ok(AlertType::SentimentShift),
            "volume_spike" => Ok(AlertType::VolumeSpike),
            _ => Err(format!("unknown alert type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl JobStatus {
    /// Completed and failed jobs are never picked up again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Retrying => "retrying",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "retrying" => Ok(JobStatus::Retrying),
            _ => Err(format!("unknown job status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunnelStage {
    Awareness,
    Consideration,
    Decision,
}

impl FunnelStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunnelStage::Awareness => "awareness",
            FunnelStage::Consideration => "consideration",
            FunnelStage::Decision => "decision",
        }
    }
}

impl std::str::FromStr for FunnelStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "awareness" => Ok(FunnelStage::Awareness),
            "consideration" => Ok(FunnelStage::Consideration),
            "decision" => Ok(FunnelStage::Decision),
            _ => Err(format!("unknown funnel stage: {s}")),
        }
    }
}

/// One cited URL that does not belong to the tracked domain. Stored as a
/// JSON array on the citation row, provider rank preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorCitation {
    pub domain: String,
    pub url: String,
    pub position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Message handed from the planner to the worker through the broker. The
/// persisted tracking_jobs row stays authoritative; losing one of these is
/// recoverable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_id: String,
    pub project_id: String,
    pub keyword_id: String,
    pub platform: Platform,
    pub scheduled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn platform_round_trips_through_str() {
        for p in Platform::ALL {
            assert_eq!(Platform::from_str(p.as_str()).unwrap(), p);
        }
    }

    #[test]
    fn platform_serde_uses_snake_case() {
        let json = serde_json::to_string(&Platform::GoogleAiOverview).unwrap();
        assert_eq!(json, "\"google_ai_overview\"");
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Retrying.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }
}
