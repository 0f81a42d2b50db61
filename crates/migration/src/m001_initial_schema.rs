use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
PRAGMA journal_mode=WAL;

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    primary_domain TEXT NOT NULL,
    competitor_domains TEXT NOT NULL DEFAULT '[]',
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_projects_is_active ON projects(is_active);

CREATE TABLE IF NOT EXISTS keywords (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    keyword_text TEXT NOT NULL,
    priority_level INTEGER NOT NULL DEFAULT 3,
    funnel_stage TEXT NOT NULL DEFAULT 'awareness',
    is_active INTEGER NOT NULL DEFAULT 1,
    last_tracked_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(project_id, keyword_text)
);
CREATE INDEX IF NOT EXISTS idx_keywords_project ON keywords(project_id, is_active);

CREATE TABLE IF NOT EXISTS citations (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    keyword_id TEXT NOT NULL,
    platform TEXT NOT NULL,
    tracked_at TEXT NOT NULL,
    domain_mentioned INTEGER NOT NULL DEFAULT 0,
    citation_position INTEGER,
    citation_context TEXT,
    full_response_text TEXT NOT NULL DEFAULT '',
    response_summary TEXT NOT NULL DEFAULT '',
    sentiment TEXT NOT NULL DEFAULT 'neutral',
    confidence_score REAL NOT NULL DEFAULT 0.5,
    word_count INTEGER NOT NULL DEFAULT 0,
    competitor_citations TEXT NOT NULL DEFAULT '[]',
    total_sources_cited INTEGER NOT NULL DEFAULT 0,
    response_time_ms INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_citations_keyword_platform
    ON citations(keyword_id, platform, tracked_at DESC);
CREATE INDEX IF NOT EXISTS idx_citations_project_tracked
    ON citations(project_id, tracked_at);

CREATE TABLE IF NOT EXISTS tracking_jobs (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    keyword_id TEXT NOT NULL,
    platform TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    scheduled_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    citation_found INTEGER,
    result_data TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_jobs_status_scheduled
    ON tracking_jobs(status, scheduled_at);
CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_open_unique
    ON tracking_jobs(project_id, keyword_id, platform, scheduled_at)
    WHERE status IN ('pending', 'processing', 'retrying');

CREATE TABLE IF NOT EXISTS daily_metrics (
    project_id TEXT NOT NULL,
    date TEXT NOT NULL,
    platform TEXT NOT NULL,
    total_citations INTEGER NOT NULL DEFAULT 0,
    mentions INTEGER NOT NULL DEFAULT 0,
    avg_position REAL,
    positive_count INTEGER NOT NULL DEFAULT 0,
    neutral_count INTEGER NOT NULL DEFAULT 0,
    negative_count INTEGER NOT NULL DEFAULT 0,
    competitor_mentions INTEGER NOT NULL DEFAULT 0,
    avg_confidence REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (project_id, date, platform)
);

CREATE TABLE IF NOT EXISTS visibility_scores (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    calculated_at TEXT NOT NULL,
    overall_score REAL NOT NULL,
    grade TEXT NOT NULL,
    frequency_score REAL NOT NULL,
    position_score REAL NOT NULL,
    diversity_score REAL NOT NULL,
    context_score REAL NOT NULL,
    momentum_score REAL NOT NULL,
    delta_7d REAL,
    delta_30d REAL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_scores_project_calculated
    ON visibility_scores(project_id, calculated_at DESC);

CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL DEFAULT 'info',
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    keyword_id TEXT,
    platform TEXT,
    citation_id TEXT,
    previous_value TEXT,
    current_value TEXT,
    change_percent REAL,
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alerts_unread
    ON alerts(project_id, is_read) WHERE is_read = 0;
CREATE INDEX IF NOT EXISTS idx_alerts_project_created
    ON alerts(project_id, created_at DESC);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS alerts;
DROP TABLE IF EXISTS visibility_scores;
DROP TABLE IF EXISTS daily_metrics;
DROP TABLE IF EXISTS tracking_jobs;
DROP TABLE IF EXISTS citations;
DROP TABLE IF EXISTS keywords;
DROP TABLE IF EXISTS projects;
";
