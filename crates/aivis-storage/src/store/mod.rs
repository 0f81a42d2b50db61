use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};

pub mod alert;
pub mod citation;
pub mod job;
pub mod keyword;
pub mod metric;
pub mod project;
pub mod score;

pub use alert::{AlertFilter, AlertRow, NewAlert, UnreadCounts};
pub use citation::{CitationRow, NewCitation};
pub use job::{JobCounts, NewJob, TrackingJobRow, TrackingStatus};
pub use keyword::{KeywordRow, KeywordUpdate, NewKeyword};
pub use metric::DailyMetricRow;
pub use project::{NewProject, ProjectRow, ProjectUpdate};
pub use score::VisibilityScoreRow;

/// Unified access layer over the relational store.
///
/// All methods are `async fn` backed by SeaORM. The store is the only
/// system of record: broker messages merely point at `tracking_jobs` rows.
pub struct Store {
    pub(crate) db: DatabaseConnection,
}

impl Store {
    /// Connect to the database and bring the schema up to date.
    pub async fn connect(url: &str) -> Result<Self> {
        let db = Database::connect(url).await?;

        if url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;
        tracing::info!("Store initialized, schema up to date");

        Ok(Self { db })
    }

    /// In-memory store for tests. A single pooled connection keeps every
    /// query on the same in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1);
        let db = Database::connect(options).await?;
        Migrator::up(&db, None).await?;
        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
