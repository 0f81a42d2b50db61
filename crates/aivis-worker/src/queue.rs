//! The work-queue seam. Delivery is at-least-once and the persisted
//! tracking_jobs row stays authoritative, so a lost message is recoverable:
//! the default broker simply reads due rows back out of the store.

use aivis_common::types::JobMessage;
use aivis_storage::{NewJob, Store};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait Broker: Send + Sync {
    /// Make a job visible to workers. Duplicate enqueues of a non-terminal
    /// (project, keyword, platform, scheduled_at) are no-ops.
    async fn enqueue(&self, message: &JobMessage) -> Result<bool>;

    /// Fetch up to `limit` due deliveries. May redeliver: consumers claim
    /// the underlying row before doing work.
    async fn poll(&self, limit: u64) -> Result<Vec<JobMessage>>;
}

/// Store-backed queue: the tracking_jobs table is both the ledger and the
/// delivery channel.
pub struct DbQueue {
    store: Arc<Store>,
}

impl DbQueue {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Broker for DbQueue {
    async fn enqueue(&self, message: &JobMessage) -> Result<bool> {
        self.store
            .insert_job(&NewJob {
                project_id: message.project_id.clone(),
                keyword_id: message.keyword_id.clone(),
                platform: message.platform,
                scheduled_at: message.scheduled_at,
            })
            .await
    }

    async fn poll(&self, limit: u64) -> Result<Vec<JobMessage>> {
        let jobs = self.store.due_jobs(Utc::now(), limit).await?;
        Ok(jobs
            .into_iter()
            .map(|job| JobMessage {
                job_id: job.id,
                project_id: job.project_id,
                keyword_id: job.keyword_id,
                platform: job.platform,
                scheduled_at: job.scheduled_at,
            })
            .collect())
    }
}

/// Resolve the configured broker. The store-backed queue is the only wire
/// format this release ships; an unrecognized QUEUE_URL is a startup error
/// rather than a silent fallback.
pub fn connect_broker(queue_url: Option<&str>, store: Arc<Store>) -> Result<Arc<dyn Broker>> {
    match queue_url {
        None => Ok(Arc::new(DbQueue::new(store))),
        Some(url) if url.starts_with("db:") || url.starts_with("sqlite:") => {
            Ok(Arc::new(DbQueue::new(store)))
        }
        Some(url) => bail!("unsupported QUEUE_URL scheme: {url}"),
    }
}
