//! Queue consumer: claims due tracking jobs, drives the tracking engine
//! under a deadline, and applies the retry policy. The engine itself owns
//! the citation write and the alert diff.

use crate::queue::Broker;
use aivis_common::types::JobMessage;
use aivis_provider::QueryOptions;
use aivis_storage::Store;
use aivis_tracker::{TrackResult, TrackerEngine};
use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

/// Base delay for the first retry.
const BACKOFF_BASE_SECS: u64 = 30;
/// Store-write failures wait at least this long; the provider call already
/// happened and re-querying before the store recovers is wasted spend.
const STORE_RETRY_FLOOR_SECS: u64 = 30;
/// How often the consumer polls for due jobs.
const POLL_INTERVAL_SECS: u64 = 5;
/// Consecutive poll failures tolerated before the process gives up.
const MAX_CONSECUTIVE_POLL_FAILURES: u32 = 12;

/// Exponential backoff with ±20% jitter: 30 s × 2^retry, so 30 s, 60 s,
/// 120 s for the default three attempts.
pub fn backoff_delay(retry_count: i32) -> Duration {
    let exponent = retry_count.clamp(0, 10) as u32;
    let base = BACKOFF_BASE_SECS.saturating_mul(2u64.saturating_pow(exponent));
    let jitter = rand::thread_rng().gen_range(0.8..=1.2);
    Duration::from_secs_f64(base as f64 * jitter)
}

pub struct Worker {
    store: Arc<Store>,
    broker: Arc<dyn Broker>,
    engine: Arc<TrackerEngine>,
    concurrency: usize,
    job_deadline: Duration,
    max_retries: i32,
}

impl Worker {
    pub fn new(
        store: Arc<Store>,
        broker: Arc<dyn Broker>,
        engine: Arc<TrackerEngine>,
        concurrency: usize,
        job_deadline: Duration,
        max_retries: i32,
    ) -> Self {
        Self {
            store,
            broker,
            engine,
            concurrency,
            job_deadline,
            max_retries,
        }
    }

    /// Consume until shutdown flips. Returns an error only when the store
    /// stays unreachable past the restart threshold (irrecoverable).
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            concurrency = self.concurrency,
            deadline_secs = self.job_deadline.as_secs(),
            "Worker started"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tick = tokio::time::interval(Duration::from_secs(POLL_INTERVAL_SECS));
        let mut poll_failures: u32 = 0;

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }

            let messages = match self.broker.poll(self.concurrency as u64 * 2).await {
                Ok(messages) => {
                    poll_failures = 0;
                    messages
                }
                Err(e) => {
                    poll_failures += 1;
                    tracing::error!(error = %e, consecutive = poll_failures, "Job poll failed");
                    if poll_failures >= MAX_CONSECUTIVE_POLL_FAILURES {
                        anyhow::bail!("store unreachable for {poll_failures} consecutive polls");
                    }
                    continue;
                }
            };

            for message in messages {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let worker = self.clone();
                tokio::spawn(async move {
                    worker.process_message(message).await;
                    drop(permit);
                });
            }
        }

        // Drain: wait for in-flight jobs; anything still processing after
        // the grace window is requeued by the reaper on restart.
        tracing::info!("Worker draining in-flight jobs");
        let _ = semaphore.acquire_many(self.concurrency as u32).await;
        tracing::info!("Worker stopped");
        Ok(())
    }

    async fn process_message(&self, message: JobMessage) {
        let now = Utc::now();

        // At-least-once delivery: only the claimant runs the job
        match self.store.claim_job(&message.job_id, now).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(job_id = %message.job_id, "Duplicate delivery discarded");
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %message.job_id, error = %e, "Claim failed");
                return;
            }
        }

        let loaded = match self.load_pair(&message).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(job_id = %message.job_id, error = %e, "Job context load failed");
                self.retry_or_fail(&message, &format!("context load failed: {e}"), true)
                    .await;
                return;
            }
        };
        let Some((keyword, project)) = loaded else {
            // Keyword or project deleted since planning: terminal, ack
            if let Err(e) = self.store.fail_job(&message.job_id, "orphaned", None).await {
                tracing::error!(job_id = %message.job_id, error = %e, "Failed to mark orphaned job");
            }
            return;
        };

        let tracked = tokio::time::timeout(
            self.job_deadline,
            self.engine.track_keyword(
                &keyword,
                &project,
                &[message.platform],
                &QueryOptions::default(),
            ),
        )
        .await;

        let result = match tracked {
            Ok(mut results) if !results.is_empty() => results.remove(0),
            Ok(_) => {
                self.retry_or_fail(&message, "engine returned no result", false)
                    .await;
                return;
            }
            Err(_) => {
                tracing::warn!(
                    job_id = %message.job_id,
                    deadline_secs = self.job_deadline.as_secs(),
                    "Job exceeded its deadline"
                );
                self.retry_or_fail(&message, "timeout", true).await;
                return;
            }
        };

        if result.success {
            self.finish_success(&message, &result).await;
        } else {
            let error = result.error.as_deref().unwrap_or("unknown error");
            let store_floor = result.error_kind.as_deref() == Some("store");
            if result.retriable {
                self.retry_with_floor(&message, error, store_floor).await;
            } else {
                self.retry_or_fail(&message, error, false).await;
            }
        }
    }

    async fn load_pair(
        &self,
        message: &JobMessage,
    ) -> Result<Option<(aivis_storage::KeywordRow, aivis_storage::ProjectRow)>> {
        let Some(keyword) = self.store.get_keyword(&message.keyword_id).await? else {
            return Ok(None);
        };
        let Some(project) = self.store.get_project(&message.project_id).await? else {
            return Ok(None);
        };
        Ok(Some((keyword, project)))
    }

    async fn finish_success(&self, message: &JobMessage, result: &TrackResult) {
        let citation = match &result.citation {
            Some(citation) => citation,
            None => {
                // success without a row should be unreachable
                self.retry_or_fail(message, "missing citation on success", false)
                    .await;
                return;
            }
        };

        let result_data = serde_json::to_value(result).ok();
        if let Err(e) = self
            .store
            .complete_job(&message.job_id, citation.domain_mentioned, result_data.as_ref())
            .await
        {
            tracing::error!(job_id = %message.job_id, error = %e, "Failed to mark job completed");
        } else {
            tracing::info!(
                job_id = %message.job_id,
                platform = %message.platform,
                mentioned = citation.domain_mentioned,
                position = ?citation.citation_position,
                "Job completed"
            );
        }
    }

    /// Transition a failed attempt to retrying (when retriable and under
    /// the retry budget) or terminally failed.
    async fn retry_or_fail(&self, message: &JobMessage, error: &str, retriable: bool) {
        self.apply_failure(message, error, retriable, false).await;
    }

    async fn retry_with_floor(&self, message: &JobMessage, error: &str, store_floor: bool) {
        self.apply_failure(message, error, true, store_floor).await;
    }

    async fn apply_failure(&self, message: &JobMessage, error: &str, retriable: bool, store_floor: bool) {
        let job = match self.store.get_job(&message.job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(job_id = %message.job_id, error = %e, "Job reload failed");
                return;
            }
        };

        let retry_at = if retriable && job.retry_count < self.max_retries {
            let mut delay = backoff_delay(job.retry_count);
            if store_floor && delay < Duration::from_secs(STORE_RETRY_FLOOR_SECS) {
                delay = Duration::from_secs(STORE_RETRY_FLOOR_SECS);
            }
            Some(Utc::now() + ChronoDuration::from_std(delay).unwrap_or(ChronoDuration::seconds(30)))
        } else {
            None
        };

        match self.store.fail_job(&message.job_id, error, retry_at).await {
            Ok(row) => {
                tracing::warn!(
                    job_id = %message.job_id,
                    platform = %message.platform,
                    status = %row.status,
                    retry_count = row.retry_count,
                    error,
                    "Job attempt failed"
                );
            }
            Err(e) => {
                tracing::error!(job_id = %message.job_id, error = %e, "Failed to record job failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::DbQueue;
    use aivis_common::types::{FunnelStage, JobStatus, Platform};
    use aivis_provider::error::Result as ProviderResult;
    use aivis_provider::{
        AdapterSource, ProviderAdapter, ProviderAnswer, ProviderError, RateLimitStatus,
        RawCitation,
    };
    use aivis_storage::{NewKeyword, NewProject};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedAdapter {
        script: Mutex<Vec<ProviderResult<ProviderAnswer>>>,
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn platform(&self) -> Platform {
            Platform::Gemini
        }

        async fn query(
            &self,
            _query: &str,
            _options: &aivis_provider::QueryOptions,
        ) -> ProviderResult<ProviderAnswer> {
            self.script
                .lock()
                .unwrap()
                .pop()
                .expect("scripted adapter exhausted")
        }

        async fn rate_limit_status(&self) -> RateLimitStatus {
            RateLimitStatus {
                limit: 10,
                used: 0,
                reset_at: None,
            }
        }
    }

    struct StubSource {
        adapters: HashMap<Platform, Arc<dyn ProviderAdapter>>,
    }

    impl AdapterSource for StubSource {
        fn adapter(&self, platform: Platform) -> Option<Arc<dyn ProviderAdapter>> {
            self.adapters.get(&platform).cloned()
        }

        fn platforms(&self) -> Vec<Platform> {
            self.adapters.keys().copied().collect()
        }

        fn cooldown_until(&self, _platform: Platform) -> Option<chrono::DateTime<Utc>> {
            None
        }

        fn start_cooldown(&self, _platform: Platform) {}
    }

    async fn build_worker(
        script: Vec<ProviderResult<ProviderAnswer>>,
    ) -> (Arc<Worker>, Arc<Store>, JobMessage) {
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
                funnel_stage: FunnelStage::Awareness,
            })
            .await
            .unwrap();

        let broker = Arc::new(DbQueue::new(store.clone()));
        broker
            .enqueue(&JobMessage {
                job_id: String::new(),
                project_id: project.id.clone(),
                keyword_id: keyword.id.clone(),
                platform: Platform::Gemini,
                scheduled_at: Utc::now(),
            })
            .await
            .unwrap();
        let message = broker.poll(1).await.unwrap().pop().unwrap();

        let mut adapters: HashMap<Platform, Arc<dyn ProviderAdapter>> = HashMap::new();
        adapters.insert(
            Platform::Gemini,
            Arc::new(ScriptedAdapter {
                script: Mutex::new(script),
            }),
        );
        let source = Arc::new(StubSource { adapters });

        let engine = Arc::new(TrackerEngine::new(store.clone(), source));
        let worker = Arc::new(Worker::new(
            store.clone(),
            broker,
            engine,
            2,
            Duration::from_secs(5),
            3,
        ));
        (worker, store, message)
    }

    fn answer() -> ProviderAnswer {
        ProviderAnswer {
            platform: Platform::Gemini,
            query: "best crm".into(),
            response_text: "Acme.com is a leading provider.".into(),
            citations: vec![RawCitation {
                url: "https://acme.com/guide".into(),
                title: None,
                snippet: None,
                rank: 1,
            }],
            response_time_ms: 800,
        }
    }

    #[tokio::test]
    async fn rate_limited_attempt_retries_then_completes() {
        // Script is popped from the back: first rate-limited, then success
        let (worker, store, message) = build_worker(vec![
            Ok(answer()),
            Err(ProviderError::RateLimited {
                platform: Platform::Gemini,
            }),
        ])
        .await;

        worker.process_message(message.clone()).await;

        let job = store.get_job(&message.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Retrying);
        assert_eq!(job.retry_count, 1);
        // No citation is written for the failed attempt
        assert!(store
            .latest_citation(&message.keyword_id, Platform::Gemini)
            .await
            .unwrap()
            .is_none());

        // Backoff elapsed: the redelivered message succeeds
        worker.process_message(message.clone()).await;

        let job = store.get_job(&message.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.citation_found, Some(true));
        assert!(job.result_data.is_some());

        let citation = store
            .latest_citation(&message.keyword_id, Platform::Gemini)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(citation.citation_position, Some(1));

        // First observation with a mention raises new_citation
        let counts = store.unread_alert_counts(&message.project_id).await.unwrap();
        assert_eq!(counts.total, 1);
    }

    #[tokio::test]
    async fn non_retriable_error_fails_terminally() {
        let (worker, store, message) = build_worker(vec![Err(ProviderError::Auth {
            platform: Platform::Gemini,
            message: "bad key".into(),
        })])
        .await;

        worker.process_message(message.clone()).await;

        let job = store.get_job(&message.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_delivery_is_discarded_after_completion() {
        let (worker, store, message) = build_worker(vec![Ok(answer())]).await;

        worker.process_message(message.clone()).await;
        // Redelivery of a completed job is a no-op (the scripted adapter
        // would panic if queried again)
        worker.process_message(message.clone()).await;

        let job = store.get_job(&message.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn backoff_doubles_with_bounded_jitter() {
        for (retry, base) in [(0, 30.0), (1, 60.0), (2, 120.0)] {
            let delay = backoff_delay(retry).as_secs_f64();
            assert!(delay >= base * 0.8 - 1e-9, "retry {retry}: {delay}");
            assert!(delay <= base * 1.2 + 1e-9, "retry {retry}: {delay}");
        }
    }

    #[test]
    fn backoff_exponent_is_clamped() {
        // A pathological retry_count must not overflow
        let delay = backoff_delay(1000);
        assert!(delay.as_secs() <= 30 * 1024 * 2);
    }
}
