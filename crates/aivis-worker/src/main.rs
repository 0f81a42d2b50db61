use aivis_provider::ProviderRegistry;
use aivis_scoring::ScoringService;
use aivis_storage::Store;
use aivis_tracker::TrackerEngine;
use aivis_worker::config::WorkerConfig;
use aivis_worker::planner::Planner;
use aivis_worker::queue;
use aivis_worker::worker::Worker;
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Clean shutdown.
const EXIT_OK: i32 = 0;
/// Startup failure: missing store, missing broker, unparseable config.
const EXIT_STARTUP: i32 = 1;
/// Irrecoverable runtime: the store stayed unreachable past the restart
/// threshold.
const EXIT_RUNTIME: i32 = 2;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("aivis=info".parse().expect("static directive parses")),
        )
        .init();

    aivis_common::id::init(1, 1);

    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Worker failed to start");
            EXIT_STARTUP
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let config = WorkerConfig::from_env().context("loading configuration")?;

    tracing::info!(
        concurrency = config.worker_concurrency,
        providers = config.providers.len(),
        tracking_interval_hours = config.tracking_interval_hours,
        "aivis-worker starting"
    );

    let store = Arc::new(
        Store::connect(&config.database_url)
            .await
            .context("connecting to store")?,
    );
    let broker = queue::connect_broker(config.queue_url.as_deref(), store.clone())
        .context("connecting to broker")?;
    let registry =
        Arc::new(ProviderRegistry::build(&config.providers).context("building provider registry")?);
    if registry.is_empty() {
        tracing::warn!("No providers configured; tracking jobs will fail until keys are set");
    }

    // Requeue work a dead worker left behind
    let stale_before = Utc::now()
        - ChronoDuration::from_std(config.shutdown_grace * 2)
            .unwrap_or(ChronoDuration::seconds(60));
    match store.reap_stale_jobs(stale_before).await {
        Ok(0) => {}
        Ok(reaped) => tracing::info!(reaped, "Requeued stale processing jobs"),
        Err(e) => tracing::error!(error = %e, "Stale-job reap failed"),
    }

    let engine = Arc::new(TrackerEngine::new(store.clone(), registry.clone()));
    let scoring = Arc::new(ScoringService::new(store.clone()));

    let worker = Arc::new(Worker::new(
        store.clone(),
        broker.clone(),
        engine,
        config.worker_concurrency,
        config.job_deadline,
        config.max_retries,
    ));
    let planner = Arc::new(Planner::new(
        store.clone(),
        broker,
        scoring,
        registry.platforms(),
        config.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut worker_handle = tokio::spawn(worker.run(shutdown_rx.clone()));
    let daily_planner = planner.clone();
    let daily_rx = shutdown_rx.clone();
    let daily_handle = tokio::spawn(async move { daily_planner.run_daily_tracker(daily_rx).await });
    let score_planner = planner.clone();
    let score_rx = shutdown_rx.clone();
    let score_handle = tokio::spawn(async move { score_planner.run_score_loop(score_rx).await });
    let retention_planner = planner.clone();
    let retention_rx = shutdown_rx;
    let retention_handle =
        tokio::spawn(async move { retention_planner.run_retention_loop(retention_rx).await });

    let grace = config.shutdown_grace;
    let exit_code;

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!(grace_secs = grace.as_secs(), "Shutdown signal received, draining");
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(grace, &mut worker_handle).await {
                Ok(Ok(Ok(()))) => {
                    exit_code = EXIT_OK;
                }
                Ok(Ok(Err(e))) => {
                    tracing::error!(error = %e, "Worker exited with error during drain");
                    exit_code = EXIT_RUNTIME;
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Worker task panicked");
                    exit_code = EXIT_RUNTIME;
                }
                Err(_) => {
                    // In-flight jobs stay `processing`; the reaper requeues
                    // them on the next start
                    tracing::warn!("Drain grace expired, leaving remaining jobs to the reaper");
                    exit_code = EXIT_OK;
                }
            }
        }
        result = &mut worker_handle => {
            // The consumer only returns on its own when the store is gone
            match result {
                Ok(Ok(())) => exit_code = EXIT_OK,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Worker hit an irrecoverable runtime error");
                    exit_code = EXIT_RUNTIME;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Worker task panicked");
                    exit_code = EXIT_RUNTIME;
                }
            }
            let _ = shutdown_tx.send(true);
        }
    }

    daily_handle.abort();
    score_handle.abort();
    retention_handle.abort();
    tracing::info!(exit_code, "aivis-worker stopped");

    Ok(exit_code)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler");
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}
