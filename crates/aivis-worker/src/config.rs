//! Worker configuration from process environment variables. Credentials
//! are read once at startup; rotation requires a restart.

use aivis_common::types::Platform;
use aivis_provider::{registry, ProviderConfig};
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub queue_url: Option<String>,
    pub worker_concurrency: usize,
    pub job_deadline: Duration,
    pub tracking_interval_hours: i64,
    pub max_retries: i32,
    pub retention_citations_days: i64,
    pub retention_alerts_days: i64,
    pub retention_jobs_days: i64,
    /// Local time of day ("HH:MM") the daily tracker plans its batch.
    pub daily_tracking_time: String,
    pub shutdown_grace: Duration,
    pub providers: HashMap<Platform, ProviderConfig>,
}

fn parse_or_default<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid value for {key}: {raw}")),
        None => Ok(default),
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; the environment in production,
    /// a map in tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .context("DATABASE_URL is required")?;

        let daily_tracking_time =
            lookup("TRACKING_DAILY_TIME").unwrap_or_else(|| "02:00".to_string());
        parse_daily_time(&daily_tracking_time)
            .with_context(|| format!("invalid TRACKING_DAILY_TIME: {daily_tracking_time}"))?;

        let mut providers = HashMap::new();
        for platform in Platform::ALL {
            let env = platform.env_name();
            let Some(api_key) = lookup(&format!("PROVIDER_{env}_API_KEY")) else {
                continue;
            };
            if api_key.trim().is_empty() {
                continue;
            }
            let rate_per_min = parse_or_default(
                lookup(&format!("PROVIDER_{env}_RATE_PER_MIN")),
                "PROVIDER_*_RATE_PER_MIN",
                registry::DEFAULT_RATE_PER_MIN,
            )?;
            providers.insert(
                platform,
                ProviderConfig {
                    api_key,
                    rate_per_min,
                    base_url: lookup(&format!("PROVIDER_{env}_BASE_URL")),
                    model: lookup(&format!("PROVIDER_{env}_MODEL")),
                },
            );
        }

        Ok(Self {
            database_url,
            queue_url: lookup("QUEUE_URL").filter(|v| !v.trim().is_empty()),
            worker_concurrency: parse_or_default(
                lookup("WORKER_CONCURRENCY"),
                "WORKER_CONCURRENCY",
                5usize,
            )?
            .max(1),
            job_deadline: Duration::from_secs(parse_or_default(
                lookup("JOB_DEADLINE_SECONDS"),
                "JOB_DEADLINE_SECONDS",
                60u64,
            )?),
            tracking_interval_hours: parse_or_default(
                lookup("TRACKING_INTERVAL_HOURS"),
                "TRACKING_INTERVAL_HOURS",
                24i64,
            )?,
            max_retries: parse_or_default(lookup("MAX_RETRIES"), "MAX_RETRIES", 3i32)?,
            retention_citations_days: parse_or_default(
                lookup("RETENTION_CITATIONS_DAYS"),
                "RETENTION_CITATIONS_DAYS",
                365i64,
            )?,
            retention_alerts_days: parse_or_default(
                lookup("RETENTION_ALERTS_DAYS"),
                "RETENTION_ALERTS_DAYS",
                90i64,
            )?,
            retention_jobs_days: parse_or_default(
                lookup("RETENTION_JOBS_DAYS"),
                "RETENTION_JOBS_DAYS",
                30i64,
            )?,
            daily_tracking_time,
            shutdown_grace: Duration::from_secs(parse_or_default(
                lookup("SHUTDOWN_GRACE_SECONDS"),
                "SHUTDOWN_GRACE_SECONDS",
                30u64,
            )?),
            providers,
        })
    }
}

/// Parse "HH:MM" into hour and minute.
pub fn parse_daily_time(time: &str) -> Result<(u32, u32)> {
    let Some((hour, minute)) = time.split_once(':') else {
        bail!("expected HH:MM");
    };
    let hour: u32 = hour.trim().parse().context("invalid hour")?;
    let minute: u32 = minute.trim().parse().context("invalid minute")?;
    if hour >= 24 {
        bail!("hour must be 0-23");
    }
    if minute >= 60 {
        bail!("minute must be 0-59");
    }
    Ok((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn missing_database_url_is_a_startup_error() {
        assert!(WorkerConfig::from_lookup(lookup_from(&[])).is_err());
    }

    #[test]
    fn defaults_apply_when_keys_are_absent() {
        let config =
            WorkerConfig::from_lookup(lookup_from(&[("DATABASE_URL", "sqlite::memory:")])).unwrap();
        assert_eq!(config.worker_concurrency, 5);
        assert_eq!(config.job_deadline, Duration::from_secs(60));
        assert_eq!(config.tracking_interval_hours, 24);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retention_citations_days, 365);
        assert_eq!(config.retention_alerts_days, 90);
        assert_eq!(config.retention_jobs_days, 30);
        assert_eq!(config.daily_tracking_time, "02:00");
        assert!(config.providers.is_empty());
    }

    #[test]
    fn provider_key_presence_enables_the_adapter() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("PROVIDER_GEMINI_API_KEY", "g-key"),
            ("PROVIDER_GEMINI_RATE_PER_MIN", "25"),
            ("PROVIDER_CHATGPT_API_KEY", ""),
        ]))
        .unwrap();

        assert_eq!(config.providers.len(), 1);
        let gemini = &config.providers[&Platform::Gemini];
        assert_eq!(gemini.api_key, "g-key");
        assert_eq!(gemini.rate_per_min, 25);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let result = WorkerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("WORKER_CONCURRENCY", "not-a-number"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn daily_time_validation() {
        assert!(parse_daily_time("02:00").is_ok());
        assert!(parse_daily_time("23:59").is_ok());
        assert!(parse_daily_time("24:00").is_err());
        assert!(parse_daily_time("nope").is_err());
    }
}
