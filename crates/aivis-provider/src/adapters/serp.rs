use crate::error::{ProviderError, Result};
use crate::limiter::{RateLimitStatus, SlidingWindowLimiter};
use crate::models::SerpResponse;
use crate::{ProviderAdapter, ProviderAnswer, QueryOptions, RawCitation, DEFAULT_QUERY_TIMEOUT};
use aivis_common::types::Platform;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Instant;

/// Google AI Overviews are scraped through a SERP API. When the query does
/// not trigger an AI Overview block, the adapter returns the plain organic
/// snippet with an empty citation list; that is a valid answer, not an
/// error.
pub struct SerpAdapter {
    base_url: String,
    api_key: String,
    client: Client,
    limiter: SlidingWindowLimiter,
}

impl SerpAdapter {
    pub fn new(api_key: String, base_url: String, rate_per_min: usize) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_QUERY_TIMEOUT * 2)
            .build()?;
        Ok(Self {
            base_url,
            api_key,
            client,
            limiter: SlidingWindowLimiter::per_minute(rate_per_min),
        })
    }
}

#[async_trait]
impl ProviderAdapter for SerpAdapter {
    fn platform(&self) -> Platform {
        Platform::GoogleAiOverview
    }

    async fn query(&self, query_text: &str, options: &QueryOptions) -> Result<ProviderAnswer> {
        self.limiter.acquire().await;

        let mut params = vec![
            ("engine".to_string(), "google".to_string()),
            ("q".to_string(), query_text.to_string()),
            ("api_key".to_string(), self.api_key.clone()),
        ];
        if let Some(locale) = &options.locale {
            params.push(("hl".to_string(), locale.language.clone()));
            params.push(("gl".to_string(), locale.country.clone()));
        }

        let timeout = options.timeout.unwrap_or(DEFAULT_QUERY_TIMEOUT);
        let start = Instant::now();

        let send = self.client.get(&self.base_url).query(&params).send();

        let resp = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| ProviderError::Timeout {
                platform: Platform::GoogleAiOverview,
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| ProviderError::from_reqwest(Platform::GoogleAiOverview, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                Platform::GoogleAiOverview,
                status,
                body,
            ));
        }

        let parsed: SerpResponse =
            resp.json().await.map_err(|e| ProviderError::MalformedResponse {
                platform: Platform::GoogleAiOverview,
                message: e.to_string(),
            })?;

        let response_time_ms = start.elapsed().as_millis() as i64;

        let Some(overview) = parsed.ai_overview else {
            // No AI Overview for this query; fall back to the top organic
            // snippet so downstream sentiment still has text to work with.
            let snippet = parsed
                .organic_results
                .first()
                .and_then(|r| r.snippet.clone())
                .unwrap_or_default();
            return Ok(ProviderAnswer {
                platform: Platform::GoogleAiOverview,
                query: query_text.to_string(),
                response_text: snippet,
                citations: Vec::new(),
                response_time_ms,
            });
        };

        let response_text = overview
            .text_blocks
            .iter()
            .map(|b| b.snippet.as_str())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        // References come back with optional 0-based indexes; order by them
        // where present, then re-rank densely first-seen.
        let mut references = overview.references;
        references.sort_by_key(|r| r.index.unwrap_or(i32::MAX));

        let mut citations: Vec<RawCitation> = Vec::new();
        for reference in references {
            if reference.link.is_empty() || citations.iter().any(|c| c.url == reference.link) {
                continue;
            }
            citations.push(RawCitation {
                url: reference.link,
                title: reference.title,
                snippet: reference.snippet,
                rank: citations.len() as i32 + 1,
            });
        }

        Ok(ProviderAnswer {
            platform: Platform::GoogleAiOverview,
            query: query_text.to_string(),
            response_text,
            citations,
            response_time_ms,
        })
    }

    async fn rate_limit_status(&self) -> RateLimitStatus {
        self.limiter.status().await
    }

    async fn healthcheck(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::Auth {
                platform: Platform::GoogleAiOverview,
                message: "empty API key".to_string(),
            });
        }
        Ok(())
    }
}
