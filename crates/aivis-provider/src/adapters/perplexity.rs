use crate::error::{ProviderError, Result};
use crate::limiter::{RateLimitStatus, SlidingWindowLimiter};
use crate::models::{ChatMessage, ChatRequest, ChatResponse};
use crate::{ProviderAdapter, ProviderAnswer, QueryOptions, RawCitation, DEFAULT_QUERY_TIMEOUT};
use aivis_common::types::Platform;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Instant;

/// Perplexity speaks chat completions but returns its sources as a flat
/// top-level array of URIs; rank is array order, titles and snippets are
/// not provided.
pub struct PerplexityAdapter {
    base_url: String,
    model: String,
    api_key: String,
    client: Client,
    limiter: SlidingWindowLimiter,
}

impl PerplexityAdapter {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        rate_per_min: usize,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_QUERY_TIMEOUT * 2)
            .build()?;
        Ok(Self {
            base_url,
            model,
            api_key,
            client,
            limiter: SlidingWindowLimiter::per_minute(rate_per_min),
        })
    }
}

#[async_trait]
impl ProviderAdapter for PerplexityAdapter {
    fn platform(&self) -> Platform {
        Platform::Perplexity
    }

    async fn query(&self, query_text: &str, options: &QueryOptions) -> Result<ProviderAnswer> {
        self.limiter.acquire().await;

        let req = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: query_text.to_string(),
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            search_recency_filter: options.recency.wire_value().map(str::to_string),
        };

        let timeout = options.timeout.unwrap_or(DEFAULT_QUERY_TIMEOUT);
        let start = Instant::now();

        let send = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send();

        let resp = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| ProviderError::Timeout {
                platform: Platform::Perplexity,
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| ProviderError::from_reqwest(Platform::Perplexity, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(Platform::Perplexity, status, body));
        }

        let parsed: ChatResponse =
            resp.json().await.map_err(|e| ProviderError::MalformedResponse {
                platform: Platform::Perplexity,
                message: e.to_string(),
            })?;

        let response_text = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ProviderError::MalformedResponse {
                platform: Platform::Perplexity,
                message: "response carried no choices".to_string(),
            })?;

        let citations = parsed
            .citations
            .iter()
            .enumerate()
            .map(|(idx, uri)| RawCitation {
                url: uri.clone(),
                title: None,
                snippet: None,
                rank: idx as i32 + 1,
            })
            .collect();

        Ok(ProviderAnswer {
            platform: Platform::Perplexity,
            query: query_text.to_string(),
            response_text,
            citations,
            response_time_ms: start.elapsed().as_millis() as i64,
        })
    }

    async fn rate_limit_status(&self) -> RateLimitStatus {
        self.limiter.status().await
    }

    async fn healthcheck(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::Auth {
                platform: Platform::Perplexity,
                message: "empty API key".to_string(),
            });
        }
        Ok(())
    }
}
