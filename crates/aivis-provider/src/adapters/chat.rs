use crate::error::{ProviderError, Result};
use crate::limiter::{RateLimitStatus, SlidingWindowLimiter};
use crate::models::{ChatMessage, ChatRequest, ChatResponse};
use crate::{extract, ProviderAdapter, ProviderAnswer, QueryOptions, DEFAULT_QUERY_TIMEOUT};
use aivis_common::types::Platform;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Instant;

/// Adapter for providers that speak the OpenAI chat-completions dialect and
/// return citations only inside prose: chatgpt, copilot, claude, grok and
/// deepseek. Citations are recovered from the answer text.
pub struct ChatCompletionsAdapter {
    platform: Platform,
    base_url: String,
    model: String,
    api_key: String,
    client: Client,
    limiter: SlidingWindowLimiter,
}

impl ChatCompletionsAdapter {
    pub fn new(
        platform: Platform,
        api_key: String,
        base_url: String,
        model: String,
        rate_per_min: usize,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_QUERY_TIMEOUT * 2)
            .build()?;
        Ok(Self {
            platform,
            base_url,
            model,
            api_key,
            client,
            limiter: SlidingWindowLimiter::per_minute(rate_per_min),
        })
    }
}

#[async_trait]
impl ProviderAdapter for ChatCompletionsAdapter {
    fn platform(&self) -> Platform {
        self.platform
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
            search_recency_filter: None,
        };

        let timeout = options.timeout.unwrap_or(DEFAULT_QUERY_TIMEOUT);
        let start = Instant::now();

        tracing::debug!(
            platform = %self.platform,
            model = %self.model,
            query_length = query_text.len(),
            "Querying chat-completions provider"
        );

        let send = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send();

        let resp = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| ProviderError::Timeout {
                platform: self.platform,
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| ProviderError::from_reqwest(self.platform, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(self.platform, status, body));
        }

        let parsed: ChatResponse =
            resp.json().await.map_err(|e| ProviderError::MalformedResponse {
                platform: self.platform,
                message: e.to_string(),
            })?;

        let response_text = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ProviderError::MalformedResponse {
                platform: self.platform,
                message: "response carried no choices".to_string(),
            })?;

        let citations = extract::extract_citations(&response_text);

        Ok(ProviderAnswer {
            platform: self.platform,
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
                platform: self.platform,
                message: "empty API key".to_string(),
            });
        }
        Ok(())
    }
}
