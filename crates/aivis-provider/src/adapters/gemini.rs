use crate::error::{ProviderError, Result};
use crate::limiter::{RateLimitStatus, SlidingWindowLimiter};
use crate::models::{
    GeminiContent, GeminiGenerationConfig, GeminiPartReq, GeminiRequest, GeminiResponse, GeminiTool,
};
use crate::{extract, ProviderAdapter, ProviderAnswer, QueryOptions, RawCitation, DEFAULT_QUERY_TIMEOUT};
use aivis_common::types::Platform;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Instant;

/// Gemini cites through a grounding-metadata block plus inline `[n]`
/// references in the prose. Both sources are merged, deduplicated by URL
/// first-seen, and ranked densely in that order.
pub struct GeminiAdapter {
    base_url: String,
    model: String,
    api_key: String,
    client: Client,
    limiter: SlidingWindowLimiter,
}

impl GeminiAdapter {
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
impl ProviderAdapter for GeminiAdapter {
    fn platform(&self) -> Platform {
        Platform::Gemini
    }

    async fn query(&self, query_text: &str, options: &QueryOptions) -> Result<ProviderAnswer> {
        self.limiter.acquire().await;

        let tools = if options.grounding_enabled {
            vec![GeminiTool {
                google_search: serde_json::json!({}),
            }]
        } else {
            Vec::new()
        };

        let req = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPartReq {
                    text: query_text.to_string(),
                }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
            }),
            tools,
        };

        let timeout = options.timeout.unwrap_or(DEFAULT_QUERY_TIMEOUT);
        let start = Instant::now();

        let send = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send();

        let resp = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| ProviderError::Timeout {
                platform: Platform::Gemini,
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| ProviderError::from_reqwest(Platform::Gemini, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(Platform::Gemini, status, body));
        }

        let parsed: GeminiResponse =
            resp.json().await.map_err(|e| ProviderError::MalformedResponse {
                platform: Platform::Gemini,
                message: e.to_string(),
            })?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse {
                platform: Platform::Gemini,
                message: "response carried no candidates".to_string(),
            })?;

        let response_text = candidate
            .content
            .map(|c| {
                c.parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        // Grounding chunks carry the authoritative order; inline references
        // found in prose extend the list without disturbing earlier ranks.
        let mut citations: Vec<RawCitation> = Vec::new();
        if let Some(metadata) = candidate.grounding_metadata {
            for chunk in metadata.grounding_chunks {
                let Some(web) = chunk.web else { continue };
                if citations.iter().any(|c| c.url == web.uri) {
                    continue;
                }
                citations.push(RawCitation {
                    url: web.uri,
                    title: web.title,
                    snippet: None,
                    rank: citations.len() as i32 + 1,
                });
            }
        }
        for inline in extract::extract_citations(&response_text) {
            if citations.iter().any(|c| c.url == inline.url) {
                continue;
            }
            citations.push(RawCitation {
                rank: citations.len() as i32 + 1,
                ..inline
            });
        }

        Ok(ProviderAnswer {
            platform: Platform::Gemini,
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
                platform: Platform::Gemini,
                message: "empty API key".to_string(),
            });
        }
        Ok(())
    }
}
