//! Pluggable adapters for the generative-AI answer engines the tracker
//! polls.
//!
//! Every engine implements the narrow [`ProviderAdapter`] contract: turn a
//! query string into a [`ProviderAnswer`] under that provider's rate-limit
//! discipline, or fail with a classified [`error::ProviderError`]. Adapters
//! are built once at process start and looked up through the immutable
//! [`registry::ProviderRegistry`].

pub mod adapters;
pub mod error;
pub mod extract;
pub mod limiter;
pub mod models;
pub mod registry;

use aivis_common::types::Platform;
use async_trait::async_trait;
use std::time::Duration;

pub use error::{ErrorKind, ProviderError};
pub use limiter::{RateLimitStatus, SlidingWindowLimiter};
pub use registry::{AdapterSource, ProviderConfig, ProviderRegistry};

/// One URL surfaced by a provider, in the provider's own citation order.
/// `rank` is 1-based and dense; adapters that only imply order assign it by
/// first appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCitation {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub rank: i32,
}

/// A parsed answer from one provider for one query.
#[derive(Debug, Clone)]
pub struct ProviderAnswer {
    pub platform: Platform,
    pub query: String,
    pub response_text: String,
    pub citations: Vec<RawCitation>,
    pub response_time_ms: i64,
}

/// How far back the provider should look when it supports recency filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecencyFilter {
    Day,
    Week,
    Month,
    #[default]
    None,
}

impl RecencyFilter {
    /// Wire value for providers with a `search_recency_filter` parameter.
    pub fn wire_value(&self) -> Option<&'static str> {
        match self {
            RecencyFilter::Day => Some("day"),
            RecencyFilter::Week => Some("week"),
            RecencyFilter::Month => Some("month"),
            RecencyFilter::None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub language: String,
    pub country: String,
}

/// Per-call tuning knobs. Missing fields take adapter defaults; adapters
/// ignore fields they cannot express.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
    pub locale: Option<Locale>,
    pub recency: RecencyFilter,
    pub grounding_enabled: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            timeout: None,
            locale: None,
            recency: RecencyFilter::None,
            grounding_enabled: true,
        }
    }
}

/// Default call deadline when neither the caller nor the adapter narrows it.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// The single contract every answer-engine plugin implements.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which platform this adapter speaks for.
    fn platform(&self) -> Platform;

    /// Run one query and parse the answer. Respects the adapter's sliding
    /// rate-limit window, sleeping cooperatively when the window is full.
    async fn query(&self, query_text: &str, options: &QueryOptions)
        -> error::Result<ProviderAnswer>;

    /// Current window occupancy for diagnostics.
    async fn rate_limit_status(&self) -> RateLimitStatus;

    /// Cheap credential sanity probe; adapters without one report Ok.
    async fn healthcheck(&self) -> error::Result<()> {
        Ok(())
    }
}
