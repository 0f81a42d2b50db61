use crate::adapters::{ChatCompletionsAdapter, GeminiAdapter, PerplexityAdapter, SerpAdapter};
use crate::ProviderAdapter;
use aivis_common::types::Platform;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-provider settings resolved from the environment. Presence of an API
/// key is what registers a platform; everything else has defaults.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub rate_per_min: usize,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            rate_per_min: DEFAULT_RATE_PER_MIN,
            base_url: None,
            model: None,
        }
    }
}

pub const DEFAULT_RATE_PER_MIN: usize = 10;

/// How long a provider sits out after reporting exhausted quota.
pub const QUOTA_COOLDOWN_SECS: i64 = 3600;

fn default_base_url(platform: Platform) -> &'static str {
    match platform {
        Platform::GoogleAiOverview => "https://serpapi.com/search.json",
        Platform::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        Platform::Chatgpt => "https://api.openai.com/v1",
        Platform::Perplexity => "https://api.perplexity.ai",
        Platform::Copilot => "https://models.github.ai/inference",
        Platform::Claude => "https://api.anthropic.com/v1",
        Platform::Grok => "https://api.x.ai/v1",
        Platform::Deepseek => "https://api.deepseek.com/v1",
    }
}

fn default_model(platform: Platform) -> &'static str {
    match platform {
        Platform::GoogleAiOverview => "",
        Platform::Gemini => "gemini-2.0-flash",
        Platform::Chatgpt => "gpt-4o",
        Platform::Perplexity => "sonar",
        Platform::Copilot => "gpt-4o",
        Platform::Claude => "claude-sonnet-4-20250514",
        Platform::Grok => "grok-3",
        Platform::Deepseek => "deepseek-chat",
    }
}

/// Where the tracking engine looks adapters up. The production
/// implementation is [`ProviderRegistry`]; tests substitute stubs.
pub trait AdapterSource: Send + Sync {
    fn adapter(&self, platform: Platform) -> Option<Arc<dyn ProviderAdapter>>;

    /// Registered platforms in enum order.
    fn platforms(&self) -> Vec<Platform>;

    /// End of an active quota cooldown for the platform, if any.
    fn cooldown_until(&self, platform: Platform) -> Option<DateTime<Utc>>;

    /// Put a platform on quota cooldown starting now.
    fn start_cooldown(&self, platform: Platform);
}

/// Immutable adapter lookup, populated once at process start. Also owns the
/// process-local quota cooldown ledger: a provider that reports exhausted
/// quota sits out for an hour, during which its jobs short-circuit.
pub struct ProviderRegistry {
    adapters: HashMap<Platform, Arc<dyn ProviderAdapter>>,
    cooldowns: Mutex<HashMap<Platform, DateTime<Utc>>>,
    cooldown: Duration,
}

impl ProviderRegistry {
    pub fn build(configs: &HashMap<Platform, ProviderConfig>) -> Result<Self> {
        Self::build_with_cooldown(configs, Duration::seconds(QUOTA_COOLDOWN_SECS))
    }

    pub fn build_with_cooldown(
        configs: &HashMap<Platform, ProviderConfig>,
        cooldown: Duration,
    ) -> Result<Self> {
        let mut adapters: HashMap<Platform, Arc<dyn ProviderAdapter>> = HashMap::new();

        for (&platform, config) in configs {
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url(platform).to_string());
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| default_model(platform).to_string());
            let rate = config.rate_per_min.max(1);

            let adapter: Arc<dyn ProviderAdapter> = match platform {
                Platform::GoogleAiOverview => Arc::new(
                    SerpAdapter::new(config.api_key.clone(), base_url, rate)
                        .context("building google_ai_overview adapter")?,
                ),
                Platform::Gemini => Arc::new(
                    GeminiAdapter::new(config.api_key.clone(), base_url, model, rate)
                        .context("building gemini adapter")?,
                ),
                Platform::Perplexity => Arc::new(
                    PerplexityAdapter::new(config.api_key.clone(), base_url, model, rate)
                        .context("building perplexity adapter")?,
                ),
                _ => Arc::new(
                    ChatCompletionsAdapter::new(
                        platform,
                        config.api_key.clone(),
                        base_url,
                        model,
                        rate,
                    )
                    .with_context(|| format!("building {platform} adapter"))?,
                ),
            };
            adapters.insert(platform, adapter);
        }

        tracing::info!(
            providers = ?adapters.keys().map(Platform::as_str).collect::<Vec<_>>(),
            "Provider registry initialized"
        );

        Ok(Self {
            adapters,
            cooldowns: Mutex::new(HashMap::new()),
            cooldown,
        })
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    pub fn is_registered(&self, platform: Platform) -> bool {
        self.adapters.contains_key(&platform)
    }

    /// Registered platforms in enum order.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.adapters.keys().copied().collect();
        platforms.sort();
        platforms
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Put a platform on quota cooldown starting now.
    pub fn start_cooldown(&self, platform: Platform) {
        let until = Utc::now() + self.cooldown;
        let mut cooldowns = self.cooldowns.lock().unwrap();
        cooldowns.insert(platform, until);
        tracing::warn!(platform = %platform, until = %until, "Provider placed on quota cooldown");
    }

    /// When the platform's cooldown ends, if one is active. Expired entries
    /// are pruned on read.
    pub fn cooldown_until(&self, platform: Platform) -> Option<DateTime<Utc>> {
        let mut cooldowns = self.cooldowns.lock().unwrap();
        match cooldowns.get(&platform) {
            Some(&until) if until > Utc::now() => Some(until),
            Some(_) => {
                cooldowns.remove(&platform);
                None
            }
            None => None,
        }
    }
}

impl AdapterSource for ProviderRegistry {
    fn adapter(&self, platform: Platform) -> Option<Arc<dyn ProviderAdapter>> {
        self.get(platform)
    }

    fn platforms(&self) -> Vec<Platform> {
        ProviderRegistry::platforms(self)
    }

    fn cooldown_until(&self, platform: Platform) -> Option<DateTime<Utc>> {
        ProviderRegistry::cooldown_until(self, platform)
    }

    fn start_cooldown(&self, platform: Platform) {
        ProviderRegistry::start_cooldown(self, platform)
    }
}
