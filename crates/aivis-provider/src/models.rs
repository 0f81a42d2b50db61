//! Wire-level request/response payloads for the provider HTTP APIs.

use serde::{Deserialize, Serialize};

// ---- OpenAI-compatible chat completions (chatgpt, copilot, claude, grok,
// deepseek, perplexity) ----

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Perplexity-only knob; other providers ignore unknown fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_recency_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Perplexity returns cited URIs as a flat top-level array.
    #[serde(default)]
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: String,
}

// ---- Gemini generateContent ----

#[derive(Debug, Clone, Serialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<GeminiTool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPartReq>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiPartReq {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiTool {
    #[serde(rename = "googleSearch")]
    pub google_search: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidate {
    pub content: Option<GeminiCandidateContent>,
    #[serde(rename = "groundingMetadata")]
    pub grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidateContent {
    #[serde(default)]
    pub parts: Vec<GeminiPartResp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiPartResp {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiGroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    pub grounding_chunks: Vec<GeminiGroundingChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiGroundingChunk {
    pub web: Option<GeminiWebSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiWebSource {
    pub uri: String,
    pub title: Option<String>,
}

// ---- SERP API (google_ai_overview) ----

#[derive(Debug, Clone, Deserialize)]
pub struct SerpResponse {
    pub ai_overview: Option<SerpAiOverview>,
    #[serde(default)]
    pub organic_results: Vec<SerpOrganicResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerpAiOverview {
    #[serde(default)]
    pub text_blocks: Vec<SerpTextBlock>,
    #[serde(default)]
    pub references: Vec<SerpReference>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerpTextBlock {
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerpReference {
    pub link: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub index: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerpOrganicResult {
    pub link: Option<String>,
    pub title: Option<String>,
    pub snippet: Option<String>,
}
