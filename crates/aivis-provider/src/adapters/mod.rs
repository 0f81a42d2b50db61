pub mod chat;
pub mod gemini;
pub mod perplexity;
pub mod serp;

pub use chat::ChatCompletionsAdapter;
pub use gemini::GeminiAdapter;
pub use perplexity::PerplexityAdapter;
pub use serp::SerpAdapter;
