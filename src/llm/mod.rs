//! LLM module - Language Model integrations
//!
//! The generation capability behind both role agents, with Ollama as the
//! concrete backend.

pub mod ollama;
pub mod traits;

pub use ollama::OllamaClient;
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};
