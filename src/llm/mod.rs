//! Text generation / embedding capability and the provider implementations.
//!
//! The engine depends only on [`LlmProvider`]; the concrete backend is picked
//! once at startup by [`build_provider`] from `config.llm.provider`.

mod anthropic;
mod ollama;
mod openai;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{NewsgraphError, Result};

/// Text generation and embedding, polymorphic over the configured backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate text for a prompt, with an optional system prompt.
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String>;

    /// Embed texts into fixed-dimension vectors, one per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

impl std::fmt::Debug for dyn LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn LlmProvider")
    }
}

/// Build the provider named in the configuration.
pub fn build_provider(config: &Config) -> Result<Arc<dyn LlmProvider>> {
    match config.llm.provider.as_str() {
        "openai" => {
            let api_key = require_env(&config.llm.api_key_env)?;
            Ok(Arc::new(OpenAiProvider::new(
                api_key,
                config.llm.model.clone(),
                config.embeddings.model.clone(),
            )))
        }
        "anthropic" => {
            let api_key = require_env(&config.llm.api_key_env)?;
            Ok(Arc::new(AnthropicProvider::new(
                api_key,
                config.llm.model.clone(),
            )))
        }
        "ollama" => Ok(Arc::new(OllamaProvider::new(
            config.llm.ollama_base_url.clone(),
            config.llm.model.clone(),
        ))),
        other => Err(NewsgraphError::Config(format!(
            "Unsupported llm.provider: {}",
            other
        ))),
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| {
        NewsgraphError::Config(format!("Environment variable {} not set", name))
    })
}
