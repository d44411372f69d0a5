use anyhow::{Context, Result};
use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub graph: GraphConfig,
    pub llm: LlmConfig,
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Graph store (Neo4j) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Base URI of the Neo4j HTTP endpoint, e.g. `http://localhost:7474`
    pub uri: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_username_env")]
    pub username_env: String,
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Provider name: openai, anthropic, ollama
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub dimensions: usize,
}

/// Retrieval engine tuning
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Number of best chunks joined into the prompt context
    #[serde(default = "default_context_chunks")]
    pub context_chunks: usize,
    /// Candidate cap for the brute-force cosine fallback
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
    /// Row cap for translated and fallback Cypher queries
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            context_chunks: default_context_chunks(),
            candidate_limit: default_candidate_limit(),
            result_limit: default_result_limit(),
        }
    }
}

fn default_database() -> String {
    "neo4j".to_string()
}

fn default_username_env() -> String {
    "NEO4J_USERNAME".to_string()
}

fn default_password_env() -> String {
    "NEO4J_PASSWORD".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_similarity_threshold() -> f32 {
    0.5
}

fn default_context_chunks() -> usize {
    3
}

fn default_candidate_limit() -> usize {
    100
}

fn default_result_limit() -> usize {
    20
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in NEWSGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("NEWSGRAPH_CONFIG")
            .unwrap_or_else(|_| "config.toml".to_string());

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.graph.uri.trim().is_empty() {
            anyhow::bail!("graph.uri must not be empty");
        }

        match self.llm.provider.as_str() {
            "openai" | "anthropic" => {
                // Key may come from the environment or the .env file loaded above
                std::env::var(&self.llm.api_key_env).with_context(|| {
                    format!(
                        "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                        self.llm.api_key_env
                    )
                })?;
            }
            "ollama" => {}
            other => {
                anyhow::bail!("Unsupported llm.provider: {} (expected openai, anthropic or ollama)", other);
            }
        }

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be greater than 0");
        }

        if self.retrieval.similarity_threshold < 0.0 || self.retrieval.similarity_threshold > 1.0 {
            anyhow::bail!("retrieval.similarity_threshold must be between 0.0 and 1.0");
        }

        if self.retrieval.result_limit == 0 {
            anyhow::bail!("retrieval.result_limit must be greater than 0");
        }

        Ok(())
    }
}
