use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{NewsgraphError, Result};
use crate::llm::LlmProvider;

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    system: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Local Ollama provider.
///
/// The Ollama embeddings endpoint takes one prompt per request, so `embed`
/// issues one call per input text.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| NewsgraphError::Provider(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(NewsgraphError::Provider(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| NewsgraphError::Provider(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            system: system_prompt.unwrap_or("").to_string(),
            stream: false,
        };

        let result: GenerateResponse = self.post_json("/api/generate", &request).await?;
        Ok(result.response)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let request = EmbeddingRequest {
                model: self.model.clone(),
                prompt: text.clone(),
            };
            let result: EmbeddingResponse = self.post_json("/api/embeddings", &request).await?;
            embeddings.push(result.embedding);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let provider = OllamaProvider::new("http://localhost:11434/".to_string(), "llama2".to_string());
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_embed_empty_input() {
        let provider = OllamaProvider::new("http://localhost:11434".to_string(), "llama2".to_string());
        assert!(provider.embed(&[]).await.unwrap().is_empty());
    }
}
