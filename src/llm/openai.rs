use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{NewsgraphError, Result};
use crate::llm::LlmProvider;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Request structure for the OpenAI embeddings API
#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI chat + embeddings provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    chat_model: String,
    embedding_model: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    ///
    /// # Arguments
    ///
    /// * `api_key` - OpenAI API key
    /// * `chat_model` - Chat model name (e.g., "gpt-4o-mini")
    /// * `embedding_model` - Embedding model name (e.g., "text-embedding-3-small")
    pub fn new(api_key: String, chat_model: String, embedding_model: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            chat_model,
            embedding_model,
        }
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
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
                "OpenAI API error {}: {}",
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
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.chat_model.clone(),
            messages,
        };

        let result: ChatResponse = self
            .post_json("https://api.openai.com/v1/chat/completions", &request)
            .await?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| NewsgraphError::Provider("Empty response from OpenAI API".to_string()))
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: texts.to_vec(),
        };

        let result: EmbeddingResponse = self
            .post_json("https://api.openai.com/v1/embeddings", &request)
            .await?;

        if result.data.len() != texts.len() {
            return Err(NewsgraphError::Provider(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_new() {
        let provider = OpenAiProvider::new(
            "test-key".to_string(),
            "gpt-4o-mini".to_string(),
            "text-embedding-3-small".to_string(),
        );
        assert_eq!(provider.chat_model, "gpt-4o-mini");
        assert_eq!(provider.embedding_model, "text-embedding-3-small");
    }

    #[tokio::test]
    async fn test_embed_empty_input() {
        let provider = OpenAiProvider::new(
            "test-key".to_string(),
            "gpt-4o-mini".to_string(),
            "text-embedding-3-small".to_string(),
        );
        let result = provider.embed(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
