use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::Client;

use crate::llm::{models::GenerateRequest, ByteStream, LlmError, LlmProvider};

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    system_prompt: Option<String>,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String, system_prompt: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            system_prompt,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_stream(&self, prompt: &str) -> Result<ByteStream, LlmError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system: self.system_prompt.as_deref(),
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("Ollama Stream Error {}: {}", status, text)));
        }

        Ok(response
            .bytes_stream()
            .map_err(|e| LlmError::Network(e.to_string()))
            .boxed())
    }
}
