pub mod framing;
pub mod models;
pub mod ollama;

use ollama::OllamaProvider;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network Error: {0}")]
    Network(String),
    #[error("API Error: {0}")]
    Api(String),
}

/// Raw upstream response body, chunked however the network delivered it.
pub type ByteStream = BoxStream<'static, Result<Bytes, LlmError>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Starts a generation and hands back the undecoded NDJSON body.
    ///
    /// Errors returned here happen before any byte is streamed; failures after
    /// that point surface as items of the returned stream.
    async fn generate_stream(&self, prompt: &str) -> Result<ByteStream, LlmError>;
}

pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_default(config: &AppConfig) -> Option<Arc<dyn LlmProvider>> {
        let upstream = &config.upstream;

        match upstream.provider.as_str() {
            "ollama" => Some(Arc::new(OllamaProvider::new(
                upstream.base_url.clone(),
                upstream.model.clone(),
                upstream.system_prompt.clone(),
            ))),
            _ => None,
        }
    }
}
