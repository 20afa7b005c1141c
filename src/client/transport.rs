use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream::BoxStream, Stream, StreamExt, TryStreamExt};
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;

use crate::api::models::{ErrorBody, GenerateBody};
use crate::config::{AppConfig, ChatBackend};
use crate::llm::{
    framing::{relay_fragments, LineFraming},
    LlmProvider, ProviderFactory,
};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Network Error: {0}")]
    Network(String),
    #[error("Relay rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Stream Error: {0}")]
    Stream(String),
    #[error("Configuration Error: {0}")]
    Config(String),
}

/// Running text of the reply: every item is the whole reply so far.
pub type TextStream = BoxStream<'static, Result<String, ChatError>>;

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, prompt: String) -> Result<TextStream, ChatError>;
}

/// Folds fragments into running text, stopping after the first error.
pub fn accumulate<S>(fragments: S) -> TextStream
where
    S: Stream<Item = Result<String, ChatError>> + Send + 'static,
{
    let running = async_stream::stream! {
        let mut text = String::new();
        futures_util::pin_mut!(fragments);

        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(fragment) => {
                    text.push_str(&fragment);
                    yield Ok(text.clone());
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    };

    running.boxed()
}

/// Decodes a byte stream as UTF-8, holding back a multi-byte sequence that a
/// chunk boundary cut in half.
pub fn decode_utf8<S>(chunks: S) -> impl Stream<Item = Result<String, ChatError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, ChatError>> + Send + 'static,
{
    async_stream::stream! {
        let mut pending: Vec<u8> = Vec::new();
        futures_util::pin_mut!(chunks);

        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            pending.extend_from_slice(&chunk);

            let valid = match std::str::from_utf8(&pending) {
                Ok(_) => pending.len(),
                Err(e) if e.error_len().is_none() => e.valid_up_to(),
                // Invalid bytes, not a truncated sequence.
                Err(_) => pending.len(),
            };
            let rest = pending.split_off(valid);
            let ready = std::mem::replace(&mut pending, rest);

            if !ready.is_empty() {
                yield Ok(String::from_utf8_lossy(&ready).into_owned());
            }
        }

        if !pending.is_empty() {
            yield Ok(String::from_utf8_lossy(&pending).into_owned());
        }
    }
}

/// Talks to a relay endpoint over HTTP.
pub struct RelayTransport {
    client: Client,
    url: String,
}

impl RelayTransport {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

#[async_trait]
impl ChatTransport for RelayTransport {
    async fn open(&self, prompt: String) -> Result<TextStream, ChatError> {
        let response = self
            .client
            .post(&self.url)
            .json(&GenerateBody { prompt })
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(ChatError::Rejected { status, message });
        }

        let chunks = response
            .bytes_stream()
            .map_err(|e| ChatError::Stream(e.to_string()));

        Ok(accumulate(decode_utf8(chunks)))
    }
}

/// Talks to the upstream service itself, decoding its records locally.
pub struct DirectTransport {
    llm: Arc<dyn LlmProvider>,
    framing: LineFraming,
}

impl DirectTransport {
    pub fn new(llm: Arc<dyn LlmProvider>, framing: LineFraming) -> Self {
        Self { llm, framing }
    }
}

#[async_trait]
impl ChatTransport for DirectTransport {
    async fn open(&self, prompt: String) -> Result<TextStream, ChatError> {
        let upstream = self
            .llm
            .generate_stream(&prompt)
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let fragments =
            relay_fragments(upstream, self.framing).map_err(|e| ChatError::Stream(e.to_string()));

        Ok(accumulate(fragments))
    }
}

/// Builds the transport named by `client.backend`.
pub fn connect(config: &AppConfig) -> Result<Arc<dyn ChatTransport>, ChatError> {
    match &config.client.backend {
        ChatBackend::Relay { url } => Ok(Arc::new(RelayTransport::new(url.clone()))),
        ChatBackend::Direct => {
            let llm = ProviderFactory::create_default(config).ok_or_else(|| {
                ChatError::Config(format!("unknown upstream provider '{}'", config.upstream.provider))
            })?;
            Ok(Arc::new(DirectTransport::new(llm, config.relay.framing)))
        }
    }
}
