#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use parley::llm::{ByteStream, LlmError, LlmProvider};

/// Replays a fixed sequence of network chunks instead of calling a real service.
#[derive(Default)]
pub struct ScriptedProvider {
    pub chunks: Vec<&'static str>,
    /// Cut the connection after the scripted chunks.
    pub drop_after: bool,
    /// Fail before anything is streamed.
    pub unreachable: bool,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn with_chunks(chunks: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            chunks,
            ..Default::default()
        })
    }

    pub fn dropping_after(chunks: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            chunks,
            drop_after: true,
            ..Default::default()
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            unreachable: true,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test-model"
    }

    async fn generate_stream(&self, prompt: &str) -> Result<ByteStream, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if self.unreachable {
            return Err(LlmError::Network("connection refused".to_string()));
        }

        let mut items: Vec<Result<Bytes, LlmError>> = self
            .chunks
            .iter()
            .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
            .collect();
        if self.drop_after {
            items.push(Err(LlmError::Network("connection reset".to_string())));
        }

        Ok(stream::iter(items).boxed())
    }
}

pub fn byte_stream(chunks: Vec<&'static str>) -> ByteStream {
    stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c.as_bytes())))).boxed()
}
