use crate::api_types::{ChatMessage, StreamEvent};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Parameters for one chat completion
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    /// Model id as understood by the provider
    pub model: String,
    /// Maximum tokens to generate; provider default when `None`
    pub max_tokens: Option<u32>,
    /// Sampling temperature; provider default when `None`
    pub temperature: Option<f32>,
}

impl CompletionParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat completion request and return the reply text.
    async fn complete(&self, messages: Vec<ChatMessage>, params: CompletionParams)
        -> Result<String>;

    /// Streaming variant. The receiver yields text deltas and ends with
    /// `Done` (or `Error` if the stream broke mid-way).
    async fn stream_complete(
        &self,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<mpsc::Receiver<StreamEvent>>;
}
