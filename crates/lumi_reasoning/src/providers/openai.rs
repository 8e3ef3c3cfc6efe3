//! OpenAI-compatible chat completions provider (SiliconFlow, DeepSeek, OpenAI, ...).

use super::sse::{data_payload, SseBuffer};
use crate::api_types::{ChatMessage, ChatRequest, ChatResponse, StreamChunk, StreamEvent};
use crate::llm::{CompletionParams, LlmClient};
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use lumi_core::config::ApiConfig;
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    api_key: String,
    base_url: String,
    retry: RetryConfig,
    /// Whole-request limit for plain completions. Streams only use it for
    /// the response headers and as the longest gap between chunks.
    timeout: Duration,
}

impl OpenAiCompatClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .connect_timeout(timeout)
                .build()
                .context("Failed to build HTTP client")?,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
            timeout,
        })
    }

    pub fn from_config(cfg: &ApiConfig) -> Result<Self> {
        if cfg.api_key.is_empty() {
            tracing::warn!("No API key configured; requests will likely be rejected");
        }
        Self::new(
            &cfg.api_key,
            &cfg.base_url,
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<Response> {
        let url = format!("{}/chat/completions", self.base_url);
        with_retry(&self.retry, "ChatCompletions", || async {
            let mut request = self.client.post(&url).bearer_auth(&self.api_key).json(body);
            if !body.stream {
                request = request.timeout(self.timeout);
            }
            tokio::time::timeout(self.timeout, request.send())
                .await
                .context("Timed out waiting for chat completion response")?
                .context("Failed to send chat completion request")
        })
        .await
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<String> {
        let body = ChatRequest {
            model: &params.model,
            messages: &messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: false,
        };
        let response = self.send(&body).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to decode chat completion response")?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .context("Chat completion response has no choices")?;
        tracing::trace!(
            "{} finished: {:?}",
            params.model,
            choice.finish_reason.as_deref()
        );
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream_complete(
        &self,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let body = ChatRequest {
            model: &params.model,
            messages: &messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: true,
        };
        let response = self.send(&body).await?;

        let (tx, rx) = mpsc::channel(64);
        let byte_stream = response.bytes_stream();
        let idle = self.timeout;

        tokio::spawn(async move {
            if let Err(e) = parse_openai_sse(byte_stream, idle, &tx).await {
                let _ = tx.send(StreamEvent::Error(format!("{:#}", e))).await;
            }
        });

        Ok(rx)
    }
}

enum SseLine {
    Delta(String),
    Done,
}

/// Interpret one SSE line. Non-data lines, undecodable JSON and chunks
/// without content yield `None`.
fn parse_sse_line(line: &str) -> Option<SseLine> {
    let payload = data_payload(line)?;
    if payload == "[DONE]" {
        return Some(SseLine::Done);
    }
    let chunk: StreamChunk = match serde_json::from_str(payload) {
        Ok(c) => c,
        Err(e) => {
            tracing::trace!("Skipping undecodable SSE payload: {}", e);
            return None;
        }
    };
    if chunk
        .object
        .as_deref()
        .is_some_and(|o| o != "chat.completion.chunk")
    {
        return None;
    }
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|t| !t.is_empty())
        .map(SseLine::Delta)
}

/// Drive an OpenAI-style SSE byte stream into `tx`, ending with `Done`.
///
/// There is no limit on the total length of a stream, only on the silence
/// between two chunks (`idle`).
pub(crate) async fn parse_openai_sse<S>(
    stream: S,
    idle: Duration,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<()>
where
    S: Stream<Item = reqwest::Result<Bytes>>,
{
    futures_util::pin_mut!(stream);
    let mut buffer = SseBuffer::new();

    loop {
        let next = tokio::time::timeout(idle, stream.next())
            .await
            .with_context(|| format!("No streaming data for {}s", idle.as_secs_f32()))?;
        let Some(chunk) = next else { break };
        let chunk = chunk.context("Streaming response interrupted")?;
        buffer.push_bytes(&chunk);
        for line in buffer.extract_lines() {
            match parse_sse_line(&line) {
                Some(SseLine::Delta(text)) => {
                    if tx.send(StreamEvent::TextDelta(text)).await.is_err() {
                        // Receiver gone, nobody is listening anymore
                        return Ok(());
                    }
                }
                Some(SseLine::Done) => {
                    let _ = tx.send(StreamEvent::Done).await;
                    return Ok(());
                }
                None => {}
            }
        }
    }

    // Stream closed without [DONE]; flush an unterminated last line
    if let Some(SseLine::Delta(text)) = parse_sse_line(buffer.residue().trim()) {
        let _ = tx.send(StreamEvent::TextDelta(text)).await;
    }
    let _ = tx.send(StreamEvent::Done).await;
    Ok(())
}
