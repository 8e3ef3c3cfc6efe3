//! Mock LLM provider: scripted responses for testing and offline runs.

use crate::api_types::{ChatMessage, StreamEvent};
use crate::llm::{CompletionParams, LlmClient};
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Returns queued replies in order, then a fixed fallback reply.
///
/// Replies starting with `!err ` are turned into errors. Every request is
/// recorded for later inspection.
#[derive(Debug)]
pub struct MockProvider {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    /// Characters per streamed delta
    chunk_chars: usize,
    requests: Mutex<Vec<(Vec<ChatMessage>, CompletionParams)>>,
}

impl MockProvider {
    pub fn new(fallback: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
            chunk_chars: 4,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new("");
        if let Ok(mut q) = mock.replies.lock() {
            q.extend(replies.into_iter().map(Into::into));
        }
        mock
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply.into());
        }
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<(Vec<ChatMessage>, CompletionParams)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn next_reply(&self, messages: Vec<ChatMessage>, params: CompletionParams) -> Result<String> {
        if let Ok(mut r) = self.requests.lock() {
            r.push((messages, params));
        }
        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| self.fallback.clone());
        match reply.strip_prefix("!err ") {
            Some(msg) => anyhow::bail!("{}", msg),
            None => Ok(reply),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for MockProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<String> {
        self.next_reply(messages, params)
    }

    async fn stream_complete(
        &self,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let reply = self.next_reply(messages, params)?;
        let chars: Vec<char> = reply.chars().collect();
        let chunks: Vec<String> = chars
            .chunks(self.chunk_chars.max(1))
            .map(|c| c.iter().collect())
            .collect();

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(StreamEvent::TextDelta(chunk)).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(StreamEvent::Done).await;
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_replies_in_order_then_fallback() {
        let provider = MockProvider::with_replies(["one", "two"]);
        let p = CompletionParams::new("m");
        assert_eq!(provider.complete(vec![], p.clone()).await.unwrap(), "one");
        assert_eq!(provider.complete(vec![], p.clone()).await.unwrap(), "two");
        assert_eq!(provider.complete(vec![], p).await.unwrap(), "");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_error_reply() {
        let provider = MockProvider::with_replies(["!err boom"]);
        let err = provider
            .complete(vec![], CompletionParams::new("m"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_mock_stream() {
        let provider = MockProvider::with_replies(["你好呀，今天怎么样"]);
        let mut rx = provider
            .stream_complete(vec![ChatMessage::user("hi")], CompletionParams::new("m"))
            .await
            .unwrap();
        let mut text = String::new();
        let mut deltas = 0;
        let mut got_done = false;
        while let Some(ev) = rx.recv().await {
            match ev {
                StreamEvent::TextDelta(t) => {
                    text.push_str(&t);
                    deltas += 1;
                }
                StreamEvent::Done => got_done = true,
                StreamEvent::Error(e) => panic!("unexpected error {}", e),
            }
        }
        assert_eq!(text, "你好呀，今天怎么样");
        assert_eq!(deltas, 3);
        assert!(got_done);
        assert_eq!(provider.requests()[0].0[0].text(), "hi");
    }
}
