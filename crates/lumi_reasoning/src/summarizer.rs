use crate::api_types::ChatMessage;
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts;
use async_trait::async_trait;
use lumi_memory::Summarizer;
use std::sync::Arc;

/// Token cap for a memory summary.
pub const SUMMARY_MAX_TOKENS: u32 = 600;

/// Memory summarizer backed by the memory model.
pub struct LlmSummarizer {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, record: &str) -> anyhow::Result<String> {
        let messages = vec![
            ChatMessage::system(prompts::MEMORY_SUMMARY_SYSTEM),
            ChatMessage::user(prompts::memory_summary_prompt(record)),
        ];
        let params = CompletionParams::new(&self.model).max_tokens(SUMMARY_MAX_TOKENS);
        let summary = self.llm.complete(messages, params).await?;
        Ok(summary.trim().to_string())
    }
}
