pub mod manager;

pub use manager::{format_record, MemoryManager, NO_MEMORIES, SUMMARY_FAILED};

use async_trait::async_trait;
use lumi_core::Emotion;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One remembered interaction, stored as-is in the memory file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Local time, `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
    pub emotion_type: Emotion,
    /// Intensity recorded with the interaction
    pub emotion_delta: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_response: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("memory file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("memory file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Turns the interaction record into a short summary (usually an LLM call).
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, record: &str) -> anyhow::Result<String>;
}
