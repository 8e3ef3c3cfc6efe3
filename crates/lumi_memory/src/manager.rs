use crate::{MemoryEntry, MemoryError, Summarizer};
use lumi_core::config::MemoryConfig;
use lumi_core::Emotion;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const NO_MEMORIES: &str = "暂无记忆";
pub const SUMMARY_FAILED: &str = "无法生成记忆摘要";

/// Bounded interaction history plus a model-written summary of it.
///
/// Backed by two files: the entry list as pretty JSON and the summary as
/// plain text. Only the newest `max_memories` entries are kept.
pub struct MemoryManager {
    entries: Vec<MemoryEntry>,
    summary: String,
    max_memories: usize,
    memory_file: PathBuf,
    summary_file: PathBuf,
    summarizer: Arc<dyn Summarizer>,
    /// Set when the memory file exists but could not be read; `save` then
    /// leaves it untouched.
    keep_memory_file: bool,
}

impl MemoryManager {
    /// Load entries and summary from disk. Missing files start empty.
    ///
    /// Entries that cannot be read are skipped one by one. A memory file that
    /// cannot be read at all starts empty and is never overwritten.
    pub async fn load(config: &MemoryConfig, summarizer: Arc<dyn Summarizer>) -> Self {
        let mut keep_memory_file = false;
        let entries = match read_entries(&config.memory_file).await {
            Ok(Some(entries)) => {
                tracing::info!("Loaded {} memories", entries.len());
                entries
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(
                    "Failed to load memories, {} will not be overwritten: {}",
                    config.memory_file.display(),
                    e
                );
                keep_memory_file = true;
                Vec::new()
            }
        };

        let summary = match tokio::fs::read_to_string(&config.summary_file).await {
            Ok(s) => {
                tracing::info!("Loaded memory summary");
                s.trim().to_string()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                tracing::warn!(
                    "Failed to load memory summary {}: {}",
                    config.summary_file.display(),
                    e
                );
                String::new()
            }
        };

        Self {
            entries,
            summary,
            max_memories: config.max_memories.max(1),
            memory_file: config.memory_file.clone(),
            summary_file: config.summary_file.clone(),
            summarizer,
            keep_memory_file,
        }
    }

    /// Record one interaction and refresh the summary.
    ///
    /// Does nothing when both texts are empty.
    pub async fn add_memory(
        &mut self,
        user_input: &str,
        ai_response: &str,
        emotion_type: Emotion,
        emotion_delta: f32,
    ) {
        if user_input.is_empty() && ai_response.is_empty() {
            return;
        }

        let entry = MemoryEntry {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            emotion_type,
            emotion_delta,
            user_input: non_empty(user_input),
            ai_response: non_empty(ai_response),
        };
        self.push(entry);
        self.generate_summary().await;
    }

    fn push(&mut self, entry: MemoryEntry) {
        self.entries.push(entry);
        if self.entries.len() > self.max_memories {
            let excess = self.entries.len() - self.max_memories;
            self.entries.drain(..excess);
        }
    }

    /// Ask the summarizer for a fresh summary of all entries.
    pub async fn generate_summary(&mut self) {
        if self.entries.is_empty() {
            self.summary = NO_MEMORIES.to_string();
            return;
        }

        let record = format_record(&self.entries);
        match self.summarizer.summarize(&record).await {
            Ok(summary) => {
                self.summary = summary.trim().to_string();
                tracing::info!("Generated new memory summary");
            }
            Err(e) => {
                tracing::warn!("Memory summary generation failed: {:#}", e);
                self.summary = SUMMARY_FAILED.to_string();
            }
        }
    }

    /// Write entries and summary to their files.
    pub async fn save(&self) -> Result<(), MemoryError> {
        if self.keep_memory_file {
            tracing::warn!(
                "Not saving {} memories: {} was unreadable at start-up",
                self.entries.len(),
                self.memory_file.display()
            );
        } else {
            let json = serde_json::to_string_pretty(&self.entries)?;
            write_file(&self.memory_file, json.as_bytes()).await?;
            tracing::info!("Saved {} memories", self.entries.len());
        }

        write_file(&self.summary_file, self.summary.as_bytes()).await?;
        tracing::info!("Saved memory summary");
        Ok(())
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn has_memories(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn max_memories(&self) -> usize {
        self.max_memories
    }
}

/// Numbered interaction record fed to the summary model.
pub fn format_record(entries: &[MemoryEntry]) -> String {
    let mut text = String::new();
    for (i, m) in entries.iter().enumerate() {
        text.push_str(&format!("记忆 #{} ({}):\n", i + 1, m.timestamp));
        if let Some(u) = &m.user_input {
            text.push_str(&format!("用户: {}\n", u));
        }
        if let Some(a) = &m.ai_response {
            text.push_str(&format!("AI: {}\n", a));
        }
        text.push_str(&format!(
            "情感变化: {} ({:?})\n\n",
            m.emotion_type, m.emotion_delta
        ));
    }
    text
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

async fn read_entries(path: &Path) -> Result<Option<Vec<MemoryEntry>>, MemoryError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(MemoryError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    let raw: Vec<serde_json::Value> = serde_json::from_str(&content)?;
    let total = raw.len();
    let entries: Vec<MemoryEntry> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| match parse_entry(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping memory #{}: {}", i + 1, e);
                None
            }
        })
        .collect();
    if entries.len() < total {
        tracing::warn!("{} of {} memories could not be read", total - entries.len(), total);
    }
    Ok(Some(entries))
}

/// One entry, tolerating stray quotes or backticks around the emotion label.
fn parse_entry(mut value: serde_json::Value) -> Result<MemoryEntry, serde_json::Error> {
    let label = value
        .get("emotion_type")
        .and_then(|v| v.as_str())
        .map(|s| s.trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c.is_whitespace()));
    if let Some(emotion) = label.and_then(|l| l.parse::<Emotion>().ok()) {
        value["emotion_type"] = serde_json::Value::String(emotion.label().to_string());
    }
    serde_json::from_value(value)
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), MemoryError> {
    let io_err = |source| MemoryError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, bytes).await.map_err(io_err)
}
