use crate::api_types::{ChatMessage, StreamEvent};
use crate::emotion::analyze_emotion;
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts;
use crate::vision::{InputActivity, ScreenCapture, VisualAnalyzer, VisualPersona};
use anyhow::Result;
use lumi_core::config::VisualConfig;
use lumi_core::{LumiConfig, UiChannels};
use lumi_limbic::EmotionState;
use lumi_memory::MemoryManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub const WELCOME_MAX_TOKENS: u32 = 50;

/// Names, models and persona the engine talks with.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub ai_name: String,
    pub personality: String,
    /// Persona prompt for the configured language
    pub system_prompt: String,
    pub chat_model: String,
    pub emotion_model: String,
    pub stream: bool,
}

impl EngineSettings {
    pub fn from_config(cfg: &LumiConfig) -> Self {
        Self {
            ai_name: cfg.ui.ai_name.clone(),
            personality: cfg.personality.ai_personality.clone(),
            system_prompt: cfg.system_prompt().to_string(),
            chat_model: cfg.api.model.clone(),
            emotion_model: cfg.emotion.emotion_model.clone(),
            stream: cfg.settings.stream,
        }
    }
}

/// The conversational side of the companion.
///
/// Turns user input into emotion changes and replies, feeds the bubble queue
/// while replying and records every exchange in memory.
pub struct CompanionEngine {
    llm: Arc<dyn LlmClient>,
    emotion: Arc<EmotionState>,
    memory: Mutex<MemoryManager>,
    ui: UiChannels,
    settings: EngineSettings,
    activity: InputActivity,
    /// Set once the jump for the current turn has been sent
    jumped: AtomicBool,
    visual: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CompanionEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        emotion: Arc<EmotionState>,
        memory: MemoryManager,
        ui: UiChannels,
        settings: EngineSettings,
    ) -> Self {
        Self {
            llm,
            emotion,
            memory: Mutex::new(memory),
            ui,
            settings,
            activity: InputActivity::new(),
            jumped: AtomicBool::new(false),
            visual: std::sync::Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn emotion(&self) -> &Arc<EmotionState> {
        &self.emotion
    }

    pub fn ui(&self) -> &UiChannels {
        &self.ui
    }

    pub fn activity(&self) -> &InputActivity {
        &self.activity
    }

    pub async fn memory_summary(&self) -> String {
        self.memory.lock().await.summary().to_string()
    }

    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    pub async fn has_memories(&self) -> bool {
        self.memory.lock().await.has_memories()
    }

    /// Analyze `text` and apply its effect on the emotion state.
    ///
    /// From Calm the analysis may pick a new emotion; otherwise only the
    /// intensity moves. Returns whether the emotion type changed, in which
    /// case the new emotion has already been pushed onto the emotion queue.
    pub async fn process_user_input(&self, text: &str) -> bool {
        self.activity.touch();
        self.jumped.store(false, Ordering::SeqCst);

        let state = self.emotion.get_state().await;
        let summary = self.memory_summary().await;
        let (new_emotion, delta) = analyze_emotion(
            self.llm.as_ref(),
            &self.settings.emotion_model,
            &self.settings.personality,
            &state,
            &summary,
            text,
        )
        .await;

        // decay may have run during analysis: branch on the current state
        let changed = self.emotion.apply_input(new_emotion, delta).await;

        if changed {
            self.emotion.notify_changed().await;
        }
        tracing::debug!(
            "Input analyzed: {} {:+.1}, changed={}",
            new_emotion,
            delta,
            changed
        );
        changed
    }

    fn jump_once(&self) {
        if !self.jumped.swap(true, Ordering::SeqCst) {
            self.ui.jump();
        }
    }

    /// Reply to `text` with the main model.
    ///
    /// Every piece of reply text is handed to `on_chunk` as it arrives (the
    /// whole reply at once when not streaming). The finished reply goes to
    /// the bubble as final and is recorded in memory.
    pub async fn respond<F>(&self, text: &str, on_chunk: F) -> Result<String>
    where
        F: Fn(&str),
    {
        let state = self.emotion.get_state().await;
        let summary = self.memory_summary().await;
        let messages = vec![
            ChatMessage::system(prompts::chat_system_prompt(
                &self.settings.system_prompt,
                &state,
                &summary,
            )),
            ChatMessage::user(text),
        ];
        let params = CompletionParams::new(&self.settings.chat_model);

        let reply = if self.settings.stream {
            let mut rx = self.llm.stream_complete(messages, params).await?;
            let mut reply = String::new();
            while let Some(event) = rx.recv().await {
                match event {
                    StreamEvent::TextDelta(delta) => {
                        if delta.is_empty() {
                            continue;
                        }
                        self.jump_once();
                        on_chunk(&delta);
                        reply.push_str(&delta);
                        self.ui.bubble(reply.clone(), false);
                    }
                    StreamEvent::Done => break,
                    StreamEvent::Error(e) => anyhow::bail!("Reply stream broke off: {}", e),
                }
            }
            reply
        } else {
            let reply = self.llm.complete(messages, params).await?;
            self.jump_once();
            on_chunk(&reply);
            reply
        };

        self.ui.bubble(reply.clone(), true);

        let state = self.emotion.get_state().await;
        self.memory
            .lock()
            .await
            .add_memory(text, &reply, state.emotion, state.intensity)
            .await;

        Ok(reply)
    }

    /// A one-line greeting based on the memory summary.
    ///
    /// Only produced when there are memories; the greeting is also shown in
    /// the bubble. Failures are logged and yield `None`.
    pub async fn welcome_message(&self) -> Option<String> {
        let summary = {
            let memory = self.memory.lock().await;
            if !memory.has_memories() {
                return None;
            }
            memory.summary().to_string()
        };

        let messages = vec![
            ChatMessage::system(prompts::welcome_system_prompt(&self.settings.ai_name)),
            ChatMessage::user(prompts::welcome_user_prompt(&summary)),
        ];
        let params = CompletionParams::new(&self.settings.chat_model).max_tokens(WELCOME_MAX_TOKENS);
        match self.llm.complete(messages, params).await {
            Ok(reply) => {
                let reply = reply.trim().to_string();
                if reply.is_empty() {
                    return None;
                }
                self.ui.bubble(reply.clone(), true);
                Some(reply)
            }
            Err(e) => {
                tracing::warn!("Failed to generate welcome message: {:#}", e);
                None
            }
        }
    }

    /// Start the idle visual analysis loop in the background.
    pub fn start_visual_analysis(&self, capture: Arc<dyn ScreenCapture>, config: VisualConfig) {
        let persona = VisualPersona {
            ai_name: self.settings.ai_name.clone(),
            personality: self.settings.personality.clone(),
            system_prompt: self.settings.system_prompt.clone(),
            chat_model: self.settings.chat_model.clone(),
        };
        let analyzer = VisualAnalyzer::new(
            self.llm.clone(),
            self.emotion.clone(),
            self.ui.clone(),
            capture,
            self.activity.clone(),
            persona,
            config,
        );
        let handle = tokio::spawn(analyzer.run());
        if let Ok(mut slot) = self.visual.lock() {
            if let Some(old) = slot.replace(handle) {
                old.abort();
            }
        }
        tracing::info!("Visual analysis started");
    }

    pub fn stop_visual_analysis(&self) {
        if let Ok(mut slot) = self.visual.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
                tracing::info!("Visual analysis stopped");
            }
        }
    }

    pub fn visual_analysis_running(&self) -> bool {
        self.visual
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Stop background work and persist memory.
    pub async fn shutdown(&self) -> Result<()> {
        self.emotion.stop();
        self.stop_visual_analysis();
        self.memory.lock().await.save().await?;
        tracing::info!("Emotion state and visual analysis stopped, memory saved");
        Ok(())
    }
}
