//! Idle visual analysis: after a random quiet period, look at the screen and
//! say something about it.

use crate::api_types::ChatMessage;
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lumi_core::config::VisualConfig;
use lumi_core::UiChannels;
use lumi_limbic::EmotionState;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const VISION_MAX_TOKENS: u32 = 1000;
pub const CONTEXT_MAX_TOKENS: u32 = 300;

/// Screenshot capability.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Capture the primary screen as a PNG file inside `dir`, returning its path.
    async fn capture(&self, dir: &Path) -> Result<PathBuf>;
}

/// Runs an external screenshot tool with the output path as last argument,
/// e.g. `["grim"]`, `["scrot", "-o"]` or `["screencapture", "-x"]`.
#[derive(Debug, Clone)]
pub struct CommandCapture {
    program: String,
    args: Vec<String>,
}

impl CommandCapture {
    /// `None` when no (or an empty) command is configured.
    pub fn from_config(cfg: &VisualConfig) -> Option<Self> {
        let (program, args) = cfg.capture_command.as_deref()?.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl ScreenCapture for CommandCapture {
    async fn capture(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create screenshot dir {}", dir.display()))?;
        let path = dir.join(format!(
            "screenshot_{}.png",
            chrono::Local::now().timestamp()
        ));

        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .status()
            .await
            .with_context(|| format!("Failed to run screenshot command {}", self.program))?;
        if !status.success() {
            anyhow::bail!("Screenshot command {} exited with {}", self.program, status);
        }
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            anyhow::bail!("Screenshot command did not write {}", path.display());
        }
        Ok(path)
    }
}

/// Instant of the most recent user input, shared between the engine and the
/// visual analyzer.
#[derive(Debug, Clone, Default)]
pub struct InputActivity {
    last: Arc<Mutex<Option<Instant>>>,
}

impl InputActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&self) {
        if let Ok(mut last) = self.last.lock() {
            *last = Some(Instant::now());
        }
    }

    /// Whether the user typed less than `window` ago.
    pub fn active_within(&self, window: Duration) -> bool {
        self.last
            .lock()
            .ok()
            .and_then(|last| *last)
            .is_some_and(|t| t.elapsed() < window)
    }
}

/// Persona details the proactive remark is written with.
#[derive(Debug, Clone)]
pub struct VisualPersona {
    pub ai_name: String,
    pub personality: String,
    /// Chat persona prompt used for the final reply
    pub system_prompt: String,
    pub chat_model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisualOutcome {
    /// The companion said something
    Spoke(String),
    /// Nothing was said
    Skipped(&'static str),
}

pub struct VisualAnalyzer {
    llm: Arc<dyn LlmClient>,
    emotion: Arc<EmotionState>,
    ui: UiChannels,
    capture: Arc<dyn ScreenCapture>,
    activity: InputActivity,
    persona: VisualPersona,
    config: VisualConfig,
}

impl VisualAnalyzer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        emotion: Arc<EmotionState>,
        ui: UiChannels,
        capture: Arc<dyn ScreenCapture>,
        activity: InputActivity,
        persona: VisualPersona,
        config: VisualConfig,
    ) -> Self {
        Self {
            llm,
            emotion,
            ui,
            capture,
            activity,
            persona,
            config,
        }
    }

    fn idle_grace(&self) -> Duration {
        Duration::from_secs(self.config.idle_grace_secs)
    }

    /// Random wait in `min_wait_secs..=max_wait_secs`.
    pub fn next_wait(&self) -> Duration {
        let lo = self.config.min_wait_secs.min(self.config.max_wait_secs);
        let hi = self.config.min_wait_secs.max(self.config.max_wait_secs);
        Duration::from_secs(rand::thread_rng().gen_range(lo..=hi))
    }

    /// Loop forever: wait, then analyze unless the user is active.
    pub async fn run(self) {
        loop {
            let wait = self.next_wait();
            tracing::info!("Visual analysis in {}s", wait.as_secs());
            tokio::time::sleep(wait).await;

            match self.analyze_once().await {
                Ok(VisualOutcome::Spoke(reply)) => {
                    tracing::info!("{} (proactive): {}", self.persona.ai_name, reply)
                }
                Ok(VisualOutcome::Skipped(reason)) => {
                    tracing::info!("Visual analysis skipped: {}", reason)
                }
                Err(e) => tracing::warn!("Visual analysis failed: {:#}", e),
            }
        }
    }

    /// One analysis round. The screenshot is removed whatever happens.
    pub async fn analyze_once(&self) -> Result<VisualOutcome> {
        if self.activity.active_within(self.idle_grace()) {
            return Ok(VisualOutcome::Skipped("user typed recently"));
        }

        tracing::info!("User idle, starting visual analysis");
        let path = self.capture.capture(&self.config.screenshot_dir).await?;
        tracing::debug!("Screenshot saved: {}", path.display());

        let result = self.speak_about(&path).await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("Failed to remove screenshot {}: {}", path.display(), e);
        }
        result
    }

    async fn speak_about(&self, screenshot: &Path) -> Result<VisualOutcome> {
        let bytes = tokio::fs::read(screenshot)
            .await
            .with_context(|| format!("Failed to read screenshot {}", screenshot.display()))?;
        let image_url = format!("data:image/png;base64,{}", STANDARD.encode(bytes));

        let description = self
            .llm
            .complete(
                vec![ChatMessage::user_with_image(prompts::VISION_PROMPT, image_url)],
                CompletionParams::new(&self.config.vision_model).max_tokens(VISION_MAX_TOKENS),
            )
            .await
            .context("Vision model request failed")?;
        if description.trim().is_empty() {
            return Ok(VisualOutcome::Skipped("empty screen description"));
        }
        tracing::debug!("Screen description: {}", description);

        let state = self.emotion.get_state().await;
        let context = self
            .llm
            .complete(
                vec![ChatMessage::system(prompts::context_prompt(
                    &self.persona.ai_name,
                    &self.persona.personality,
                    &state,
                    &description,
                ))],
                CompletionParams::new(&self.config.analysis_model).max_tokens(CONTEXT_MAX_TOKENS),
            )
            .await
            .context("Context prompt request failed")?;
        if context.trim().is_empty() {
            return Ok(VisualOutcome::Skipped("empty context prompt"));
        }
        tracing::debug!("Context prompt: {}", context);

        if self.activity.active_within(self.idle_grace()) {
            return Ok(VisualOutcome::Skipped("user typed during analysis"));
        }

        let reply = self
            .llm
            .complete(
                vec![
                    ChatMessage::system(self.persona.system_prompt.as_str()),
                    ChatMessage::user(context),
                ],
                CompletionParams::new(&self.persona.chat_model),
            )
            .await
            .context("Proactive reply request failed")?;

        self.ui.bubble(reply.clone(), true);
        self.ui.jump();
        Ok(VisualOutcome::Spoke(reply))
    }
}
