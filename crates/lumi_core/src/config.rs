use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LumiConfig {
    pub api: ApiConfig,
    pub settings: SettingsConfig,
    pub ui: UiConfig,
    pub emotion: EmotionConfig,
    pub personality: PersonalityConfig,
    pub visual: VisualConfig,
    pub memory: MemoryConfig,
    pub music: MusicConfig,
    pub clock: ClockConfig,
}

impl LumiConfig {
    /// Read a TOML file; absent keys keep their defaults, then `LUMI_*`
    /// variables are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: LumiConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Like [`LumiConfig::load`], but an unreadable file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({:#}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LUMI_API_KEY") {
            self.api.api_key = v;
        }
        if let Ok(v) = std::env::var("LUMI_BASE_URL") {
            self.api.base_url = v;
        }
        if let Ok(v) = std::env::var("LUMI_MODEL") {
            self.api.model = v;
        }
        if let Ok(v) = std::env::var("LUMI_STREAM") {
            if let Ok(b) = v.parse() {
                self.settings.stream = b;
            }
        }
        if let Ok(v) = std::env::var("LUMI_LANGUAGE") {
            self.settings.language = Language::from_setting(&v);
        }
    }

    /// Persona prompt for the configured language.
    pub fn system_prompt(&self) -> &str {
        match self.settings.language {
            Language::Japanese => &self.personality.system_prompt_2,
            Language::Chinese => &self.personality.system_prompt,
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.siliconflow.cn/v1".to_string(),
            model: "deepseek-ai/DeepSeek-V3".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    Chinese,
    Japanese,
}

impl Language {
    /// Anything other than "japanese" selects Chinese.
    pub fn from_setting(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("japanese") {
            Language::Japanese
        } else {
            Language::Chinese
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Chinese => "中文",
            Language::Japanese => "日文",
        }
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Language::from_setting(&s))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub stream: bool,
    pub language: Language,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            stream: true,
            language: Language::Chinese,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub ai_name: String,
    /// Sprite scale in percent (1-100).
    pub scale: f32,
    pub images_dir: PathBuf,
    pub bubble_font: String,
    pub bubble_font_size: u32,
    pub bubble_text_color: String,
    pub bubble_bg_color: String,
    pub bubble_corner_radius: u32,
    pub bubble_max_width: f32,
    pub bubble_hide_secs: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            ai_name: "AI".to_string(),
            scale: 50.0,
            images_dir: PathBuf::from("images"),
            bubble_font: "Microsoft YaHei".to_string(),
            bubble_font_size: 12,
            bubble_text_color: "#333333".to_string(),
            bubble_bg_color: "rgba(255, 255, 255, 200)".to_string(),
            bubble_corner_radius: 10,
            bubble_max_width: 230.0,
            bubble_hide_secs: 5,
        }
    }
}

impl UiConfig {
    /// Scale as a factor, clamped to the 1-100 percent range.
    pub fn scale_factor(&self) -> f32 {
        self.scale.clamp(1.0, 100.0) / 100.0
    }

    pub fn bubble_hide_after(&self) -> Duration {
        Duration::from_secs(self.bubble_hide_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    pub emotion_model: String,
    /// Intensity lost per heartbeat tick.
    pub emotion_decay: f32,
    pub max_intensity: f32,
    pub emotion_impact_factor: f32,
    pub tick_secs: u64,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            emotion_model: "deepseek-ai/DeepSeek-R1".to_string(),
            emotion_decay: 1.0,
            max_intensity: 250.0,
            emotion_impact_factor: 1.0,
            tick_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersonalityConfig {
    pub ai_personality: String,
    pub system_prompt: String,
    pub system_prompt_2: String,
}

impl Default for PersonalityConfig {
    fn default() -> Self {
        Self {
            ai_personality: "一个AI助手".to_string(),
            system_prompt: "你是一个住在用户桌面上的虚拟伙伴，说话简短自然，像朋友一样聊天。"
                .to_string(),
            system_prompt_2:
                "あなたはユーザーのデスクトップに住むバーチャルな相棒です。短く自然に、友達のように話してください。"
                    .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub enabled: bool,
    pub vision_model: String,
    pub analysis_model: String,
    pub min_wait_secs: u64,
    pub max_wait_secs: u64,
    /// Input within this window cancels a pending analysis.
    pub idle_grace_secs: u64,
    pub screenshot_dir: PathBuf,
    /// External screenshot command; the output path is appended as last argument.
    pub capture_command: Option<Vec<String>>,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vision_model: "deepseek-ai/deepseek-vl2".to_string(),
            analysis_model: "deepseek-ai/DeepSeek-V3".to_string(),
            min_wait_secs: 50,
            max_wait_secs: 200,
            idle_grace_secs: 5,
            screenshot_dir: PathBuf::from("screenshots"),
            capture_command: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub memory_model: String,
    pub max_memories: usize,
    pub memory_file: PathBuf,
    pub summary_file: PathBuf,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            memory_model: "deepseek-ai/DeepSeek-V3".to_string(),
            max_memories: 18,
            memory_file: PathBuf::from("memories.json"),
            summary_file: PathBuf::from("memory_summary.txt"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MusicConfig {
    pub music_dir: PathBuf,
    /// Initial volume in percent.
    pub volume: f32,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            music_dir: PathBuf::from("music"),
            volume: 50.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub hold_secs: u64,
    pub fade_step: f32,
    pub fade_interval_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            hold_secs: 5,
            fade_step: 0.05,
            fade_interval_ms: 50,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = LumiConfig::default();
        assert_eq!(cfg.api.model, "deepseek-ai/DeepSeek-V3");
        assert!(cfg.settings.stream);
        assert_eq!(cfg.emotion.max_intensity, 250.0);
        assert_eq!(cfg.memory.max_memories, 18);
        assert!((cfg.ui.scale_factor() - 0.5).abs() < 1e-6);
        assert!(cfg.visual.capture_command.is_none());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[api]
api_key = "sk-test"
model = "Qwen/Qwen2.5-7B-Instruct"
"#;
        let cfg: LumiConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.api.api_key, "sk-test");
        assert_eq!(cfg.api.model, "Qwen/Qwen2.5-7B-Instruct");
        // missing keys keep their defaults
        assert_eq!(cfg.api.base_url, "https://api.siliconflow.cn/v1");
        assert_eq!(cfg.emotion.emotion_decay, 1.0);
        assert_eq!(cfg.ui.ai_name, "AI");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[api]
api_key = "sk-test"
base_url = "http://localhost:8000/v1"
model = "main"
timeout_secs = 30

[settings]
stream = false
language = "Japanese"

[ui]
ai_name = "Lumi"
scale = 80
bubble_bg_color = "rgba(0, 0, 0, 128)"
bubble_hide_secs = 8

[emotion]
emotion_model = "emo"
emotion_decay = 2.5
max_intensity = 100
emotion_impact_factor = 0.5

[personality]
ai_personality = "傲娇的猫娘"
system_prompt = "中文提示"
system_prompt_2 = "日本語プロンプト"

[visual]
enabled = false
min_wait_secs = 10
max_wait_secs = 20
capture_command = ["grim"]

[memory]
max_memories = 5
memory_file = "data/memories.json"

[music]
music_dir = "songs"

[clock]
hold_secs = 2
"#;
        let cfg: LumiConfig = toml::from_str(toml_str).unwrap();
        assert!(!cfg.settings.stream);
        assert_eq!(cfg.settings.language, Language::Japanese);
        assert_eq!(cfg.system_prompt(), "日本語プロンプト");
        assert_eq!(cfg.ui.ai_name, "Lumi");
        assert!((cfg.ui.scale_factor() - 0.8).abs() < 1e-6);
        assert_eq!(cfg.ui.bubble_hide_after(), Duration::from_secs(8));
        assert_eq!(cfg.emotion.emotion_decay, 2.5);
        assert_eq!(cfg.emotion.max_intensity, 100.0);
        assert!(!cfg.visual.enabled);
        assert_eq!(cfg.visual.capture_command, Some(vec!["grim".to_string()]));
        assert_eq!(cfg.memory.max_memories, 5);
        assert_eq!(cfg.memory.memory_file, PathBuf::from("data/memories.json"));
        assert_eq!(cfg.music.music_dir, PathBuf::from("songs"));
        assert_eq!(cfg.clock.hold_secs, 2);
        assert_eq!(cfg.clock.fade_interval_ms, 50);
    }

    #[test]
    fn test_unknown_language_falls_back_to_chinese() {
        let cfg: LumiConfig = toml::from_str("[settings]\nlanguage = \"klingon\"").unwrap();
        assert_eq!(cfg.settings.language, Language::Chinese);
        assert_eq!(cfg.system_prompt(), cfg.personality.system_prompt);
    }

    #[test]
    fn test_scale_is_clamped() {
        let ui = UiConfig {
            scale: 250.0,
            ..UiConfig::default()
        };
        assert!((ui.scale_factor() - 1.0).abs() < 1e-6);
        let ui = UiConfig {
            scale: 0.0,
            ..UiConfig::default()
        };
        assert!((ui.scale_factor() - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        // Part 1: env overrides
        std::env::set_var("LUMI_MODEL", "env-model");
        std::env::set_var("LUMI_STREAM", "false");

        let mut cfg = LumiConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.api.model, "env-model");
        assert!(!cfg.settings.stream);

        std::env::remove_var("LUMI_MODEL");
        std::env::remove_var("LUMI_STREAM");

        // missing file
        let cfg = LumiConfig::load_or_default("/nonexistent/lumi.toml");
        assert_eq!(cfg.api.model, "deepseek-ai/DeepSeek-V3");
    }
}
