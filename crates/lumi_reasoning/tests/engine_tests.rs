//! Integration tests for the CompanionEngine.
//!
//! A scripted MockProvider stands in for the model; memory lives in a temp dir.

use lumi_core::config::MemoryConfig;
use lumi_core::{BubbleEvent, Emotion, UiChannels, UiReceivers};
use lumi_limbic::{EmotionParams, EmotionState, HeartbeatConfig};
use lumi_memory::MemoryManager;
use lumi_reasoning::api_types::{ChatMessage, StreamEvent};
use lumi_reasoning::providers::MockProvider;
use lumi_reasoning::{CompanionEngine, CompletionParams, EngineSettings, LlmClient, LlmSummarizer};
use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    engine: CompanionEngine,
    chat: Arc<MockProvider>,
    rx: UiReceivers,
    dir: TempDir,
}

fn settings(stream: bool) -> EngineSettings {
    EngineSettings {
        ai_name: "Lumi".into(),
        personality: "活泼的桌面伙伴".into(),
        system_prompt: "你是Lumi。".into(),
        chat_model: "chat-model".into(),
        emotion_model: "emotion-model".into(),
        stream,
    }
}

fn memory_config(dir: &TempDir) -> MemoryConfig {
    MemoryConfig {
        memory_model: "memory-model".into(),
        max_memories: 18,
        memory_file: dir.path().join("memories.json"),
        summary_file: dir.path().join("memory_summary.txt"),
    }
}

async fn harness_in(dir: TempDir, replies: &[&str], stream: bool) -> Harness {
    let chat = Arc::new(MockProvider::with_replies(replies.iter().copied()));
    let summaries = Arc::new(MockProvider::new("用户和Lumi聊了天。"));
    let summarizer = Arc::new(LlmSummarizer::new(summaries, "memory-model"));
    let memory = MemoryManager::load(&memory_config(&dir), summarizer).await;

    let (ui, rx) = UiChannels::new();
    // Slow heartbeat so decay never interferes
    let emotion = Arc::new(EmotionState::new(
        EmotionParams::default(),
        HeartbeatConfig {
            interval: Duration::from_secs(3600),
        },
        ui.clone(),
    ));

    let engine = CompanionEngine::new(chat.clone(), emotion, memory, ui, settings(stream));
    Harness {
        engine,
        chat,
        rx,
        dir,
    }
}

async fn harness(replies: &[&str], stream: bool) -> Harness {
    harness_in(tempfile::tempdir().unwrap(), replies, stream).await
}

fn drain_bubbles(rx: &mut UiReceivers) -> Vec<BubbleEvent> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.bubble_rx.try_recv() {
        events.push(ev);
    }
    events
}

fn text(t: &str, is_final: bool) -> BubbleEvent {
    BubbleEvent::Text {
        text: t.to_string(),
        is_final,
    }
}

// ============================================================================
// process_user_input
// ============================================================================

#[tokio::test]
async fn test_calm_input_sets_new_emotion() {
    let mut h = harness(&["开心 50"], true).await;

    let changed = h.engine.process_user_input("你今天真好看").await;
    assert!(changed);

    let state = h.engine.emotion().get_state().await;
    assert_eq!(state.emotion, Emotion::Happy);
    assert_eq!(state.intensity, 50.0);
    assert_eq!(h.rx.emotion_rx.try_recv().unwrap(), Emotion::Happy);

    let (messages, params) = h.chat.requests().remove(0);
    assert_eq!(params.model, "emotion-model");
    assert!(messages[0].text().contains("活泼的桌面伙伴"));
    assert_eq!(messages[1].text(), "你今天真好看");
}

#[tokio::test]
async fn test_excited_input_only_moves_intensity() {
    let mut h = harness(&["生气 80", "-30", "惊讶 20"], true).await;

    assert!(h.engine.process_user_input("哼").await);
    assert!(!h.engine.process_user_input("别生气了").await);
    let state = h.engine.emotion().get_state().await;
    assert_eq!(state.emotion, Emotion::Angry);
    assert_eq!(state.intensity, 50.0);

    // Label replies are not accepted outside Calm
    assert!(!h.engine.process_user_input("看！").await);
    assert_eq!(h.engine.emotion().get_state().await.intensity, 50.0);

    assert_eq!(h.rx.emotion_rx.try_recv().unwrap(), Emotion::Angry);
    assert!(h.rx.emotion_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_failed_analysis_leaves_state_alone() {
    let mut h = harness(&["!err 500 boom"], true).await;

    assert!(!h.engine.process_user_input("你好").await);
    let state = h.engine.emotion().get_state().await;
    assert_eq!(state.emotion, Emotion::Calm);
    assert_eq!(state.intensity, 0.0);
    assert!(h.rx.emotion_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_input_marks_activity() {
    let h = harness(&["开心 10"], true).await;
    assert!(!h.engine.activity().active_within(Duration::from_secs(5)));
    h.engine.process_user_input("在吗").await;
    assert!(h.engine.activity().active_within(Duration::from_secs(5)));
}

/// Model that takes its time before answering.
struct SlowModel {
    delay: Duration,
    reply: &'static str,
}

#[async_trait::async_trait]
impl LlmClient for SlowModel {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _params: CompletionParams,
    ) -> anyhow::Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.to_string())
    }

    async fn stream_complete(
        &self,
        _messages: Vec<ChatMessage>,
        _params: CompletionParams,
    ) -> anyhow::Result<mpsc::Receiver<StreamEvent>> {
        anyhow::bail!("streaming not scripted")
    }
}

#[tokio::test(start_paused = true)]
async fn test_decay_during_analysis_sets_fresh_emotion() {
    let dir = tempfile::tempdir().unwrap();
    let summarizer = Arc::new(LlmSummarizer::new(
        Arc::new(MockProvider::new("摘要")),
        "memory-model",
    ));
    let memory = MemoryManager::load(&memory_config(&dir), summarizer).await;

    let (ui, mut rx) = UiChannels::new();
    let emotion = Arc::new(EmotionState::new(
        EmotionParams {
            decay_rate: 5.0,
            ..EmotionParams::default()
        },
        HeartbeatConfig {
            interval: Duration::from_secs(1),
        },
        ui.clone(),
    ));
    emotion.set_emotion(Emotion::Happy, 5.0).await;

    let model = Arc::new(SlowModel {
        delay: Duration::from_millis(2500),
        reply: "30",
    });
    let engine = CompanionEngine::new(model, emotion, memory, ui, settings(false));

    // analysis starts from Happy; decay reaches Calm after one tick
    let changed = engine.process_user_input("还在吗").await;

    let state = engine.emotion().get_state().await;
    assert!(changed);
    assert_eq!(state.emotion, Emotion::Happy);
    assert_eq!(state.intensity, 30.0);
    assert_eq!(rx.emotion_rx.try_recv().unwrap(), Emotion::Calm);
    assert_eq!(rx.emotion_rx.try_recv().unwrap(), Emotion::Happy);
    assert!(rx.emotion_rx.try_recv().is_err());
}

// ============================================================================
// respond
// ============================================================================

#[tokio::test]
async fn test_streaming_reply_feeds_bubble_and_memory() {
    let mut h = harness(&["开心 40", "今天天气真好呀"], true).await;
    h.engine.process_user_input("出去玩吧").await;

    let chunks = RefCell::new(Vec::new());
    let reply = h
        .engine
        .respond("出去玩吧", |c| chunks.borrow_mut().push(c.to_string()))
        .await
        .unwrap();
    assert_eq!(reply, "今天天气真好呀");
    assert_eq!(chunks.into_inner(), vec!["今天天气", "真好呀"]);

    assert_eq!(
        drain_bubbles(&mut h.rx),
        vec![
            BubbleEvent::Jump,
            text("今天天气", false),
            text("今天天气真好呀", false),
            text("今天天气真好呀", true),
        ]
    );

    assert_eq!(h.engine.memory_len().await, 1);
    assert_eq!(h.engine.memory_summary().await, "用户和Lumi聊了天。");
}

#[tokio::test]
async fn test_chat_prompt_carries_emotion_and_summary() {
    let h = harness(&["期待 60", "好呀"], false).await;
    h.engine.process_user_input("明天去游乐园").await;
    h.engine.respond("明天去游乐园", |_| {}).await.unwrap();

    let (messages, params) = h.chat.requests().remove(1);
    assert_eq!(params.model, "chat-model");
    let system = messages[0].text();
    assert!(system.starts_with("你是Lumi。"));
    assert!(system.contains("[当前情感状态: 期待，强度: 60.0。"));
    assert!(system.ends_with("以下是之前的互动记忆摘要：\n"));
}

#[tokio::test]
async fn test_non_streaming_reply_jumps_once() {
    let mut h = harness(&["平静 0", "好的", "还在"], false).await;
    h.engine.process_user_input("帮我个忙").await;

    let reply = h.engine.respond("帮我个忙", |_| {}).await.unwrap();
    assert_eq!(reply, "好的");
    assert_eq!(
        drain_bubbles(&mut h.rx),
        vec![BubbleEvent::Jump, text("好的", true)]
    );

    // A second reply in the same turn does not jump again
    h.engine.respond("还在吗", |_| {}).await.unwrap();
    assert_eq!(drain_bubbles(&mut h.rx), vec![text("还在", true)]);
}

#[tokio::test]
async fn test_reply_failure_propagates_without_memory() {
    let mut h = harness(&["开心 10", "!err 401 invalid api key"], true).await;
    h.engine.process_user_input("hi").await;

    let err = h.engine.respond("hi", |_| {}).await.unwrap_err();
    assert!(err.to_string().contains("401"));
    assert_eq!(h.engine.memory_len().await, 0);
    assert!(drain_bubbles(&mut h.rx).is_empty());
}

// ============================================================================
// welcome / shutdown
// ============================================================================

#[tokio::test]
async fn test_no_welcome_without_memories() {
    let h = harness(&["欢迎回来！"], true).await;
    assert!(h.engine.welcome_message().await.is_none());
    assert_eq!(h.chat.calls(), 0);
}

#[tokio::test]
async fn test_welcome_with_memories() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("memories.json"),
        r#"[{"timestamp":"2024-05-01 10:00:00","emotion_type":"开心","emotion_delta":30.0,"user_input":"早","ai_response":"早上好"}]"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("memory_summary.txt"), "用户早上打了招呼").unwrap();

    let mut h = harness_in(dir, &["  又见面啦！ "], true).await;
    assert_eq!(h.engine.welcome_message().await.as_deref(), Some("又见面啦！"));

    let (messages, params) = h.chat.requests().remove(0);
    assert_eq!(params.max_tokens, Some(50));
    assert!(messages[0].text().contains("名字是Lumi"));
    assert_eq!(messages[1].text(), "记忆摘要：\n用户早上打了招呼");
    assert_eq!(drain_bubbles(&mut h.rx), vec![text("又见面啦！", true)]);
}

#[tokio::test]
async fn test_welcome_failure_is_none() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("memories.json"),
        r#"[{"timestamp":"2024-05-01 10:00:00","emotion_type":"平静","emotion_delta":0.0,"user_input":"在吗"}]"#,
    )
    .unwrap();
    let h = harness_in(dir, &["!err timeout"], true).await;
    assert!(h.engine.welcome_message().await.is_none());
}

#[tokio::test]
async fn test_shutdown_saves_memory_and_stops_heartbeat() {
    let h = harness(&["开心 20", "嗯嗯"], true).await;
    h.engine.process_user_input("陪我聊天").await;
    h.engine.respond("陪我聊天", |_| {}).await.unwrap();

    h.engine.shutdown().await.unwrap();
    assert!(!h.engine.emotion().is_running());

    let saved = std::fs::read_to_string(h.dir.path().join("memories.json")).unwrap();
    assert!(saved.contains("陪我聊天"));
    assert!(saved.contains("嗯嗯"));
    let summary = std::fs::read_to_string(h.dir.path().join("memory_summary.txt")).unwrap();
    assert_eq!(summary, "用户和Lumi聊了天。");
}
