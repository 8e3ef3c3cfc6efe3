//! Emotion analysis of user input through the emotion model.

use crate::api_types::ChatMessage;
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts;
use lumi_core::{Emotion, EmotionSnapshot};
use regex::Regex;
use std::sync::LazyLock;

/// Largest change a single input may cause, in either direction.
pub const MAX_DELTA: f32 = 100.0;

static RE_THINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Ask the emotion model how `user_input` affects the companion.
///
/// Returns `(emotion, delta)`. Any failure leaves the emotion as it is with a
/// zero delta.
pub async fn analyze_emotion(
    llm: &dyn LlmClient,
    model: &str,
    personality: &str,
    state: &EmotionSnapshot,
    memory_summary: &str,
    user_input: &str,
) -> (Emotion, f32) {
    let messages = vec![
        ChatMessage::system(prompts::emotion_analysis_prompt(
            personality,
            state,
            memory_summary,
        )),
        ChatMessage::user(user_input),
    ];

    match llm.complete(messages, CompletionParams::new(model)).await {
        Ok(reply) => {
            let result = parse_emotion_reply(state.emotion, &reply);
            tracing::debug!("Emotion model replied {:?} -> {:?}", reply.trim(), result);
            result
        }
        Err(e) => {
            tracing::warn!("Emotion analysis failed: {:#}", e);
            (state.emotion, 0.0)
        }
    }
}

/// Parse the emotion model's reply.
///
/// From Calm the reply must be `<emotion> <number>`; otherwise a single
/// number. Unparsable replies yield `(current, 0)`.
pub fn parse_emotion_reply(current: Emotion, reply: &str) -> (Emotion, f32) {
    let cleaned = RE_THINK.replace_all(reply, "");
    let cleaned = cleaned.trim().trim_matches('`').trim();

    if current.is_calm() {
        let mut parts = cleaned.split_whitespace();
        let (Some(label), Some(number)) = (parts.next(), parts.next()) else {
            return (current, 0.0);
        };
        match (label.parse::<Emotion>(), parse_delta(number)) {
            (Ok(emotion), Some(delta)) => (emotion, delta),
            _ => (current, 0.0),
        }
    } else {
        (current, parse_delta(cleaned).unwrap_or(0.0))
    }
}

fn parse_delta(s: &str) -> Option<f32> {
    let v: f32 = s.trim().trim_matches('`').parse().ok()?;
    v.is_finite().then(|| v.clamp(-MAX_DELTA, MAX_DELTA))
}
