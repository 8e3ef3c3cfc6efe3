//! UI event queues between the engine and the presentation consumers.
//!
//! Three unbounded queues: emotion changes and bubble updates go to the
//! character window, clock commands go to the clock overlay. Producers never
//! block; a send to a consumer that has gone away is dropped.

use crate::Emotion;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum BubbleEvent {
    /// Replace the bubble text. `is_final` marks the complete reply.
    Text { text: String, is_final: bool },
    /// Play the jump animation and show the jump indicator.
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockCommand {
    Show,
}

/// Wire form of every queue message, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    Emotion {
        emotion: Emotion,
    },
    Bubble {
        text: String,
        #[serde(rename = "final", default)]
        is_final: bool,
    },
    Jump,
    Clock,
}

impl From<BubbleEvent> for UiEvent {
    fn from(ev: BubbleEvent) -> Self {
        match ev {
            BubbleEvent::Text { text, is_final } => UiEvent::Bubble { text, is_final },
            BubbleEvent::Jump => UiEvent::Jump,
        }
    }
}

impl UiEvent {
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Sending half of the UI queues. Cheap to clone.
#[derive(Debug, Clone)]
pub struct UiChannels {
    emotion_tx: mpsc::UnboundedSender<Emotion>,
    bubble_tx: mpsc::UnboundedSender<BubbleEvent>,
    clock_tx: mpsc::UnboundedSender<ClockCommand>,
}

/// Receiving half, handed to the presentation side.
#[derive(Debug)]
pub struct UiReceivers {
    pub emotion_rx: mpsc::UnboundedReceiver<Emotion>,
    pub bubble_rx: mpsc::UnboundedReceiver<BubbleEvent>,
    pub clock_rx: mpsc::UnboundedReceiver<ClockCommand>,
}

impl UiChannels {
    pub fn new() -> (Self, UiReceivers) {
        let (emotion_tx, emotion_rx) = mpsc::unbounded_channel();
        let (bubble_tx, bubble_rx) = mpsc::unbounded_channel();
        let (clock_tx, clock_rx) = mpsc::unbounded_channel();
        (
            Self {
                emotion_tx,
                bubble_tx,
                clock_tx,
            },
            UiReceivers {
                emotion_rx,
                bubble_rx,
                clock_rx,
            },
        )
    }

    pub fn emotion_changed(&self, emotion: Emotion) {
        if self.emotion_tx.send(emotion).is_err() {
            tracing::debug!("Emotion queue closed, dropping {}", emotion);
        } else {
            tracing::debug!("Sent emotion update: {}", emotion);
        }
    }

    pub fn bubble(&self, text: impl Into<String>, is_final: bool) {
        let ev = BubbleEvent::Text {
            text: text.into(),
            is_final,
        };
        if self.bubble_tx.send(ev).is_err() {
            tracing::debug!("Bubble queue closed, dropping text update");
        }
    }

    pub fn jump(&self) {
        if self.bubble_tx.send(BubbleEvent::Jump).is_err() {
            tracing::debug!("Bubble queue closed, dropping jump");
        }
    }

    pub fn show_clock(&self) {
        if self.clock_tx.send(ClockCommand::Show).is_err() {
            tracing::debug!("Clock queue closed, dropping show");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queues_deliver_in_order() {
        let (tx, mut rx) = UiChannels::new();
        tx.bubble("hel", false);
        tx.jump();
        tx.bubble("hello", true);
        tx.emotion_changed(Emotion::Happy);
        tx.show_clock();

        assert_eq!(
            rx.bubble_rx.try_recv().unwrap(),
            BubbleEvent::Text {
                text: "hel".into(),
                is_final: false
            }
        );
        assert_eq!(rx.bubble_rx.try_recv().unwrap(), BubbleEvent::Jump);
        assert!(matches!(
            rx.bubble_rx.try_recv().unwrap(),
            BubbleEvent::Text { is_final: true, .. }
        ));
        assert_eq!(rx.emotion_rx.try_recv().unwrap(), Emotion::Happy);
        assert_eq!(rx.clock_rx.try_recv().unwrap(), ClockCommand::Show);
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (tx, rx) = UiChannels::new();
        drop(rx);
        tx.bubble("nobody listens", true);
        tx.jump();
        tx.emotion_changed(Emotion::Sad);
        tx.show_clock();
    }

    #[test]
    fn test_json_lines() {
        let ev = UiEvent::Emotion {
            emotion: Emotion::Happy,
        };
        assert_eq!(
            ev.to_json_line().unwrap(),
            r#"{"type":"emotion","emotion":"开心"}"#
        );

        let ev: UiEvent = BubbleEvent::Text {
            text: "hi".into(),
            is_final: true,
        }
        .into();
        assert_eq!(
            ev.to_json_line().unwrap(),
            r#"{"type":"bubble","text":"hi","final":true}"#
        );

        assert_eq!(UiEvent::Jump.to_json_line().unwrap(), r#"{"type":"jump"}"#);
    }

    #[test]
    fn test_parse_bubble_without_final() {
        let ev: UiEvent = serde_json::from_str(r#"{"type":"bubble","text":"x"}"#).unwrap();
        assert_eq!(
            ev,
            UiEvent::Bubble {
                text: "x".into(),
                is_final: false
            }
        );
    }
}
