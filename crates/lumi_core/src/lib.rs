pub mod config;
pub mod emotion;
pub mod events;

pub use config::{Language, LumiConfig};
pub use emotion::{Emotion, EmotionParseError};
pub use events::{BubbleEvent, ClockCommand, UiChannels, UiEvent, UiReceivers};

use serde::{Deserialize, Serialize};

/// Point-in-time view of the emotional state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EmotionSnapshot {
    pub emotion: Emotion,
    pub intensity: f32,
}

impl EmotionSnapshot {
    /// Status line form, e.g. `开心 42.0`.
    pub fn status_line(&self) -> String {
        format!("{} {:.1}", self.emotion, self.intensity)
    }
}
