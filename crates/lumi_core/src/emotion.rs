//! Discrete emotion types shown by the companion.
//!
//! The set is closed: every emotion has a sprite pair on disk
//! (`<label>_1.png`, `<label>_2.png`) and a label the emotion model picks from.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Emotion {
    /// Resting state. Intensity decays back here.
    #[default]
    Calm,
    Happy,
    Angry,
    Sad,
    Disgusted,
    Embarrassed,
    Expectant,
    Afraid,
    Surprised,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown emotion label: {0:?}")]
pub struct EmotionParseError(pub String);

impl Emotion {
    pub const ALL: [Emotion; 9] = [
        Emotion::Calm,
        Emotion::Happy,
        Emotion::Angry,
        Emotion::Sad,
        Emotion::Disgusted,
        Emotion::Embarrassed,
        Emotion::Expectant,
        Emotion::Afraid,
        Emotion::Surprised,
    ];

    /// Chinese label, used in prompts and sprite file names.
    pub fn label(&self) -> &'static str {
        match self {
            Emotion::Calm => "平静",
            Emotion::Happy => "开心",
            Emotion::Angry => "生气",
            Emotion::Sad => "悲伤",
            Emotion::Disgusted => "厌恶",
            Emotion::Embarrassed => "尴尬",
            Emotion::Expectant => "期待",
            Emotion::Afraid => "恐惧",
            Emotion::Surprised => "惊讶",
        }
    }

    pub fn english_name(&self) -> &'static str {
        match self {
            Emotion::Calm => "calm",
            Emotion::Happy => "happy",
            Emotion::Angry => "angry",
            Emotion::Sad => "sad",
            Emotion::Disgusted => "disgusted",
            Emotion::Embarrassed => "embarrassed",
            Emotion::Expectant => "expectant",
            Emotion::Afraid => "afraid",
            Emotion::Surprised => "surprised",
        }
    }

    pub fn is_calm(&self) -> bool {
        matches!(self, Emotion::Calm)
    }

    /// Comma-separated label list for the emotion analysis prompt.
    pub fn label_list() -> String {
        Self::ALL
            .iter()
            .map(|e| e.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Emotion {
    type Err = EmotionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.label() == s || e.english_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| EmotionParseError(s.to_string()))
    }
}

impl Serialize for Emotion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Emotion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
