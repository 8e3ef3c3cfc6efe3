//! Pure state transitions for the emotion state.
//!
//! Every function takes the snapshot by `&mut` and reports whether the
//! emotion *type* changed. Intensity stays within `[0, max_intensity]`.

use lumi_core::config::EmotionConfig;
use lumi_core::{Emotion, EmotionSnapshot};

/// Tunable parameters, fixed for the lifetime of an `EmotionState`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionParams {
    /// Intensity lost per heartbeat tick.
    pub decay_rate: f32,
    pub max_intensity: f32,
    /// Multiplier applied to every input-driven change.
    pub impact_factor: f32,
}

impl Default for EmotionParams {
    fn default() -> Self {
        Self {
            decay_rate: 1.0,
            max_intensity: 250.0,
            impact_factor: 1.0,
        }
    }
}

impl From<&EmotionConfig> for EmotionParams {
    fn from(cfg: &EmotionConfig) -> Self {
        Self {
            decay_rate: cfg.emotion_decay.max(0.0),
            max_intensity: cfg.max_intensity.max(0.0),
            impact_factor: cfg.emotion_impact_factor,
        }
    }
}

impl EmotionParams {
    fn clamp(&self, intensity: f32) -> f32 {
        if intensity.is_nan() {
            return 0.0;
        }
        intensity.clamp(0.0, self.max_intensity)
    }
}

/// Shift intensity by `delta × impact_factor`. The type never changes here.
pub fn apply_delta(state: &mut EmotionSnapshot, params: &EmotionParams, delta: f32) -> bool {
    state.intensity = params.clamp(state.intensity + delta * params.impact_factor);
    false
}

/// Replace type and intensity (intensity scaled by `impact_factor`).
pub fn apply_set(
    state: &mut EmotionSnapshot,
    params: &EmotionParams,
    emotion: Emotion,
    intensity: f32,
) -> bool {
    let prev = state.emotion;
    state.emotion = emotion;
    state.intensity = params.clamp(intensity * params.impact_factor);
    prev != emotion
}

/// Effect of analyzed user input: from Calm a new emotion is set, otherwise
/// only the intensity moves.
pub fn apply_input(
    state: &mut EmotionSnapshot,
    params: &EmotionParams,
    emotion: Emotion,
    delta: f32,
) -> bool {
    if state.emotion.is_calm() {
        apply_set(state, params, emotion, delta)
    } else {
        apply_delta(state, params, delta)
    }
}

/// One heartbeat tick. Reaching zero intensity resets the type to Calm.
pub fn apply_decay(state: &mut EmotionSnapshot, params: &EmotionParams) -> bool {
    let prev = state.emotion;
    state.intensity = (state.intensity - params.decay_rate).max(0.0);
    if state.intensity == 0.0 {
        state.emotion = Emotion::Calm;
    }
    prev != state.emotion
}
