//! # Lumi emotion state
//!
//! The companion's mood is a single `(emotion, intensity)` pair. It is
//! perturbed by analyzed user input and decays on a background heartbeat:
//!
//! 1. The engine applies input-driven changes (`set_emotion` / `update_emotion`)
//! 2. The heartbeat subtracts the decay rate once per tick
//! 3. When intensity reaches zero the emotion falls back to Calm
//!
//! Type changes are pushed onto the emotion queue for the character window;
//! every mutation is also published on a watch channel for status displays.

pub mod dynamics;
mod heartbeat;
mod system;

pub use dynamics::EmotionParams;
pub use heartbeat::HeartbeatConfig;
pub use system::EmotionState;
