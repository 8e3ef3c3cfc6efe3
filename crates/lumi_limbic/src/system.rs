//! Core emotion state implementation
//!
//! The EmotionState is the single owner of the companion's mood. It:
//! - Keeps `(emotion, intensity)` behind one lock
//! - Runs the decay heartbeat in a background task
//! - Applies input-driven changes from the engine
//! - Publishes snapshots (watch) and type changes (emotion queue)

use crate::dynamics::{self, EmotionParams};
use crate::heartbeat::HeartbeatConfig;
use lumi_core::{Emotion, EmotionSnapshot, UiChannels};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

pub struct EmotionState {
    /// Current state (protected by RwLock for concurrent access)
    state: Arc<RwLock<EmotionSnapshot>>,

    params: EmotionParams,

    /// Emotion queue towards the character window
    ui: UiChannels,

    /// Watch channel for snapshots (status line subscribes to this)
    state_watch_tx: Arc<watch::Sender<EmotionSnapshot>>,

    /// Receiver for snapshots (cloneable)
    state_watch_rx: watch::Receiver<EmotionSnapshot>,

    heartbeat_config: HeartbeatConfig,

    /// Running heartbeat task, `None` once stopped
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl EmotionState {
    /// Create an emotion state and start its decay heartbeat.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(params: EmotionParams, heartbeat_config: HeartbeatConfig, ui: UiChannels) -> Self {
        let initial = EmotionSnapshot::default();
        let (state_watch_tx, state_watch_rx) = watch::channel(initial);

        let system = Self {
            state: Arc::new(RwLock::new(initial)),
            params,
            ui,
            state_watch_tx: Arc::new(state_watch_tx),
            state_watch_rx,
            heartbeat_config,
            heartbeat: Mutex::new(None),
        };

        let handle = system.spawn_heartbeat();
        if let Ok(mut slot) = system.heartbeat.lock() {
            *slot = Some(handle);
        }

        system
    }

    /// Spawn the background decay task
    fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let state_watch_tx = Arc::clone(&self.state_watch_tx);
        let params = self.params;
        let ui = self.ui.clone();
        let period = self.heartbeat_config.interval;

        tokio::spawn(async move {
            // First decay happens one full period after start
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);

            loop {
                interval.tick().await;

                let (changed, snapshot) = {
                    let mut guard = state.write().await;
                    let changed = dynamics::apply_decay(&mut guard, &params);
                    let _ = state_watch_tx.send(*guard);
                    (changed, *guard)
                };

                if changed {
                    tracing::debug!("Emotion decayed back to {}", snapshot.emotion);
                    ui.emotion_changed(snapshot.emotion);
                }
            }
        })
    }

    /// Shift intensity of the current emotion (scaled by the impact factor).
    ///
    /// Returns whether the emotion type changed, which is never the case here.
    pub async fn update_emotion(&self, delta: f32) -> bool {
        let mut guard = self.state.write().await;
        let changed = dynamics::apply_delta(&mut guard, &self.params, delta);
        let _ = self.state_watch_tx.send(*guard);
        tracing::trace!("update_emotion({:.1}) -> {}", delta, guard.status_line());
        changed
    }

    /// Replace emotion type and intensity (intensity scaled by the impact factor).
    ///
    /// Returns whether the emotion type changed.
    pub async fn set_emotion(&self, emotion: Emotion, intensity: f32) -> bool {
        let mut guard = self.state.write().await;
        let changed = dynamics::apply_set(&mut guard, &self.params, emotion, intensity);
        let _ = self.state_watch_tx.send(*guard);
        tracing::trace!(
            "set_emotion({}, {:.1}) -> {}",
            emotion,
            intensity,
            guard.status_line()
        );
        changed
    }

    /// Apply an analyzed input against the state as it is now, under one
    /// lock: `set_emotion` when Calm, `update_emotion` otherwise.
    ///
    /// Returns whether the emotion type changed.
    pub async fn apply_input(&self, emotion: Emotion, delta: f32) -> bool {
        let mut guard = self.state.write().await;
        let changed = dynamics::apply_input(&mut guard, &self.params, emotion, delta);
        let _ = self.state_watch_tx.send(*guard);
        tracing::trace!(
            "apply_input({}, {:+.1}) -> {}",
            emotion,
            delta,
            guard.status_line()
        );
        changed
    }

    /// Get the current `(emotion, intensity)`
    pub async fn get_state(&self) -> EmotionSnapshot {
        *self.state.read().await
    }

    /// Push the current emotion onto the emotion queue.
    pub async fn notify_changed(&self) {
        let emotion = self.state.read().await.emotion;
        self.ui.emotion_changed(emotion);
    }

    /// Subscribe to snapshot updates
    pub fn subscribe(&self) -> watch::Receiver<EmotionSnapshot> {
        self.state_watch_rx.clone()
    }

    pub fn params(&self) -> &EmotionParams {
        &self.params
    }

    pub fn is_running(&self) -> bool {
        self.heartbeat
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Stop the decay heartbeat. Safe to call more than once.
    pub fn stop(&self) {
        if let Ok(mut slot) = self.heartbeat.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
                tracing::debug!("Emotion heartbeat stopped");
            }
        }
    }
}

impl Drop for EmotionState {
    fn drop(&mut self) {
        self.stop();
    }
}
