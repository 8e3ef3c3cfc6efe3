//! Character window logic.
//!
//! Consumes the emotion and bubble queues and drives a [`Surface`]: swaps the
//! sprite on emotion changes, shows and hides the speech bubble, plays the
//! jump animation and the jump indicator.

use crate::bubble::{initial_anchor, layout_bubble, BubbleLayout, BubbleStyle, Size, TextMeasure};
use crate::jump::{random_height, JumpAnimation, FRAME_DELAY, INDICATOR_DURATION, INDICATOR_OFFSET};
use crate::sprite::{self, Sprite, SpriteCache};
use anyhow::{Context, Result};
use lumi_core::config::UiConfig;
use lumi_core::{BubbleEvent, Emotion};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

/// Window-system capability the presenter draws on.
pub trait Surface: Send {
    fn screen_width(&self) -> u32;
    /// Top-left corner of the window on screen.
    fn window_position(&self) -> (i32, i32);
    fn window_size(&self) -> Size;
    fn move_window(&mut self, x: i32, y: i32);
    /// Load an image and return its size after scaling.
    fn load_sprite(&mut self, path: &Path, scale: f32) -> Result<Size>;
    /// Show a loaded sprite; the window takes the sprite's size.
    fn show_sprite(&mut self, sprite: &Sprite);
    fn draw_bubble(&mut self, layout: &BubbleLayout, style: &BubbleStyle);
    fn clear_bubble(&mut self);
    fn show_jump_indicator(&mut self, x: f32, y: f32);
    fn hide_jump_indicator(&mut self);
}

#[derive(Debug, Clone)]
pub struct PresenterConfig {
    pub images_dir: PathBuf,
    pub scale: f32,
    pub style: BubbleStyle,
    pub hide_after: Duration,
}

impl PresenterConfig {
    pub fn from_config(cfg: &UiConfig) -> Self {
        Self {
            images_dir: cfg.images_dir.clone(),
            scale: cfg.scale_factor(),
            style: BubbleStyle::from_config(cfg),
            hide_after: cfg.bubble_hide_after(),
        }
    }
}

struct ActiveJump {
    animation: JumpAnimation,
    next_frame_at: Instant,
}

pub struct CharacterPresenter<S: Surface> {
    surface: S,
    config: PresenterConfig,
    measure: Box<dyn TextMeasure>,
    sprites: SpriteCache,
    emotion: Emotion,
    /// Visible bubble, if any
    bubble: Option<BubbleLayout>,
    /// Last bubble centre; the jump indicator sits above it
    anchor: (f32, f32),
    bubble_deadline: Option<Instant>,
    jump: Option<ActiveJump>,
    indicator_deadline: Option<Instant>,
}

impl<S: Surface> CharacterPresenter<S> {
    pub fn new(surface: S, config: PresenterConfig, measure: Box<dyn TextMeasure>) -> Self {
        Self {
            surface,
            config,
            measure,
            sprites: SpriteCache::new(),
            emotion: Emotion::Calm,
            bubble: None,
            anchor: (0.0, 0.0),
            bubble_deadline: None,
            jump: None,
            indicator_deadline: None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn emotion(&self) -> Emotion {
        self.emotion
    }

    pub fn bubble(&self) -> Option<&BubbleLayout> {
        self.bubble.as_ref()
    }

    pub fn is_jumping(&self) -> bool {
        self.jump.is_some()
    }

    pub fn cached_sprites(&self) -> usize {
        self.sprites.len()
    }

    /// Switch to a random variant of `emotion`'s sprite.
    ///
    /// Returns whether a sprite was shown; a missing or unreadable image
    /// leaves the current one in place.
    pub fn handle_emotion(&mut self, emotion: Emotion) -> bool {
        self.emotion = emotion;
        let variant = rand::thread_rng().gen_range(1..=sprite::VARIANTS);
        let key = sprite::sprite_key(emotion, variant);

        let sprite = match self.sprites.get(&key) {
            Some(s) => s.clone(),
            None => match self.load(emotion, variant) {
                Ok(s) => {
                    self.sprites.insert(s.clone());
                    s
                }
                Err(e) => {
                    tracing::warn!("{:#}", e);
                    return false;
                }
            },
        };

        self.surface.show_sprite(&sprite);
        tracing::debug!(
            "Sprite {} ({}x{}, scale {:.0}%)",
            sprite.key,
            sprite.size.width,
            sprite.size.height,
            self.config.scale * 100.0
        );
        true
    }

    fn load(&mut self, emotion: Emotion, variant: u8) -> Result<Sprite> {
        let path = sprite::sprite_path(&self.config.images_dir, emotion, variant);
        if !path.exists() {
            anyhow::bail!("Sprite file not found: {}", path.display());
        }
        let size = self
            .surface
            .load_sprite(&path, self.config.scale)
            .with_context(|| format!("Failed to load sprite {}", path.display()))?;
        Ok(Sprite {
            key: sprite::sprite_key(emotion, variant),
            path,
            size,
        })
    }

    pub fn handle_bubble(&mut self, event: BubbleEvent, now: Instant) {
        match event {
            BubbleEvent::Text { text, .. } => self.show_text(&text, now),
            BubbleEvent::Jump => self.start_jump(now),
        }
    }

    /// Show or update the bubble. Blank text is ignored.
    pub fn show_text(&mut self, text: &str, now: Instant) {
        if text.trim().is_empty() {
            return;
        }

        let window = self.surface.window_size();
        let anchor = match &self.bubble {
            Some(current) => current.center,
            None => {
                let (x, _) = self.surface.window_position();
                initial_anchor(
                    x,
                    window,
                    self.surface.screen_width(),
                    &mut rand::thread_rng(),
                )
            }
        };

        let Some(layout) = layout_bubble(
            text,
            anchor,
            window,
            &self.config.style,
            self.measure.as_ref(),
        ) else {
            return;
        };
        self.anchor = layout.center;
        self.surface.draw_bubble(&layout, &self.config.style);
        self.bubble = Some(layout);
        self.bubble_deadline = Some(now + self.config.hide_after);
    }

    pub fn hide_bubble(&mut self) {
        if self.bubble.take().is_some() {
            self.surface.clear_bubble();
        }
        self.bubble_deadline = None;
    }

    /// Start the hop and show the indicator above the bubble anchor.
    ///
    /// A jump arriving mid-animation restarts from the resting position.
    pub fn start_jump(&mut self, now: Instant) {
        let origin_y = match &self.jump {
            Some(active) => active.animation.origin_y(),
            None => self.surface.window_position().1,
        };
        let height = random_height(&mut rand::thread_rng());
        let mut animation = JumpAnimation::new(origin_y, height);
        if let Some(y) = animation.next_frame() {
            let (x, _) = self.surface.window_position();
            self.surface.move_window(x, y);
        }
        self.jump = Some(ActiveJump {
            animation,
            next_frame_at: now + FRAME_DELAY,
        });

        self.surface.hide_jump_indicator();
        self.surface
            .show_jump_indicator(self.anchor.0, self.anchor.1 - INDICATOR_OFFSET);
        self.indicator_deadline = Some(now + INDICATOR_DURATION);
    }

    /// Run everything that is due at `now`: jump frames, bubble and
    /// indicator timeouts.
    pub fn advance(&mut self, now: Instant) {
        if let Some(active) = self.jump.as_mut() {
            while active.next_frame_at <= now {
                match active.animation.next_frame() {
                    Some(y) => {
                        let (x, _) = self.surface.window_position();
                        self.surface.move_window(x, y);
                        active.next_frame_at += FRAME_DELAY;
                    }
                    None => break,
                }
            }
            if active.animation.is_finished() {
                self.jump = None;
            }
        }

        if self.bubble_deadline.is_some_and(|d| d <= now) {
            self.hide_bubble();
        }

        if self.indicator_deadline.is_some_and(|d| d <= now) {
            self.surface.hide_jump_indicator();
            self.indicator_deadline = None;
        }
    }

    /// Consume both queues until they are closed, then hand the surface back.
    pub async fn run(
        mut self,
        mut emotion_rx: mpsc::UnboundedReceiver<Emotion>,
        mut bubble_rx: mpsc::UnboundedReceiver<BubbleEvent>,
    ) -> S {
        self.handle_emotion(Emotion::Calm);

        let mut ticker = tokio::time::interval(FRAME_DELAY);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut emotion_open = true;
        let mut bubble_open = true;

        while emotion_open || bubble_open {
            tokio::select! {
                msg = emotion_rx.recv(), if emotion_open => match msg {
                    Some(emotion) => {
                        tracing::debug!("Emotion update received: {}", emotion);
                        self.handle_emotion(emotion);
                    }
                    None => emotion_open = false,
                },
                msg = bubble_rx.recv(), if bubble_open => match msg {
                    Some(event) => self.handle_bubble(event, Instant::now()),
                    None => bubble_open = false,
                },
                _ = ticker.tick() => self.advance(Instant::now()),
            }
        }

        tracing::debug!("Presenter queues closed");
        self.surface
    }
}

/// What a [`HeadlessSurface`] was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Sprite(String),
    Move(i32, i32),
    Bubble(String),
    ClearBubble,
    Indicator(f32, f32),
    HideIndicator,
}

/// Surface without a window: keeps geometry, records every operation and
/// logs it. Sprite sizes come from the PNG header.
#[derive(Debug)]
pub struct HeadlessSurface {
    screen_width: u32,
    position: (i32, i32),
    size: Size,
    ops: Vec<SurfaceOp>,
}

impl HeadlessSurface {
    /// Window at the top-right of the screen, like a freshly opened
    /// character window.
    pub fn new(screen_width: u32, size: Size) -> Self {
        Self {
            screen_width,
            position: (screen_width as i32 - 400, 50),
            size,
            ops: Vec::new(),
        }
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.position = (x, y);
        self
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.ops)
    }
}

impl Surface for HeadlessSurface {
    fn screen_width(&self) -> u32 {
        self.screen_width
    }

    fn window_position(&self) -> (i32, i32) {
        self.position
    }

    fn window_size(&self) -> Size {
        self.size
    }

    fn move_window(&mut self, x: i32, y: i32) {
        self.position = (x, y);
        self.ops.push(SurfaceOp::Move(x, y));
    }

    fn load_sprite(&mut self, path: &Path, scale: f32) -> Result<Size> {
        let bytes = std::fs::read(path)?;
        let (w, h) = sprite::png_dimensions(&bytes).context("Not a PNG image")?;
        Ok(sprite::scaled(w, h, scale))
    }

    fn show_sprite(&mut self, sprite: &Sprite) {
        self.size = sprite.size;
        tracing::info!("Character: {}", sprite.key);
        self.ops.push(SurfaceOp::Sprite(sprite.key.clone()));
    }

    fn draw_bubble(&mut self, layout: &BubbleLayout, _style: &BubbleStyle) {
        let text = layout.lines.concat();
        tracing::debug!(
            "Bubble at ({:.0}, {:.0}) {}x{}: {}",
            layout.center.0,
            layout.center.1,
            layout.width,
            layout.height,
            text
        );
        self.ops.push(SurfaceOp::Bubble(text));
    }

    fn clear_bubble(&mut self) {
        self.ops.push(SurfaceOp::ClearBubble);
    }

    fn show_jump_indicator(&mut self, x: f32, y: f32) {
        self.ops.push(SurfaceOp::Indicator(x, y));
    }

    fn hide_jump_indicator(&mut self) {
        self.ops.push(SurfaceOp::HideIndicator);
    }
}
