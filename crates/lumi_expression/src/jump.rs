//! The little hop the character does when it starts talking.

use rand::Rng;
use std::time::Duration;

/// Delay between animation frames.
pub const FRAME_DELAY: Duration = Duration::from_millis(20);
/// How long the jump indicator stays above the bubble.
pub const INDICATOR_DURATION: Duration = Duration::from_secs(2);
/// Indicator offset above the bubble anchor.
pub const INDICATOR_OFFSET: f32 = 30.0;

/// Random hop height in pixels, 10 to 15 inclusive.
pub fn random_height<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    rng.gen_range(10..=15)
}

/// Frame-by-frame vertical window positions: up, down, a smaller up, a
/// smaller down, then back to the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct JumpAnimation {
    origin_y: i32,
    frames: Vec<i32>,
    next: usize,
}

impl JumpAnimation {
    pub fn new(origin_y: i32, height: i32) -> Self {
        let h = height as f32;
        let offsets = [-h, h, -0.3 * h, 0.3 * h];
        let mut frames: Vec<i32> = offsets
            .iter()
            .map(|dy| (origin_y as f32 + dy) as i32)
            .collect();
        frames.push(origin_y);
        Self {
            origin_y,
            frames,
            next: 0,
        }
    }

    pub fn origin_y(&self) -> i32 {
        self.origin_y
    }

    /// Y of the next frame, `None` once the window is back at the origin.
    pub fn next_frame(&mut self) -> Option<i32> {
        let y = self.frames.get(self.next).copied()?;
        self.next += 1;
        Some(y)
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.frames.len()
    }
}
