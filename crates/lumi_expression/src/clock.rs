//! Clock overlay: pops up with the current time and fades away.

use lumi_core::config::ClockConfig;
use lumi_core::ClockCommand;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fading stops and snaps to fully transparent at or below this alpha.
const MIN_VISIBLE_ALPHA: f32 = 0.1;

/// Overlay window capability.
pub trait ClockDisplay: Send {
    fn set_text(&mut self, text: &str);
    fn set_alpha(&mut self, alpha: f32);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Hidden,
    Holding { until: Instant },
    Fading { next_step: Instant },
}

pub struct ClockOverlay<D: ClockDisplay> {
    display: D,
    hold: Duration,
    fade_step: f32,
    fade_interval: Duration,
    alpha: f32,
    phase: Phase,
    text: String,
}

impl<D: ClockDisplay> ClockOverlay<D> {
    pub fn new(display: D, cfg: &ClockConfig) -> Self {
        Self {
            display,
            hold: Duration::from_secs(cfg.hold_secs),
            fade_step: cfg.fade_step.clamp(0.001, 1.0),
            fade_interval: Duration::from_millis(cfg.fade_interval_ms.max(1)),
            alpha: 0.0,
            phase: Phase::Hidden,
            text: String::new(),
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_visible(&self) -> bool {
        self.phase != Phase::Hidden
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    fn refresh_text(&mut self) {
        let text = chrono::Local::now().format(TIME_FORMAT).to_string();
        if text != self.text {
            self.display.set_text(&text);
            self.text = text;
        }
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
        self.display.set_alpha(alpha);
    }

    /// Make the overlay opaque with the current time. Showing again while
    /// visible restarts the hold.
    pub fn show(&mut self, now: Instant) {
        self.refresh_text();
        self.set_alpha(1.0);
        self.phase = Phase::Holding {
            until: now + self.hold,
        };
    }

    pub fn advance(&mut self, now: Instant) {
        if self.phase == Phase::Hidden {
            return;
        }
        self.refresh_text();

        if let Phase::Holding { until } = self.phase {
            if now < until {
                return;
            }
            self.phase = Phase::Fading { next_step: until };
        }

        while let Phase::Fading { next_step } = self.phase {
            if next_step > now {
                break;
            }
            if self.alpha > MIN_VISIBLE_ALPHA {
                self.set_alpha(self.alpha - self.fade_step);
                self.phase = Phase::Fading {
                    next_step: next_step + self.fade_interval,
                };
            } else {
                self.set_alpha(0.0);
                self.phase = Phase::Hidden;
            }
        }
    }

    /// Serve the clock queue until it closes.
    pub async fn run(mut self, mut clock_rx: mpsc::UnboundedReceiver<ClockCommand>) -> D {
        let mut ticker = tokio::time::interval(self.fade_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                cmd = clock_rx.recv() => match cmd {
                    Some(ClockCommand::Show) => self.show(Instant::now()),
                    None => break,
                },
                _ = ticker.tick() => self.advance(Instant::now()),
            }
        }
        self.display
    }
}

/// Display without a window: logs the time when it appears and remembers
/// what it was told.
#[derive(Debug, Default)]
pub struct HeadlessClock {
    pub text: String,
    pub alpha: f32,
    /// Number of times the overlay went from hidden to visible
    pub shown: usize,
}

impl ClockDisplay for HeadlessClock {
    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn set_alpha(&mut self, alpha: f32) {
        if self.alpha <= 0.0 && alpha > 0.0 {
            self.shown += 1;
            tracing::info!("🕒 {}", self.text);
        }
        self.alpha = alpha;
    }
}
