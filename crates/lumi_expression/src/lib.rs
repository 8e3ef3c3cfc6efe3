//! # Lumi presentation consumers
//!
//! Everything that reacts to the UI queues: the character window (sprite,
//! speech bubble, jump), the clock overlay and the music player. Drawing,
//! windowing and audio stay behind small capability traits so the logic runs
//! headless as well.

pub mod bubble;
pub mod clock;
pub mod jump;
pub mod music;
pub mod presenter;
pub mod sprite;

pub use bubble::{BubbleLayout, BubbleStyle, CellMeasure, Rgba, Size, TextMeasure};
pub use clock::{ClockDisplay, ClockOverlay, HeadlessClock};
pub use music::{AudioOutput, MusicPlayer, Progress, SilentOutput};
pub use presenter::{CharacterPresenter, HeadlessSurface, PresenterConfig, Surface, SurfaceOp};
