//! Speech bubble geometry: wrapping, sizing, placement and colour parsing.

use lumi_core::config::UiConfig;
use rand::Rng;

/// Inner padding between bubble edge and text.
pub const PADDING: f32 = 10.0;
/// Distance kept from the window edge when the bubble has to be pushed back in.
pub const EDGE_MARGIN: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for Rgba {
    /// Semi-transparent white.
    fn default() -> Self {
        Self {
            r: 255,
            g: 255,
            b: 255,
            a: 200,
        }
    }
}

impl Rgba {
    /// Parse `rgba(r, g, b, a)`; anything else gives the default colour.
    pub fn parse(s: &str) -> Self {
        Self::try_parse(s).unwrap_or_default()
    }

    fn try_parse(s: &str) -> Option<Self> {
        let inner = s.trim().strip_prefix("rgba(")?.strip_suffix(')')?;
        let parts: Vec<u8> = inner
            .split(',')
            .map(|p| p.trim().parse().ok())
            .collect::<Option<_>>()?;
        match parts[..] {
            [r, g, b, a] => Some(Self { r, g, b, a }),
            _ => None,
        }
    }
}

/// Text measurement capability of the rendering backend.
pub trait TextMeasure: Send {
    /// Rendered width of `text` in pixels.
    fn measure(&self, text: &str) -> f32;
    fn line_height(&self) -> f32;
}

/// Fixed-cell measurement: ASCII is half a cell, everything else a full cell
/// of `font_size` pixels.
#[derive(Debug, Clone, Copy)]
pub struct CellMeasure {
    pub font_size: f32,
}

impl CellMeasure {
    pub fn new(font_size: f32) -> Self {
        Self {
            font_size: font_size.max(1.0),
        }
    }
}

impl TextMeasure for CellMeasure {
    fn measure(&self, text: &str) -> f32 {
        text.chars()
            .map(|c| {
                if c.is_ascii() {
                    self.font_size / 2.0
                } else {
                    self.font_size
                }
            })
            .sum()
    }

    fn line_height(&self) -> f32 {
        (self.font_size * 4.0 / 3.0).ceil()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BubbleStyle {
    pub font: String,
    pub font_size: u32,
    pub text_color: String,
    pub background: Rgba,
    pub corner_radius: u32,
    /// Wrap width of the text, padding excluded
    pub max_width: f32,
}

impl BubbleStyle {
    pub fn from_config(cfg: &UiConfig) -> Self {
        Self {
            font: cfg.bubble_font.clone(),
            font_size: cfg.bubble_font_size,
            text_color: cfg.bubble_text_color.clone(),
            background: Rgba::parse(&cfg.bubble_bg_color),
            corner_radius: cfg.bubble_corner_radius,
            max_width: cfg.bubble_max_width,
        }
    }
}

/// Wrap character by character: a line breaks before the character that
/// would make it wider than `max_width`, and at every `\n`.
pub fn wrap_text(text: &str, max_width: f32, measure: &dyn TextMeasure) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c == '\n' {
            lines.push(std::mem::take(&mut current));
            continue;
        }
        current.push(c);
        if measure.measure(&current) > max_width && current.chars().count() > 1 {
            // a glyph wider than the bubble still gets a line of its own
            current.pop();
            lines.push(std::mem::replace(&mut current, c.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Fully resolved bubble: centre point, outer size and wrapped lines.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleLayout {
    pub center: (f32, f32),
    pub width: f32,
    pub height: f32,
    pub lines: Vec<String>,
    pub line_height: f32,
}

impl BubbleLayout {
    pub fn left(&self) -> f32 {
        self.center.0 - self.width / 2.0
    }

    pub fn right(&self) -> f32 {
        self.center.0 + self.width / 2.0
    }

    pub fn top(&self) -> f32 {
        self.center.1 - self.height / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.center.1 + self.height / 2.0
    }
}

/// Lay out `text` around `anchor`, pushed back inside `window` if needed.
///
/// Returns `None` for blank text.
pub fn layout_bubble(
    text: &str,
    anchor: (f32, f32),
    window: Size,
    style: &BubbleStyle,
    measure: &dyn TextMeasure,
) -> Option<BubbleLayout> {
    let lines = wrap_text(text, style.max_width, measure);
    if lines.is_empty() {
        return None;
    }

    let max_line = lines
        .iter()
        .map(|l| measure.measure(l))
        .fold(0.0_f32, f32::max);
    let line_height = measure.line_height();
    let width = (max_line + 2.0 * PADDING).min(style.max_width + 2.0 * PADDING);
    let height = lines.len() as f32 * line_height + 2.0 * PADDING;

    let center = (
        clamp_axis(anchor.0, width, window.width as f32),
        clamp_axis(anchor.1, height, window.height as f32),
    );

    Some(BubbleLayout {
        center,
        width,
        height,
        lines,
        line_height,
    })
}

fn clamp_axis(mut pos: f32, extent: f32, limit: f32) -> f32 {
    if pos + extent / 2.0 > limit {
        pos = limit - extent / 2.0 - EDGE_MARGIN;
    }
    if pos - extent / 2.0 < 0.0 {
        pos = extent / 2.0 + EDGE_MARGIN;
    }
    pos
}

/// Where a freshly shown bubble goes: towards the screen centre horizontally
/// (20% of the window width when the window is on the right half of the
/// screen, 80% otherwise), somewhere in the top 30% vertically.
pub fn initial_anchor<R: Rng + ?Sized>(
    window_x: i32,
    window: Size,
    screen_width: u32,
    rng: &mut R,
) -> (f32, f32) {
    let x = if window_x > (screen_width / 2) as i32 {
        window.width as f32 * 0.2
    } else {
        window.width as f32 * 0.8
    };
    let top = 20;
    let bottom = ((window.height as f32 * 0.3) as u32).max(top);
    (x, rng.gen_range(top..=bottom) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> BubbleStyle {
        BubbleStyle::from_config(&UiConfig::default())
    }

    #[test]
    fn test_parse_rgba() {
        assert_eq!(
            Rgba::parse("rgba(10, 20, 30, 40)"),
            Rgba {
                r: 10,
                g: 20,
                b: 30,
                a: 40
            }
        );
        assert_eq!(Rgba::parse("#ffffff"), Rgba::default());
        assert_eq!(Rgba::parse("rgba(1, 2, 3)"), Rgba::default());
        assert_eq!(Rgba::parse("rgba(300, 0, 0, 0)"), Rgba::default());
    }

    #[test]
    fn test_cell_measure() {
        let m = CellMeasure::new(12.0);
        assert_eq!(m.measure("ab"), 12.0);
        assert_eq!(m.measure("你好"), 24.0);
        assert_eq!(m.line_height(), 16.0);
    }

    #[test]
    fn test_wrap_by_width() {
        let m = CellMeasure::new(10.0);
        // 5 full-width chars per 50px line
        let lines = wrap_text("一二三四五六七", 50.0, &m);
        assert_eq!(lines, vec!["一二三四五", "六七"]);
    }

    #[test]
    fn test_wrap_glyph_wider_than_bubble() {
        let m = CellMeasure::new(10.0);
        assert_eq!(wrap_text("好", 5.0, &m), vec!["好"]);
        assert_eq!(wrap_text("你好", 5.0, &m), vec!["你", "好"]);
        assert_eq!(wrap_text("a好", 8.0, &m), vec!["a", "好"]);
    }

    #[test]
    fn test_wrap_explicit_newlines() {
        let m = CellMeasure::new(10.0);
        let lines = wrap_text("ab\n\ncd", 100.0, &m);
        assert_eq!(lines, vec!["ab", "", "cd"]);
    }

    #[test]
    fn test_wrap_blank_is_empty() {
        let m = CellMeasure::new(10.0);
        assert!(wrap_text(" \n\t", 100.0, &m).is_empty());
    }

    #[test]
    fn test_layout_size() {
        let m = CellMeasure::new(12.0);
        let layout =
            layout_bubble("你好", (200.0, 100.0), Size::new(400, 600), &style(), &m).unwrap();
        assert_eq!(layout.width, 24.0 + 2.0 * PADDING);
        assert_eq!(layout.height, 16.0 + 2.0 * PADDING);
        assert_eq!(layout.center, (200.0, 100.0));
    }

    #[test]
    fn test_layout_width_capped() {
        let m = CellMeasure::new(12.0);
        let long = "很".repeat(100);
        let layout =
            layout_bubble(&long, (200.0, 300.0), Size::new(400, 600), &style(), &m).unwrap();
        assert!(layout.width <= 230.0 + 2.0 * PADDING);
        assert!(layout.lines.len() > 1);
    }

    #[test]
    fn test_layout_pushed_inside() {
        let m = CellMeasure::new(12.0);
        let layout = layout_bubble("你好呀", (395.0, 2.0), Size::new(400, 600), &style(), &m).unwrap();
        assert_eq!(layout.right(), 400.0 - EDGE_MARGIN);
        assert_eq!(layout.top(), EDGE_MARGIN);
    }

    #[test]
    fn test_initial_anchor_side() {
        let mut rng = rand::thread_rng();
        let window = Size::new(300, 500);
        let (x, y) = initial_anchor(1500, window, 1920, &mut rng);
        assert_eq!(x, 60.0);
        assert!((20.0..=150.0).contains(&y));

        let (x, _) = initial_anchor(100, window, 1920, &mut rng);
        assert_eq!(x, 240.0);
    }

    #[test]
    fn test_initial_anchor_tiny_window() {
        let mut rng = rand::thread_rng();
        let (_, y) = initial_anchor(0, Size::new(50, 40), 1920, &mut rng);
        assert_eq!(y, 20.0);
    }
}
