//! Character sprites: one or two images per emotion, `<label>_<n>.png`.

use crate::bubble::Size;
use lumi_core::Emotion;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Number of image variants per emotion.
pub const VARIANTS: u8 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    /// Cache key, e.g. `开心_2`
    pub key: String,
    pub path: PathBuf,
    /// Size after scaling
    pub size: Size,
}

pub fn sprite_key(emotion: Emotion, variant: u8) -> String {
    format!("{}_{}", emotion.label(), variant)
}

pub fn sprite_path(images_dir: &Path, emotion: Emotion, variant: u8) -> PathBuf {
    images_dir.join(format!("{}.png", sprite_key(emotion, variant)))
}

/// Width and height from a PNG's IHDR chunk.
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if bytes.len() < 24 || !bytes.starts_with(SIGNATURE) || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

/// Scale a natural image size, never below one pixel.
pub fn scaled(width: u32, height: u32, scale: f32) -> Size {
    Size::new(
        ((width as f32 * scale) as u32).max(1),
        ((height as f32 * scale) as u32).max(1),
    )
}

/// Loaded sprites by key. Scale is fixed for the cache's lifetime.
#[derive(Debug, Default)]
pub struct SpriteCache {
    sprites: HashMap<String, Sprite>,
}

impl SpriteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Sprite> {
        self.sprites.get(key)
    }

    pub fn insert(&mut self, sprite: Sprite) {
        self.sprites.insert(sprite.key.clone(), sprite);
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn fake_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR".to_vec();
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sprite_path() {
        let p = sprite_path(Path::new("images"), Emotion::Happy, 2);
        assert_eq!(p, Path::new("images").join("开心_2.png"));
    }

    #[test]
    fn test_png_dimensions() {
        assert_eq!(png_dimensions(&fake_png(640, 960)), Some((640, 960)));
        assert_eq!(png_dimensions(b"GIF89a not a png at all......"), None);
        assert_eq!(png_dimensions(&fake_png(1, 1)[..20]), None);
    }

    #[test]
    fn test_scaled() {
        assert_eq!(scaled(640, 960, 0.5), Size::new(320, 480));
        assert_eq!(scaled(1, 1, 0.01), Size::new(1, 1));
    }
}
