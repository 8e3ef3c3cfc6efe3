//! Background music player over an [`AudioOutput`] backend.

use anyhow::{Context, Result};
use lumi_core::config::MusicConfig;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["mp3", "wav", "ogg"];

/// Audio playback capability (mixer, decoder, device).
pub trait AudioOutput: Send {
    fn play_file(&mut self, path: &Path) -> Result<()>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    /// Volume in `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32);
    fn seek(&mut self, position: Duration) -> Result<()>;
    /// Whether a track is currently loaded and not finished.
    fn is_busy(&self) -> bool;
    /// Playback position of the current track.
    fn position(&self) -> Option<Duration>;
    /// Total length of a track, when it can be determined.
    fn track_length(&self, path: &Path) -> Option<Duration>;
}

/// Playback progress for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub percent: f32,
    pub position: Duration,
    pub length: Duration,
}

impl Progress {
    /// `MM:SS/MM:SS`
    pub fn label(&self) -> String {
        format!("{}/{}", mmss(self.position), mmss(self.length))
    }
}

fn mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", (secs / 60) % 60, secs % 60)
}

pub struct MusicPlayer<A: AudioOutput> {
    music_dir: PathBuf,
    playlist: Vec<PathBuf>,
    current: usize,
    playing: bool,
    paused: bool,
    volume: f32,
    output: A,
}

impl<A: AudioOutput> MusicPlayer<A> {
    pub fn new(cfg: &MusicConfig, output: A) -> Self {
        Self {
            music_dir: cfg.music_dir.clone(),
            playlist: Vec::new(),
            current: 0,
            playing: false,
            paused: false,
            volume: (cfg.volume / 100.0).clamp(0.0, 1.0),
            output,
        }
    }

    /// Rescan the music directory (created when missing). Returns the number
    /// of tracks found.
    pub fn load_music(&mut self) -> Result<usize> {
        if !self.music_dir.exists() {
            tracing::info!("Creating music directory {}", self.music_dir.display());
            std::fs::create_dir_all(&self.music_dir).with_context(|| {
                format!("Failed to create music dir {}", self.music_dir.display())
            })?;
        }

        let mut playlist: Vec<PathBuf> = std::fs::read_dir(&self.music_dir)
            .with_context(|| format!("Failed to read music dir {}", self.music_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_supported(p))
            .collect();
        playlist.sort();

        if playlist.is_empty() {
            tracing::info!("No music found in {}", self.music_dir.display());
        } else {
            tracing::info!("Found {} tracks in {}", playlist.len(), self.music_dir.display());
        }
        self.playlist = playlist;
        if self.current >= self.playlist.len() {
            self.current = 0;
        }
        Ok(self.playlist.len())
    }

    pub fn playlist(&self) -> &[PathBuf] {
        &self.playlist
    }

    pub fn current_track(&self) -> Option<&Path> {
        self.playlist.get(self.current).map(PathBuf::as_path)
    }

    pub fn is_playing(&self) -> bool {
        self.playing && !self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Volume in percent.
    pub fn volume(&self) -> f32 {
        self.volume * 100.0
    }

    pub fn output(&self) -> &A {
        &self.output
    }

    /// Pause when playing, otherwise play (resuming a paused track).
    pub fn toggle_play(&mut self) {
        if self.playlist.is_empty() {
            return;
        }
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn play(&mut self) {
        if self.playlist.is_empty() {
            return;
        }
        if self.paused {
            self.output.resume();
            self.paused = false;
            return;
        }

        let path = self.playlist[self.current].clone();
        self.output.set_volume(self.volume);
        match self.output.play_file(&path) {
            Ok(()) => {
                self.playing = true;
                self.paused = false;
                tracing::info!("Now playing: {}", track_name(&path));
            }
            Err(e) => tracing::warn!("Failed to play {}: {:#}", path.display(), e),
        }
    }

    pub fn pause(&mut self) {
        if !self.playing || self.paused {
            return;
        }
        self.output.pause();
        self.paused = true;
    }

    pub fn stop(&mut self) {
        if self.playlist.is_empty() {
            return;
        }
        self.output.stop();
        self.playing = false;
        self.paused = false;
    }

    pub fn next(&mut self) {
        if self.playlist.is_empty() {
            return;
        }
        self.current = (self.current + 1) % self.playlist.len();
        self.stop();
        self.play();
    }

    pub fn prev(&mut self) {
        if self.playlist.is_empty() {
            return;
        }
        self.current = (self.current + self.playlist.len() - 1) % self.playlist.len();
        self.stop();
        self.play();
    }

    /// Set volume in percent (clamped to 0-100).
    pub fn set_volume(&mut self, percent: f32) {
        self.volume = (percent / 100.0).clamp(0.0, 1.0);
        if !self.playlist.is_empty() {
            self.output.set_volume(self.volume);
        }
    }

    /// Seek to `percent` of the track. Only while playing a track of known length.
    pub fn set_position(&mut self, percent: f32) {
        if !self.playing || !self.output.is_busy() {
            return;
        }
        let Some(length) = self.current_length() else {
            return;
        };
        let target = length.mul_f32(percent.clamp(0.0, 100.0) / 100.0);
        if let Err(e) = self.output.seek(target) {
            tracing::warn!("Seek failed: {:#}", e);
        }
    }

    fn current_length(&self) -> Option<Duration> {
        self.current_track()
            .and_then(|p| self.output.track_length(p))
            .filter(|l| !l.is_zero())
    }

    /// Progress of the running track; `None` when stopped, paused or of
    /// unknown length.
    pub fn progress(&self) -> Option<Progress> {
        if !self.is_playing() || !self.output.is_busy() {
            return None;
        }
        let length = self.current_length()?;
        let position = self.output.position()?;
        let percent = (position.as_secs_f32() * 100.0 / length.as_secs_f32()).clamp(0.0, 100.0);
        Some(Progress {
            percent,
            position,
            length,
        })
    }

    /// One-line player state for the console.
    pub fn status_line(&self) -> String {
        let Some(track) = self.current_track() else {
            return format!("没有找到音乐文件，请将音乐放入 {}", self.music_dir.display());
        };
        let name = track_name(track);
        let state = if self.is_playing() {
            "正在播放"
        } else if self.paused {
            "已暂停"
        } else {
            "准备播放"
        };
        match self.progress() {
            Some(p) => format!("{}: {} [{:.0}% {}]", state, name, p.percent, p.label()),
            None => format!("{}: {}", state, name),
        }
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn track_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Output without a sound device: logs every call and keeps a wall-clock
/// position so progress and seeking behave.
#[derive(Debug, Default)]
pub struct SilentOutput {
    started: Option<Instant>,
    /// Position accumulated before the last pause
    offset: Duration,
    paused: bool,
    volume: f32,
}

impl SilentOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

impl AudioOutput for SilentOutput {
    fn play_file(&mut self, path: &Path) -> Result<()> {
        tracing::debug!("(silent) play {}", path.display());
        self.started = Some(Instant::now());
        self.offset = Duration::ZERO;
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(started) = self.started.take() {
            self.offset += started.elapsed();
        }
        self.paused = true;
    }

    fn resume(&mut self) {
        if self.paused {
            self.started = Some(Instant::now());
            self.paused = false;
        }
    }

    fn stop(&mut self) {
        self.started = None;
        self.offset = Duration::ZERO;
        self.paused = false;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.offset = position;
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.started.is_some() || self.paused
    }

    fn position(&self) -> Option<Duration> {
        let running = self.started.map(|s| s.elapsed()).unwrap_or_default();
        Some(self.offset + running)
    }

    fn track_length(&self, _path: &Path) -> Option<Duration> {
        None
    }
}
