//! Terminal side of the companion: input thread, status line and the
//! JSON-lines event sink.

use anyhow::Result;
use lumi_core::{EmotionSnapshot, UiEvent, UiReceivers};
use rustyline::error::ReadlineError;
use std::io::{IsTerminal, Write};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Line reader running on its own thread.
///
/// The thread only prompts after [`Input::next_line`] asks for a line, so the
/// prompt never lands in the middle of a streamed reply.
pub struct Input {
    ready_tx: std::sync::mpsc::Sender<()>,
    line_rx: mpsc::UnboundedReceiver<String>,
}

impl Input {
    pub fn spawn(prompt: String) -> Result<Self> {
        let mut editor = rustyline::DefaultEditor::new()?;
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
        let (line_tx, line_rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            while ready_rx.recv().is_ok() {
                let line = match editor.readline(&prompt) {
                    Ok(line) => {
                        if !line.trim().is_empty() {
                            let _ = editor.add_history_entry(line.as_str());
                        }
                        line
                    }
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => "exit".to_string(),
                    Err(e) => {
                        tracing::error!("Input error: {}", e);
                        "exit".to_string()
                    }
                };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });

        Ok(Self { ready_tx, line_rx })
    }

    /// Prompt for the next line. `None` once the input thread is gone.
    pub async fn next_line(&mut self) -> Option<String> {
        self.ready_tx.send(()).ok()?;
        self.line_rx.recv().await
    }
}

/// Print the status line and keep it current until the task is aborted.
///
/// On a terminal the line just above the prompt is rewritten in place every
/// second; otherwise it is printed once.
pub fn spawn_status_line(mut state: watch::Receiver<EmotionSnapshot>) -> Option<JoinHandle<()>> {
    let first = state.borrow_and_update().status_line();
    println!("{}", first);
    if !std::io::stdout().is_terminal() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATUS_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let line = state.borrow().status_line();
            let mut out = std::io::stdout().lock();
            // save cursor, up one line, clear it, write, restore
            let _ = write!(out, "\x1b7\x1b[1A\r\x1b[2K{}\x1b8", line);
            let _ = out.flush();
        }
    }))
}

/// Drain every UI queue into `out` as JSON lines until all of them close.
pub async fn forward_events<W: Write>(rx: UiReceivers, mut out: W) -> W {
    let UiReceivers {
        mut emotion_rx,
        mut bubble_rx,
        mut clock_rx,
    } = rx;
    let (mut emotion_open, mut bubble_open, mut clock_open) = (true, true, true);

    while emotion_open || bubble_open || clock_open {
        let event = tokio::select! {
            msg = emotion_rx.recv(), if emotion_open => match msg {
                Some(emotion) => UiEvent::Emotion { emotion },
                None => { emotion_open = false; continue; }
            },
            msg = bubble_rx.recv(), if bubble_open => match msg {
                Some(ev) => UiEvent::from(ev),
                None => { bubble_open = false; continue; }
            },
            msg = clock_rx.recv(), if clock_open => match msg {
                Some(_) => UiEvent::Clock,
                None => { clock_open = false; continue; }
            },
        };

        match event.to_json_line() {
            Ok(line) => {
                if writeln!(out, "{}", line).and_then(|_| out.flush()).is_err() {
                    tracing::warn!("Event sink closed");
                    break;
                }
            }
            Err(e) => tracing::warn!("Failed to encode UI event: {}", e),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumi_core::{Emotion, UiChannels};

    #[tokio::test]
    async fn test_forward_events_writes_json_lines() {
        let (ui, rx) = UiChannels::new();
        ui.emotion_changed(Emotion::Happy);
        ui.bubble("你好", true);
        ui.jump();
        ui.show_clock();
        drop(ui);

        let out = forward_events(rx, Vec::new()).await;
        let text = String::from_utf8(out).unwrap();
        let events: Vec<UiEvent> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(events.len(), 4);
        assert!(events.contains(&UiEvent::Emotion {
            emotion: Emotion::Happy
        }));
        assert!(events.contains(&UiEvent::Clock));
        // bubble queue keeps its own order
        let bubble_pos = events
            .iter()
            .position(|e| matches!(e, UiEvent::Bubble { .. }))
            .unwrap();
        let jump_pos = events.iter().position(|e| *e == UiEvent::Jump).unwrap();
        assert!(bubble_pos < jump_pos);
    }

    #[tokio::test]
    async fn test_forward_events_ends_when_queues_close() {
        let (ui, rx) = UiChannels::new();
        drop(ui);
        let out = forward_events(rx, Vec::new()).await;
        assert!(out.is_empty());
    }
}
