//! Runs an operation on a worker thread while drawing its progress
//!
//! The terminal is put into raw mode for the duration so Esc and Ctrl+C
//! arrive as key events; either one requests cancellation. When stdout or
//! stdin is not a terminal the bar is hidden and keys are not read.

use std::io::IsTerminal;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cancel::CancellationToken;
use crate::error::ProfileResult;
use crate::progress::{ProgressEvent, ProgressMode, ProgressSlot};
use crate::worker::spawn_operation;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Keeps the terminal in raw mode until dropped
struct RawMode;

impl RawMode {
    fn enable() -> Option<Self> {
        terminal::enable_raw_mode().ok().map(|_| Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Wait up to `timeout` for a key press; true for Esc or Ctrl+C
fn cancel_key_pressed(timeout: Duration) -> bool {
    if !matches!(event::poll(timeout), Ok(true)) {
        return false;
    }
    match event::read() {
        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
            key.code == KeyCode::Esc
                || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        }
        _ => false,
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn render(bar: &ProgressBar, event: &ProgressEvent) {
    match event.mode {
        ProgressMode::Indeterminate => {
            bar.set_style(spinner_style());
        }
        ProgressMode::Determinate { current, maximum } => {
            bar.set_style(bar_style());
            bar.set_length(maximum);
            bar.set_position(current);
        }
    }
    if event.detail.is_empty() {
        bar.set_message(event.status.clone());
    } else {
        bar.set_message(format!("{} {}", event.status, event.detail));
    }
}

/// Run `operation` off-thread, showing its progress until it finishes
pub fn run_with_progress<T, F>(name: &str, operation: F) -> ProfileResult<T>
where
    T: Send + 'static,
    F: FnOnce(&ProgressSlot, &CancellationToken) -> ProfileResult<T> + Send + 'static,
{
    let interactive = std::io::stdout().is_terminal() && std::io::stdin().is_terminal();

    let handle = spawn_operation(name, operation)?;

    let bar = if interactive {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(spinner_style());
    bar.enable_steady_tick(POLL_INTERVAL);

    let raw_mode = if interactive { RawMode::enable() } else { None };
    let mut seen = 0;

    while !handle.is_finished() {
        if raw_mode.is_some() {
            if cancel_key_pressed(POLL_INTERVAL) && !handle.is_cancelled() {
                handle.cancel();
                bar.set_style(spinner_style());
                bar.set_message("Cancelling...");
            }
        } else {
            thread::sleep(POLL_INTERVAL);
        }

        let generation = handle.progress_generation();
        if generation != seen && !handle.is_cancelled() {
            seen = generation;
            if let Some(event) = handle.latest_progress() {
                render(&bar, &event);
            }
        }
    }

    drop(raw_mode);
    bar.finish_and_clear();
    handle.join()
}
