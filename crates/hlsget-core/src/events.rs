//! Session event stream consumed by the calling interface.
//!
//! A session emits exactly four event kinds: progress percentage, timestamped
//! log line, fatal error, and terminal completion. Events travel over a plain
//! mpsc channel; the caller drains the receiver from its own thread.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

/// One event from a download session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Overall progress as an integer percentage in [0, 100]. Non-decreasing
    /// within a session.
    Progress(u8),
    /// Human-readable log line, stamped `[YYYY-MM-DD HH:MM:SS] ...`.
    Log(String),
    /// Fatal error message; the session stops after emitting this.
    Error(String),
    /// Terminal success. Carries the merged output path when auto-merge ran.
    Completed(Option<PathBuf>),
}

/// Sending half of the event stream. Cheap to clone; sends never block, and a
/// dropped receiver silently discards further events so a detached session
/// keeps running.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<SessionEvent>,
}

impl EventSender {
    pub fn channel() -> (EventSender, Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel();
        (EventSender { tx }, rx)
    }

    pub fn progress(&self, percent: u8) {
        let _ = self.tx.send(SessionEvent::Progress(percent.min(100)));
    }

    /// Emits `message` as a timestamped log line and mirrors it to tracing.
    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!("{}", message);
        let line = format!(
            "[{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        );
        let _ = self.tx.send(SessionEvent::Log(line));
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        let _ = self.tx.send(SessionEvent::Error(message));
    }

    pub fn completed(&self, output: Option<PathBuf>) {
        let _ = self.tx.send(SessionEvent::Completed(output));
    }
}
