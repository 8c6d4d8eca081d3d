//! Download session orchestration.
//!
//! A session ties the pieces together in order: load progress, fetch the
//! playlist, run the segment scheduler, then optionally merge. It owns the
//! pause flag and the event stream; the caller drives it from one thread and
//! may pause/resume from another through a [`SessionHandle`].

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use crate::config::HlsgetConfig;
use crate::downloader;
use crate::events::{EventSender, SessionEvent};
use crate::merge::{self, DEFAULT_FFMPEG};
use crate::playlist;
use crate::progress;

/// Upper bound on the worker pool; the configured value is clamped into
/// 1..=MAX_CONCURRENCY.
pub const MAX_CONCURRENCY: usize = 32;

/// Everything a download session needs up front.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Playlist URL; must end in `.m3u8`.
    pub url: String,
    /// Request headers sent with the playlist and every segment GET.
    pub headers: HashMap<String, String>,
    /// Directory for segment files and the progress sidecar.
    pub segments_dir: PathBuf,
    /// Directory for the merged MP4.
    pub output_dir: PathBuf,
    /// Worker pool size.
    pub concurrency: usize,
    /// Merge automatically once every segment is down.
    pub auto_merge: bool,
    /// Muxer binary; `None` means `ffmpeg` on PATH.
    pub ffmpeg_path: Option<PathBuf>,
}

impl SessionOptions {
    /// Options for `url` with tunables taken from config.
    pub fn from_config(
        url: String,
        segments_dir: PathBuf,
        output_dir: PathBuf,
        cfg: &HlsgetConfig,
    ) -> Self {
        Self {
            url,
            headers: cfg.headers.clone(),
            segments_dir,
            output_dir,
            concurrency: cfg.concurrency,
            auto_merge: cfg.auto_merge,
            ffmpeg_path: cfg.ffmpeg_path.clone(),
        }
    }
}

/// Pause/resume handle, safe to use from another thread while `run` blocks.
/// The controller is the only writer of the flag; workers only read it.
#[derive(Clone)]
pub struct SessionHandle {
    pause: Arc<AtomicBool>,
    events: EventSender,
}

impl SessionHandle {
    pub fn pause(&self) {
        self.pause.store(true, Ordering::Relaxed);
        self.events.log("download paused");
    }

    pub fn resume(&self) {
        self.pause.store(false, Ordering::Relaxed);
        self.events.log("download resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::Relaxed)
    }
}

pub struct DownloadSession {
    options: SessionOptions,
    pause: Arc<AtomicBool>,
    events: EventSender,
}

impl DownloadSession {
    /// Creates a session plus the receiving end of its event stream.
    pub fn new(options: SessionOptions) -> (Self, Receiver<SessionEvent>) {
        let (events, rx) = EventSender::channel();
        (
            Self {
                options,
                pause: Arc::new(AtomicBool::new(false)),
                events,
            },
            rx,
        )
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            pause: Arc::clone(&self.pause),
            events: self.events.clone(),
        }
    }

    /// Runs the session to completion. Any fatal error is emitted on the
    /// event stream and returned; on success a `Completed` event carries the
    /// merged path (when auto-merge ran), which is also the return value.
    pub fn run(&self) -> Result<Option<PathBuf>> {
        match self.run_inner() {
            Ok(output) => {
                self.events.completed(output.clone());
                Ok(output)
            }
            Err(e) => {
                self.events.error(format!("{:#}", e));
                Err(e)
            }
        }
    }

    fn run_inner(&self) -> Result<Option<PathBuf>> {
        let opts = &self.options;
        self.events.log(format!("starting download: {}", opts.url));

        std::fs::create_dir_all(&opts.segments_dir)
            .with_context(|| format!("create segments dir {}", opts.segments_dir.display()))?;

        let mut completed = progress::load(&opts.segments_dir);
        if !completed.is_empty() {
            self.events.log(format!(
                "resuming: {} segment(s) already recorded",
                completed.len()
            ));
        }

        let segments =
            playlist::fetch(&opts.url, &opts.headers).context("playlist fetch failed")?;
        self.events
            .log(format!("playlist parsed: {} segment(s)", segments.len()));

        let concurrency = opts.concurrency.clamp(1, MAX_CONCURRENCY);
        downloader::download_segments(
            &segments,
            &opts.headers,
            &opts.segments_dir,
            concurrency,
            &self.pause,
            &mut completed,
            &self.events,
        )?;
        self.events.log("all segments downloaded");

        if !opts.auto_merge {
            return Ok(None);
        }

        self.events.log("merging segments");
        std::fs::create_dir_all(&opts.output_dir)
            .with_context(|| format!("create output dir {}", opts.output_dir.display()))?;
        let ffmpeg = opts
            .ffmpeg_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG));
        let output = merge::merge_segments(
            &opts.segments_dir,
            &opts.output_dir,
            Some(&opts.url),
            &ffmpeg,
        )
        .context("merge failed")?;
        self.events.log(format!("merged into {}", output.display()));
        Ok(Some(output))
    }
}
