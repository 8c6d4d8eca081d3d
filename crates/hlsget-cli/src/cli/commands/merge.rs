//! `hlsget merge` – concatenate existing segments into an MP4.

use anyhow::{Context, Result};
use hlsget_core::config::HlsgetConfig;
use hlsget_core::merge::{merge_segments, DEFAULT_FFMPEG};
use std::path::{Path, PathBuf};

pub fn run_merge(
    cfg: &HlsgetConfig,
    segments_dir: &Path,
    output_dir: &Path,
    source_url: Option<&str>,
    ffmpeg: Option<PathBuf>,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("create output dir {}", output_dir.display()))?;
    let ffmpeg = ffmpeg
        .or_else(|| cfg.ffmpeg_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG));

    let output = merge_segments(segments_dir, output_dir, source_url, &ffmpeg)?;
    println!("merged into {}", output.display());
    Ok(())
}
