//! CLI for the hlsget m3u8 downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hlsget_core::config;
use std::path::PathBuf;

use commands::{run_download, run_merge};

/// Top-level CLI for the hlsget segmented m3u8 downloader.
#[derive(Debug, Parser)]
#[command(name = "hlsget")]
#[command(about = "hlsget: segmented m3u8 downloader with resume", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a playlist's segments, resuming any earlier attempt.
    Download {
        /// Playlist URL; must end in .m3u8.
        url: String,

        /// Directory for segment files and resume state.
        #[arg(long, default_value = "segments", value_name = "DIR")]
        dir: PathBuf,

        /// Directory for the merged MP4.
        #[arg(long, default_value = ".", value_name = "DIR")]
        out: PathBuf,

        /// Concurrent segment downloads, 1-32 (default from config).
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        /// Extra request header as "Name: value". Repeatable.
        #[arg(long = "header", value_name = "HEADER")]
        headers: Vec<String>,

        /// Skip the merge step and leave the segments on disk.
        #[arg(long)]
        no_merge: bool,

        /// Path to the ffmpeg binary (default from config, else `ffmpeg`).
        #[arg(long, value_name = "PATH")]
        ffmpeg: Option<PathBuf>,
    },

    /// Merge previously downloaded segments into an MP4.
    Merge {
        /// Directory containing segment_<n>.ts files.
        #[arg(long, default_value = "segments", value_name = "DIR")]
        dir: PathBuf,

        /// Directory for the merged MP4.
        #[arg(long, default_value = ".", value_name = "DIR")]
        out: PathBuf,

        /// Source URL used to derive the output filename.
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        /// Path to the ffmpeg binary (default from config, else `ffmpeg`).
        #[arg(long, value_name = "PATH")]
        ffmpeg: Option<PathBuf>,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Download {
                url,
                dir,
                out,
                concurrency,
                headers,
                no_merge,
                ffmpeg,
            } => run_download(&cfg, url, dir, out, concurrency, &headers, no_merge, ffmpeg),
            CliCommand::Merge {
                dir,
                out,
                url,
                ffmpeg,
            } => run_merge(&cfg, &dir, &out, url.as_deref(), ffmpeg),
        }
    }
}
