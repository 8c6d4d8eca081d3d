//! Segment assembly: concat manifest plus an ffmpeg stream-copy merge.
//!
//! Discovers `segment_<n>.ts` files in the segments directory, sorts them by
//! index, writes the concat-demuxer manifest, and runs ffmpeg. Sorting here
//! is what restores playlist order after out-of-order concurrent downloads.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::downloader::segment_index_of;
use crate::url_model;

/// Manifest consumed by ffmpeg's concat demuxer; deleted after a successful
/// merge, kept for inspection when the merge fails.
pub const MANIFEST_FILE: &str = "filelist.txt";

/// Muxer binary used when neither config nor caller names one.
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("no segment files found to merge")]
    NoSegments,
    #[error("could not read segments directory {dir}: {source}")]
    Scan {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write concat manifest: {0}")]
    Manifest(#[source] std::io::Error),
    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("muxer exited with {status}: {stderr}")]
    Mux {
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Concatenates the segment files in `segments_dir` into an MP4 in
/// `output_dir`, named after `source_url` when one is given. Returns the
/// output path.
pub fn merge_segments(
    segments_dir: &Path,
    output_dir: &Path,
    source_url: Option<&str>,
    ffmpeg: &Path,
) -> Result<PathBuf, MergeError> {
    let files = discover_segments(segments_dir)?;
    if files.is_empty() {
        return Err(MergeError::NoSegments);
    }

    let manifest_path = segments_dir.join(MANIFEST_FILE);
    write_manifest(&manifest_path, &files).map_err(MergeError::Manifest)?;

    let output_path = output_dir.join(format!("{}.mp4", url_model::output_stem(source_url)));

    // Concat-demuxer stream copy: no re-encode, -safe 0 admits absolute paths
    // in the manifest, -y overwrites a previous output.
    let output = Command::new(ffmpeg)
        .arg("-f")
        .arg("concat")
        .arg("-safe")
        .arg("0")
        .arg("-i")
        .arg(&manifest_path)
        .arg("-c")
        .arg("copy")
        .arg("-y")
        .arg(&output_path)
        .output()
        .map_err(|e| MergeError::Spawn {
            program: ffmpeg.display().to_string(),
            source: e,
        })?;
    if !output.status.success() {
        return Err(MergeError::Mux {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    if let Err(e) = std::fs::remove_file(&manifest_path) {
        tracing::warn!("could not remove {}: {}", manifest_path.display(), e);
    }
    Ok(output_path)
}

/// Segment files in `dir`, sorted by index ascending. Files that do not match
/// the `segment_<n>.ts` pattern are ignored.
fn discover_segments(dir: &Path) -> Result<Vec<PathBuf>, MergeError> {
    let scan_err = |e| MergeError::Scan {
        dir: dir.to_path_buf(),
        source: e,
    };
    let mut files: Vec<(usize, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        if let Some(index) = entry.file_name().to_str().and_then(segment_index_of) {
            files.push((index, entry.path()));
        }
    }
    files.sort_by_key(|(index, _)| *index);
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// One `file '<path>'` line per segment, the concat demuxer's list syntax.
fn write_manifest(path: &Path, files: &[PathBuf]) -> std::io::Result<()> {
    let mut out = String::new();
    for file in files {
        out.push_str(&format!("file '{}'\n", file.display()));
    }
    std::fs::write(path, out)
}
