//! Single-segment HTTP GET, streamed to a part file and renamed on completion.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Error from one segment download. The scheduler adds the segment index and
/// URL when it surfaces this to the session.
#[derive(Debug)]
pub enum SegmentError {
    /// Curl reported an error (timeout, connection, TLS, ...).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Transfer ended with fewer bytes than the advertised Content-Length
    /// (e.g. server closed early). Surfaced instead of silently keeping a
    /// truncated segment.
    ShortBody { expected: u64, received: u64 },
    /// Disk write failed (disk full, permission denied, ...).
    Storage(std::io::Error),
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::Curl(e) => write!(f, "{}", e),
            SegmentError::Http(code) => write!(f, "HTTP {}", code),
            SegmentError::ShortBody { expected, received } => {
                write!(f, "short body: expected {} bytes, got {}", expected, received)
            }
            SegmentError::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SegmentError::Curl(e) => Some(e),
            SegmentError::Storage(e) => Some(e),
            SegmentError::Http(_) | SegmentError::ShortBody { .. } => None,
        }
    }
}

/// Downloads one segment to `final_path`, skipping work entirely if the file
/// already exists. The body streams into `<final_path>.part`, renamed into
/// place only after a 2xx status and a complete body, so the final name never
/// holds a partial segment (file presence is a completion signal for resume).
pub(super) fn download_one_segment(
    url: &str,
    custom_headers: &HashMap<String, String>,
    final_path: &Path,
) -> Result<(), SegmentError> {
    if final_path.exists() {
        return Ok(());
    }
    let part_path = part_path_for(final_path);
    match fetch_to_file(url, custom_headers, &part_path) {
        Ok(()) => std::fs::rename(&part_path, final_path).map_err(SegmentError::Storage),
        Err(e) => {
            let _ = std::fs::remove_file(&part_path);
            Err(e)
        }
    }
}

fn part_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn fetch_to_file(
    url: &str,
    custom_headers: &HashMap<String, String>,
    part_path: &Path,
) -> Result<(), SegmentError> {
    let mut file = File::create(part_path).map_err(SegmentError::Storage)?;
    let received = Arc::new(AtomicU64::new(0));
    let received_in_cb = Arc::clone(&received);
    let storage_error: Arc<Mutex<Option<std::io::Error>>> = Arc::new(Mutex::new(None));
    let storage_error_cb = Arc::clone(&storage_error);

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(SegmentError::Curl)?;
    easy.follow_location(true).map_err(SegmentError::Curl)?;
    easy.connect_timeout(Duration::from_secs(30))
        .map_err(SegmentError::Curl)?;
    // Prefer low-speed timeout: abort if throughput drops below 1 KiB/s for 60s.
    // Keeps large segments on slow links from being killed by a hard wall-clock timeout.
    easy.low_speed_limit(1024).map_err(SegmentError::Curl)?;
    easy.low_speed_time(Duration::from_secs(60))
        .map_err(SegmentError::Curl)?;
    // Safety net: hard timeout after 1 hour so a completely stuck transfer eventually fails.
    easy.timeout(Duration::from_secs(3600))
        .map_err(SegmentError::Curl)?;

    let mut list = curl::easy::List::new();
    for (k, v) in custom_headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))
            .map_err(SegmentError::Curl)?;
    }
    if !custom_headers.is_empty() {
        easy.http_headers(list).map_err(SegmentError::Curl)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| match file.write_all(data) {
                Ok(()) => {
                    received_in_cb.fetch_add(data.len() as u64, Ordering::Relaxed);
                    Ok(data.len())
                }
                Err(e) => {
                    let _ = storage_error_cb.lock().unwrap().replace(e);
                    // Returning a short count makes curl abort the transfer.
                    Ok(0)
                }
            })
            .map_err(SegmentError::Curl)?;
        if let Err(e) = transfer.perform() {
            if e.is_write_error() {
                if let Some(io_err) = storage_error.lock().unwrap().take() {
                    return Err(SegmentError::Storage(io_err));
                }
            }
            return Err(SegmentError::Curl(e));
        }
    }

    let code = easy.response_code().map_err(SegmentError::Curl)?;
    if code < 200 || code >= 300 {
        return Err(SegmentError::Http(code));
    }

    let received = received.load(Ordering::Relaxed);
    let expected = easy.content_length_download().map_err(SegmentError::Curl)?;
    if expected >= 0.0 && received != expected as u64 {
        return Err(SegmentError::ShortBody {
            expected: expected as u64,
            received,
        });
    }

    file.sync_all().map_err(SegmentError::Storage)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path_for(Path::new("/tmp/out/segment_3.ts")),
            PathBuf::from("/tmp/out/segment_3.ts.part")
        );
    }

    #[test]
    fn existing_file_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment_0.ts");
        std::fs::write(&path, b"already here").unwrap();
        // Bogus URL: must not be contacted at all.
        download_one_segment("http://[::1]:1/seg0.ts", &HashMap::new(), &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"already here");
    }

    #[test]
    fn failed_download_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment_0.ts");
        let err =
            download_one_segment("http://[::1]:1/seg0.ts", &HashMap::new(), &path).unwrap_err();
        assert!(matches!(err, SegmentError::Curl(_)));
        assert!(!path.exists());
        assert!(!part_path_for(&path).exists());
    }
}
